pub mod format;
pub mod sla;
pub mod types;

pub use types::*;

use chrono::{DateTime, Duration, Utc, Weekday};

use crate::date_util::{date_key, Window};
use crate::model::{Category, Priority, Status, Ticket, User};

/// Stand-in for a real customer-satisfaction input, which the ticket data
/// does not carry yet. Replace once ratings are collected.
pub const PLACEHOLDER_SATISFACTION_SCORE: f64 = 4.2;

/// Length of the trailing daily-volume series.
pub const DAILY_VOLUME_DAYS: i64 = 30;

/// Knobs that change how calendar periods are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsOptions {
    /// First day of a calendar week for trend windows.
    pub week_start: Weekday,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            week_start: Weekday::Sun,
        }
    }
}

/// Compute every KPI from the full ticket and user collections as of `now`.
///
/// Pure: no I/O, no clock reads, inputs are not modified. Calling it twice
/// with the same arguments yields equal snapshots.
pub fn compute_kpi_metrics(
    tickets: &[Ticket],
    users: &[User],
    now: DateTime<Utc>,
    options: &MetricsOptions,
) -> KpiMetrics {
    log::debug!(
        "Computing KPI metrics over {} tickets and {} users as of {now}",
        tickets.len(),
        users.len()
    );

    let count_status = |s: Status| tickets.iter().filter(|t| t.status == s).count() as u64;

    let resolution_hours: Vec<i64> = tickets.iter().filter_map(Ticket::resolution_hours).collect();
    let skipped = tickets
        .iter()
        .filter(|t| t.status == Status::Resolved && t.resolved_at.is_none())
        .count();
    if skipped > 0 {
        log::warn!("{skipped} resolved tickets have no resolution time; excluded from averages");
    }
    let first_response_hours: Vec<i64> =
        tickets.iter().filter_map(Ticket::first_response_hours).collect();

    KpiMetrics {
        total_tickets: tickets.len() as u64,
        open_tickets: count_status(Status::Open),
        in_progress_tickets: count_status(Status::InProgress),
        resolved_tickets: count_status(Status::Resolved),
        closed_tickets: count_status(Status::Closed),
        average_resolution_time: mean_hours(&resolution_hours),
        first_response_time: mean_hours(&first_response_hours),
        customer_satisfaction_score: PLACEHOLDER_SATISFACTION_SCORE,
        ticket_trends: compute_trends(tickets, now, options.week_start),
        category_breakdown: compute_category_breakdown(tickets),
        priority_distribution: compute_priority_distribution(tickets),
        team_performance: compute_team_performance(tickets, users),
        daily_ticket_volume: compute_daily_volume(tickets, now),
        sla_metrics: sla::compute_sla(tickets),
    }
}

/// Role-scoped counts for one user's dashboard.
///
/// `tickets` should already be restricted to what the user can see.
pub fn compute_dashboard_summary(tickets: &[Ticket], user: &User) -> DashboardSummary {
    let mut summary = DashboardSummary {
        user_id: user.id.clone(),
        role: user.role.to_string(),
        visible: tickets.len() as u64,
        ..Default::default()
    };
    for t in tickets {
        match t.status {
            Status::Open => summary.open += 1,
            Status::InProgress => summary.in_progress += 1,
            Status::Resolved => summary.resolved += 1,
            _ => {}
        }
        if t.created_by == user.id {
            summary.my_tickets += 1;
        }
        if t.assigned_to.as_deref() == Some(user.id.as_str()) {
            summary.assigned_to_me += 1;
        }
    }
    summary
}

/// Percent change from `previous` to `current`; 0 without a baseline.
pub fn growth_rate(current: u64, previous: u64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    (current as f64 - previous as f64) / previous as f64 * 100.0
}

fn mean_hours(hours: &[i64]) -> f64 {
    if hours.is_empty() {
        return 0.0;
    }
    hours.iter().sum::<i64>() as f64 / hours.len() as f64
}

fn created_within(tickets: &[Ticket], window: &Window) -> u64 {
    tickets
        .iter()
        .filter(|t| window.contains(t.created_at))
        .count() as u64
}

fn compute_trends(tickets: &[Ticket], now: DateTime<Utc>, week_start: Weekday) -> TicketTrends {
    let this_week_window = Window::week_containing(now, week_start);
    let this_month_window = Window::month_containing(now);

    let this_week = created_within(tickets, &this_week_window);
    let last_week = created_within(tickets, &this_week_window.previous_week());
    let this_month = created_within(tickets, &this_month_window);
    let last_month = created_within(tickets, &this_month_window.previous_month());

    TicketTrends {
        this_week,
        last_week,
        this_month,
        last_month,
        weekly_growth: growth_rate(this_week, last_week),
        monthly_growth: growth_rate(this_month, last_month),
    }
}

fn compute_category_breakdown(tickets: &[Ticket]) -> CategoryBreakdown {
    let mut b = CategoryBreakdown::default();
    for t in tickets {
        match t.category {
            Category::Hardware => b.hardware += 1,
            Category::Software => b.software += 1,
            Category::Network => b.network += 1,
            Category::Security => b.security += 1,
            Category::Other => b.other += 1,
            Category::Unrecognized(_) => {}
        }
    }
    b
}

fn compute_priority_distribution(tickets: &[Ticket]) -> PriorityDistribution {
    let mut d = PriorityDistribution::default();
    for t in tickets {
        match t.priority {
            Priority::Critical => d.critical += 1,
            Priority::High => d.high += 1,
            Priority::Medium => d.medium += 1,
            Priority::Low => d.low += 1,
            Priority::Unrecognized(_) => {}
        }
    }
    d
}

fn compute_team_performance(tickets: &[Ticket], users: &[User]) -> Vec<TeamMemberPerformance> {
    users
        .iter()
        .filter(|u| u.role.is_support_staff())
        .map(|user| {
            let assigned: Vec<&Ticket> = tickets
                .iter()
                .filter(|t| t.assigned_to.as_deref() == Some(user.id.as_str()))
                .collect();
            let resolved = assigned
                .iter()
                .filter(|t| t.status == Status::Resolved)
                .count() as u64;
            let hours: Vec<i64> = assigned.iter().filter_map(|t| t.resolution_hours()).collect();
            let assigned_count = assigned.len() as u64;

            TeamMemberPerformance {
                user_id: user.id.clone(),
                user_name: user.name.clone(),
                role: user.role.to_string(),
                assigned_tickets: assigned_count,
                resolved_tickets: resolved,
                average_resolution_time: mean_hours(&hours),
                resolution_rate: if assigned_count > 0 {
                    resolved as f64 / assigned_count as f64 * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect()
}

fn compute_daily_volume(tickets: &[Ticket], now: DateTime<Utc>) -> Vec<DailyVolume> {
    (0..DAILY_VOLUME_DAYS)
        .map(|i| {
            let date = date_key(now - Duration::days(DAILY_VOLUME_DAYS - 1 - i));
            let created = tickets
                .iter()
                .filter(|t| date_key(t.created_at) == date)
                .count() as u64;
            let resolved = tickets
                .iter()
                .filter(|t| t.resolved_at.is_some_and(|r| date_key(r) == date))
                .count() as u64;
            DailyVolume {
                date,
                created,
                resolved,
            }
        })
        .collect()
}
