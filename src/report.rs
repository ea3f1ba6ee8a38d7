//! Plain-text renderings of a ticket and of a KPI snapshot.
//!
//! Both are `Display` wrappers so callers can print them directly or turn
//! them into a `String` with `to_string()`.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::metrics::format::{format_duration, format_growth, format_percentage};
use crate::metrics::{KpiMetrics, TeamMemberPerformance};
use crate::model::{Status, Ticket};

const NOT_PROVIDED: &str = "Not provided";

/// Printable support-ticket report.
pub struct TicketReport<'a>(pub &'a Ticket);

/// Printable KPI summary.
pub struct MetricsReport<'a>(pub &'a KpiMetrics);

pub fn ticket_report(ticket: &Ticket) -> String {
    TicketReport(ticket).to_string()
}

pub fn metrics_report(metrics: &KpiMetrics) -> String {
    MetricsReport(metrics).to_string()
}

/// The short number shown to users: the id without its `ticket-` prefix.
pub fn ticket_number(id: &str) -> &str {
    id.strip_prefix("ticket-").unwrap_or(id)
}

fn format_when(t: DateTime<Utc>) -> String {
    t.format("%B %-d, %Y %H:%M UTC").to_string()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn write_section(f: &mut fmt::Formatter<'_>, title: &str, body: &str) -> fmt::Result {
    writeln!(f, "## {title}")?;
    writeln!(f)?;
    if body.trim().is_empty() {
        writeln!(f, "{NOT_PROVIDED}")?;
    } else {
        writeln!(f, "{}", body.trim_end())?;
    }
    writeln!(f)
}

impl fmt::Display for TicketReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.0;
        writeln!(f, "# IT Support Ticket Report")?;
        writeln!(f)?;
        writeln!(
            f,
            "Ticket #{}  [{}]",
            ticket_number(&t.id),
            t.status.as_str().to_uppercase().replace('_', " ")
        )?;
        writeln!(f)?;

        writeln!(f, "## Ticket Information")?;
        writeln!(f)?;
        let mut info = vec![
            ("Title", t.title.clone()),
            ("Category", capitalize(t.category.as_str())),
            ("Priority", t.priority.as_str().to_uppercase()),
            ("Created By", t.created_by_name.clone()),
            ("Created Date", format_when(t.created_at)),
            ("Last Updated", format_when(t.updated_at)),
            (
                "Assigned To",
                t.assigned_to_name
                    .clone()
                    .unwrap_or_else(|| "Unassigned".to_string()),
            ),
        ];
        if t.status == Status::Resolved {
            if let Some(ref name) = t.resolved_by_name {
                info.push(("Resolved By", name.clone()));
            }
            if let Some(at) = t.resolved_at {
                info.push(("Resolved Date", format_when(at)));
            }
        }
        for (label, value) in &info {
            writeln!(f, "{:<14} {value}", format!("{label}:"))?;
        }
        writeln!(f)?;

        write_section(f, "Description", &t.description)?;
        write_section(f, "Reproduction Steps", &t.reproduction_steps)?;
        if t.status == Status::Resolved || t.resolution_steps.is_some() {
            write_section(
                f,
                "Resolution Steps",
                t.resolution_steps.as_deref().unwrap_or(""),
            )?;
        }

        if !t.screenshots.is_empty() {
            writeln!(f, "## Attachments ({})", t.screenshots.len())?;
            writeln!(f)?;
            for s in &t.screenshots {
                writeln!(f, "- {s}")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "## Comments ({})", t.comments.len())?;
        writeln!(f)?;
        if t.comments.is_empty() {
            writeln!(f, "No comments yet.")?;
        }
        for c in &t.comments {
            writeln!(f, "**{}** ({})", c.user_name, format_when(c.created_at))?;
            writeln!(f, "{}", c.content.trim_end())?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Team rows ordered for display: best resolution rate first, then name.
pub fn ranked_team(metrics: &KpiMetrics) -> Vec<&TeamMemberPerformance> {
    let mut rows: Vec<&TeamMemberPerformance> = metrics.team_performance.iter().collect();
    rows.sort_by(|a, b| {
        b.resolution_rate
            .total_cmp(&a.resolution_rate)
            .then_with(|| a.user_name.cmp(&b.user_name))
    });
    rows
}

impl fmt::Display for MetricsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        writeln!(f, "# Helpdesk KPI Report")?;
        writeln!(f)?;

        writeln!(f, "## Tickets")?;
        writeln!(f, "  Total:        {}", m.total_tickets)?;
        writeln!(f, "  Open:         {}", m.open_tickets)?;
        writeln!(f, "  In progress:  {}", m.in_progress_tickets)?;
        writeln!(f, "  Resolved:     {}", m.resolved_tickets)?;
        writeln!(f, "  Closed:       {}", m.closed_tickets)?;
        writeln!(f)?;

        writeln!(f, "## Performance")?;
        writeln!(f, "  Avg resolution:  {}", format_duration(m.average_resolution_time))?;
        writeln!(f, "  First response:  {}", format_duration(m.first_response_time))?;
        writeln!(f, "  Satisfaction:    {:.1}/5", m.customer_satisfaction_score)?;
        writeln!(f)?;

        let tr = &m.ticket_trends;
        writeln!(f, "## Trends")?;
        writeln!(
            f,
            "  This week:   {} (last week {}, {})",
            tr.this_week,
            tr.last_week,
            format_growth(tr.weekly_growth)
        )?;
        writeln!(
            f,
            "  This month:  {} (last month {}, {})",
            tr.this_month,
            tr.last_month,
            format_growth(tr.monthly_growth)
        )?;
        writeln!(f)?;

        let c = &m.category_breakdown;
        writeln!(f, "## Categories")?;
        writeln!(f, "  Hardware: {}  Software: {}  Network: {}  Security: {}  Other: {}",
            c.hardware, c.software, c.network, c.security, c.other)?;
        let p = &m.priority_distribution;
        writeln!(f, "## Priorities")?;
        writeln!(f, "  Critical: {}  High: {}  Medium: {}  Low: {}",
            p.critical, p.high, p.medium, p.low)?;
        writeln!(f)?;

        let sla = &m.sla_metrics;
        writeln!(f, "## SLA")?;
        writeln!(
            f,
            "  Compliance: {} ({} within, {} breached)",
            format_percentage(sla.sla_compliance),
            sla.within_sla,
            sla.breached_sla
        )?;
        writeln!(f)?;

        writeln!(f, "## Team Performance")?;
        let team = ranked_team(m);
        if team.is_empty() {
            writeln!(f, "  No support staff.")?;
        }
        for row in team {
            writeln!(
                f,
                "  {:<20} {:<13} assigned {:>3}  resolved {:>3}  rate {:>7}  avg {}",
                row.user_name,
                row.role,
                row.assigned_tickets,
                row.resolved_tickets,
                format_percentage(row.resolution_rate),
                format_duration(row.average_resolution_time)
            )?;
        }
        writeln!(f)?;

        writeln!(f, "## Daily Volume (last {} days)", m.daily_ticket_volume.len())?;
        for day in &m.daily_ticket_volume {
            writeln!(f, "  {}  created {:>3}  resolved {:>3}", day.date, day.created, day.resolved)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{compute_kpi_metrics, MetricsOptions};
    use crate::model::{Category, Priority, Role, TicketComment, User};
    use chrono::{Duration, TimeZone};

    fn ticket() -> Ticket {
        let created = Utc.with_ymd_and_hms(2025, 3, 19, 12, 0, 0).unwrap();
        Ticket {
            id: "ticket-1700000000000".into(),
            title: "Cannot reach VPN".into(),
            description: "Timeout on connect".into(),
            reproduction_steps: String::new(),
            resolution_steps: None,
            category: Category::Network,
            priority: Priority::High,
            status: Status::InProgress,
            assigned_to: None,
            assigned_to_name: None,
            created_by: "employee-1".into(),
            created_by_name: "John Employee".into(),
            created_at: created,
            updated_at: created,
            resolved_at: None,
            resolved_by: None,
            resolved_by_name: None,
            screenshots: vec![],
            comments: vec![],
        }
    }

    #[test]
    fn test_ticket_number() {
        assert_eq!(ticket_number("ticket-123"), "123");
        assert_eq!(ticket_number("legacy"), "legacy");
    }

    #[test]
    fn test_ticket_report_contents() {
        let out = ticket_report(&ticket());
        assert!(out.contains("Ticket #1700000000000  [IN PROGRESS]"));
        assert!(out.contains("Category:      Network"));
        assert!(out.contains("Priority:      HIGH"));
        assert!(out.contains("Assigned To:   Unassigned"));
        assert!(out.contains("Created Date:  March 19, 2025 12:00 UTC"));
        // Empty reproduction steps
        assert!(out.contains("## Reproduction Steps\n\nNot provided"));
        assert!(!out.contains("Resolution Steps"));
        assert!(out.contains("## Comments (0)"));
    }

    #[test]
    fn test_resolved_ticket_report() {
        let mut t = ticket();
        t.status = Status::Resolved;
        t.resolved_at = Some(t.created_at + Duration::hours(2));
        t.resolved_by_name = Some("Tech Support".into());
        t.resolution_steps = Some("Reset the VPN profile".into());
        t.comments.push(TicketComment {
            id: "comment-1".into(),
            ticket_id: t.id.clone(),
            user_id: "tech-1".into(),
            user_name: "Tech Support".into(),
            content: "Fixed".into(),
            created_at: t.created_at + Duration::hours(2),
        });
        let out = TicketReport(&t).to_string();
        assert!(out.contains("Resolved By:   Tech Support"));
        assert!(out.contains("Resolved Date: March 19, 2025 14:00 UTC"));
        assert!(out.contains("Reset the VPN profile"));
        assert!(out.contains("**Tech Support**"));
    }

    #[test]
    fn test_metrics_report_ranks_team() {
        let now = Utc.with_ymd_and_hms(2025, 3, 19, 12, 0, 0).unwrap();
        let users: Vec<User> = [("a", "Alice"), ("b", "Bob")]
            .into_iter()
            .map(|(id, name)| User {
                id: id.into(),
                email: format!("{id}@company.com"),
                name: name.into(),
                role: Role::TechSupport,
                department: None,
                created_at: now,
            })
            .collect();
        let mut t = ticket();
        t.assigned_to = Some("b".into());
        t.status = Status::Resolved;
        t.resolved_at = Some(now + Duration::hours(1));

        let m = compute_kpi_metrics(&[t], &users, now, &MetricsOptions::default());
        // Snapshot keeps store order
        assert_eq!(m.team_performance[0].user_id, "a");
        let ranked: Vec<&str> = ranked_team(&m).iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ranked, vec!["b", "a"]);

        let out = metrics_report(&m);
        assert!(out.contains("Compliance: 100%"));
        assert!(out.contains("## Daily Volume (last 30 days)"));
        assert!(out.find("Bob").unwrap() < out.find("Alice").unwrap());
    }
}
