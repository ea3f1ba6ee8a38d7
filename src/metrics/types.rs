use serde::Serialize;

/// Ticket creation volume for the current and previous calendar periods.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketTrends {
    pub this_week: u64,
    pub last_week: u64,
    pub this_month: u64,
    pub last_month: u64,
    /// Percent change week over week. 0 when last week had no tickets.
    pub weekly_growth: f64,
    /// Percent change month over month. 0 when last month had no tickets.
    pub monthly_growth: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryBreakdown {
    pub hardware: u64,
    pub software: u64,
    pub network: u64,
    pub security: u64,
    pub other: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PriorityDistribution {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

/// Workload and outcome figures for one support-staff member.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberPerformance {
    pub user_id: String,
    pub user_name: String,
    pub role: String,
    pub assigned_tickets: u64,
    pub resolved_tickets: u64,
    /// Hours, averaged over resolved tickets that carry a resolution time.
    pub average_resolution_time: f64,
    /// Percentage of assigned tickets that are resolved.
    pub resolution_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyVolume {
    /// UTC calendar day, `YYYY-MM-DD`.
    pub date: String,
    pub created: u64,
    pub resolved: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlaMetrics {
    #[serde(rename = "withinSLA")]
    pub within_sla: u64,
    #[serde(rename = "breachedSLA")]
    pub breached_sla: u64,
    /// Percentage within budget. 100 when nothing has been resolved.
    #[serde(rename = "slaCompliance")]
    pub sla_compliance: f64,
}

/// Snapshot of every helpdesk KPI at one instant.
///
/// Built fresh by [`super::compute_kpi_metrics`] and never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiMetrics {
    pub total_tickets: u64,
    pub open_tickets: u64,
    pub in_progress_tickets: u64,
    pub resolved_tickets: u64,
    pub closed_tickets: u64,

    /// Hours.
    pub average_resolution_time: f64,
    /// Hours from ticket creation to its first comment.
    pub first_response_time: f64,
    pub customer_satisfaction_score: f64,

    pub ticket_trends: TicketTrends,
    pub category_breakdown: CategoryBreakdown,
    pub priority_distribution: PriorityDistribution,
    pub team_performance: Vec<TeamMemberPerformance>,
    pub daily_ticket_volume: Vec<DailyVolume>,
    pub sla_metrics: SlaMetrics,
}

/// Per-user counts shown on a role-scoped dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub user_id: String,
    pub role: String,
    pub visible: u64,
    pub open: u64,
    pub in_progress: u64,
    pub resolved: u64,
    pub my_tickets: u64,
    pub assigned_to_me: u64,
}
