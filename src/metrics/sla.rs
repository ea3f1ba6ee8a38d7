use crate::model::{Priority, Ticket};

use super::types::SlaMetrics;

/// Hours allowed between creation and resolution for a priority.
///
/// Labels outside the known set get the medium budget.
pub fn budget_hours(priority: &Priority) -> i64 {
    match priority {
        Priority::Critical => 4,
        Priority::High => 24,
        Priority::Medium => 48,
        Priority::Low => 72,
        Priority::Unrecognized(_) => 48,
    }
}

/// `Some(true)` if the ticket was resolved within its budget, `None` if it
/// has no measurable resolution time.
pub fn within_budget(ticket: &Ticket) -> Option<bool> {
    ticket
        .resolution_hours()
        .map(|hours| hours <= budget_hours(&ticket.priority))
}

pub(crate) fn compute_sla(tickets: &[Ticket]) -> SlaMetrics {
    let mut within_sla = 0u64;
    let mut breached_sla = 0u64;
    for ticket in tickets {
        match within_budget(ticket) {
            Some(true) => within_sla += 1,
            Some(false) => breached_sla += 1,
            None => {}
        }
    }

    let measured = within_sla + breached_sla;
    SlaMetrics {
        within_sla,
        breached_sla,
        sla_compliance: if measured > 0 {
            within_sla as f64 / measured as f64 * 100.0
        } else {
            100.0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budgets() {
        assert_eq!(budget_hours(&Priority::Critical), 4);
        assert_eq!(budget_hours(&Priority::High), 24);
        assert_eq!(budget_hours(&Priority::Medium), 48);
        assert_eq!(budget_hours(&Priority::Low), 72);
        assert_eq!(budget_hours(&Priority::Unrecognized("urgent".into())), 48);
    }

    #[test]
    fn test_no_resolved_tickets_is_fully_compliant() {
        let sla = compute_sla(&[]);
        assert_eq!(sla.within_sla, 0);
        assert_eq!(sla.breached_sla, 0);
        assert_eq!(sla.sla_compliance, 100.0);
    }
}
