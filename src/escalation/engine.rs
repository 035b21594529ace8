//! One scan pass over the active ticket set.
//!
//! The scan is read-then-act per ticket rather than one bulk update:
//! each candidate is re-read and re-validated under its own row lock, so an
//! escalation racing a manual update can only commit against the state the
//! manual update left behind. A candidate that lost the race (now terminal,
//! or already escalated) is skipped.

use crate::escalation::policy::EscalationPolicy;
use crate::tickets::error::TicketError;
use crate::tickets::machine;
use crate::tickets::model::{Ticket, TicketPriority, TicketStatus};
use crate::tickets::store::TicketStore;
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Default, Serialize)]
pub struct EscalationReport {
    pub scanned: usize,
    pub escalated: usize,
    pub errors: Vec<String>,
}

pub struct EscalationEngine {
    store: TicketStore,
    policy: EscalationPolicy,
}

/// Whether a ticket has sat untouched past its threshold.
pub fn overdue(ticket: &Ticket, now: DateTime<Utc>, threshold: Duration) -> bool {
    now - ticket.last_action_at >= threshold
}

/// Drive one pass over the candidate list. A failure on one ticket is
/// recorded in the report and the pass continues with the rest.
fn run_scan<F>(candidates: Vec<Ticket>, mut escalate: F) -> EscalationReport
where
    F: FnMut(&Ticket) -> Result<bool, TicketError>,
{
    let mut report = EscalationReport::default();
    for candidate in candidates {
        report.scanned += 1;
        match escalate(&candidate) {
            Ok(true) => report.escalated += 1,
            Ok(false) => {}
            Err(e) => {
                warn!("scan: ticket {} failed: {e}", candidate.ticket_id);
                report.errors.push(format!("{}: {e}", candidate.ticket_id));
            }
        }
    }
    report
}

impl EscalationEngine {
    pub fn new(store: TicketStore, policy: EscalationPolicy) -> Self {
        Self { store, policy }
    }

    pub fn scan(&self, now: DateTime<Utc>) -> EscalationReport {
        let candidates = match self.store.eligible_for_escalation() {
            Ok(rows) => rows,
            Err(e) => {
                let mut report = EscalationReport::default();
                report.errors.push(format!("eligibility query failed: {e}"));
                return report;
            }
        };

        run_scan(candidates, |candidate| {
            self.escalate_if_overdue(&candidate.ticket_id, now)
        })
    }

    /// Re-check a single candidate under its row lock and escalate when it
    /// is still eligible and still overdue.
    fn escalate_if_overdue(
        &self,
        ticket_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, TicketError> {
        let policy = self.policy.clone();
        let (_, recorded) = self.store.mutate(ticket_id, move |current| {
            let status = TicketStatus::from_str(&current.status)?;
            if status.is_terminal() || current.escalated {
                // Lost the race to a manual update; leave it alone.
                debug!("scan: skipping {} ({})", current.ticket_id, current.status);
                return Ok((current, None));
            }

            // Priority may have changed since the candidate query ran, so
            // the threshold is derived from the locked row.
            let priority = TicketPriority::from_str(&current.priority)?;
            let threshold = policy.threshold_for(priority);
            if !overdue(&current, now, threshold) {
                return Ok((current, None));
            }

            let inactive = now - current.last_action_at;
            machine::auto_escalate(current, inactive, threshold, now)
        })?;
        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tickets::machine::create;

    #[test]
    fn overdue_requires_threshold_of_inactivity() {
        let now = Utc::now();
        let (mut ticket, _) = create("u", "c", "d", "Critical", now).unwrap();
        ticket.last_action_at = now - Duration::minutes(3);

        assert!(overdue(&ticket, now, Duration::minutes(2)));
        assert!(overdue(&ticket, now, Duration::minutes(3)));
        assert!(!overdue(&ticket, now, Duration::minutes(4)));
    }

    #[test]
    fn fresh_ticket_is_not_overdue() {
        let now = Utc::now();
        let (ticket, _) = create("u", "c", "d", "Low", now).unwrap();
        assert!(!overdue(&ticket, now, Duration::minutes(1)));
    }

    #[test]
    fn scan_records_a_failed_ticket_and_continues() {
        let now = Utc::now();
        let mk = |priority| create("u", "c", "d", priority, now).unwrap().0;
        let candidates = vec![mk("Critical"), mk("High"), mk("Low")];
        let failing = candidates[1].ticket_id.clone();

        let report = run_scan(candidates, |candidate| {
            if candidate.ticket_id == failing {
                Err(TicketError::TicketNotFound(candidate.ticket_id.clone()))
            } else {
                Ok(true)
            }
        });

        assert_eq!(report.scanned, 3);
        assert_eq!(report.escalated, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains(&failing));
    }

    #[test]
    fn scan_counts_only_tickets_actually_escalated() {
        let now = Utc::now();
        let mk = |priority| create("u", "c", "d", priority, now).unwrap().0;
        let candidates = vec![mk("Critical"), mk("Low")];
        let slow_one = candidates[0].ticket_id.clone();

        let report = run_scan(candidates, |candidate| {
            Ok(candidate.ticket_id == slow_one)
        });

        assert_eq!(report.scanned, 2);
        assert_eq!(report.escalated, 1);
        assert!(report.errors.is_empty());
    }
}
