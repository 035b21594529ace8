//! Pure transition logic for tickets.
//!
//! Every mutation in the system goes through one of the functions here,
//! whether it was triggered by a user, an admin, or the escalation engine.
//! Each function returns the updated row together with the history row that
//! must be committed in the same transaction, so the audit trail can never
//! drift from ticket state.

use crate::tickets::error::TicketError;
use crate::tickets::model::{
    generate_ticket_id, Ticket, TicketHistory, TicketPatch, TicketPriority, TicketStatus,
    SYSTEM_ACTOR,
};
use chrono::{DateTime, Duration, Utc};
use std::str::FromStr;
use uuid::Uuid;

fn history_entry(
    ticket: &Ticket,
    changed_by: &str,
    old_status: Option<String>,
    comment: String,
    now: DateTime<Utc>,
) -> TicketHistory {
    TicketHistory {
        id: Uuid::new_v4(),
        ticket_id: ticket.ticket_id.clone(),
        changed_by: changed_by.to_string(),
        old_status,
        new_status: ticket.status.clone(),
        comment,
        changed_at: now,
    }
}

/// Build a new Open ticket plus its creation history entry.
pub fn create(
    user_id: &str,
    category: &str,
    description: &str,
    priority: &str,
    now: DateTime<Utc>,
) -> Result<(Ticket, TicketHistory), TicketError> {
    let priority = TicketPriority::from_str(priority)?;

    let ticket = Ticket {
        id: Uuid::new_v4(),
        ticket_id: generate_ticket_id(),
        user_id: user_id.to_string(),
        category: category.to_string(),
        description: description.to_string(),
        priority: priority.as_str().to_string(),
        status: TicketStatus::Open.as_str().to_string(),
        escalated: false,
        escalation_level: 0,
        assigned_to: None,
        resolution_notes: None,
        created_at: now,
        updated_at: now,
        last_action_at: now,
        resolved_at: None,
    };

    let history = history_entry(&ticket, user_id, None, "Ticket created".to_string(), now);
    Ok((ticket, history))
}

/// Apply a partial update. Only fields present in the patch are touched.
/// A history entry is written when the status actually changes; its comment
/// summarizes every field changed in the same call.
pub fn apply_update(
    mut ticket: Ticket,
    patch: &TicketPatch,
    actor: &str,
    allow_reopen: bool,
    now: DateTime<Utc>,
) -> Result<(Ticket, Option<TicketHistory>), TicketError> {
    // Validate everything before mutating anything.
    let new_status = patch
        .status
        .as_deref()
        .map(TicketStatus::from_str)
        .transpose()?;
    let new_priority = patch
        .priority
        .as_deref()
        .map(TicketPriority::from_str)
        .transpose()?;
    let current_status = TicketStatus::from_str(&ticket.status)?;

    let mut changes: Vec<String> = Vec::new();

    if let Some(priority) = new_priority {
        if ticket.priority != priority.as_str() {
            changes.push(format!("priority: {} -> {}", ticket.priority, priority));
            ticket.priority = priority.as_str().to_string();
        }
    }
    // The outer Option is field presence; the inner one distinguishes a new
    // value from an explicit null that clears the field.
    if let Some(assigned_to) = &patch.assigned_to {
        if ticket.assigned_to != *assigned_to {
            match assigned_to {
                Some(name) => changes.push(format!("assigned to {name}")),
                None => changes.push("unassigned".to_string()),
            }
            ticket.assigned_to = assigned_to.clone();
        }
    }
    if let Some(notes) = &patch.resolution_notes {
        if ticket.resolution_notes != *notes {
            changes.push(match notes {
                Some(_) => "resolution notes updated".to_string(),
                None => "resolution notes cleared".to_string(),
            });
            ticket.resolution_notes = notes.clone();
        }
    }

    let mut status_changed = false;
    if let Some(status) = new_status {
        if status != current_status {
            if current_status.is_terminal() && !allow_reopen {
                return Err(TicketError::AlreadyTerminal(ticket.ticket_id.clone()));
            }
            changes.insert(0, format!("status: {current_status} -> {status}"));
            apply_status_transition(&mut ticket, current_status, status, now);
            status_changed = true;
        }
    }

    if changes.is_empty() {
        return Ok((ticket, None));
    }

    ticket.updated_at = now;
    ticket.last_action_at = now;

    let history = if status_changed {
        Some(history_entry(
            &ticket,
            actor,
            Some(current_status.as_str().to_string()),
            changes.join("; "),
            now,
        ))
    } else {
        None
    };

    Ok((ticket, history))
}

fn apply_status_transition(
    ticket: &mut Ticket,
    from: TicketStatus,
    to: TicketStatus,
    now: DateTime<Utc>,
) {
    ticket.status = to.as_str().to_string();
    // Reopening clears the resolution timestamp regardless of the target
    // status; the Resolved/Closed arms re-stamp it. The escalation counter
    // is monotonic and survives.
    if from.is_terminal() {
        ticket.resolved_at = None;
    }
    match to {
        TicketStatus::Escalated => {
            ticket.escalated = true;
            ticket.escalation_level += 1;
        }
        TicketStatus::Resolved | TicketStatus::Closed => {
            ticket.resolved_at = Some(now);
            ticket.escalated = false;
        }
        _ => {}
    }
}

/// Explicit escalation requested by a human actor. Each call raises the
/// level by one; escalating twice is a deliberate double escalation.
pub fn manual_escalate(
    mut ticket: Ticket,
    actor: &str,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(Ticket, Option<TicketHistory>), TicketError> {
    let current_status = TicketStatus::from_str(&ticket.status)?;
    if current_status.is_terminal() {
        return Err(TicketError::AlreadyTerminal(ticket.ticket_id.clone()));
    }

    ticket.status = TicketStatus::Escalated.as_str().to_string();
    ticket.escalated = true;
    ticket.escalation_level += 1;
    ticket.updated_at = now;
    ticket.last_action_at = now;

    let comment = format!(
        "Escalated to level {}: {}",
        ticket.escalation_level,
        reason.unwrap_or("Manual escalation")
    );
    let history = history_entry(
        &ticket,
        actor,
        Some(current_status.as_str().to_string()),
        comment,
        now,
    );
    Ok((ticket, Some(history)))
}

/// Inactivity-triggered escalation performed by the engine. The history
/// comment records the measured inactivity against the threshold that
/// applied, and the actor is the system identity.
pub fn auto_escalate(
    mut ticket: Ticket,
    inactive: Duration,
    threshold: Duration,
    now: DateTime<Utc>,
) -> Result<(Ticket, Option<TicketHistory>), TicketError> {
    let current_status = TicketStatus::from_str(&ticket.status)?;
    if current_status.is_terminal() {
        return Err(TicketError::AlreadyTerminal(ticket.ticket_id.clone()));
    }

    ticket.status = TicketStatus::Escalated.as_str().to_string();
    ticket.escalated = true;
    ticket.escalation_level += 1;
    ticket.updated_at = now;
    ticket.last_action_at = now;

    let comment = format!(
        "Auto-escalated to level {} after {:.1}h of inactivity ({} priority threshold {:.1}h)",
        ticket.escalation_level,
        inactive.num_minutes() as f64 / 60.0,
        ticket.priority,
        threshold.num_minutes() as f64 / 60.0,
    );
    let history = history_entry(
        &ticket,
        SYSTEM_ACTOR,
        Some(current_status.as_str().to_string()),
        comment,
        now,
    );
    Ok((ticket, Some(history)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_ticket(priority: &str) -> Ticket {
        let (ticket, _) = create("user-1", "Maintenance", "Broken AC", priority, Utc::now())
            .expect("create");
        ticket
    }

    #[test]
    fn create_produces_open_ticket_with_creation_history() {
        let now = Utc::now();
        let (ticket, history) =
            create("user-1", "IT Support", "Laptop dead", "High", now).unwrap();
        assert_eq!(ticket.status, "Open");
        assert!(!ticket.escalated);
        assert_eq!(ticket.escalation_level, 0);
        assert_eq!(ticket.last_action_at, now);
        assert!(ticket.resolved_at.is_none());
        assert_eq!(history.old_status, None);
        assert_eq!(history.new_status, "Open");
        assert_eq!(history.changed_by, "user-1");
    }

    #[test]
    fn create_rejects_unknown_priority() {
        let err = create("u", "c", "d", "Blocker", Utc::now()).unwrap_err();
        assert!(matches!(err, TicketError::InvalidPriority(_)));
    }

    #[test]
    fn update_rejects_unknown_status_without_touching_ticket() {
        let ticket = new_ticket("Medium");
        let before = ticket.clone();
        let patch = TicketPatch {
            status: Some("Purple".into()),
            ..Default::default()
        };
        let err = apply_update(ticket.clone(), &patch, "admin", false, Utc::now()).unwrap_err();
        assert!(matches!(err, TicketError::InvalidStatus(_)));
        assert_eq!(before.status, "Open");
    }

    #[test]
    fn status_change_appends_history_with_change_summary() {
        let ticket = new_ticket("Medium");
        let now = Utc::now();
        let patch = TicketPatch {
            status: Some("In Progress".into()),
            priority: Some("High".into()),
            ..Default::default()
        };
        let (updated, history) = apply_update(ticket, &patch, "admin", false, now).unwrap();
        let history = history.expect("history entry");
        assert_eq!(updated.status, "In Progress");
        assert_eq!(updated.priority, "High");
        assert_eq!(history.old_status.as_deref(), Some("Open"));
        assert_eq!(history.new_status, "In Progress");
        assert!(history.comment.contains("status: Open -> In Progress"));
        assert!(history.comment.contains("priority: Medium -> High"));
        assert_eq!(updated.last_action_at, now);
    }

    #[test]
    fn non_status_update_refreshes_timestamps_without_history() {
        let ticket = new_ticket("Low");
        let now = Utc::now();
        let patch = TicketPatch {
            assigned_to: Some(Some("tech-7".into())),
            ..Default::default()
        };
        let (updated, history) = apply_update(ticket, &patch, "admin", false, now).unwrap();
        assert!(history.is_none());
        assert_eq!(updated.assigned_to.as_deref(), Some("tech-7"));
        assert_eq!(updated.updated_at, now);
        assert_eq!(updated.last_action_at, now);
    }

    #[test]
    fn empty_patch_is_a_no_op() {
        let ticket = new_ticket("Low");
        let before_updated = ticket.updated_at;
        let (updated, history) =
            apply_update(ticket, &TicketPatch::default(), "admin", false, Utc::now()).unwrap();
        assert!(history.is_none());
        assert_eq!(updated.updated_at, before_updated);
    }

    #[test]
    fn transition_to_escalated_sets_flag_and_bumps_level() {
        let ticket = new_ticket("Medium");
        let patch = TicketPatch {
            status: Some("Escalated".into()),
            ..Default::default()
        };
        let (updated, _) = apply_update(ticket, &patch, "admin", false, Utc::now()).unwrap();
        assert!(updated.escalated);
        assert_eq!(updated.escalation_level, 1);
    }

    #[test]
    fn resolving_clears_escalation_and_stamps_resolved_at() {
        let ticket = new_ticket("Critical");
        let (escalated, _) =
            manual_escalate(ticket, "admin", Some("stuck"), Utc::now()).unwrap();
        assert!(escalated.escalated);

        let now = Utc::now();
        let patch = TicketPatch {
            status: Some("Resolved".into()),
            resolution_notes: Some(Some("Replaced the unit".into())),
            ..Default::default()
        };
        let (resolved, history) = apply_update(escalated, &patch, "admin", false, now).unwrap();
        assert_eq!(resolved.status, "Resolved");
        assert!(!resolved.escalated);
        assert_eq!(resolved.resolved_at, Some(now));
        // Level is monotonic: resolution clears the flag, not the counter.
        assert_eq!(resolved.escalation_level, 1);
        assert!(history.unwrap().comment.contains("Resolved"));
    }

    #[test]
    fn terminal_ticket_rejects_status_change_when_reopen_disabled() {
        let ticket = new_ticket("Medium");
        let patch = TicketPatch {
            status: Some("Closed".into()),
            ..Default::default()
        };
        let (closed, _) = apply_update(ticket, &patch, "admin", false, Utc::now()).unwrap();

        let reopen = TicketPatch {
            status: Some("Open".into()),
            ..Default::default()
        };
        let err = apply_update(closed, &reopen, "admin", false, Utc::now()).unwrap_err();
        assert!(matches!(err, TicketError::AlreadyTerminal(_)));
    }

    #[test]
    fn reopen_clears_resolved_at_when_enabled() {
        let ticket = new_ticket("Medium");
        let patch = TicketPatch {
            status: Some("Resolved".into()),
            ..Default::default()
        };
        let (resolved, _) = apply_update(ticket, &patch, "admin", true, Utc::now()).unwrap();
        assert!(resolved.resolved_at.is_some());

        let reopen = TicketPatch {
            status: Some("Open".into()),
            ..Default::default()
        };
        let (reopened, history) = apply_update(resolved, &reopen, "admin", true, Utc::now()).unwrap();
        assert_eq!(reopened.status, "Open");
        assert!(reopened.resolved_at.is_none());
        assert!(!reopened.escalated);
        assert!(history.is_some());
    }

    #[test]
    fn reopen_straight_to_escalated_clears_resolved_at() {
        let ticket = new_ticket("High");
        let patch = TicketPatch {
            status: Some("Resolved".into()),
            ..Default::default()
        };
        let (resolved, _) = apply_update(ticket, &patch, "admin", true, Utc::now()).unwrap();
        assert!(resolved.resolved_at.is_some());

        let reopen = TicketPatch {
            status: Some("Escalated".into()),
            ..Default::default()
        };
        let (reopened, history) =
            apply_update(resolved, &reopen, "admin", true, Utc::now()).unwrap();
        assert_eq!(reopened.status, "Escalated");
        assert!(reopened.resolved_at.is_none());
        assert!(reopened.escalated);
        assert_eq!(reopened.escalation_level, 1);
        assert_eq!(history.unwrap().old_status.as_deref(), Some("Resolved"));
    }

    #[test]
    fn explicit_null_clears_assignment() {
        let ticket = new_ticket("Medium");
        let assign = TicketPatch {
            assigned_to: Some(Some("tech-3".into())),
            ..Default::default()
        };
        let (assigned, _) = apply_update(ticket, &assign, "admin", false, Utc::now()).unwrap();
        assert_eq!(assigned.assigned_to.as_deref(), Some("tech-3"));

        let unassign: TicketPatch =
            serde_json::from_str(r#"{"assigned_to": null}"#).unwrap();
        assert_eq!(unassign.assigned_to, Some(None));
        let now = Utc::now();
        let (cleared, history) = apply_update(assigned, &unassign, "admin", false, now).unwrap();
        assert!(cleared.assigned_to.is_none());
        assert!(history.is_none());
        assert_eq!(cleared.last_action_at, now);
    }

    #[test]
    fn absent_field_leaves_assignment_untouched() {
        let ticket = new_ticket("Medium");
        let assign = TicketPatch {
            assigned_to: Some(Some("tech-3".into())),
            ..Default::default()
        };
        let (assigned, _) = apply_update(ticket, &assign, "admin", false, Utc::now()).unwrap();

        let patch: TicketPatch =
            serde_json::from_str(r#"{"priority": "High"}"#).unwrap();
        assert_eq!(patch.assigned_to, None);
        let (updated, _) = apply_update(assigned, &patch, "admin", false, Utc::now()).unwrap();
        assert_eq!(updated.assigned_to.as_deref(), Some("tech-3"));
        assert_eq!(updated.priority, "High");
    }

    #[test]
    fn manual_escalate_twice_reaches_level_two() {
        let ticket = new_ticket("High");
        let (once, h1) = manual_escalate(ticket, "admin", None, Utc::now()).unwrap();
        let (twice, h2) = manual_escalate(once, "admin", None, Utc::now()).unwrap();
        assert_eq!(twice.escalation_level, 2);
        assert_eq!(h1.unwrap().new_status, "Escalated");
        let h2 = h2.unwrap();
        assert_eq!(h2.new_status, "Escalated");
        assert_eq!(h2.old_status.as_deref(), Some("Escalated"));
    }

    #[test]
    fn manual_escalate_rejects_terminal_ticket() {
        let ticket = new_ticket("High");
        let patch = TicketPatch {
            status: Some("Resolved".into()),
            ..Default::default()
        };
        let (resolved, _) = apply_update(ticket, &patch, "admin", false, Utc::now()).unwrap();
        let err = manual_escalate(resolved, "admin", None, Utc::now()).unwrap_err();
        assert!(matches!(err, TicketError::AlreadyTerminal(_)));
    }

    #[test]
    fn auto_escalate_records_system_actor_and_inactivity() {
        let ticket = new_ticket("Critical");
        let (updated, history) = auto_escalate(
            ticket,
            Duration::minutes(180),
            Duration::minutes(120),
            Utc::now(),
        )
        .unwrap();
        assert!(updated.escalated);
        assert_eq!(updated.escalation_level, 1);
        let history = history.unwrap();
        assert_eq!(history.changed_by, SYSTEM_ACTOR);
        assert!(history.comment.contains("3.0h"));
        assert!(history.comment.contains("threshold 2.0h"));
    }

    #[test]
    fn escalation_level_never_decreases_across_a_lifecycle() {
        let ticket = new_ticket("Medium");
        let mut levels = vec![ticket.escalation_level];

        let (t, _) = manual_escalate(ticket, "admin", None, Utc::now()).unwrap();
        levels.push(t.escalation_level);

        let patch = TicketPatch {
            status: Some("In Progress".into()),
            ..Default::default()
        };
        let (t, _) = apply_update(t, &patch, "admin", false, Utc::now()).unwrap();
        levels.push(t.escalation_level);

        let (t, _) = auto_escalate(
            t,
            Duration::hours(30),
            Duration::hours(24),
            Utc::now(),
        )
        .unwrap();
        levels.push(t.escalation_level);

        let patch = TicketPatch {
            status: Some("Resolved".into()),
            ..Default::default()
        };
        let (t, _) = apply_update(t, &patch, "admin", false, Utc::now()).unwrap();
        levels.push(t.escalation_level);

        assert!(levels.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(t.escalation_level, 2);
    }
}
