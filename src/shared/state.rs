use crate::escalation::EscalationScheduler;
use crate::tickets::TicketService;
use std::sync::Arc;

/// Shared handler state. The pool lives inside `TicketService`'s store, so
/// handlers only ever see the service and the scheduler.
#[derive(Clone)]
pub struct AppState {
    pub tickets: Arc<TicketService>,
    pub scheduler: Arc<EscalationScheduler>,
}
