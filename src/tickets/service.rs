//! Orchestration between the HTTP surface, the state machine, and the store.

use crate::tickets::error::TicketError;
use crate::tickets::machine;
use crate::tickets::model::{
    CreateTicketRequest, Ticket, TicketHistory, TicketListFilters, TicketPatch, TicketStats,
};
use crate::tickets::store::TicketStore;
use chrono::Utc;
use log::info;

pub struct TicketService {
    store: TicketStore,
    allow_reopen: bool,
}

impl TicketService {
    pub fn new(store: TicketStore, allow_reopen: bool) -> Self {
        Self {
            store,
            allow_reopen,
        }
    }

    pub fn create(&self, req: &CreateTicketRequest) -> Result<Ticket, TicketError> {
        let priority = req.priority.as_deref().unwrap_or("Medium");
        let (ticket, history) = machine::create(
            &req.user_id,
            &req.category,
            &req.description,
            priority,
            Utc::now(),
        )?;
        self.store.insert(&ticket, &history)?;
        info!("created ticket {} for user {}", ticket.ticket_id, ticket.user_id);
        Ok(ticket)
    }

    pub fn get(&self, ticket_id: &str) -> Result<Ticket, TicketError> {
        self.store.get(ticket_id)
    }

    pub fn list_by_user(
        &self,
        user_id: &str,
        filters: &TicketListFilters,
    ) -> Result<Vec<Ticket>, TicketError> {
        self.validate_filters(filters)?;
        self.store.list_by_user(user_id, filters)
    }

    pub fn list_all(&self, filters: &TicketListFilters) -> Result<Vec<Ticket>, TicketError> {
        self.validate_filters(filters)?;
        self.store.list_all(filters)
    }

    pub fn update(
        &self,
        ticket_id: &str,
        patch: &TicketPatch,
        actor: &str,
    ) -> Result<Ticket, TicketError> {
        let allow_reopen = self.allow_reopen;
        let now = Utc::now();
        let (ticket, _) = self.store.mutate(ticket_id, |current| {
            machine::apply_update(current, patch, actor, allow_reopen, now)
        })?;
        info!("ticket {} updated by {}", ticket.ticket_id, actor);
        Ok(ticket)
    }

    pub fn manual_escalate(
        &self,
        ticket_id: &str,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<Ticket, TicketError> {
        let now = Utc::now();
        let (ticket, _) = self
            .store
            .mutate(ticket_id, |current| {
                machine::manual_escalate(current, actor, reason, now)
            })?;
        info!(
            "ticket {} escalated to level {} by {}",
            ticket.ticket_id, ticket.escalation_level, actor
        );
        Ok(ticket)
    }

    pub fn history(&self, ticket_id: &str) -> Result<Vec<TicketHistory>, TicketError> {
        self.store.history(ticket_id)
    }

    pub fn stats(&self) -> Result<TicketStats, TicketError> {
        self.store.stats()
    }

    fn validate_filters(&self, filters: &TicketListFilters) -> Result<(), TicketError> {
        use crate::tickets::model::{TicketPriority, TicketStatus};
        if let Some(status) = &filters.status {
            status.parse::<TicketStatus>()?;
        }
        if let Some(priority) = &filters.priority {
            priority.parse::<TicketPriority>()?;
        }
        Ok(())
    }
}
