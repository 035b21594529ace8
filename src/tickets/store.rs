//! Diesel-backed persistence for tickets and their audit trail.
//!
//! All writes go through `insert` or `mutate`. `mutate` is the single
//! mutation path shared by user-driven updates and the escalation engine:
//! it locks the ticket row for the duration of the transaction, runs the
//! state-machine closure against the freshly read row, and commits the new
//! row together with its history entry. Two racing writers on the same
//! ticket therefore serialize, and the loser re-validates against committed
//! state.

use crate::shared::schema::{ticket_history, tickets};
use crate::shared::utils::DbPool;
use crate::tickets::error::TicketError;
use crate::tickets::model::{
    Ticket, TicketHistory, TicketListFilters, TicketStats, TicketStatus,
};
use diesel::prelude::*;

const DEFAULT_LIST_LIMIT: i64 = 50;

#[derive(Clone)]
pub struct TicketStore {
    pool: DbPool,
}

impl TicketStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(
        &self,
    ) -> Result<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>, TicketError>
    {
        Ok(self.pool.get()?)
    }

    /// Insert a freshly created ticket and its creation history entry in
    /// one transaction.
    pub fn insert(&self, ticket: &Ticket, history: &TicketHistory) -> Result<(), TicketError> {
        let mut conn = self.conn()?;
        conn.transaction::<_, TicketError, _>(|conn| {
            diesel::insert_into(tickets::table)
                .values(ticket)
                .execute(conn)?;
            diesel::insert_into(ticket_history::table)
                .values(history)
                .execute(conn)?;
            Ok(())
        })
    }

    /// Read-validate-write a single ticket under a row lock. The closure
    /// receives the current committed row and returns the updated row plus
    /// an optional history entry; both are written before commit. Returns
    /// the updated ticket and whether a history entry was recorded.
    pub fn mutate<F>(&self, ticket_id: &str, f: F) -> Result<(Ticket, bool), TicketError>
    where
        F: FnOnce(Ticket) -> Result<(Ticket, Option<TicketHistory>), TicketError>,
    {
        let mut conn = self.conn()?;
        conn.transaction::<_, TicketError, _>(|conn| {
            let current: Ticket = tickets::table
                .filter(tickets::ticket_id.eq(ticket_id))
                .for_update()
                .first(conn)
                .optional()?
                .ok_or_else(|| TicketError::TicketNotFound(ticket_id.to_string()))?;

            let (updated, history) = f(current)?;

            diesel::update(tickets::table.filter(tickets::ticket_id.eq(ticket_id)))
                .set(&updated)
                .execute(conn)?;

            let recorded = if let Some(entry) = &history {
                diesel::insert_into(ticket_history::table)
                    .values(entry)
                    .execute(conn)?;
                true
            } else {
                false
            };

            Ok((updated, recorded))
        })
    }

    pub fn get(&self, ticket_id: &str) -> Result<Ticket, TicketError> {
        let mut conn = self.conn()?;
        tickets::table
            .filter(tickets::ticket_id.eq(ticket_id))
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| TicketError::TicketNotFound(ticket_id.to_string()))
    }

    pub fn list_by_user(
        &self,
        user_id: &str,
        filters: &TicketListFilters,
    ) -> Result<Vec<Ticket>, TicketError> {
        let mut conn = self.conn()?;
        let mut q = tickets::table
            .filter(tickets::user_id.eq(user_id))
            .into_boxed();

        if let Some(status) = &filters.status {
            q = q.filter(tickets::status.eq(status.clone()));
        }
        if let Some(priority) = &filters.priority {
            q = q.filter(tickets::priority.eq(priority.clone()));
        }

        let rows = q
            .order(tickets::created_at.desc())
            .limit(filters.limit.unwrap_or(DEFAULT_LIST_LIMIT))
            .load(&mut conn)?;
        Ok(rows)
    }

    pub fn list_all(&self, filters: &TicketListFilters) -> Result<Vec<Ticket>, TicketError> {
        let mut conn = self.conn()?;
        let mut q = tickets::table.into_boxed();

        if let Some(status) = &filters.status {
            q = q.filter(tickets::status.eq(status.clone()));
        }
        if let Some(priority) = &filters.priority {
            q = q.filter(tickets::priority.eq(priority.clone()));
        }
        if let Some(escalated) = filters.escalated {
            q = q.filter(tickets::escalated.eq(escalated));
        }

        let rows = q
            .order(tickets::created_at.desc())
            .limit(filters.limit.unwrap_or(DEFAULT_LIST_LIMIT))
            .load(&mut conn)?;
        Ok(rows)
    }

    /// History entries for one ticket, newest first.
    pub fn history(&self, ticket_id: &str) -> Result<Vec<TicketHistory>, TicketError> {
        let mut conn = self.conn()?;
        let exists: i64 = tickets::table
            .filter(tickets::ticket_id.eq(ticket_id))
            .count()
            .get_result(&mut conn)?;
        if exists == 0 {
            return Err(TicketError::TicketNotFound(ticket_id.to_string()));
        }

        let rows = ticket_history::table
            .filter(ticket_history::ticket_id.eq(ticket_id))
            .order(ticket_history::changed_at.desc())
            .load(&mut conn)?;
        Ok(rows)
    }

    /// Tickets the escalation engine should look at: not terminal and not
    /// already flagged. The engine re-validates each row under its own
    /// transaction before acting.
    pub fn eligible_for_escalation(&self) -> Result<Vec<Ticket>, TicketError> {
        let mut conn = self.conn()?;
        let terminal = [
            TicketStatus::Resolved.as_str(),
            TicketStatus::Closed.as_str(),
        ];
        let rows = tickets::table
            .filter(tickets::escalated.eq(false))
            .filter(tickets::status.ne_all(terminal))
            .order(tickets::last_action_at.asc())
            .load(&mut conn)?;
        Ok(rows)
    }

    pub fn stats(&self) -> Result<TicketStats, TicketError> {
        let mut conn = self.conn()?;

        let count_status = |conn: &mut PgConnection, status: TicketStatus| -> QueryResult<i64> {
            tickets::table
                .filter(tickets::status.eq(status.as_str()))
                .count()
                .get_result(conn)
        };

        let total: i64 = tickets::table.count().get_result(&mut conn)?;
        let open = count_status(&mut conn, TicketStatus::Open)?;
        let in_progress = count_status(&mut conn, TicketStatus::InProgress)?;
        let escalated = count_status(&mut conn, TicketStatus::Escalated)?;
        let resolved = count_status(&mut conn, TicketStatus::Resolved)?;

        let terminal = [
            TicketStatus::Resolved.as_str(),
            TicketStatus::Closed.as_str(),
        ];
        let active_critical: i64 = tickets::table
            .filter(tickets::priority.eq("Critical"))
            .filter(tickets::status.ne_all(terminal))
            .count()
            .get_result(&mut conn)?;
        let active_high: i64 = tickets::table
            .filter(tickets::priority.eq("High"))
            .filter(tickets::status.ne_all(terminal))
            .count()
            .get_result(&mut conn)?;

        Ok(TicketStats {
            total,
            open,
            in_progress,
            escalated,
            resolved,
            active_critical,
            active_high,
            resolution_rate: resolution_rate(resolved, total),
        })
    }
}

pub fn resolution_rate(resolved: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (resolved as f64 / total as f64 * 10000.0).round() / 100.0
}
