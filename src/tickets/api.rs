//! HTTP surface consumed by the chat agent, the UI, and admin tooling.

use crate::shared::state::AppState;
use crate::tickets::error::TicketError;
use crate::tickets::model::{
    CreateTicketRequest, Ticket, TicketHistory, TicketListFilters, TicketPatch, TicketStats,
};
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ActorQuery {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct EscalateQuery {
    pub user_id: String,
    pub reason: Option<String>,
}

/// Ticket plus derived age, as the original dashboard expects.
#[derive(Debug, Serialize)]
pub struct TicketView {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub age_hours: f64,
}

impl From<Ticket> for TicketView {
    fn from(ticket: Ticket) -> Self {
        let age = Utc::now() - ticket.created_at;
        let age_hours = (age.num_minutes() as f64 / 60.0 * 10.0).round() / 10.0;
        Self { ticket, age_hours }
    }
}

#[derive(Debug, Serialize)]
pub struct TicketListResponse {
    pub total: usize,
    pub tickets: Vec<Ticket>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub ticket_id: String,
    pub history: Vec<TicketHistory>,
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTicketRequest>,
) -> Result<Json<Ticket>, TicketError> {
    let ticket = state.tickets.create(&req)?;
    Ok(Json(ticket))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
) -> Result<Json<TicketView>, TicketError> {
    let ticket = state.tickets.get(&ticket_id)?;
    Ok(Json(ticket.into()))
}

pub async fn list_user_tickets(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(filters): Query<TicketListFilters>,
) -> Result<Json<TicketListResponse>, TicketError> {
    let tickets = state.tickets.list_by_user(&user_id, &filters)?;
    Ok(Json(TicketListResponse {
        total: tickets.len(),
        tickets,
    }))
}

pub async fn list_all_tickets(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<TicketListFilters>,
) -> Result<Json<TicketListResponse>, TicketError> {
    let tickets = state.tickets.list_all(&filters)?;
    Ok(Json(TicketListResponse {
        total: tickets.len(),
        tickets,
    }))
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
    Query(actor): Query<ActorQuery>,
    Json(patch): Json<TicketPatch>,
) -> Result<Json<Ticket>, TicketError> {
    let ticket = state.tickets.update(&ticket_id, &patch, &actor.user_id)?;
    Ok(Json(ticket))
}

pub async fn escalate_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
    Query(query): Query<EscalateQuery>,
) -> Result<Json<Ticket>, TicketError> {
    let ticket =
        state
            .tickets
            .manual_escalate(&ticket_id, &query.user_id, query.reason.as_deref())?;
    Ok(Json(ticket))
}

pub async fn get_ticket_history(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
) -> Result<Json<HistoryResponse>, TicketError> {
    let history = state.tickets.history(&ticket_id)?;
    Ok(Json(HistoryResponse { ticket_id, history }))
}

pub async fn get_ticket_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TicketStats>, TicketError> {
    Ok(Json(state.tickets.stats()?))
}

pub async fn run_escalation_now(
    State(state): State<Arc<AppState>>,
) -> Json<crate::escalation::EscalationReport> {
    Json(state.scheduler.run_now().await)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ready",
        "auto_escalation": "active"
    }))
}

pub fn configure_ticket_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", post(create_ticket))
        .route("/api/tickets/all", get(list_all_tickets))
        .route("/api/tickets/stats/dashboard", get(get_ticket_stats))
        .route("/api/tickets/user/:user_id", get(list_user_tickets))
        .route("/api/tickets/:ticket_id", get(get_ticket))
        .route("/api/tickets/:ticket_id/status", patch(update_ticket))
        .route("/api/tickets/:ticket_id/escalate", post(escalate_ticket))
        .route("/api/tickets/:ticket_id/history", get(get_ticket_history))
        .route("/api/escalation/run", post(run_escalation_now))
        .route("/health", get(health))
}
