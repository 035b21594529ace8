//! Ticket and history rows plus the enumerated status/priority vocabulary.

use crate::shared::schema::{ticket_history, tickets};
use crate::tickets::error::TicketError;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity recorded on history rows written by the escalation engine.
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = tickets)]
#[diesel(treat_none_as_null = true)]
pub struct Ticket {
    pub id: Uuid,
    pub ticket_id: String,
    pub user_id: String,
    pub category: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub escalated: bool,
    pub escalation_level: i32,
    pub assigned_to: Option<String>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_action_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = ticket_history)]
pub struct TicketHistory {
    pub id: Uuid,
    pub ticket_id: String,
    pub changed_by: String,
    pub old_status: Option<String>,
    pub new_status: String,
    pub comment: String,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    Open,
    Assigned,
    InProgress,
    OnHold,
    Escalated,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::Assigned => "Assigned",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::OnHold => "On Hold",
            TicketStatus::Escalated => "Escalated",
            TicketStatus::Resolved => "Resolved",
            TicketStatus::Closed => "Closed",
        }
    }

    /// Resolved and Closed tickets are retained for audit but take no
    /// further part in escalation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(TicketStatus::Open),
            "Assigned" => Ok(TicketStatus::Assigned),
            "In Progress" => Ok(TicketStatus::InProgress),
            "On Hold" => Ok(TicketStatus::OnHold),
            "Escalated" => Ok(TicketStatus::Escalated),
            "Resolved" => Ok(TicketStatus::Resolved),
            "Closed" => Ok(TicketStatus::Closed),
            other => Err(TicketError::InvalidStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "Low",
            TicketPriority::Medium => "Medium",
            TicketPriority::High => "High",
            TicketPriority::Critical => "Critical",
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketPriority {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(TicketPriority::Low),
            "Medium" => Ok(TicketPriority::Medium),
            "High" => Ok(TicketPriority::High),
            "Critical" => Ok(TicketPriority::Critical),
            other => Err(TicketError::InvalidPriority(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTicketRequest {
    pub user_id: String,
    pub category: String,
    pub description: String,
    pub priority: Option<String>,
}

/// Partial update: only fields present in the payload are touched. For the
/// nullable columns a present-but-null value clears the column, so those
/// fields distinguish `{}` (untouched) from `{"assigned_to": null}` (clear).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketPatch {
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "nullable_field")]
    pub assigned_to: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable_field")]
    pub resolution_notes: Option<Option<String>>,
}

fn nullable_field<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketListFilters {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub escalated: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TicketStats {
    pub total: i64,
    pub open: i64,
    pub in_progress: i64,
    pub escalated: i64,
    pub resolved: i64,
    pub active_critical: i64,
    pub active_high: i64,
    pub resolution_rate: f64,
}

pub fn generate_ticket_id() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("TKT-{}", raw[..8].to_uppercase())
}
