//! Priority to inactivity-threshold lookup.

use crate::config::EscalationConfig;
use crate::tickets::model::TicketPriority;
use chrono::Duration;

#[derive(Clone, Debug)]
pub struct EscalationPolicy {
    critical: Duration,
    high: Duration,
    medium: Duration,
    low: Duration,
}

impl EscalationPolicy {
    pub fn from_config(cfg: &EscalationConfig) -> Self {
        Self {
            critical: Duration::minutes(cfg.critical_minutes),
            high: Duration::minutes(cfg.high_minutes),
            medium: Duration::minutes(cfg.medium_minutes),
            low: Duration::minutes(cfg.low_minutes),
        }
    }

    pub fn threshold_for(&self, priority: TicketPriority) -> Duration {
        match priority {
            TicketPriority::Critical => self.critical,
            TicketPriority::High => self.high,
            TicketPriority::Medium => self.medium,
            TicketPriority::Low => self.low,
        }
    }
}
