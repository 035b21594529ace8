pub mod config;
pub mod escalation;
pub mod shared;
pub mod tickets;
