pub mod engine;
pub mod policy;
pub mod scheduler;

pub use engine::{EscalationEngine, EscalationReport};
pub use policy::EscalationPolicy;
pub use scheduler::EscalationScheduler;
