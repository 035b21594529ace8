pub mod api;
pub mod error;
pub mod machine;
pub mod model;
pub mod service;
pub mod store;

pub use error::TicketError;
pub use model::{Ticket, TicketHistory, TicketPatch, TicketStats};
pub use service::TicketService;
pub use store::TicketStore;
