//! Real-time side of Parley: who is online, which connection belongs to whom,
//! room membership, and best-effort delivery of gateway events.

pub mod connection;
pub mod dispatcher;
pub mod presence;
pub mod typing;

pub use dispatcher::{Dispatcher, SessionState};
pub use presence::PresenceRegistry;
