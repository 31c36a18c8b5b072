//! WebSocket link to the weather host: connection lifecycle and messages.

pub mod client;
pub mod messaging;
