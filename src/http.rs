//! HTTP transports, host forwarding, and JSON fetch helpers.

pub mod client;
pub mod forwarded;
pub mod transport;
