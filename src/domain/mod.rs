//! Domain types and the ports the gateway talks through.

pub mod audit;
pub mod callback;
pub mod messages;
pub mod order;
pub mod ports;
pub mod processor;
pub mod session;
pub mod status;
