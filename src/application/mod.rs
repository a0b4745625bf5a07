//! Application layer coordinating payments between the order store and the processor.
//!
//! `PaymentOrchestrator` owns the payment state machine. `GatewayController` routes
//! inbound callbacks and admin actions to it and keeps per-user notices.

pub mod controller;
pub mod orchestrator;
