//! Outbound delivery gateways.

pub mod email;
