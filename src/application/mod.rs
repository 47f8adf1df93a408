//! Application layer: reconciliation of processor notifications and the
//! checkout-side gateway calls.
//!
//! Both paths serialize on the same per-order lock ([`locks::OrderLocks`]), so
//! a notification and a checkout request never interleave on one order.

pub mod checkout;
pub mod engine;
pub mod locks;
pub mod replayer;
pub mod service;
