//! Domain model: notifications, payments, orders, and the rules that connect
//! them. Nothing in here performs I/O.

pub mod classifier;
pub mod gateway;
pub mod money;
pub mod notification;
pub mod order;
pub mod payment;
pub mod ports;
pub mod state_machine;
