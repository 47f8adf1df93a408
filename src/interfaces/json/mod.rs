pub mod notification_reader;
pub mod order_loader;
