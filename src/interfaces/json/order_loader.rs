use crate::domain::order::Order;
use crate::error::Result;
use std::io::Read;

/// Reads the orders known to the store before any notification arrives: a
/// JSON array of orders with their payments.
pub fn load_orders<R: Read>(source: R) -> Result<Vec<Order>> {
    Ok(serde_json::from_reader(source)?)
}
