use crate::domain::order::Order;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

const HEADER: [&str; 8] = [
    "order",
    "payment",
    "state",
    "external_reference",
    "amount",
    "captured",
    "refunded",
    "currency",
];

#[derive(Debug, Serialize)]
struct PaymentRow<'a> {
    order: &'a str,
    payment: String,
    state: &'static str,
    external_reference: &'a str,
    amount: Decimal,
    captured: Decimal,
    refunded: Decimal,
    currency: &'a str,
}

/// Writes the reconciled state of every payment as CSV, one row per payment.
/// The header is written even when there are no payments.
pub struct PaymentWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PaymentWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(sink),
        }
    }

    pub fn write_orders<'a>(&mut self, orders: impl IntoIterator<Item = &'a Order>) -> Result<()> {
        self.writer.write_record(HEADER)?;
        for order in orders {
            for payment in &order.payments {
                self.writer.serialize(PaymentRow {
                    order: &order.number,
                    payment: payment.id.to_string(),
                    state: payment.state.as_str(),
                    external_reference: payment.external_reference().unwrap_or(""),
                    amount: payment.amount.amount,
                    captured: payment.captured_amount().amount,
                    refunded: payment.refunded_amount().amount,
                    currency: payment.currency(),
                })?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Money;
    use crate::domain::payment::{Payment, PaymentSource};
    use rust_decimal_macros::dec;

    #[test]
    fn test_one_row_per_payment() {
        let mut order = Order::new("R100");
        let mut payment = Payment::new(
            Money::new(dec!(20.00), "EUR"),
            PaymentSource::Other {
                method: "check".into(),
            },
        )
        .with_external_reference("TX1");
        payment.complete().unwrap();
        payment.record_capture(Money::new(dec!(15.00), "EUR"), "TX1");
        let id = order.add_payment(payment);
        let empty = Order::new("R200");

        let mut out = Vec::new();
        PaymentWriter::new(&mut out)
            .write_orders([&order, &empty])
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "order,payment,state,external_reference,amount,captured,refunded,currency"
        );
        assert_eq!(lines[1], format!("R100,{id},completed,TX1,15.00,15.00,0,EUR"));
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_empty_report_has_header() {
        let mut out = Vec::new();
        PaymentWriter::new(&mut out)
            .write_orders(std::iter::empty::<&Order>())
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "order,payment,state,external_reference,amount,captured,refunded,currency\n"
        );
    }
}
