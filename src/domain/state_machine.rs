//! Application of classified notifications to a payment's lifecycle.
//!
//! ```text
//! pending ──► processing ──► completed
//!    │            │      └─► void
//!    └────────────┴────────► failed
//! ```
//!
//! `completed` is sticky with respect to failures: a late failure notification
//! never regresses a completed payment.

use super::classifier::{Category, Modification};
use super::money::Money;
use super::notification::Notification;
use super::payment::{Payment, PaymentState};
use crate::error::Result;

/// What applying a notification did to the payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Failed,
    /// A failure arrived for a payment that is already final.
    FailureIgnored(PaymentState),
    Completed { captured: Money },
    Voided,
    Refunded { amount: Money },
    /// An authorisation confirmed the payment's reference; capture follows later.
    Authorised { reference_matches: bool },
    Unchanged,
}

/// Applies `category` to `payment`. On error the payment is left untouched.
pub fn apply(
    payment: &mut Payment,
    category: Category,
    notification: &Notification,
    refund_reason_id: &str,
) -> Result<Effect> {
    match category {
        Category::Failure => match payment.state {
            PaymentState::Completed | PaymentState::Void => {
                Ok(Effect::FailureIgnored(payment.state))
            }
            _ => {
                payment.fail()?;
                Ok(Effect::Failed)
            }
        },
        Category::ModificationEvent(Modification::Capture) => capture(payment, notification),
        Category::ModificationEvent(Modification::CancelOrRefund) => {
            payment.void()?;
            Ok(Effect::Voided)
        }
        Category::ModificationEvent(Modification::Refund) => {
            // A refund implies the original capture went through.
            payment.complete()?;
            let amount = in_payment_currency(payment, notification);
            payment.record_refund(amount.clone(), &notification.psp_reference, refund_reason_id);
            Ok(Effect::Refunded { amount })
        }
        Category::NormalEvent { auto_captured } => {
            if auto_captured {
                payment.complete()?;
            }
            let reference = &notification.psp_reference;
            let reference_matches = payment.confirm_external_reference(reference);
            if auto_captured {
                Ok(record_capture(payment, notification))
            } else {
                Ok(Effect::Authorised { reference_matches })
            }
        }
        Category::Unhandled => Ok(Effect::Unchanged),
    }
}

fn capture(payment: &mut Payment, notification: &Notification) -> Result<Effect> {
    payment.complete()?;
    Ok(record_capture(payment, notification))
}

fn record_capture(payment: &mut Payment, notification: &Notification) -> Effect {
    let amount = in_payment_currency(payment, notification);
    payment.record_capture(amount, &notification.psp_reference);
    Effect::Completed {
        captured: payment.captured_amount(),
    }
}

/// The notification's minor-unit value as a decimal amount in the payment's
/// currency.
fn in_payment_currency(payment: &Payment, notification: &Notification) -> Money {
    Money::new(
        notification.amount.to_money().amount,
        payment.currency().to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::classifier::classify;
    use crate::domain::money::MinorAmount;
    use crate::domain::notification::{EventCode, NotificationEvent};
    use crate::domain::payment::{PaymentSource, StoredCardSource};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn payment(state: PaymentState) -> Payment {
        let mut payment = Payment::new(
            Money::new(dec!(20.00), "EUR"),
            PaymentSource::StoredCard(StoredCardSource::default()),
        )
        .with_external_reference("TX1");
        payment.state = state;
        payment
    }

    fn notification(code: EventCode, success: bool, value: i64) -> Notification {
        Notification::from(NotificationEvent {
            psp_reference: "TX1".into(),
            original_reference: None,
            merchant_reference: Some("R1".into()),
            event_code: code,
            success,
            amount: MinorAmount::new(value, "EUR"),
            event_date: Utc::now(),
            payment_method: None,
            reason: None,
            additional_data: BTreeMap::new(),
        })
    }

    fn run(payment: &mut Payment, notification: &Notification) -> Result<Effect> {
        apply(payment, classify(notification), notification, "1")
    }

    #[test]
    fn test_failure_fails_processing_payment() {
        let mut p = payment(PaymentState::Processing);
        let effect = run(&mut p, &notification(EventCode::Authorisation, false, 0)).unwrap();
        assert_eq!(effect, Effect::Failed);
        assert_eq!(p.state, PaymentState::Failed);
    }

    #[test]
    fn test_completed_is_sticky() {
        let mut p = payment(PaymentState::Completed);
        let effect = run(&mut p, &notification(EventCode::Capture, false, 2000)).unwrap();
        assert_eq!(effect, Effect::FailureIgnored(PaymentState::Completed));
        assert_eq!(p.state, PaymentState::Completed);
    }

    #[test]
    fn test_failure_on_void_is_ignored() {
        let mut p = payment(PaymentState::Void);
        let effect = run(&mut p, &notification(EventCode::Authorisation, false, 2000)).unwrap();
        assert_eq!(effect, Effect::FailureIgnored(PaymentState::Void));
        assert_eq!(p.state, PaymentState::Void);
    }

    #[test]
    fn test_capture_completes_with_captured_amount() {
        let mut p = payment(PaymentState::Processing);
        let effect = run(&mut p, &notification(EventCode::Capture, true, 2000)).unwrap();
        assert_eq!(
            effect,
            Effect::Completed {
                captured: Money::new(dec!(20.00), "EUR")
            }
        );
        assert_eq!(p.state, PaymentState::Completed);
        assert_eq!(p.captured_amount().amount, dec!(20.00));
    }

    #[test]
    fn test_cancel_or_refund_voids() {
        let mut p = payment(PaymentState::Processing);
        run(&mut p, &notification(EventCode::CancelOrRefund, true, 2000)).unwrap();
        assert_eq!(p.state, PaymentState::Void);
    }

    #[test]
    fn test_refund_arithmetic() {
        let mut p = payment(PaymentState::Completed);
        let effect = run(&mut p, &notification(EventCode::Refund, true, 1500)).unwrap();
        assert_eq!(
            effect,
            Effect::Refunded {
                amount: Money::new(dec!(15.00), "EUR")
            }
        );
        assert_eq!(p.state, PaymentState::Completed);
        assert_eq!(p.refunds.len(), 1);
        assert_eq!(p.refunds[0].amount.amount, dec!(15.00));
        assert_eq!(p.refunds[0].reason_id, "1");
    }

    #[test]
    fn test_refund_completes_processing_payment() {
        let mut p = payment(PaymentState::Processing);
        run(&mut p, &notification(EventCode::Refund, true, 500)).unwrap();
        assert_eq!(p.state, PaymentState::Completed);
        assert_eq!(p.refunded_amount().amount, dec!(5.00));
    }

    #[test]
    fn test_authorisation_without_auto_capture_keeps_state() {
        let mut p = Payment::new(
            Money::new(dec!(20.00), "EUR"),
            PaymentSource::StoredCard(StoredCardSource::default()),
        );
        p.state = PaymentState::Processing;
        let effect = run(&mut p, &notification(EventCode::Authorisation, true, 2000)).unwrap();
        assert_eq!(
            effect,
            Effect::Authorised {
                reference_matches: true
            }
        );
        assert_eq!(p.state, PaymentState::Processing);
        assert_eq!(p.external_reference(), Some("TX1"));
    }

    #[test]
    fn test_auto_captured_authorisation_completes() {
        let mut p = payment(PaymentState::Pending);
        let mut auth = notification(EventCode::Authorisation, true, 2000);
        auth.payment_method = Some("ideal".into());
        run(&mut p, &auth).unwrap();
        assert_eq!(p.state, PaymentState::Completed);
        assert_eq!(p.captured_amount().amount, dec!(20.00));
    }

    #[test]
    fn test_capture_on_void_payment_is_rejected_untouched() {
        let mut p = payment(PaymentState::Void);
        let before = p.clone();
        assert!(run(&mut p, &notification(EventCode::Capture, true, 2000)).is_err());
        assert_eq!(p, before);
    }
}
