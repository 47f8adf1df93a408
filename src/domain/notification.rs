use super::money::MinorAmount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Payment methods the processor captures at authorisation time. An
/// authorisation for one of these is already a completed capture.
pub const AUTO_CAPTURE_ONLY_METHODS: &[&str] = &[
    "ideal",
    "c_cash",
    "directEbanking",
    "trustly",
    "giropay",
    "bcmc",
    "sofort",
    "paypal",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventCode {
    Authorisation,
    Capture,
    CancelOrRefund,
    Refund,
    Other(String),
}

impl EventCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Authorisation => "AUTHORISATION",
            Self::Capture => "CAPTURE",
            Self::CancelOrRefund => "CANCEL_OR_REFUND",
            Self::Refund => "REFUND",
            Self::Other(code) => code,
        }
    }
}

impl From<String> for EventCode {
    fn from(code: String) -> Self {
        match code.to_ascii_uppercase().as_str() {
            "AUTHORISATION" => Self::Authorisation,
            "CAPTURE" => Self::Capture,
            "CANCEL_OR_REFUND" => Self::CancelOrRefund,
            "REFUND" => Self::Refund,
            _ => Self::Other(code),
        }
    }
}

impl From<EventCode> for String {
    fn from(code: EventCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deduplication key of the notification log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationKey {
    pub psp_reference: String,
    pub event_code: EventCode,
}

impl NotificationKey {
    pub fn new(psp_reference: impl Into<String>, event_code: EventCode) -> Self {
        Self {
            psp_reference: psp_reference.into(),
            event_code,
        }
    }

    /// Flat byte form used by key-value backends.
    pub fn storage_key(&self) -> String {
        format!("{}\u{1f}{}", self.psp_reference, self.event_code)
    }
}

/// An inbound event as delivered by the processor, already authenticated and
/// parsed by the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub psp_reference: String,
    #[serde(default)]
    pub original_reference: Option<String>,
    #[serde(default)]
    pub merchant_reference: Option<String>,
    pub event_code: EventCode,
    pub success: bool,
    pub amount: MinorAmount,
    pub event_date: DateTime<Utc>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub additional_data: BTreeMap<String, String>,
}

impl NotificationEvent {
    pub fn key(&self) -> NotificationKey {
        NotificationKey::new(self.psp_reference.clone(), self.event_code.clone())
    }
}

/// One entry of the notification log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub psp_reference: String,
    pub original_reference: Option<String>,
    pub merchant_reference: Option<String>,
    pub event_code: EventCode,
    pub success: bool,
    pub amount: MinorAmount,
    pub event_date: DateTime<Utc>,
    pub payment_method: Option<String>,
    pub reason: Option<String>,
    pub additional_data: BTreeMap<String, String>,
    pub processed: bool,
    pub payment_id: Option<Uuid>,
}

impl From<NotificationEvent> for Notification {
    fn from(event: NotificationEvent) -> Self {
        Self {
            psp_reference: event.psp_reference,
            original_reference: event.original_reference,
            merchant_reference: event.merchant_reference,
            event_code: event.event_code,
            success: event.success,
            amount: event.amount,
            event_date: event.event_date,
            payment_method: event.payment_method,
            reason: event.reason,
            additional_data: event.additional_data,
            processed: false,
            payment_id: None,
        }
    }
}

impl Notification {
    pub fn key(&self) -> NotificationKey {
        NotificationKey::new(self.psp_reference.clone(), self.event_code.clone())
    }

    /// Reference of the payment this event is about. Modification events name
    /// the original authorisation in `original_reference`.
    pub fn payment_reference(&self) -> &str {
        self.original_reference
            .as_deref()
            .unwrap_or(&self.psp_reference)
    }

    /// The order number, if the processor echoed one back.
    pub fn order_reference(&self) -> Option<&str> {
        self.merchant_reference
            .as_deref()
            .filter(|reference| !reference.trim().is_empty())
    }

    pub fn is_authorisation(&self) -> bool {
        self.event_code == EventCode::Authorisation
    }

    pub fn is_auto_captured(&self) -> bool {
        let method_captures = self
            .payment_method
            .as_deref()
            .is_some_and(|method| AUTO_CAPTURE_ONLY_METHODS.contains(&method));
        let flagged = self
            .additional_data
            .get("autoCapture")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        method_captures || flagged
    }

    pub fn mark_processed(&mut self) {
        self.processed = true;
    }

    pub fn resolve_payment(&mut self, payment_id: Uuid) {
        self.payment_id = Some(payment_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> NotificationEvent {
        serde_json::from_str(json).expect("valid notification payload")
    }

    #[test]
    fn test_event_deserialization() {
        let event = parse(
            r#"{
                "pspReference": "TX1",
                "merchantReference": "R100",
                "eventCode": "AUTHORISATION",
                "success": true,
                "amount": { "currency": "EUR", "value": 2000 },
                "eventDate": "2024-03-01T10:00:00Z",
                "paymentMethod": "visa",
                "additionalData": { "authCode": "1234" }
            }"#,
        );
        assert_eq!(event.event_code, EventCode::Authorisation);
        assert_eq!(event.amount, MinorAmount::new(2000, "EUR"));
        assert_eq!(event.original_reference, None);
        assert_eq!(event.additional_data["authCode"], "1234");
    }

    #[test]
    fn test_unknown_event_code_is_preserved() {
        let code = EventCode::from("REPORT_AVAILABLE".to_string());
        assert_eq!(code, EventCode::Other("REPORT_AVAILABLE".to_string()));
        assert_eq!(String::from(code), "REPORT_AVAILABLE");
    }

    #[test]
    fn test_payment_reference_prefers_original_reference() {
        let mut notification = Notification::from(parse(
            r#"{
                "pspReference": "MOD1",
                "originalReference": "TX1",
                "eventCode": "CAPTURE",
                "success": true,
                "amount": { "currency": "EUR", "value": 2000 },
                "eventDate": "2024-03-01T10:00:00Z"
            }"#,
        ));
        assert_eq!(notification.payment_reference(), "TX1");
        notification.original_reference = None;
        assert_eq!(notification.payment_reference(), "MOD1");
    }

    #[test]
    fn test_blank_merchant_reference_is_unresolvable() {
        let mut notification = Notification::from(parse(
            r#"{
                "pspReference": "TX1",
                "merchantReference": "  ",
                "eventCode": "AUTHORISATION",
                "success": true,
                "amount": { "currency": "EUR", "value": 100 },
                "eventDate": "2024-03-01T10:00:00Z"
            }"#,
        ));
        assert_eq!(notification.order_reference(), None);
        notification.merchant_reference = Some("R1".into());
        assert_eq!(notification.order_reference(), Some("R1"));
    }

    #[test]
    fn test_auto_capture_detection() {
        let mut notification = Notification::from(parse(
            r#"{
                "pspReference": "TX1",
                "eventCode": "AUTHORISATION",
                "success": true,
                "amount": { "currency": "EUR", "value": 100 },
                "eventDate": "2024-03-01T10:00:00Z",
                "paymentMethod": "visa"
            }"#,
        ));
        assert!(!notification.is_auto_captured());

        notification.payment_method = Some("ideal".into());
        assert!(notification.is_auto_captured());

        notification.payment_method = Some("visa".into());
        notification
            .additional_data
            .insert("autoCapture".into(), "TRUE".into());
        assert!(notification.is_auto_captured());
    }
}
