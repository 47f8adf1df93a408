use super::notification::{EventCode, Notification};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modification {
    Capture,
    CancelOrRefund,
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Failure,
    ModificationEvent(Modification),
    /// Authorisation outcome. `auto_captured` is set when the processor
    /// captured the funds as part of the authorisation.
    NormalEvent { auto_captured: bool },
    Unhandled,
}

/// Maps a notification to the category that decides its effect on a payment.
///
/// A failed event is a failure whatever its event code.
pub fn classify(notification: &Notification) -> Category {
    if !notification.success {
        return Category::Failure;
    }
    match notification.event_code {
        EventCode::Capture => Category::ModificationEvent(Modification::Capture),
        EventCode::CancelOrRefund => Category::ModificationEvent(Modification::CancelOrRefund),
        EventCode::Refund => Category::ModificationEvent(Modification::Refund),
        EventCode::Authorisation => Category::NormalEvent {
            auto_captured: notification.is_auto_captured(),
        },
        EventCode::Other(_) => Category::Unhandled,
    }
}
