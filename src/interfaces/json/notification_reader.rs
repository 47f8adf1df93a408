use crate::domain::notification::NotificationEvent;
use crate::error::{ReconcileError, Result};
use std::io::Read;

/// Reads notification deliveries from a stream of JSON documents, typically
/// one per line as they were captured from the webhook.
pub struct NotificationReader<R: Read> {
    source: R,
}

impl<R: Read> NotificationReader<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Lazily deserializes deliveries in the order they appear.
    ///
    /// A malformed document yields an error; the stream cannot resynchronize
    /// after it, so iteration ends there.
    pub fn events(self) -> impl Iterator<Item = Result<NotificationEvent>> {
        let mut failed = false;
        serde_json::Deserializer::from_reader(self.source)
            .into_iter::<NotificationEvent>()
            .map_while(move |result| {
                if failed {
                    return None;
                }
                failed = result.is_err();
                Some(result.map_err(ReconcileError::from))
            })
    }
}
