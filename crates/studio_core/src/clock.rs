use chrono::{DateTime, Utc};
use shared::domain::MessageId;

/// Issues creation-time message ids that stay strictly increasing even when
/// two messages land in the same millisecond.
#[derive(Debug, Default, Clone)]
pub struct MessageClock {
    last_id: i64,
}

impl MessageClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> (MessageId, DateTime<Utc>) {
        self.next_at(Utc::now())
    }

    pub fn next_at(&mut self, now: DateTime<Utc>) -> (MessageId, DateTime<Utc>) {
        let millis = now.timestamp_millis();
        let id = millis.max(self.last_id.saturating_add(1));
        self.last_id = id;
        let timestamp = DateTime::from_timestamp_millis(millis).unwrap_or(now);
        (MessageId(id), timestamp)
    }

    /// Records an id issued elsewhere (imported or injected) so later ids sort after it.
    pub fn observe(&mut self, id: MessageId) {
        self.last_id = self.last_id.max(id.0);
    }
}
