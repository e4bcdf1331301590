use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{iso8601_millis, Message},
    error::TranscriptError,
};

/// The downloadable transcript document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptExport {
    pub messages: Vec<Message>,
    #[serde(with = "iso8601_millis")]
    pub timestamp: DateTime<Utc>,
    pub message_count: usize,
}

impl TranscriptExport {
    pub fn new(messages: Vec<Message>, exported_at: DateTime<Utc>) -> Self {
        let message_count = messages.len();
        Self {
            messages,
            timestamp: exported_at,
            message_count,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, TranscriptError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn file_name(&self) -> String {
        export_file_name(self.timestamp)
    }

    pub fn from_json(raw: &str) -> Result<Self, TranscriptError> {
        let export: Self = serde_json::from_str(raw)?;
        export.validate()?;
        Ok(export)
    }

    pub fn validate(&self) -> Result<(), TranscriptError> {
        if self.message_count != self.messages.len() {
            return Err(TranscriptError::CountMismatch {
                declared: self.message_count,
                actual: self.messages.len(),
            });
        }

        // Ids double as creation times.
        if let Some((index, message)) = self
            .messages
            .iter()
            .enumerate()
            .find(|(_, message)| DateTime::from_timestamp_millis(message.id.0).is_none())
        {
            return Err(TranscriptError::IdOutOfRange {
                index,
                id: message.id,
            });
        }

        for (index, pair) in self.messages.windows(2).enumerate() {
            if pair[1].id <= pair[0].id {
                return Err(TranscriptError::OutOfOrder {
                    index: index + 1,
                    id: pair[1].id,
                });
            }
        }

        Ok(())
    }
}

pub fn export_file_name(exported_at: DateTime<Utc>) -> String {
    format!("chat-export-{}.json", exported_at.timestamp_millis())
}
