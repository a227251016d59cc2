use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Id;

/// A visitor's contact-form message, as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    /// Hex form of the document ID.
    pub id: String,
    pub name: String,
    pub email: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Body of a `POST /api/message` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

impl MessageRequest {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.email.is_empty() || self.message.is_empty() {
            return Err(Error::invalid_input("name, email and message are required"));
        }
        Ok(())
    }
}

/// A message without an ID, ready for insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub name: String,
    pub email: String,
    pub message: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn new(request: MessageRequest, now: DateTime<Utc>) -> Self {
        Self {
            name: request.name,
            email: request.email,
            message: request.message,
            created_at: now,
        }
    }

    pub fn with_id(self, id: Id) -> ContactMessage {
        ContactMessage {
            id: id.to_string(),
            name: self.name,
            email: self.email,
            message: self.message,
            created_at: self.created_at,
        }
    }
}

/// A message from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDoc {
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    pub email: String,
    pub message: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl From<MessageDoc> for ContactMessage {
    fn from(doc: MessageDoc) -> Self {
        Self {
            id: doc.id.to_string(),
            name: doc.name,
            email: doc.email,
            message: doc.message,
            created_at: doc.created_at,
        }
    }
}

/// Response to a successful `POST /api/message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSaved {
    pub message: String,
    pub data: ContactMessage,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl MessageRequest {
        pub fn example() -> Self {
            Self {
                name: "Visitor".to_string(),
                email: "visitor@example.com".to_string(),
                message: "Loved the Gunsan travel page!".to_string(),
            }
        }
    }
}
