use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A visitor review, as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: u32,
    pub name: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Body of a `POST /reviews` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub comment: String,
}

impl ReviewRequest {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.comment.is_empty() {
            return Err(Error::invalid_input("name and comment are required"));
        }
        Ok(())
    }

    pub fn into_review(self, id: u32, now: DateTime<Utc>) -> Review {
        Review {
            id,
            name: self.name,
            comment: self.comment,
            created_at: now,
        }
    }
}

/// A review as stored in the database. The numeric ID doubles as `_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDoc {
    #[serde(rename = "_id")]
    pub id: u32,
    pub name: String,
    pub comment: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReviewDoc {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            name: review.name,
            comment: review.comment,
            created_at: review.created_at,
        }
    }
}

impl From<ReviewDoc> for Review {
    fn from(doc: ReviewDoc) -> Self {
        Self {
            id: doc.id,
            name: doc.name,
            comment: doc.comment,
            created_at: doc.created_at,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl ReviewRequest {
        pub fn example() -> Self {
            Self {
                name: "Minji".to_string(),
                comment: "The carousel is lovely.".to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_and_comment_are_required() {
        assert!(ReviewRequest::example().validate().is_ok());
        let request = ReviewRequest {
            name: "Minji".to_string(),
            comment: String::new(),
        };
        assert!(request.validate().is_err());
    }
}
