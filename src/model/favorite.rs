use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The like counter for one tourist spot, as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRecord {
    pub place_id: String,
    pub place_name: String,
    pub likes: u64,
    pub updated_at: DateTime<Utc>,
}

impl FavoriteRecord {
    /// A record for a place that has just been liked for the first time.
    pub fn first_like(place_id: &str, place_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            place_id: place_id.to_string(),
            place_name: place_name.to_string(),
            likes: 1,
            updated_at: now,
        }
    }

    /// Apply one more like, overwriting the display name.
    pub fn like(&mut self, place_name: &str, now: DateTime<Utc>) {
        self.likes += 1;
        self.place_name = place_name.to_string();
        self.updated_at = now;
    }
}

/// A favorite record as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteDoc {
    pub place_id: String,
    pub place_name: String,
    pub likes: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl From<FavoriteDoc> for FavoriteRecord {
    fn from(doc: FavoriteDoc) -> Self {
        Self {
            place_id: doc.place_id,
            place_name: doc.place_name,
            likes: doc.likes.max(0) as u64,
            updated_at: doc.updated_at,
        }
    }
}

/// Body of a `POST /favorites` request. Absent fields deserialize as empty
/// strings so that they are rejected by [`validate_place`] like empty ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRequest {
    #[serde(default)]
    pub place_id: String,
    #[serde(default)]
    pub place_name: String,
}

impl FavoriteRequest {
    pub fn new(place_id: impl Into<String>, place_name: impl Into<String>) -> Self {
        Self {
            place_id: place_id.into(),
            place_name: place_name.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_place(&self.place_id, &self.place_name)
    }
}

/// Both the place ID and its display name must be non-empty.
pub fn validate_place(place_id: &str, place_name: &str) -> Result<()> {
    if place_id.is_empty() || place_name.is_empty() {
        return Err(Error::invalid_input("placeId and placeName are required"));
    }
    Ok(())
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl FavoriteRequest {
        pub fn example() -> Self {
            Self::new("shinhung-house", "신흥동 일본식 가옥")
        }

        pub fn example2() -> Self {
            Self::new("gyeongam-railroad", "경암동 철길마을")
        }
    }

    impl FavoriteRecord {
        pub fn example(place_id: &str, place_name: &str, likes: u64) -> Self {
            Self {
                place_id: place_id.to_string(),
                place_name: place_name.to_string(),
                likes,
                updated_at: Utc::now(),
            }
        }
    }
}
