use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Coll;

/// The ID of the counter that hands out review IDs.
pub const REVIEW_ID_COUNTER_ID: &str = "reviews";

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u32,
}

impl Counter {
    /// Create a new `Counter` with the given ID, starting at the given value.
    pub fn new(id: impl Into<String>, start: u32) -> Self {
        Self {
            id: id.into(),
            next: start,
        }
    }

    /// Atomically retrieve the next value of the counter with the given ID.
    pub async fn next(counters: &Coll<Counter>, id: &str) -> Result<u32> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options: FindOneAndUpdateOptions = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": id }, update, options)
            .await?
            .ok_or_else(|| Error::Internal(format!("Failed to find counter with ID {id}")))?;
        Ok(counter.next)
    }
}

/// Ensure the review ID counter exists, creating it at 1 if not.
///
/// This operation is idempotent and never resets an existing counter.
pub async fn ensure_review_counter_exists(counters: &Coll<Counter>) -> std::result::Result<(), DbError> {
    let options = UpdateOptions::builder().upsert(true).build();
    counters
        .update_one(
            doc! { "_id": REVIEW_ID_COUNTER_ID },
            doc! { "$setOnInsert": { "next": 1_u32 } },
            options,
        )
        .await?;
    Ok(())
}
