use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::error::{Error, Result};
use crate::model::{
    favorite::{validate_place, FavoriteRecord},
    message::{ContactMessage, MessageRequest, NewMessage},
    mongodb::Id,
    review::{Review, ReviewRequest},
};

use super::{FavoriteStore, HealthCheck, MessageStore, ReviewStore};

/// Take a lock, treating a poisoned one as an unusable store.
fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| Error::StorageUnavailable(format!("{what} lock poisoned")))
}

/// Favorite records keyed by place ID. The whole read-modify-write of an
/// increment happens under one lock, so increments are never lost.
#[derive(Debug, Default)]
pub struct MemoryFavoriteStore {
    records: Mutex<HashMap<String, FavoriteRecord>>,
}

#[rocket::async_trait]
impl FavoriteStore for MemoryFavoriteStore {
    async fn get(&self, place_id: &str) -> Result<Option<FavoriteRecord>> {
        Ok(lock(&self.records, "favorite store")?.get(place_id).cloned())
    }

    async fn upsert_increment(&self, place_id: &str, place_name: &str) -> Result<FavoriteRecord> {
        validate_place(place_id, place_name)?;
        let now = Utc::now();
        let mut records = lock(&self.records, "favorite store")?;
        let record = records
            .entry(place_id.to_string())
            .and_modify(|record| record.like(place_name, now))
            .or_insert_with(|| FavoriteRecord::first_like(place_id, place_name, now));
        Ok(record.clone())
    }

    async fn list_all(&self) -> Result<Vec<FavoriteRecord>> {
        Ok(lock(&self.records, "favorite store")?
            .values()
            .cloned()
            .collect())
    }
}

/// Contact messages in insertion order.
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    messages: Mutex<Vec<ContactMessage>>,
}

#[rocket::async_trait]
impl MessageStore for MemoryMessageStore {
    async fn create(&self, request: MessageRequest) -> Result<ContactMessage> {
        request.validate()?;
        let message = NewMessage::new(request, Utc::now()).with_id(Id::new());
        lock(&self.messages, "message store")?.push(message.clone());
        Ok(message)
    }

    async fn list(&self) -> Result<Vec<ContactMessage>> {
        let mut messages = lock(&self.messages, "message store")?.clone();
        messages.reverse();
        Ok(messages)
    }

    async fn delete(&self, id: Id) -> Result<bool> {
        let id = id.to_string();
        let mut messages = lock(&self.messages, "message store")?;
        let before = messages.len();
        messages.retain(|message| message.id != id);
        Ok(messages.len() != before)
    }
}

#[derive(Debug)]
struct ReviewTable {
    next_id: u32,
    reviews: BTreeMap<u32, Review>,
}

impl Default for ReviewTable {
    fn default() -> Self {
        Self {
            next_id: 1,
            reviews: BTreeMap::new(),
        }
    }
}

/// Reviews keyed by their auto-incremented ID.
#[derive(Debug, Default)]
pub struct MemoryReviewStore {
    table: Mutex<ReviewTable>,
}

#[rocket::async_trait]
impl ReviewStore for MemoryReviewStore {
    async fn create(&self, request: ReviewRequest) -> Result<Review> {
        request.validate()?;
        let mut table = lock(&self.table, "review store")?;
        let id = table.next_id;
        table.next_id += 1;
        let review = request.into_review(id, Utc::now());
        table.reviews.insert(id, review.clone());
        Ok(review)
    }

    async fn list(&self) -> Result<Vec<Review>> {
        Ok(lock(&self.table, "review store")?
            .reviews
            .values()
            .rev()
            .cloned()
            .collect())
    }

    async fn delete(&self, id: u32) -> Result<bool> {
        Ok(lock(&self.table, "review store")?
            .reviews
            .remove(&id)
            .is_some())
    }
}

/// The in-memory backend is always reachable.
#[derive(Debug, Clone, Copy)]
pub struct MemoryHealth;

#[rocket::async_trait]
impl HealthCheck for MemoryHealth {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
