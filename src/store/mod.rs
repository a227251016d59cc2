//! Storage backends for the three resources the API serves.
//!
//! Each resource is accessed only through its trait, so handlers work the
//! same over MongoDB or the in-memory backend. A [`Stores`] bundle is built
//! once at startup and placed into Rocket's managed state.

use std::time::Duration;

use mongodb::Database;
use rocket::{Build, Rocket};

use crate::error::Result;
use crate::model::{
    favorite::FavoriteRecord,
    message::{ContactMessage, MessageRequest},
    mongodb::Id,
    review::{Review, ReviewRequest},
};

mod memory;
mod mongo;

pub use memory::{MemoryFavoriteStore, MemoryHealth, MemoryMessageStore, MemoryReviewStore};
pub use mongo::{MongoFavoriteStore, MongoHealth, MongoMessageStore, MongoReviewStore};

/// Durable, uniquely-keyed storage of favorite records.
#[rocket::async_trait]
pub trait FavoriteStore: Send + Sync {
    /// Look up the record for one place.
    async fn get(&self, place_id: &str) -> Result<Option<FavoriteRecord>>;

    /// Atomically create the record with one like, or add one like to the
    /// existing record and overwrite its name. Either way `updatedAt` is set
    /// to the current time in the same step.
    ///
    /// Fails with `InvalidInput`, without touching any record, if either
    /// argument is empty.
    async fn upsert_increment(&self, place_id: &str, place_name: &str) -> Result<FavoriteRecord>;

    /// Every record, in no particular order.
    async fn list_all(&self) -> Result<Vec<FavoriteRecord>>;
}

/// Storage of contact-form messages.
#[rocket::async_trait]
pub trait MessageStore: Send + Sync {
    async fn create(&self, request: MessageRequest) -> Result<ContactMessage>;

    /// All messages, newest first.
    async fn list(&self) -> Result<Vec<ContactMessage>>;

    /// Returns `false` if there was no such message.
    async fn delete(&self, id: Id) -> Result<bool>;
}

/// Storage of reviews, numbered from 1 upwards.
#[rocket::async_trait]
pub trait ReviewStore: Send + Sync {
    async fn create(&self, request: ReviewRequest) -> Result<Review>;

    /// All reviews, highest ID first.
    async fn list(&self) -> Result<Vec<Review>>;

    /// Returns `false` if there was no such review.
    async fn delete(&self, id: u32) -> Result<bool>;
}

/// Reachability of the backing store.
#[rocket::async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> Result<()>;
}

pub type Favorites = Box<dyn FavoriteStore>;
pub type Messages = Box<dyn MessageStore>;
pub type Reviews = Box<dyn ReviewStore>;
pub type Health = Box<dyn HealthCheck>;

/// One handle per resource, all sharing a backend.
pub struct Stores {
    pub favorites: Favorites,
    pub messages: Messages,
    pub reviews: Reviews,
    pub health: Health,
}

impl Stores {
    /// Stores that live in process memory and vanish on shutdown.
    pub fn memory() -> Self {
        Self {
            favorites: Box::new(MemoryFavoriteStore::default()),
            messages: Box::new(MemoryMessageStore::default()),
            reviews: Box::new(MemoryReviewStore::default()),
            health: Box::new(MemoryHealth),
        }
    }

    /// Stores backed by the given database, with every call bounded by `timeout`.
    pub fn mongo(db: &Database, timeout: Duration) -> Self {
        Self {
            favorites: Box::new(MongoFavoriteStore::new(db, timeout)),
            messages: Box::new(MongoMessageStore::new(db, timeout)),
            reviews: Box::new(MongoReviewStore::new(db, timeout)),
            health: Box::new(MongoHealth::new(db, timeout)),
        }
    }

    /// Place every store into the managed state of `rocket`.
    pub fn manage(self, rocket: Rocket<Build>) -> Rocket<Build> {
        rocket
            .manage(self.favorites)
            .manage(self.messages)
            .manage(self.reviews)
            .manage(self.health)
    }
}
