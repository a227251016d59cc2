use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::{
    favorite::FavoriteDoc,
    message::{MessageDoc, NewMessage},
    review::ReviewDoc,
};

use super::counter::Counter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Favorite collections
const FAVORITES: &str = "favorites";
impl MongoCollection for FavoriteDoc {
    const NAME: &'static str = FAVORITES;
}

// Message collections
const MESSAGES: &str = "messages";
impl MongoCollection for MessageDoc {
    const NAME: &'static str = MESSAGES;
}
impl MongoCollection for NewMessage {
    const NAME: &'static str = MESSAGES;
}

// Review collections
const REVIEWS: &str = "reviews";
impl MongoCollection for ReviewDoc {
    const NAME: &'static str = REVIEWS;
}

// Counter collection
const COUNTERS: &str = "counters";
impl MongoCollection for Counter {
    const NAME: &'static str = COUNTERS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Favorite collection: one record per place.
    let favorite_index = IndexModel::builder()
        .keys(doc! {"placeId": 1})
        .options(unique)
        .build();
    Coll::<FavoriteDoc>::from_db(db)
        .create_index(favorite_index, None)
        .await?;

    // Message collection, listed newest first.
    let message_index = IndexModel::builder()
        .keys(doc! {"createdAt": -1})
        .build();
    Coll::<MessageDoc>::from_db(db)
        .create_index(message_index, None)
        .await?;

    Ok(())
}
