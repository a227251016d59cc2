use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Database,
};
use rocket::{
    futures::TryStreamExt,
    tokio::time::{error::Elapsed, timeout},
};

use crate::error::{Error, Result};
use crate::model::{
    favorite::{validate_place, FavoriteDoc, FavoriteRecord},
    message::{ContactMessage, MessageDoc, MessageRequest, NewMessage},
    mongodb::{is_duplicate_key_error, u32_id_filter, Coll, Counter, Id, REVIEW_ID_COUNTER_ID},
    review::{Review, ReviewDoc, ReviewRequest},
};

use super::{FavoriteStore, HealthCheck, MessageStore, ReviewStore};

/// Turn the outcome of a time-limited database call into our error type.
fn settle<T, E>(
    outcome: std::result::Result<std::result::Result<T, E>, Elapsed>,
    limit: Duration,
    op: &str,
) -> Result<T>
where
    E: Into<Error>,
{
    match outcome {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(Error::StorageUnavailable(format!(
            "{op} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

/// Run a database call, failing with `StorageUnavailable` if it takes longer than `limit`.
async fn bounded<T, E, F>(limit: Duration, op: &str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Into<Error>,
{
    settle(timeout(limit, fut).await, limit, op)
}

/// Favorite records in the `favorites` collection, unique on `placeId`.
#[derive(Clone)]
pub struct MongoFavoriteStore {
    favorites: Coll<FavoriteDoc>,
    timeout: Duration,
}

impl MongoFavoriteStore {
    pub fn new(db: &Database, timeout: Duration) -> Self {
        Self {
            favorites: Coll::from_db(db),
            timeout,
        }
    }
}

#[rocket::async_trait]
impl FavoriteStore for MongoFavoriteStore {
    async fn get(&self, place_id: &str) -> Result<Option<FavoriteRecord>> {
        let doc = bounded(
            self.timeout,
            "favorite lookup",
            self.favorites.find_one(doc! { "placeId": place_id }, None),
        )
        .await?;
        Ok(doc.map(Into::into))
    }

    async fn upsert_increment(&self, place_id: &str, place_name: &str) -> Result<FavoriteRecord> {
        validate_place(place_id, place_name)?;

        let filter = doc! { "placeId": place_id };
        let update = doc! {
            "$inc": { "likes": 1_i64 },
            "$set": {
                "placeName": place_name,
                "updatedAt": BsonDateTime::from_chrono(Utc::now()),
            },
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let upsert = || {
            self.favorites
                .find_one_and_update(filter.clone(), update.clone(), options.clone())
        };

        let doc = match timeout(self.timeout, upsert()).await {
            // Two first-time upserts raced and the other one inserted the
            // record; it exists now, so a second attempt increments it.
            Ok(Err(err)) if is_duplicate_key_error(&err) => {
                debug!("Retrying favorite upsert for {place_id} after duplicate key");
                bounded(self.timeout, "favorite upsert", upsert()).await?
            }
            outcome => settle(outcome, self.timeout, "favorite upsert")?,
        };

        doc.map(Into::into).ok_or_else(|| {
            Error::Internal(format!("Upsert of favorite {place_id} returned no document"))
        })
    }

    async fn list_all(&self) -> Result<Vec<FavoriteRecord>> {
        let options = FindOptions::builder()
            .sort(doc! { "likes": -1, "placeName": 1, "placeId": 1 })
            .build();
        let docs: Vec<FavoriteDoc> = bounded(self.timeout, "favorite listing", async {
            self.favorites.find(None, options).await?.try_collect::<Vec<_>>().await
        })
        .await?;
        Ok(docs.into_iter().map(Into::into).collect())
    }
}

/// Contact messages in the `messages` collection.
#[derive(Clone)]
pub struct MongoMessageStore {
    messages: Coll<MessageDoc>,
    new_messages: Coll<NewMessage>,
    timeout: Duration,
}

impl MongoMessageStore {
    pub fn new(db: &Database, timeout: Duration) -> Self {
        Self {
            messages: Coll::from_db(db),
            new_messages: Coll::from_db(db),
            timeout,
        }
    }
}

#[rocket::async_trait]
impl MessageStore for MongoMessageStore {
    async fn create(&self, request: MessageRequest) -> Result<ContactMessage> {
        request.validate()?;
        let message = NewMessage::new(request, Utc::now());
        let inserted = bounded(
            self.timeout,
            "message insert",
            self.new_messages.insert_one(&message, None),
        )
        .await?;
        let id: Id = inserted
            .inserted_id
            .as_object_id()
            .ok_or_else(|| Error::Internal("Inserted message has no ObjectId".to_string()))?
            .into();
        Ok(message.with_id(id))
    }

    async fn list(&self) -> Result<Vec<ContactMessage>> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1, "_id": -1 })
            .build();
        let docs: Vec<MessageDoc> = bounded(self.timeout, "message listing", async {
            self.messages.find(None, options).await?.try_collect::<Vec<_>>().await
        })
        .await?;
        Ok(docs.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, id: Id) -> Result<bool> {
        let result = bounded(
            self.timeout,
            "message delete",
            self.messages.delete_one(id.as_doc(), None),
        )
        .await?;
        Ok(result.deleted_count > 0)
    }
}

/// Reviews in the `reviews` collection, numbered by the `reviews` counter.
#[derive(Clone)]
pub struct MongoReviewStore {
    reviews: Coll<ReviewDoc>,
    counters: Coll<Counter>,
    timeout: Duration,
}

impl MongoReviewStore {
    pub fn new(db: &Database, timeout: Duration) -> Self {
        Self {
            reviews: Coll::from_db(db),
            counters: Coll::from_db(db),
            timeout,
        }
    }
}

#[rocket::async_trait]
impl ReviewStore for MongoReviewStore {
    async fn create(&self, request: ReviewRequest) -> Result<Review> {
        request.validate()?;
        let id = bounded(
            self.timeout,
            "review ID allocation",
            Counter::next(&self.counters, REVIEW_ID_COUNTER_ID),
        )
        .await?;
        let review = request.into_review(id, Utc::now());
        let doc = ReviewDoc::from(review.clone());
        bounded(self.timeout, "review insert", self.reviews.insert_one(&doc, None)).await?;
        Ok(review)
    }

    async fn list(&self) -> Result<Vec<Review>> {
        let options = FindOptions::builder().sort(doc! { "_id": -1 }).build();
        let docs: Vec<ReviewDoc> = bounded(self.timeout, "review listing", async {
            self.reviews.find(None, options).await?.try_collect::<Vec<_>>().await
        })
        .await?;
        Ok(docs.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, id: u32) -> Result<bool> {
        let result = bounded(
            self.timeout,
            "review delete",
            self.reviews.delete_one(u32_id_filter(id), None),
        )
        .await?;
        Ok(result.deleted_count > 0)
    }
}

/// Pings the database server.
#[derive(Clone)]
pub struct MongoHealth {
    db: Database,
    timeout: Duration,
}

impl MongoHealth {
    pub fn new(db: &Database, timeout: Duration) -> Self {
        Self {
            db: db.clone(),
            timeout,
        }
    }
}

#[rocket::async_trait]
impl HealthCheck for MongoHealth {
    async fn ping(&self) -> Result<()> {
        bounded::<_, DbError, _>(
            self.timeout,
            "ping",
            self.db.run_command(doc! { "ping": 1 }, None),
        )
        .await?;
        Ok(())
    }
}
