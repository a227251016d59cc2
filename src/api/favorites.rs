use rocket::{
    http::Status,
    serde::json::{Error as JsonError, Json},
    Route, State,
};

use crate::api::json_body;
use crate::error::Result;
use crate::logging::RequestId;
use crate::model::{
    favorite::{FavoriteRecord, FavoriteRequest},
    ranking::rank,
};
use crate::store::{FavoriteStore, Favorites};

pub fn routes() -> Vec<Route> {
    routes![list_favorites, add_favorite]
}

/// All favorite records, most liked first.
#[get("/favorites")]
pub async fn list_favorites(favorites: &State<Favorites>) -> Result<Json<Vec<FavoriteRecord>>> {
    Ok(Json(ranked(favorites.inner().as_ref()).await?))
}

/// Add one like to a place, creating it if needed, and return the new ranking.
#[post("/favorites", data = "<request>")]
pub async fn add_favorite(
    request: std::result::Result<Json<FavoriteRequest>, JsonError<'_>>,
    favorites: &State<Favorites>,
    req_id: &RequestId,
) -> Result<(Status, Json<Vec<FavoriteRecord>>)> {
    let request = json_body(request)?;
    let ranking = increment_and_rank(favorites.inner().as_ref(), &request, req_id).await?;
    Ok((Status::Created, Json(ranking)))
}

/// Read every record and rank it.
pub async fn ranked(store: &dyn FavoriteStore) -> Result<Vec<FavoriteRecord>> {
    Ok(rank(store.list_all().await?))
}

/// Apply one like, then take the ranking.
///
/// The listing only starts once the increment has been acknowledged, so the
/// ranking always includes it. Any failure is returned as-is; a stale ranking
/// is never substituted.
pub async fn increment_and_rank(
    store: &dyn FavoriteStore,
    request: &FavoriteRequest,
    req_id: &RequestId,
) -> Result<Vec<FavoriteRecord>> {
    request.validate()?;
    let record = store
        .upsert_increment(&request.place_id, &request.place_name)
        .await?;
    info!(
        "req{req_id} favorite {} now has {} like(s)",
        record.place_id, record.likes
    );
    ranked(store).await
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::json,
    };

    use super::*;
    use crate::error::{Error, ErrorMessage};
    use crate::model::favorite::FavoriteRecord;
    use crate::store::MemoryFavoriteStore;

    /// A store whose backend can never be reached.
    struct UnreachableStore;

    #[rocket::async_trait]
    impl FavoriteStore for UnreachableStore {
        async fn get(&self, _place_id: &str) -> Result<Option<FavoriteRecord>> {
            Err(Error::StorageUnavailable("connection refused".into()))
        }

        async fn upsert_increment(&self, _: &str, _: &str) -> Result<FavoriteRecord> {
            Err(Error::StorageUnavailable("connection refused".into()))
        }

        async fn list_all(&self) -> Result<Vec<FavoriteRecord>> {
            Err(Error::StorageUnavailable("connection refused".into()))
        }
    }

    async fn post(client: &Client, body: String) -> (Status, Option<Vec<FavoriteRecord>>) {
        let response = client
            .post(uri!(add_favorite))
            .header(ContentType::JSON)
            .body(body)
            .dispatch()
            .await;
        let status = response.status();
        let ranking = if status == Status::Created {
            response.into_json().await
        } else {
            None
        };
        (status, ranking)
    }

    #[backend_test]
    async fn empty_store_lists_nothing(client: Client) {
        let response = client.get(uri!(list_favorites)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(ContentType::JSON, response.content_type().unwrap());
        let ranking: Vec<FavoriteRecord> = response.into_json().await.unwrap();
        assert!(ranking.is_empty());
    }

    #[backend_test]
    async fn repeated_post_increments_one_record(client: Client) {
        let body = json!(FavoriteRequest::example()).to_string();

        let (status, ranking) = post(&client, body.clone()).await;
        assert_eq!(Status::Created, status);
        let ranking = ranking.unwrap();
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].place_id, "shinhung-house");
        assert_eq!(ranking[0].place_name, "신흥동 일본식 가옥");
        assert_eq!(ranking[0].likes, 1);

        let (status, ranking) = post(&client, body).await;
        assert_eq!(Status::Created, status);
        let ranking = ranking.unwrap();
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].likes, 2);
    }

    #[backend_test]
    async fn post_returns_the_full_ranking(client: Client) {
        let first = json!(FavoriteRequest::example()).to_string();
        let second = json!(FavoriteRequest::example2()).to_string();

        post(&client, first).await;
        post(&client, second.clone()).await;
        let (_, ranking) = post(&client, second).await;

        let ids: Vec<_> = ranking
            .unwrap()
            .into_iter()
            .map(|r| (r.place_id, r.likes))
            .collect();
        assert_eq!(
            ids,
            [
                ("gyeongam-railroad".to_string(), 2),
                ("shinhung-house".to_string(), 1)
            ]
        );

        let response = client.get(uri!(list_favorites)).dispatch().await;
        let listed: Vec<FavoriteRecord> = response.into_json().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].place_id, "gyeongam-railroad");
    }

    #[backend_test]
    async fn invalid_bodies_are_rejected(client: Client) {
        for body in [
            json!({ "placeId": "", "placeName": "Somewhere" }).to_string(),
            json!({ "placeId": "somewhere" }).to_string(),
            json!({}).to_string(),
            json!({ "placeId": 5, "placeName": "Five" }).to_string(),
            "not json".to_string(),
        ] {
            let response = client
                .post(uri!(add_favorite))
                .header(ContentType::JSON)
                .body(body)
                .dispatch()
                .await;
            assert_eq!(Status::BadRequest, response.status());
            let error: ErrorMessage = response.into_json().await.unwrap();
            assert!(!error.message.is_empty());
        }

        // Nothing was created along the way.
        let response = client.get(uri!(list_favorites)).dispatch().await;
        let listed: Vec<FavoriteRecord> = response.into_json().await.unwrap();
        assert!(listed.is_empty());
    }

    #[rocket::async_test]
    async fn storage_failure_is_a_server_error() {
        let mut stores = crate::store::Stores::memory();
        stores.favorites = Box::new(UnreachableStore);
        let client = Client::tracked(crate::rocket_for_stores(stores))
            .await
            .unwrap();

        let response = client.get(uri!(list_favorites)).dispatch().await;
        assert_eq!(Status::InternalServerError, response.status());
        let error: ErrorMessage = response.into_json().await.unwrap();
        assert_eq!(error.message, "Storage unavailable");

        let (status, ranking) = post(&client, json!(FavoriteRequest::example()).to_string()).await;
        assert_eq!(Status::InternalServerError, status);
        assert!(ranking.is_none());
    }

    #[rocket::async_test]
    async fn ranking_includes_the_new_like() {
        let store = MemoryFavoriteStore::default();
        let id = RequestId(0);
        store.upsert_increment("a", "Apple").await.unwrap();
        store.upsert_increment("a", "Apple").await.unwrap();

        let ranking = increment_and_rank(&store, &FavoriteRequest::new("c", "Cherry"), &id)
            .await
            .unwrap();
        assert_eq!(ranking.len(), 2);

        let ranking = increment_and_rank(&store, &FavoriteRequest::new("c", "Cherry"), &id)
            .await
            .unwrap();
        let ids: Vec<_> = ranking.iter().map(|r| r.place_id.as_str()).collect();
        // Tied on likes, so the name decides.
        assert_eq!(ids, ["a", "c"]);

        let ranking = increment_and_rank(&store, &FavoriteRequest::new("c", "Cherry"), &id)
            .await
            .unwrap();
        let ids: Vec<_> = ranking.iter().map(|r| r.place_id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
    }

    #[rocket::async_test]
    async fn invalid_request_never_reaches_the_store() {
        let ranking = increment_and_rank(
            &UnreachableStore,
            &FavoriteRequest::new("", "Nowhere"),
            &RequestId(0),
        )
        .await;
        assert!(matches!(ranking, Err(Error::InvalidInput(_))));
    }
}
