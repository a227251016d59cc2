use rocket::{
    serde::json::{Error as JsonError, Json},
    Route, State,
};

use crate::api::{json_body, Notice};
use crate::error::{Error, Result};
use crate::model::review::{Review, ReviewRequest};
use crate::store::Reviews;

pub fn routes() -> Vec<Route> {
    routes![list_reviews, add_review, delete_review]
}

/// Every review, newest first.
#[get("/reviews")]
pub async fn list_reviews(reviews: &State<Reviews>) -> Result<Json<Vec<Review>>> {
    Ok(Json(reviews.list().await?))
}

#[post("/reviews", data = "<request>")]
pub async fn add_review(
    request: std::result::Result<Json<ReviewRequest>, JsonError<'_>>,
    reviews: &State<Reviews>,
) -> Result<Json<Review>> {
    let request = json_body(request)?;
    Ok(Json(reviews.create(request).await?))
}

#[delete("/reviews/<id>")]
pub async fn delete_review(id: u32, reviews: &State<Reviews>) -> Result<Json<Notice>> {
    if !reviews.delete(id).await? {
        return Err(Error::not_found(format!("Review with ID '{id}'")));
    }
    Ok(Json(Notice::new("Review deleted")))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::json,
    };

    use super::*;

    async fn add(client: &Client) -> Review {
        let response = client
            .post(uri!(add_review))
            .header(ContentType::JSON)
            .body(json!(ReviewRequest::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        response.into_json().await.unwrap()
    }

    async fn listed_ids(client: &Client) -> Vec<u32> {
        let response = client.get(uri!(list_reviews)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let reviews: Vec<Review> = response.into_json().await.unwrap();
        reviews.into_iter().map(|r| r.id).collect()
    }

    #[backend_test]
    async fn add_list_delete(client: Client) {
        let first = add(&client).await;
        let second = add(&client).await;
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.name, ReviewRequest::example().name);
        assert_eq!(listed_ids(&client).await, [2, 1]);

        let response = client.delete(uri!(delete_review(1))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(listed_ids(&client).await, [2]);

        let response = client.delete(uri!(delete_review(1))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn empty_comment_is_rejected(client: Client) {
        let response = client
            .post(uri!(add_review))
            .header(ContentType::JSON)
            .body(json!({ "name": "Minji", "comment": "" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert!(listed_ids(&client).await.is_empty());
    }

    #[backend_test]
    async fn non_numeric_id_is_unprocessable(client: Client) {
        let response = client.delete("/reviews/first").dispatch().await;
        assert_eq!(Status::UnprocessableEntity, response.status());
    }

    #[backend_test(mongo)]
    async fn ids_come_from_the_counter(client: Client) {
        assert_eq!(add(&client).await.id, 1);
        assert_eq!(add(&client).await.id, 2);
        assert_eq!(listed_ids(&client).await, [2, 1]);
    }
}
