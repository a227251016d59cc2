use rocket::{
    serde::json::{Error as JsonError, Json},
    Route, State,
};

use crate::api::{json_body, Notice};
use crate::error::{Error, Result};
use crate::model::{
    message::{ContactMessage, MessageRequest, MessageSaved},
    mongodb::Id,
};
use crate::store::Messages;

pub fn routes() -> Vec<Route> {
    routes![save_message, list_messages, delete_message]
}

#[post("/api/message", data = "<request>")]
pub async fn save_message(
    request: std::result::Result<Json<MessageRequest>, JsonError<'_>>,
    messages: &State<Messages>,
) -> Result<Json<MessageSaved>> {
    let request = json_body(request)?;
    let data = messages.create(request).await?;
    Ok(Json(MessageSaved {
        message: "Message saved".to_string(),
        data,
    }))
}

/// Every message, newest first.
#[get("/api/messages")]
pub async fn list_messages(messages: &State<Messages>) -> Result<Json<Vec<ContactMessage>>> {
    Ok(Json(messages.list().await?))
}

#[delete("/api/messages/<id>")]
pub async fn delete_message(id: &str, messages: &State<Messages>) -> Result<Json<Notice>> {
    let parsed: Id = id
        .parse()
        .map_err(|_| Error::invalid_input(format!("'{id}' is not a valid message ID")))?;
    if !messages.delete(parsed).await? {
        return Err(Error::not_found(format!("Message with ID '{id}'")));
    }
    Ok(Json(Notice::new("Message deleted")))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::json,
    };

    use super::*;
    use crate::error::ErrorMessage;

    async fn save(client: &Client, request: &MessageRequest) -> ContactMessage {
        let response = client
            .post(uri!(save_message))
            .header(ContentType::JSON)
            .body(json!(request).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let saved: MessageSaved = response.into_json().await.unwrap();
        assert_eq!(saved.data.name, request.name);
        saved.data
    }

    #[backend_test]
    async fn save_list_delete(client: Client) {
        let first = save(&client, &MessageRequest::example()).await;
        let mut request = MessageRequest::example();
        request.message = "A second note".to_string();
        let second = save(&client, &request).await;

        let response = client.get(uri!(list_messages)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let listed: Vec<ContactMessage> = response.into_json().await.unwrap();
        assert_eq!(listed, vec![second.clone(), first.clone()]);

        let response = client
            .delete(uri!(delete_message(first.id.as_str())))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let notice: Notice = response.into_json().await.unwrap();
        assert_eq!(notice.message, "Message deleted");

        let response = client
            .delete(uri!(delete_message(first.id.as_str())))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        let response = client.get(uri!(list_messages)).dispatch().await;
        let listed: Vec<ContactMessage> = response.into_json().await.unwrap();
        assert_eq!(listed, vec![second]);
    }

    #[backend_test]
    async fn missing_fields_are_rejected(client: Client) {
        let response = client
            .post(uri!(save_message))
            .header(ContentType::JSON)
            .body(json!({ "name": "Visitor", "email": "" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        let error: ErrorMessage = response.into_json().await.unwrap();
        assert!(error.message.contains("required"));

        let response = client.get(uri!(list_messages)).dispatch().await;
        let listed: Vec<ContactMessage> = response.into_json().await.unwrap();
        assert!(listed.is_empty());
    }

    #[backend_test]
    async fn malformed_id_is_bad_request(client: Client) {
        let response = client
            .delete(uri!(delete_message("not-an-id")))
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[backend_test(mongo)]
    async fn save_list_delete_in_mongo(client: Client) {
        let saved = save(&client, &MessageRequest::example()).await;
        let response = client.get(uri!(list_messages)).dispatch().await;
        let listed: Vec<ContactMessage> = response.into_json().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, saved.id);

        let response = client
            .delete(uri!(delete_message(saved.id.as_str())))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
    }
}
