use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::Client as HttpClient;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::ChatBackend;
use crate::api::models::{
    Conversation, ExistsCheck, LoginResponse, Message, NewConversation, OutgoingPayload,
    UserSummary,
};
use crate::error::{ChatError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Interprets a login reply. Token problems reported in the body count as
/// unauthorized whatever the status.
pub fn login_outcome(status: u16, parsed: LoginResponse) -> Result<LoginResponse> {
    if (200..300).contains(&status) {
        return Ok(parsed);
    }
    match parsed.message.as_deref() {
        Some("Invalid token") | Some("Token expired") => Err(ChatError::Unauthorized),
        None if status == 401 => Err(ChatError::Unauthorized),
        _ => Err(ChatError::Server { status, message: parsed.message }),
    }
}

/// List endpoints sometimes answer with an object; that reads as an empty list.
pub fn list_or_empty<T: DeserializeOwned>(what: &str, value: Value) -> Result<Vec<T>> {
    if !value.is_array() {
        warn!("Expected array of {} but received: {}", what, value);
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(value)?)
}

/// Id of the existing conversation, only when the backend says it exists.
pub fn existing_id(check: ExistsCheck) -> Option<String> {
    if check.exists { check.chat_id } else { None }
}

pub struct ApiClient {
    pub http: HttpClient,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        Self::with_http(http, base_url)
    }

    pub fn with_http(http: HttpClient, base_url: &str) -> Result<Self> {
        let normalized = crate::utils::normalize_url(base_url);
        let base_url = Url::parse(&format!("{}/", normalized))
            .map_err(|e| ChatError::Config(format!("invalid backend url {normalized}: {e}")))?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ChatError::Config(e.to_string()))
    }

    fn with_auth(req: RequestBuilder, token: &str) -> RequestBuilder {
        req.header("Authorization", format!("Bearer {}", token))
    }

    /// Turns a non-2xx response into the matching error, keeping any backend message.
    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        debug!("{} {}", status.as_u16(), resp.url());
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        error!("API Error: {} - {}", status.as_u16(), text);
        let body = serde_json::from_str::<Value>(&text).ok();
        Err(ChatError::from_status(status.as_u16(), body.as_ref()))
    }

    async fn json<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let bytes = Self::check(resp).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, token: &str, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        let resp = Self::with_auth(self.http.get(url), token).send().await?;
        Self::json(resp).await
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let url = self.endpoint("auth/login")?;
        let body = serde_json::json!({ "email": email, "password": password });
        let resp = self.http.post(url).json(&body).send().await?;
        let status = resp.status().as_u16();
        let parsed: LoginResponse = resp.json().await.unwrap_or_default();
        login_outcome(status, parsed)
    }

    async fn users(&self, token: &str) -> Result<Vec<UserSummary>> {
        let value: Value = self.get_json(token, "auth").await?;
        list_or_empty("users", value)
    }

    async fn conversations(&self, token: &str) -> Result<Vec<Conversation>> {
        debug!("Fetching chats from: {}", self.base_url);
        let value: Value = self.get_json(token, "chats").await?;
        list_or_empty("chats", value)
    }

    async fn conversation(&self, token: &str, chat_id: &str) -> Result<Conversation> {
        self.get_json(token, &format!("chats/{}", chat_id)).await
    }

    async fn create_conversation(&self, token: &str, req: &NewConversation) -> Result<Conversation> {
        debug!("Creating chat with payload: {:?}", req);
        let url = self.endpoint("chats")?;
        let resp = Self::with_auth(self.http.post(url), token).json(req).send().await?;
        Self::json(resp).await
    }

    async fn existing_conversation(&self, token: &str, participant_id: &str) -> Result<Option<String>> {
        let url = self.endpoint("chats/check-exists")?;
        let body = serde_json::json!({ "participantId": participant_id });
        let resp = Self::with_auth(self.http.post(url), token).json(&body).send().await?;
        let check: ExistsCheck = Self::json(resp).await?;
        Ok(existing_id(check))
    }

    async fn delete_conversation(&self, token: &str, chat_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("chats/{}", chat_id))?;
        let resp = Self::with_auth(self.http.delete(url), token).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn add_participants(&self, token: &str, chat_id: &str, user_ids: &[String]) -> Result<Conversation> {
        let url = self.endpoint(&format!("chats/{}/participants", chat_id))?;
        let body = serde_json::json!({ "userIds": user_ids });
        let resp = Self::with_auth(self.http.post(url), token).json(&body).send().await?;
        Self::json(resp).await
    }

    async fn send_message(&self, token: &str, chat_id: &str, payload: &OutgoingPayload) -> Result<Message> {
        let url = self.endpoint(&format!("chats/{}/messages", chat_id))?;
        let req = Self::with_auth(self.http.post(url), token);
        let req = match payload {
            OutgoingPayload::Text(content) => req.json(&serde_json::json!({ "content": content })),
            OutgoingPayload::WithFile { content, file } => {
                let part = Part::bytes(file.bytes.clone())
                    .file_name(file.name.clone())
                    .mime_str(&file.mime)?;
                let mut form = Form::new();
                if let Some(text) = content {
                    form = form.text("content", text.clone());
                }
                req.multipart(form.part("file", part))
            }
        };
        Self::json(req.send().await?).await
    }

    async fn edit_message(&self, token: &str, chat_id: &str, message_id: &str, content: &str) -> Result<Message> {
        let url = self.endpoint(&format!("chats/{}/messages/{}", chat_id, message_id))?;
        let body = serde_json::json!({ "content": content });
        let resp = Self::with_auth(self.http.patch(url), token).json(&body).send().await?;
        Self::json(resp).await
    }

    async fn delete_message(&self, token: &str, chat_id: &str, message_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("chats/{}/messages/{}", chat_id, message_id))?;
        let resp = Self::with_auth(self.http.delete(url), token).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn mark_read(&self, token: &str, chat_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("chats/{}/messages/read", chat_id))?;
        let resp = Self::with_auth(self.http.post(url), token).send().await?;
        Self::check(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_under_base_path() {
        let client = ApiClient::new("api.example.org/v2/").unwrap();
        assert_eq!(client.base_url().as_str(), "https://api.example.org/v2/");
        assert_eq!(
            client.endpoint("chats/c1/messages").unwrap().as_str(),
            "https://api.example.org/v2/chats/c1/messages"
        );
        assert_eq!(
            client.endpoint("/auth/login").unwrap().as_str(),
            "https://api.example.org/v2/auth/login"
        );
    }

    #[test]
    fn rejects_unparseable_base() {
        assert!(matches!(ApiClient::new("http://exa mple.com"), Err(ChatError::Config(_))));
    }

    fn reply(message: Option<&str>) -> LoginResponse {
        LoginResponse { message: message.map(String::from), ..Default::default() }
    }

    #[test]
    fn login_token_messages_are_unauthorized() {
        assert!(matches!(login_outcome(400, reply(Some("Invalid token"))), Err(ChatError::Unauthorized)));
        assert!(matches!(login_outcome(403, reply(Some("Token expired"))), Err(ChatError::Unauthorized)));
        assert!(matches!(login_outcome(401, reply(None)), Err(ChatError::Unauthorized)));
        match login_outcome(401, reply(Some("Wrong password"))) {
            Err(ChatError::Server { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message.as_deref(), Some("Wrong password"));
            }
            other => panic!("unexpected {:?}", other),
        }
        let ok = LoginResponse { access_token: Some("tok".into()), ..Default::default() };
        assert_eq!(login_outcome(200, ok).unwrap().access_token.as_deref(), Some("tok"));
    }

    #[test]
    fn non_array_lists_read_as_empty() {
        let chats: Vec<Conversation> = list_or_empty("chats", serde_json::json!({ "error": "nope" })).unwrap();
        assert!(chats.is_empty());
        let users: Vec<UserSummary> = list_or_empty("users", Value::Null).unwrap();
        assert!(users.is_empty());
        let users: Vec<UserSummary> =
            list_or_empty("users", serde_json::json!([{ "id": "u1", "fullname": "Sam" }])).unwrap();
        assert_eq!(users[0].id, "u1");
        assert!(list_or_empty::<UserSummary>("users", serde_json::json!([42])).is_err());
    }

    #[test]
    fn existing_id_needs_the_exists_flag() {
        let found = ExistsCheck { exists: true, chat_id: Some("c9".into()) };
        assert_eq!(existing_id(found).as_deref(), Some("c9"));
        let stale = ExistsCheck { exists: false, chat_id: Some("c9".into()) };
        assert!(existing_id(stale).is_none());
        assert!(existing_id(ExistsCheck { exists: true, chat_id: None }).is_none());
    }
}
