//! Client for the hosted identity provider.
//!
//! The provider owns credentials: accounts are created there first, and
//! logins and password resets are checked against it. The local `users` row
//! keeps its `uid`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("identity provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected identity response: {0}")]
    UnexpectedResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdentityUser {
    #[serde(rename = "localId")]
    pub uid: String,
    pub email: Option<String>,
    #[serde(rename = "phoneNumber")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<IdentityUser>, IdentityError>;

    /// Creates the account and returns its uid.
    async fn create_user(&self, email: &str, password: &str, phone_number: &str) -> Result<String, IdentityError>;

    async fn delete_user(&self, uid: &str) -> Result<(), IdentityError>;

    /// `Ok(false)` when the provider rejects the credentials.
    async fn verify_password(&self, email: &str, password: &str) -> Result<bool, IdentityError>;

    async fn password_reset_link(&self, email: &str) -> Result<String, IdentityError>;
}

/// Identity-toolkit style REST client.
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Provider error codes that mean "wrong credentials" rather than an outage.
const REJECTED_CREDENTIALS: [&str; 5] = [
    "EMAIL_NOT_FOUND",
    "INVALID_PASSWORD",
    "INVALID_LOGIN_CREDENTIALS",
    "USER_DISABLED",
    "INVALID_EMAIL",
];

impl HttpIdentityProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, IdentityError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn call(&self, method: &str, body: Value) -> Result<Value, IdentityError> {
        let url = format!("{}/accounts:{}", self.base_url, method);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);

        if status.is_success() {
            return Ok(payload);
        }

        Err(IdentityError::Api {
            status: status.as_u16(),
            message: error_code(&payload).unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            }),
        })
    }
}

/// `{"error": {"message": "EMAIL_NOT_FOUND : details"}}` -> `EMAIL_NOT_FOUND`
fn error_code(payload: &Value) -> Option<String> {
    payload["error"]["message"]
        .as_str()
        .map(|message| message.split(" : ").next().unwrap_or(message).trim().to_string())
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<IdentityUser>, IdentityError> {
        let payload = self.call("lookup", json!({ "email": [email] })).await?;

        match payload.get("users").and_then(Value::as_array) {
            Some(users) => match users.first() {
                Some(user) => serde_json::from_value(user.clone())
                    .map(Some)
                    .map_err(|e| IdentityError::UnexpectedResponse(e.to_string())),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    async fn create_user(&self, email: &str, password: &str, phone_number: &str) -> Result<String, IdentityError> {
        let payload = self
            .call(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": false }),
            )
            .await?;

        let uid = payload["localId"]
            .as_str()
            .ok_or_else(|| IdentityError::UnexpectedResponse("missing localId".to_string()))?
            .to_string();

        if let Err(err) = self
            .call("update", json!({ "localId": uid, "phoneNumber": phone_number }))
            .await
        {
            tracing::warn!(uid = %uid, "Could not attach phone number to identity account: {}", err);
        }

        Ok(uid)
    }

    async fn delete_user(&self, uid: &str) -> Result<(), IdentityError> {
        self.call("delete", json!({ "localId": uid })).await?;
        Ok(())
    }

    async fn verify_password(&self, email: &str, password: &str) -> Result<bool, IdentityError> {
        let result = self
            .call(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(IdentityError::Api { status, message })
                if status == StatusCode::BAD_REQUEST.as_u16()
                    && REJECTED_CREDENTIALS.contains(&message.as_str()) =>
            {
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn password_reset_link(&self, email: &str) -> Result<String, IdentityError> {
        let payload = self
            .call(
                "sendOobCode",
                json!({ "requestType": "PASSWORD_RESET", "email": email, "returnOobLink": true }),
            )
            .await?;

        payload["oobLink"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| IdentityError::UnexpectedResponse("missing oobLink".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_strips_details() {
        let payload = json!({ "error": { "message": "WEAK_PASSWORD : Password should be at least 6 characters" } });
        assert_eq!(error_code(&payload).as_deref(), Some("WEAK_PASSWORD"));
        assert_eq!(error_code(&json!({})), None);
    }

    #[test]
    fn identity_user_deserializes_provider_fields() {
        let user: IdentityUser = serde_json::from_value(json!({
            "localId": "abc123",
            "email": "member@example.com",
            "phoneNumber": "+15551234567"
        }))
        .unwrap();

        assert_eq!(user.uid, "abc123");
        assert_eq!(user.phone_number.as_deref(), Some("+15551234567"));
        assert!(!user.disabled);
    }
}
