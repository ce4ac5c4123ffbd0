use super::state::{Account, Session};
use crate::core::{ApiError, Result, SyncError};
use crate::http::{ApiClient, Method};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

pub const EMPTY_FIELDS_MESSAGE: &str = "Please fill in all required fields.";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password.";

/// Payload of `/auth/login` and `/auth/register`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub account: Account,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

impl SignupRequest {
    pub fn new(username: &str, email: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            extra: JsonMap::new(),
        }
    }
}

/// Login, signup and logout against the backend's auth routes.
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(SyncError::Validation(EMPTY_FIELDS_MESSAGE.to_string()));
        }

        let body = serde_json::json!({ "username": username.trim(), "password": password });
        let response = self
            .client
            .credential_request(Method::POST, "/auth/login", Some(body))
            .await
            .map_err(|err| match err {
                ApiError::Unauthorized => {
                    SyncError::Validation(INVALID_CREDENTIALS_MESSAGE.to_string())
                }
                other => SyncError::Api(other),
            })?;

        self.establish(response)
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<Session> {
        if request.username.trim().is_empty()
            || request.email.trim().is_empty()
            || request.password.is_empty()
        {
            return Err(SyncError::Validation(EMPTY_FIELDS_MESSAGE.to_string()));
        }

        let body = serde_json::to_value(request)?;
        let response = self
            .client
            .credential_request(Method::POST, "/auth/register", Some(body))
            .await?;

        self.establish(response)
    }

    pub fn logout(&self) {
        self.client.session().sign_out();
    }

    fn establish(&self, response: JsonValue) -> Result<Session> {
        let LoginResponse { token, account } = serde_json::from_value(response)?;
        self.client.session().establish(token, account)
    }
}
