// ============================================================================
// Account profile
// ============================================================================

use crate::core::{ApiError, Result, SyncError};
use crate::http::ApiClient;
use crate::session::Account;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const DUPLICATE_ACCOUNT_MESSAGE: &str = "Username or email already exists";

lazy_static! {
    static ref EMAIL_PATTERN: Option<Regex> = Regex::new(r"^\S+@\S+\.\S+$").ok();
    static ref PHONE_PATTERN: Option<Regex> = Regex::new(r"^\d{10}$").ok();
    static ref IMAGE_URL_PATTERN: Option<Regex> = Regex::new(r#"^(http|https)://[^ "]+$"#).ok();
}

fn fits(pattern: &Option<Regex>, value: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(value))
}

/// Editable profile fields
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    pub username: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub image: String,
    /// Sent only when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip)]
    pub repeat_password: Option<String>,
}

impl ProfileUpdate {
    /// Form prefilled from a fetched account.
    pub fn from_account(account: &Account) -> Self {
        let text = |field: &str| {
            account
                .extra
                .get(field)
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            username: account.username.clone().unwrap_or_default(),
            email: account.email.clone().unwrap_or_default(),
            name: text("name"),
            phone: text("phone"),
            address: text("address"),
            image: text("image"),
            password: None,
            repeat_password: None,
        }
    }

    pub fn with_password(mut self, password: &str, repeat: &str) -> Self {
        self.password = Some(password.to_string()).filter(|p| !p.is_empty());
        self.repeat_password = Some(repeat.to_string());
        self
    }

    /// Problems keyed by field name. Empty when the update can be sent.
    pub fn field_errors(&self) -> BTreeMap<&'static str, &'static str> {
        let mut errors = BTreeMap::new();
        let username_len = self.username.chars().count();
        if !(3..=30).contains(&username_len) {
            errors.insert("username", "Username must be 3-30 characters");
        }
        if self.name.is_empty() || self.name.chars().count() > 50 {
            errors.insert("name", "Name is required and cannot exceed 50 characters");
        }
        if !fits(&EMAIL_PATTERN, &self.email) {
            errors.insert("email", "Valid email is required");
        }
        if !fits(&PHONE_PATTERN, &self.phone) {
            errors.insert("phone", "Phone must be exactly 10 digits");
        }
        if self.address.is_empty() || self.address.chars().count() > 100 {
            errors.insert(
                "address",
                "Address is required and cannot exceed 100 characters",
            );
        }
        if !self.image.is_empty() && !fits(&IMAGE_URL_PATTERN, &self.image) {
            errors.insert("image", "Image must be a valid URL");
        }
        if let Some(password) = &self.password {
            if password.chars().count() < 8 {
                errors.insert("password", "Password must be at least 8 characters");
            }
            if self.repeat_password.as_deref() != Some(password.as_str()) {
                errors.insert("repeatPassword", "Passwords do not match");
            }
        }
        errors
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let errors = self.field_errors();
        if errors.is_empty() {
            return Ok(());
        }
        Err(errors.into_values().collect::<Vec<_>>().join("; "))
    }
}

/// Profile of the signed-in account
#[derive(Clone)]
pub struct AccountService {
    client: ApiClient,
    account_id: String,
}

impl AccountService {
    pub fn new(client: ApiClient, account_id: impl Into<String>) -> Self {
        Self {
            client,
            account_id: account_id.into(),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    fn path(&self) -> String {
        format!("/accounts/{}", self.account_id)
    }

    pub async fn fetch(&self) -> Result<Account> {
        let body = self
            .client
            .authorized_request(Method::GET, &self.path(), None, &[], None)
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Save the profile and refresh the session's copy of the account.
    pub async fn update(&self, update: &ProfileUpdate) -> Result<Account> {
        update.validate().map_err(SyncError::Validation)?;

        let body = serde_json::to_value(update)?;
        let response = self
            .client
            .authorized_request(Method::PUT, &self.path(), Some(body), &[], None)
            .await
            .map_err(|err| match err {
                ApiError::RequestError { status: 409, .. } => {
                    SyncError::Validation(DUPLICATE_ACCOUNT_MESSAGE.to_string())
                }
                other => SyncError::Api(other),
            })?;

        let fields = response.get("account").cloned().unwrap_or(response);
        let account: Account = serde_json::from_value(fields)?;
        self.client.session().update_account(account.clone())?;
        info!(account = %self.account_id, "profile updated");
        Ok(account)
    }

    /// Delete the account and end the session.
    pub async fn delete(&self) -> Result<()> {
        self.client
            .authorized_request(Method::DELETE, &self.path(), None, &[], None)
            .await
            .inspect_err(|err| warn!(account = %self.account_id, error = %err, "account deletion failed"))?;
        self.client.session().sign_out();
        info!(account = %self.account_id, "account deleted");
        Ok(())
    }
}
