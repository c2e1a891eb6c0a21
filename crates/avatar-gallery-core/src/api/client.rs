//! HTTP client for the avatar service REST API.
//!
//! `ApiClient` is the production implementation of [`AvatarApi`]; session and
//! fetch logic only ever talk to the trait so they can be exercised against a
//! scripted transport in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::Deserialize;
use tracing::debug;

use crate::models::{AvatarId, AvatarRecord};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL of the avatar service API
pub const DEFAULT_API_BASE_URL: &str = "https://api.vrchat.cloud/api/1";

/// The service rejects requests without an identifying user agent
const USER_AGENT: &str = concat!("avatar-gallery/", env!("CARGO_PKG_VERSION"));

const LOGIN_PATH: &str = "auth/user/login";
const TOTP_VERIFY_PATH: &str = "auth/twofactorauth/totp/verify";
const CURRENT_USER_PATH: &str = "auth/user";
const AVATARS_PATH: &str = "avatars";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: String,
    #[serde(rename = "requiresTwoFactor", default)]
    pub requires_two_factor: bool,
}

/// Remote operations the session and fetcher depend on.
#[async_trait]
pub trait AvatarApi: Send + Sync {
    /// `POST /auth/user/login` with form-encoded credentials
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError>;

    /// `POST /auth/twofactorauth/totp/verify` for the login in progress
    async fn verify_two_factor(&self, code: &str) -> Result<(), ApiError>;

    /// `GET /auth/user`, used as a cheap token validity probe
    async fn current_user(&self, token: &str) -> Result<(), ApiError>;

    /// `GET /avatars/{id}`
    async fn fetch_avatar(&self, token: &str, id: &AvatarId) -> Result<AvatarRecord, ApiError>;
}

/// API client for the avatar service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client. The cookie store keeps the pending login's
    /// auth cookie so the follow-up two-factor verification applies to it.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Check if response is successful, returning a typed error if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(
                status = %status,
                body = %ApiError::truncate_body(&body),
                "Request rejected"
            );
            Err(ApiError::from_status(status, &body))
        }
    }
}

#[async_trait]
impl AvatarApi for ApiClient {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .header(header::ACCEPT, "application/json")
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let response = Self::check_response(response).await?;

        response
            .json::<LoginResponse>()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse login response: {}", e)))
    }

    async fn verify_two_factor(&self, code: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url(TOTP_VERIFY_PATH))
            .header(header::ACCEPT, "application/json")
            .form(&[("code", code)])
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }

    async fn current_user(&self, token: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .get(self.url(CURRENT_USER_PATH))
            .bearer_auth(token)
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }

    async fn fetch_avatar(&self, token: &str, id: &AvatarId) -> Result<AvatarRecord, ApiError> {
        let url = self.url(&format!("{}/{}", AVATARS_PATH, id));
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let response = Self::check_response(response).await?;

        response.json::<AvatarRecord>().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse avatar {}: {}", id, e))
        })
    }
}
