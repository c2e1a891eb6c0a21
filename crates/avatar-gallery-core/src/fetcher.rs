//! Authenticated avatar fetch.
//!
//! A `401` triggers at most one session refresh and one retry. Every other
//! failure collapses to `None`; callers count failures themselves.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::api::{ApiError, AvatarApi};
use crate::auth::SessionClient;
use crate::models::{AvatarId, AvatarRecord};

/// Something that can produce an avatar record for an ID. The repository's
/// bulk and single-add operations are written against this.
#[async_trait]
pub trait AvatarSource: Send {
    async fn fetch_avatar(&mut self, id: &AvatarId) -> Option<AvatarRecord>;
}

pub struct AvatarFetcher {
    api: Arc<dyn AvatarApi>,
}

impl AvatarFetcher {
    pub fn new(api: Arc<dyn AvatarApi>) -> Self {
        Self { api }
    }

    /// Fetch one avatar with the session's token, refreshing the session and
    /// retrying once if the token was rejected.
    pub async fn fetch(&self, id: &AvatarId, session: &mut SessionClient) -> Option<AvatarRecord> {
        let Some(token) = session.token().map(str::to_string) else {
            debug!(id = %id, "No session token, skipping fetch");
            return None;
        };

        match self.api.fetch_avatar(&token, id).await {
            Ok(record) => Some(record),
            Err(ApiError::Unauthorized(_)) => self.retry_after_refresh(id, session).await,
            Err(e) => {
                warn!(id = %id, error = %e, "Failed to fetch avatar");
                None
            }
        }
    }

    async fn retry_after_refresh(
        &self,
        id: &AvatarId,
        session: &mut SessionClient,
    ) -> Option<AvatarRecord> {
        if !session.can_refresh() {
            warn!(id = %id, "Token rejected and no saved login to refresh with");
            return None;
        }
        if !session.refresh().await {
            warn!(id = %id, "Token rejected and session refresh failed");
            return None;
        }

        let token = session.token()?.to_string();
        match self.api.fetch_avatar(&token, id).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(id = %id, error = %e, "Failed to fetch avatar after refresh");
                None
            }
        }
    }
}

/// Production [`AvatarSource`]: the fetcher paired with the live session.
pub struct SessionSource<'a> {
    fetcher: &'a AvatarFetcher,
    session: &'a mut SessionClient,
}

impl<'a> SessionSource<'a> {
    pub fn new(fetcher: &'a AvatarFetcher, session: &'a mut SessionClient) -> Self {
        Self { fetcher, session }
    }
}

#[async_trait]
impl<'a> AvatarSource for SessionSource<'a> {
    async fn fetch_avatar(&mut self, id: &AvatarId) -> Option<AvatarRecord> {
        self.fetcher.fetch(id, &mut *self.session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::api::fake::{self, FakeApi};
    use crate::api::ApiClient;
    use crate::auth::{Credential, CredentialStore, SessionState, UserCipher, CREDENTIAL_FILE};

    const ID: &str = "avtr_5f2a3b4c-1d2e-3f4a-5b6c-7d8e9f0a1b2c";

    struct Harness {
        _dir: tempfile::TempDir,
        api: Arc<FakeApi>,
        fetcher: AvatarFetcher,
        session: SessionClient,
    }

    /// Session holding `tok-old`, optionally with a refreshable saved login
    async fn harness(refreshable: bool) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let cipher = UserCipher::from_secret(b"alice-secret").unwrap();
        let store = CredentialStore::new(dir.path().join(CREDENTIAL_FILE), cipher);
        let api = Arc::new(FakeApi::new());
        let mut session = SessionClient::new(api.clone(), store);

        api.accept_token("tok-old");
        assert!(session.validate_existing_token("tok-old").await);
        if refreshable {
            let credential =
                Credential::new("alice", "hunter2", session.store().cipher()).unwrap();
            session.resume(credential);
        }

        Harness {
            _dir: dir,
            fetcher: AvatarFetcher::new(api.clone()),
            api,
            session,
        }
    }

    fn id() -> AvatarId {
        AvatarId::parse(ID).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mut h = harness(true).await;
        h.api.push_avatar(Ok(fake::record(ID, "Robot")));

        let record = h.fetcher.fetch(&id(), &mut h.session).await;
        assert_eq!(record.map(|r| r.name), Some("Robot".to_string()));
        assert_eq!(h.api.fetch_tokens(), vec!["tok-old".to_string()]);
        assert_eq!(h.api.logins(), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_then_ok_refreshes_once() {
        let mut h = harness(true).await;
        h.api
            .push_avatar(Err(ApiError::Unauthorized(None)))
            .push_avatar(Ok(fake::record(ID, "Robot")))
            .push_login(fake::token("tok-new"));

        let record = h.fetcher.fetch(&id(), &mut h.session).await;
        assert_eq!(record, Some(fake::record(ID, "Robot")));
        assert_eq!(h.api.logins(), 1);
        assert_eq!(h.api.fetches(), 2);
        assert_eq!(
            h.api.fetch_tokens(),
            vec!["tok-old".to_string(), "tok-new".to_string()]
        );
        assert_eq!(h.session.token(), Some("tok-new"));
    }

    #[tokio::test]
    async fn test_unauthorized_twice_gives_up_after_one_retry() {
        let mut h = harness(true).await;
        h.api
            .push_avatar(Err(ApiError::Unauthorized(None)))
            .push_avatar(Err(ApiError::Unauthorized(None)))
            .push_login(fake::token("tok-new"))
            .push_login(fake::token("tok-newer"));

        assert_eq!(h.fetcher.fetch(&id(), &mut h.session).await, None);
        assert_eq!(h.api.logins(), 1);
        assert_eq!(h.api.fetches(), 2);
    }

    #[tokio::test]
    async fn test_unauthorized_without_saved_login() {
        let mut h = harness(false).await;
        h.api.push_avatar(Err(ApiError::Unauthorized(None)));

        assert_eq!(h.fetcher.fetch(&id(), &mut h.session).await, None);
        assert_eq!(h.api.logins(), 0);
        assert_eq!(h.api.fetches(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_and_refresh_fails() {
        let mut h = harness(true).await;
        h.api.push_avatar(Err(ApiError::Unauthorized(None)));
        // No scripted login: the refresh is rejected

        assert_eq!(h.fetcher.fetch(&id(), &mut h.session).await, None);
        assert_eq!(h.api.logins(), 1);
        assert_eq!(h.api.fetches(), 1);
        assert_eq!(h.session.state(), SessionState::Expired);

        // Expired sessions are not refreshed again on the next fetch
        assert_eq!(h.fetcher.fetch(&id(), &mut h.session).await, None);
        assert_eq!(h.api.logins(), 1);
    }

    #[tokio::test]
    async fn test_other_errors_return_none_without_refresh() {
        let mut h = harness(true).await;
        h.api
            .push_avatar(Err(ApiError::NotFound(None)))
            .push_avatar(Err(ApiError::AccessDenied(None)))
            .push_avatar(Err(ApiError::InvalidResponse("bad json".to_string())))
            .push_avatar(Err(ApiError::RateLimited));

        for _ in 0..4 {
            assert_eq!(h.fetcher.fetch(&id(), &mut h.session).await, None);
        }
        assert_eq!(h.api.logins(), 0);
        assert_eq!(h.api.fetches(), 4);
    }

    #[tokio::test]
    async fn test_transport_error_returns_none() {
        let mut h = harness(true).await;
        let unreachable: Arc<dyn AvatarApi> =
            Arc::new(ApiClient::new("http://127.0.0.1:1", Duration::from_secs(5)).unwrap());

        let err = unreachable.fetch_avatar("tok-old", &id()).await.unwrap_err();
        assert!(matches!(err, ApiError::NetworkError(_)));

        let fetcher = AvatarFetcher::new(unreachable);
        assert_eq!(fetcher.fetch(&id(), &mut h.session).await, None);
        assert_eq!(h.api.logins(), 0);
        assert_eq!(h.session.token(), Some("tok-old"));
    }

    #[tokio::test]
    async fn test_no_token_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let cipher = UserCipher::from_secret(b"alice-secret").unwrap();
        let api = Arc::new(FakeApi::new());
        let mut session = SessionClient::new(
            api.clone(),
            CredentialStore::new(dir.path().join(CREDENTIAL_FILE), cipher),
        );
        let fetcher = AvatarFetcher::new(api.clone());

        assert_eq!(fetcher.fetch(&id(), &mut session).await, None);
        assert_eq!(api.fetches(), 0);
    }

    #[tokio::test]
    async fn test_session_source_delegates() {
        let mut h = harness(true).await;
        h.api.push_avatar(Ok(fake::record(ID, "Robot")));

        let mut source = SessionSource::new(&h.fetcher, &mut h.session);
        let record = source.fetch_avatar(&id()).await;
        assert_eq!(record.map(|r| r.id), Some(ID.to_string()));
    }
}
