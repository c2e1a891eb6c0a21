use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::api::{ApiError, AvatarApi, LoginResponse};

use super::credentials::{Credential, CredentialStore};

/// Where the client is in the login lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    TwoFactorPending,
    Authenticated,
    /// A silent refresh failed; only an interactive login can recover
    Expired,
}

/// Result of an interactive login step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success(String),
    TwoFactorRequired,
    Failure(String),
}

/// The live bearer token.
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    authenticated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: String) -> Self {
        Self {
            token,
            authenticated_at: Utc::now(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn authenticated_at(&self) -> DateTime<Utc> {
        self.authenticated_at
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.authenticated_at
    }
}

/// Credentials held between the first login step and 2FA verification
struct PendingLogin {
    username: String,
    password: String,
    remember: bool,
}

/// Owns the current token and the remembered login used for silent refresh.
///
/// Every method that talks to the server takes `&mut self`, so at most one
/// login or refresh can be in flight per client.
pub struct SessionClient {
    api: Arc<dyn AvatarApi>,
    store: CredentialStore,
    state: SessionState,
    session: Option<Session>,
    credential: Option<Credential>,
    pending: Option<PendingLogin>,
}

impl SessionClient {
    pub fn new(api: Arc<dyn AvatarApi>, store: CredentialStore) -> Self {
        Self {
            api,
            store,
            state: SessionState::Unauthenticated,
            session: None,
            credential: None,
            pending: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Bearer token for authenticated requests
    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(Session::token)
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Whether a silent refresh may be attempted: a remembered login exists
    /// and no earlier refresh has already failed.
    pub fn can_refresh(&self) -> bool {
        self.credential.is_some() && self.state != SessionState::Expired
    }

    /// Adopt a remembered login loaded from disk so later refreshes can use it
    pub fn resume(&mut self, credential: Credential) {
        debug!(username = %credential.username, "Resuming saved login");
        self.credential = Some(credential);
    }

    /// Submit username and password.
    ///
    /// With `remember` set, a successful login is saved through the
    /// credential store and used for silent refresh later.
    pub async fn login(&mut self, username: &str, password: &str, remember: bool) -> LoginOutcome {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return LoginOutcome::Failure("Username and password are required.".to_string());
        }

        self.state = SessionState::Authenticating;
        self.pending = None;

        match self.api.login(username, password).await {
            Ok(response) if response.requires_two_factor => {
                info!(username = %username, "Two-factor code required");
                self.pending = Some(PendingLogin {
                    username: username.to_string(),
                    password: password.to_string(),
                    remember,
                });
                self.state = SessionState::TwoFactorPending;
                LoginOutcome::TwoFactorRequired
            }
            Ok(response) => self.complete_login(username, password, remember, None, response),
            Err(e) => {
                warn!(username = %username, error = %e, "Login failed");
                self.reset();
                LoginOutcome::Failure(format!("Login failed: {}", e.reason()))
            }
        }
    }

    /// Verify a two-factor code for the pending login, then log in again to
    /// obtain the final token. A rejected code keeps the pending login so the
    /// user can retry.
    pub async fn submit_two_factor(&mut self, code: &str) -> LoginOutcome {
        let Some(pending) = self.pending.take() else {
            return LoginOutcome::Failure("No login is waiting for a 2FA code".to_string());
        };

        let code = code.trim();
        if code.is_empty() {
            self.pending = Some(pending);
            return LoginOutcome::Failure("2FA code required".to_string());
        }

        self.state = SessionState::Authenticating;

        if let Err(e) = self.api.verify_two_factor(code).await {
            debug!(error = %e, "Two-factor verification rejected");
            self.pending = Some(pending);
            self.state = SessionState::TwoFactorPending;
            return LoginOutcome::Failure("invalid 2FA code".to_string());
        }

        match self.api.login(&pending.username, &pending.password).await {
            Ok(response) if !response.requires_two_factor => self.complete_login(
                &pending.username,
                &pending.password,
                pending.remember,
                Some(code),
                response,
            ),
            Ok(_) => {
                warn!(username = %pending.username, "Server still requires 2FA after verification");
                self.reset();
                LoginOutcome::Failure("Login after 2FA failed: verification was not accepted".to_string())
            }
            Err(e) => {
                warn!(username = %pending.username, error = %e, "Login after 2FA failed");
                self.reset();
                LoginOutcome::Failure(format!("Login after 2FA failed: {}", e.reason()))
            }
        }
    }

    /// Probe the server with a previously saved token. Adopts the token on
    /// success; any failure (including network errors) returns false.
    pub async fn validate_existing_token(&mut self, token: &str) -> bool {
        if token.trim().is_empty() {
            return false;
        }

        match self.api.current_user(token).await {
            Ok(()) => {
                info!("Saved token is still valid");
                self.session = Some(Session::new(token.to_string()));
                self.state = SessionState::Authenticated;
                true
            }
            Err(e) => {
                debug!(error = %e, "Saved token rejected");
                false
            }
        }
    }

    /// Log in again with the remembered credentials.
    ///
    /// On success the new token replaces the old one in memory and in the
    /// saved login. On failure the session becomes `Expired` and further
    /// silent refreshes are refused until an interactive login.
    pub async fn refresh(&mut self) -> bool {
        let Some(credential) = self.credential.clone() else {
            warn!("No saved login to refresh the session with");
            self.expire();
            return false;
        };

        let password = match credential.password(self.store.cipher()) {
            Ok(password) => password,
            Err(e) => {
                warn!(error = %e, "Saved password cannot be recovered");
                self.expire();
                return false;
            }
        };

        let previous_age_minutes = self.session.as_ref().map(|s| s.age().num_minutes());

        match self.api.login(&credential.username, &password).await {
            Ok(response) if !response.requires_two_factor && !response.token.is_empty() => {
                info!(
                    username = %credential.username,
                    previous_token_age_minutes = ?previous_age_minutes,
                    "Session refreshed"
                );
                self.session = Some(Session::new(response.token.clone()));
                self.state = SessionState::Authenticated;

                let mut updated = credential;
                updated.token = Some(response.token);
                self.store.save(&updated);
                self.credential = Some(updated);
                true
            }
            Ok(_) => {
                warn!(username = %credential.username, "Refresh needs interactive login");
                self.expire();
                false
            }
            Err(e) => {
                warn!(username = %credential.username, error = %e, "Session refresh failed");
                self.expire();
                false
            }
        }
    }

    /// Forget the token and the remembered login, deleting the saved file
    pub fn logout(&mut self) {
        self.reset();
        self.credential = None;
        self.store.clear();
        info!("Logged out");
    }

    fn complete_login(
        &mut self,
        username: &str,
        password: &str,
        remember: bool,
        two_factor_code: Option<&str>,
        response: LoginResponse,
    ) -> LoginOutcome {
        if response.token.is_empty() {
            let e = ApiError::InvalidResponse("login response did not include a token".to_string());
            warn!(username = %username, error = %e, "Login failed");
            self.reset();
            return LoginOutcome::Failure(format!("Login failed: {}", e.reason()));
        }

        info!(username = %username, "Login successful");
        self.session = Some(Session::new(response.token.clone()));
        self.state = SessionState::Authenticated;
        self.pending = None;

        if remember {
            match Credential::new(username, password, self.store.cipher()) {
                Ok(mut credential) => {
                    credential.two_factor_secret = two_factor_code.map(str::to_string);
                    credential.token = Some(response.token.clone());
                    self.store.save(&credential);
                    self.credential = Some(credential);
                }
                Err(e) => warn!(error = %e, "Could not remember login"),
            }
        } else {
            self.credential = None;
        }

        LoginOutcome::Success(response.token)
    }

    fn reset(&mut self) {
        self.session = None;
        self.pending = None;
        self.state = SessionState::Unauthenticated;
    }

    fn expire(&mut self) {
        self.session = None;
        self.state = SessionState::Expired;
    }
}
