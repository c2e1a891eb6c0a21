//! Application core driven by the UI.
//!
//! `App` wires the session, fetcher and repository together and exposes the
//! flows the UI triggers: resume a saved login, log in, load the gallery,
//! add, remove and refresh avatars. Every method returns an outcome value;
//! nothing here aborts the process.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::api::{ApiClient, AvatarApi};
use crate::auth::{
    CredentialStore, KeychainKeySource, LoginOutcome, SessionClient, UserCipher, CREDENTIAL_FILE,
};
use crate::cache::{AvatarRepository, LoadOutcome, RefreshSummary, RepositoryError};
use crate::config::Config;
use crate::fetcher::{AvatarFetcher, SessionSource};
use crate::models::AvatarRecord;

pub struct App {
    config: Config,
    /// Where to write `config` back; `None` keeps it in memory only
    config_path: Option<PathBuf>,
    session: SessionClient,
    fetcher: AvatarFetcher,
    repository: AvatarRepository,
}

impl App {
    /// Build the app with the real HTTP client and the OS keychain
    pub fn new(config: Config) -> Result<Self> {
        let api: Arc<dyn AvatarApi> =
            Arc::new(ApiClient::new(&config.api_base_url, config.request_timeout())?);
        let cipher = UserCipher::from_source(&KeychainKeySource::default())?;
        let data_dir = config.data_dir()?;
        let mut app = Self::with_parts(config, api, cipher, data_dir)?;
        app.config_path = Some(Config::config_path()?);
        Ok(app)
    }

    /// Build the app from explicit parts
    pub fn with_parts(
        config: Config,
        api: Arc<dyn AvatarApi>,
        cipher: UserCipher,
        data_dir: PathBuf,
    ) -> Result<Self> {
        let store = CredentialStore::new(data_dir.join(CREDENTIAL_FILE), cipher);
        let repository = AvatarRepository::new(data_dir)?;
        Ok(Self {
            config,
            config_path: None,
            session: SessionClient::new(api.clone(), store),
            fetcher: AvatarFetcher::new(api),
            repository,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &SessionClient {
        &self.session
    }

    pub fn avatars(&self) -> &[AvatarRecord] {
        self.repository.records()
    }

    // ===== Session =====

    /// Pick up the saved login, if any. Returns true when its token is still
    /// accepted; otherwise the UI should show the login form. The saved
    /// login is kept either way so a later refresh can use it.
    pub async fn resume_session(&mut self) -> bool {
        let Some(credential) = self.session.store().load() else {
            return false;
        };

        let token = credential.token.clone();
        self.session.resume(credential);

        match token {
            Some(token) => self.session.validate_existing_token(&token).await,
            None => false,
        }
    }

    pub async fn login(&mut self, username: &str, password: &str, remember: bool) -> LoginOutcome {
        let outcome = self.session.login(username, password, remember).await;
        if !matches!(outcome, LoginOutcome::Failure(_)) {
            self.remember_username(username);
        }
        outcome
    }

    pub async fn submit_two_factor(&mut self, code: &str) -> LoginOutcome {
        self.session.submit_two_factor(code).await
    }

    pub fn logout(&mut self) {
        self.session.logout();
    }

    fn remember_username(&mut self, username: &str) {
        let username = username.trim();
        if self.config.last_username.as_deref() == Some(username) {
            return;
        }
        self.config.last_username = Some(username.to_string());
        if let Some(ref path) = self.config_path {
            if let Err(e) = self.config.save_to(path) {
                warn!(error = %e, "Failed to save config");
            }
        }
    }

    // ===== Gallery =====

    /// Startup load: cached records if available, else a full refresh
    pub async fn load_or_refresh(&mut self) -> LoadOutcome {
        let mut source = SessionSource::new(&self.fetcher, &mut self.session);
        self.repository.load_or_refresh(&mut source).await
    }

    /// Re-fetch every tracked avatar, in order, one at a time
    pub async fn refresh_all(&mut self) -> RefreshSummary {
        let mut source = SessionSource::new(&self.fetcher, &mut self.session);
        let summary = self.repository.refresh_tracked(&mut source).await;
        info!("{}", summary.status_message());
        summary
    }

    pub async fn add_avatar(&mut self, raw: &str) -> Result<AvatarRecord, RepositoryError> {
        let mut source = SessionSource::new(&self.fetcher, &mut self.session);
        self.repository.add(raw, &mut source).await
    }

    pub fn remove_avatar(&mut self, id: &str) -> bool {
        self.repository.remove(id)
    }
}
