//! Scripted in-memory transport for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{AvatarId, AvatarRecord};

use super::{ApiError, AvatarApi, LoginResponse};

/// Each call pops the next scripted response; an empty script answers with a
/// plausible failure for that endpoint.
#[derive(Default)]
pub(crate) struct FakeApi {
    logins: Mutex<VecDeque<Result<LoginResponse, ApiError>>>,
    verifications: Mutex<VecDeque<Result<(), ApiError>>>,
    avatars: Mutex<VecDeque<Result<AvatarRecord, ApiError>>>,
    valid_tokens: Mutex<Vec<String>>,
    fetch_tokens: Mutex<Vec<String>>,
    pub login_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_login(&self, response: Result<LoginResponse, ApiError>) -> &Self {
        self.logins.lock().unwrap().push_back(response);
        self
    }

    pub fn push_verification(&self, response: Result<(), ApiError>) -> &Self {
        self.verifications.lock().unwrap().push_back(response);
        self
    }

    pub fn push_avatar(&self, response: Result<AvatarRecord, ApiError>) -> &Self {
        self.avatars.lock().unwrap().push_back(response);
        self
    }

    pub fn accept_token(&self, token: &str) -> &Self {
        self.valid_tokens.lock().unwrap().push(token.to_string());
        self
    }

    pub fn logins(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn verifications(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Tokens presented to `fetch_avatar`, in call order
    pub fn fetch_tokens(&self) -> Vec<String> {
        self.fetch_tokens.lock().unwrap().clone()
    }
}

pub(crate) fn token(token: &str) -> Result<LoginResponse, ApiError> {
    Ok(LoginResponse {
        token: token.to_string(),
        requires_two_factor: false,
    })
}

pub(crate) fn two_factor_required() -> Result<LoginResponse, ApiError> {
    Ok(LoginResponse {
        token: String::new(),
        requires_two_factor: true,
    })
}

pub(crate) fn record(id: &str, name: &str) -> AvatarRecord {
    AvatarRecord {
        id: id.to_string(),
        name: name.to_string(),
        image_url: format!("https://files.example/{}.png", name),
        author_name: "tester".to_string(),
    }
}

#[async_trait]
impl AvatarApi for FakeApi {
    async fn login(&self, _username: &str, _password: &str) -> Result<LoginResponse, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.logins.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(ApiError::Unauthorized(Some(
                "Invalid Username/Email or Password".to_string(),
            )))
        })
    }

    async fn verify_two_factor(&self, _code: &str) -> Result<(), ApiError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verifications
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ApiError::Unauthorized(None)))
    }

    async fn current_user(&self, token: &str) -> Result<(), ApiError> {
        if self.valid_tokens.lock().unwrap().iter().any(|t| t == token) {
            Ok(())
        } else {
            Err(ApiError::Unauthorized(None))
        }
    }

    async fn fetch_avatar(&self, token: &str, _id: &AvatarId) -> Result<AvatarRecord, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_tokens.lock().unwrap().push(token.to_string());
        self.avatars
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ApiError::NotFound(None)))
    }
}
