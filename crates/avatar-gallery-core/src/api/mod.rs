//! REST API client module for the avatar service.
//!
//! This module provides the `AvatarApi` trait and its reqwest-backed
//! implementation `ApiClient`. Authenticated endpoints take a bearer token
//! obtained through the login endpoint.

pub mod client;
pub mod error;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{ApiClient, AvatarApi, LoginResponse, DEFAULT_API_BASE_URL};
pub use error::ApiError;
