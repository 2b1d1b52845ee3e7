//! Client module for the nearby cloud function service.
//!
//! This module provides the `FriendService` trait the cache depends on, the
//! `ApiClient` that implements it over HTTP, and `RemoteCallFailure`, the
//! single error kind every remote call can produce.
//!
//! Requests are authenticated with the application id, REST API key and
//! (when signed in) the user's session token.

pub mod client;
pub mod error;
pub mod service;

pub use client::ApiClient;
pub use error::RemoteCallFailure;
pub use service::FriendService;
