//! Route handlers for the HTTP API.

pub mod health;
pub mod library;
pub mod movies;
pub mod stream;
pub mod streaming_helpers;
