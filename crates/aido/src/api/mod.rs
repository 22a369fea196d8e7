//! HTTP surface of the Aido backend.

pub mod client;
pub mod error;
pub mod fetch;

pub use client::{AidoClient, ManualResponse};
pub use error::ApiError;
pub use fetch::{ManualStore, ResourceFetcher};
