//! OpenSearch implementation of the search engine client.
//!
//! This module provides a concrete implementation of `SearchEngineClient`
//! using OpenSearch as the backend.

mod bulk;
mod client;
mod index_config;

pub use bulk::{bulk_action_line, parse_bulk_response};
pub use client::OpenSearchClient;
pub use index_config::{
    create_index_body, refresh_interval_body, BULK_REFRESH_INTERVAL, NORMAL_REFRESH_INTERVAL,
};
