use std::sync::Arc;

use bookvendor::{cache::MemoryStore, HttpClient, MetadataService, ServiceConfig};
use serde::Serialize;

/// Builds the service the commands run against.
///
/// The cache store lives for the process; nothing persists across runs.
pub fn default_service() -> MetadataService<HttpClient> {
    MetadataService::new(ServiceConfig::default(), Arc::new(MemoryStore::new()))
}

/// Renders a command result for stdout.
pub fn to_json<T: Serialize>(value: &T) -> eyre::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
