//! Outbound provider clients
//!
//! One client per external data source, each exposing the uniform Provider
//! capability (search/lookup → raw records). Clients own their own rate
//! limiting; timeouts and the concurrency budget are enforced one level up,
//! in the gateway.

pub mod rate_limit;

pub mod directory_client;
pub mod graph_client;
pub mod registry_client;
pub mod websearch_client;

pub use directory_client::DirectoryClient;
pub use graph_client::GraphClient;
pub use registry_client::RegistryClient;
pub use websearch_client::WebSearchClient;

use crate::config::resolve_provider_keys;
use crate::gateway::{gateway_for, ProviderGateway};
use dossier_common::config::TomlConfig;
use std::sync::Arc;

/// Build gateways for every provider usable with the current configuration
///
/// The public registry needs no credentials and is always present. Keyed
/// providers join only when a key resolves from ENV or TOML; a missing key
/// just means that category's data is absent from runs, never an error.
pub fn build_gateways(config: &TomlConfig) -> Vec<Arc<ProviderGateway>> {
    let keys = resolve_provider_keys(config);
    let mut gateways: Vec<Arc<ProviderGateway>> = Vec::new();

    match RegistryClient::new() {
        Ok(client) => gateways.push(gateway_for(Arc::new(client))),
        Err(e) => tracing::warn!(error = %e, "Registry client unavailable"),
    }

    if let Some(key) = keys.directory {
        match DirectoryClient::new(key) {
            Ok(client) => gateways.push(gateway_for(Arc::new(client))),
            Err(e) => tracing::warn!(error = %e, "Directory client unavailable"),
        }
    }

    if let Some(key) = keys.websearch {
        match WebSearchClient::new(key) {
            Ok(client) => gateways.push(gateway_for(Arc::new(client))),
            Err(e) => tracing::warn!(error = %e, "Web search client unavailable"),
        }
    }

    if let Some(key) = keys.graph {
        match GraphClient::new(key) {
            Ok(client) => gateways.push(gateway_for(Arc::new(client))),
            Err(e) => tracing::warn!(error = %e, "Graph client unavailable"),
        }
    }

    tracing::info!(providers = gateways.len(), "Provider gateways initialized");
    gateways
}

/// Build the analysis adapter when an analysis key is configured
pub fn build_analysis_adapter(
    config: &TomlConfig,
) -> Option<Arc<dyn crate::analysis::AnalysisAdapter>> {
    let keys = resolve_provider_keys(config);
    let key = keys.analysis?;

    match crate::analysis::LlmAnalysisClient::new(key) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "Analysis adapter unavailable");
            None
        }
    }
}
