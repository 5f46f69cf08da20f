use std::sync::Arc;
use std::time::Duration;

use parley_core::config::{AppConfig, ConfigError};
use parley_interactions::engine::Engine;
use parley_interactions::registry::{Registry, RegistryError};
use parley_interactions::reports::InMemoryReportSink;
use parley_interactions::state::CorrelationStore;
use parley_rest::{RestClient, RestError};
use thiserror::Error;
use tracing::info;

use crate::delivery::RestDelivery;
use crate::entry::Gateway;
use crate::modules::backups;
use crate::verify::{SignatureVerifier, VerifyError};

pub struct Application {
    pub config: AppConfig,
    pub gateway: Arc<Gateway>,
    pub rest: Arc<RestClient>,
    pub store: Arc<CorrelationStore>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("signing key rejected: {0}")]
    Verify(#[from] VerifyError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let verifier = SignatureVerifier::new(&config.discord.public_key)?;

    let rest = Arc::new(RestClient::new(
        config.discord.api_base.clone(),
        config.discord.bot_token.clone(),
        config.discord.application_id.clone(),
        config.engine.max_retries,
    ));

    let store = Arc::new(CorrelationStore::new(Duration::from_secs(
        config.engine.state_default_ttl_secs,
    )));
    store.spawn_sweeper(Duration::from_secs(config.engine.state_sweep_secs));

    let mut registry = Registry::new();
    // The RPC-backed implementation plugs in here once
    // services.backup_rpc_url points at a real backend; until then local
    // runs use the in-memory service.
    let backup_service: Arc<dyn backups::BackupService> =
        Arc::new(backups::InMemoryBackupService::new());
    backups::register(&mut registry, backup_service)?;

    info!(
        event_name = "system.bootstrap.registry_built",
        commands = registry.command_count(),
        "command registry built"
    );

    let engine = Engine::new(
        Arc::new(RestDelivery::new(Arc::clone(&rest))),
        Arc::clone(&store),
        Arc::new(InMemoryReportSink::new()),
        Duration::from_millis(config.engine.ack_deadline_ms),
    );

    let gateway = Arc::new(Gateway { verifier, registry, engine });

    Ok(Application { config, gateway, rest, store })
}

impl Application {
    /// Replaces the global command set with the registry's current schema.
    pub async fn push_commands(&self) -> Result<(), RestError> {
        let payloads = self.gateway.registry.registration_payloads();
        self.rest.replace_global_commands(&payloads).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use parley_core::config::{AppConfig, ConfigOverrides, LoadOptions};

    use super::bootstrap_with_config;

    fn config_with_key(public_key: &str) -> AppConfig {
        AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                public_key: Some(public_key.to_owned()),
                bot_token: Some("test-token".to_owned()),
                application_id: Some("123456789012345678".to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("config should load")
    }

    #[tokio::test]
    async fn bootstrap_builds_the_gateway_with_registered_modules() {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&[3u8; 32]);
        let public_hex = hex::encode(signing_key.verifying_key().to_bytes());

        let application =
            bootstrap_with_config(config_with_key(&public_hex)).await.expect("bootstrap");

        assert_eq!(application.gateway.registry.command_count(), 1);
        assert!(application.store.is_empty());
    }

    #[tokio::test]
    async fn bootstrap_exposes_registration_payloads_for_the_command_push() {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&[4u8; 32]);
        let public_hex = hex::encode(signing_key.verifying_key().to_bytes());

        let application =
            bootstrap_with_config(config_with_key(&public_hex)).await.expect("bootstrap");

        let payloads = application.gateway.registry.registration_payloads();
        assert_eq!(payloads[0]["name"], "backup");
        assert!(payloads[0]["options"].as_array().expect("options").len() >= 4);
    }
}
