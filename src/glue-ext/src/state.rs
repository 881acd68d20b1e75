use std::sync::Arc;

use common_error::LocatorResult;
use common_glue_config::{CredentialsSource, GlueConfig};
use common_runtime::{RuntimeRef, get_io_runtime};
use glue_catalog::{CatalogService, GlueCatalogService, TableLocator};
use glue_credentials::CredentialCache;

/// Everything a lookup needs, built once when the extension is loaded.
#[derive(Debug)]
pub struct LocatorState {
    config: GlueConfig,
    locator: TableLocator,
    runtime: RuntimeRef,
}

impl LocatorState {
    /// Validates `config`, builds the credential cache and connects the Glue
    /// client on the shared IO runtime.
    pub fn connect(config: GlueConfig) -> LocatorResult<Self> {
        config.validate()?;

        let credentials = match config.credentials_source {
            CredentialsSource::SecretFile => {
                Some(Arc::new(CredentialCache::from_config(&config)?))
            }
            CredentialsSource::Ambient => None,
        };

        let runtime = get_io_runtime()?;
        let service = {
            let config = config.clone();
            let credentials = credentials.clone();
            runtime.block_on(async move {
                GlueCatalogService::connect(&config, credentials).await
            })??
        };

        log::info!(
            "Glue locator ready for catalog {} ({} credentials)",
            config.catalog_id.as_deref().unwrap_or_default(),
            match config.credentials_source {
                CredentialsSource::SecretFile => "secret file",
                CredentialsSource::Ambient => "ambient",
            }
        );
        Ok(Self::new(config, Arc::new(service), credentials, runtime))
    }

    /// State over an arbitrary catalog service.
    pub fn new(
        config: GlueConfig,
        service: Arc<dyn CatalogService>,
        credentials: Option<Arc<CredentialCache>>,
        runtime: RuntimeRef,
    ) -> Self {
        let locator = TableLocator::from_config(service, credentials, &config);
        Self {
            config,
            locator,
            runtime,
        }
    }

    pub fn config(&self) -> &GlueConfig {
        &self.config
    }

    pub fn locator(&self) -> &TableLocator {
        &self.locator
    }

    pub fn runtime(&self) -> &RuntimeRef {
        &self.runtime
    }
}
