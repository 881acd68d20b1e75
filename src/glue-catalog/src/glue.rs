use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;
use aws_config::{
    BehaviorVersion, Region, identity::IdentityCache, retry::RetryConfig, timeout::TimeoutConfig,
};
use aws_sdk_glue::{
    Client,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    types::Table,
};
use common_glue_config::GlueConfig;
use glue_credentials::{CredentialCache, SecretFileCredentialsProvider};
use snafu::ensure;

use crate::{
    CatalogService, GetTableRequest, GetTablesRequest, Result, TableDescriptor, TablesPage,
    error::{Error, InvalidConfigSnafu},
};

/// [`CatalogService`] backed by the AWS Glue Data Catalog.
#[derive(Clone)]
pub struct GlueCatalogService {
    client: Client,
}

impl GlueCatalogService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a Glue client for the configured region.
    ///
    /// With a credential cache every request is signed with whatever the cache
    /// currently holds, and the SDK's own identity cache is switched off so a
    /// rotated secret is picked up on the next request. Without one the SDK's
    /// default credential chain is used.
    pub async fn connect(
        config: &GlueConfig,
        credentials: Option<Arc<CredentialCache>>,
    ) -> Result<Self> {
        let region = config.region.clone().unwrap_or_default();
        ensure!(
            !region.is_empty(),
            InvalidConfigSnafu {
                message: "a region is required to reach the Glue catalog"
            }
        );
        ensure!(
            config.num_tries > 0,
            InvalidConfigSnafu {
                message: "num_tries must be greater than zero"
            }
        );

        let timeout_config = TimeoutConfig::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .read_timeout(Duration::from_millis(config.read_timeout_ms))
            .build();
        let retry_config = RetryConfig::standard().with_max_attempts(config.num_tries);

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .timeout_config(timeout_config)
            .retry_config(retry_config);

        if let Some(cache) = credentials {
            loader = loader
                .credentials_provider(SecretFileCredentialsProvider::new(cache))
                .identity_cache(IdentityCache::no_cache());
        }

        let sdk_config = loader.load().await;
        log::debug!(
            "Created Glue client for region {}",
            sdk_config.region().map(ToString::to_string).unwrap_or_default()
        );
        Ok(Self::new(Client::new(&sdk_config)))
    }
}

impl Debug for GlueCatalogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlueCatalogService")
            .field("region", &self.client.config().region())
            .finish()
    }
}

#[async_trait]
impl CatalogService for GlueCatalogService {
    async fn get_tables(&self, request: &GetTablesRequest) -> Result<TablesPage> {
        let output = self
            .client
            .get_tables()
            .database_name(&request.database_name)
            .set_catalog_id(request.catalog_id.clone())
            .set_next_token(request.next_token.clone())
            .send()
            .await
            .map_err(|err| Error::UnableToListTables {
                database: request.database_name.clone(),
                message: service_message(&err),
            })?;

        Ok(TablesPage {
            tables: output.table_list().iter().map(describe_table).collect(),
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn get_table(&self, request: &GetTableRequest) -> Result<Option<TableDescriptor>> {
        let result = self
            .client
            .get_table()
            .database_name(&request.database_name)
            .name(&request.table_name)
            .set_catalog_id(request.catalog_id.clone())
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.table().map(describe_table)),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_entity_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(err) => Err(Error::UnableToGetTable {
                database: request.database_name.clone(),
                table: request.table_name.clone(),
                message: service_message(&err),
            }),
        }
    }
}

fn describe_table(table: &Table) -> TableDescriptor {
    TableDescriptor::new(
        table.name(),
        table
            .storage_descriptor()
            .and_then(|descriptor| descriptor.location()),
    )
}

/// The service's own code and message, or the full error chain for transport
/// failures that never reached the service.
fn service_message<E, R>(err: &SdkError<E, R>) -> String
where
    E: std::error::Error + ProvideErrorMetadata + 'static,
    R: Debug,
{
    match (err.code(), err.message()) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (None, Some(message)) => message.to_string(),
        _ => DisplayErrorContext(err).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_glue::types::StorageDescriptor;

    use super::*;

    #[test]
    fn describes_table_with_location() {
        let table = Table::builder()
            .name("orders")
            .storage_descriptor(
                StorageDescriptor::builder()
                    .location("s3://bucket/orders/")
                    .build(),
            )
            .build()
            .unwrap();

        assert_eq!(
            describe_table(&table),
            TableDescriptor::new("orders", Some("s3://bucket/orders/"))
        );
    }

    #[test]
    fn describes_table_without_storage_descriptor() {
        let table = Table::builder().name("view_only").build().unwrap();
        assert_eq!(describe_table(&table).location, None);
    }

    #[tokio::test]
    async fn connect_requires_a_region() {
        let config = GlueConfig {
            region: None,
            ..GlueConfig::default()
        };
        let err = GlueCatalogService::connect(&config, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }), "{err}");
    }

    #[tokio::test]
    async fn connect_builds_a_client_for_the_region() {
        let config = GlueConfig {
            region: Some("eu-west-2".to_string()),
            ..GlueConfig::default()
        };
        let service = GlueCatalogService::connect(&config, None).await.unwrap();
        assert_eq!(
            service.client.config().region().map(ToString::to_string),
            Some("eu-west-2".to_string())
        );
    }
}
