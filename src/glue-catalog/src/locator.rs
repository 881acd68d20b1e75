use std::{sync::Arc, time::Duration};

use common_glue_config::{GlueConfig, LookupMode, MatchPolicy};
use glue_credentials::CredentialCache;
use snafu::ResultExt;
use tracing::instrument;

use crate::{
    CatalogService, GetTableRequest, GetTablesRequest, Result, TableLocation, TableLocationQuery,
    error::{LookupTimedOutSnafu, UnableToLoadCredentialsSnafu},
};

/// Resolves table names to storage locations against a [`CatalogService`].
///
/// When a credential cache is attached it is consulted before the first
/// request so that a missing or malformed secret fails the lookup without any
/// network traffic.
#[derive(Debug, Clone)]
pub struct TableLocator {
    service: Arc<dyn CatalogService>,
    credentials: Option<Arc<CredentialCache>>,
    catalog_id: Option<String>,
    match_policy: MatchPolicy,
    lookup_mode: LookupMode,
    operation_timeout: Option<Duration>,
}

impl TableLocator {
    pub fn new(service: Arc<dyn CatalogService>) -> Self {
        Self {
            service,
            credentials: None,
            catalog_id: None,
            match_policy: MatchPolicy::default(),
            lookup_mode: LookupMode::default(),
            operation_timeout: None,
        }
    }

    pub fn from_config(
        service: Arc<dyn CatalogService>,
        credentials: Option<Arc<CredentialCache>>,
        config: &GlueConfig,
    ) -> Self {
        Self {
            service,
            credentials,
            catalog_id: config.catalog_id.clone(),
            match_policy: config.match_policy,
            lookup_mode: config.lookup_mode,
            operation_timeout: Some(config.operation_timeout()),
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<CredentialCache>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn with_catalog_id(mut self, catalog_id: impl Into<String>) -> Self {
        self.catalog_id = Some(catalog_id.into());
        self
    }

    #[must_use]
    pub fn with_match_policy(mut self, match_policy: MatchPolicy) -> Self {
        self.match_policy = match_policy;
        self
    }

    #[must_use]
    pub fn with_lookup_mode(mut self, lookup_mode: LookupMode) -> Self {
        self.lookup_mode = lookup_mode;
        self
    }

    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    pub fn credentials(&self) -> Option<&Arc<CredentialCache>> {
        self.credentials.as_ref()
    }

    pub async fn resolve(&self, database_name: &str, table_name: &str) -> Result<TableLocation> {
        self.resolve_query(&TableLocationQuery::new(database_name, table_name))
            .await
    }

    #[instrument(skip_all, name = "TableLocator::resolve")]
    pub async fn resolve_query(&self, query: &TableLocationQuery) -> Result<TableLocation> {
        if let Some(credentials) = &self.credentials {
            credentials
                .get_credentials()
                .context(UnableToLoadCredentialsSnafu)?;
        }

        let Some(timeout) = self.operation_timeout else {
            return self.lookup(query).await;
        };
        match tokio::time::timeout(timeout, self.lookup(query)).await {
            Ok(location) => location,
            Err(_) => LookupTimedOutSnafu {
                database: query.database_name.clone(),
                table: query.table_name.clone(),
                timeout_ms: timeout.as_millis() as u64,
            }
            .fail(),
        }
    }

    async fn lookup(&self, query: &TableLocationQuery) -> Result<TableLocation> {
        let location = match self.lookup_mode {
            LookupMode::ListTables => self.scan_pages(query).await?,
            LookupMode::GetTable => self.point_lookup(query).await?,
        };
        log::debug!(
            "Resolved {query} to {}",
            match &location {
                TableLocation::Found(location) => location.as_str(),
                TableLocation::NotFound => "<not found>",
            }
        );
        Ok(location)
    }

    async fn scan_pages(&self, query: &TableLocationQuery) -> Result<TableLocation> {
        let mut request = GetTablesRequest {
            database_name: query.database_name.clone(),
            catalog_id: self.catalog_id.clone(),
            next_token: None,
        };
        let mut location = TableLocation::NotFound;
        let mut pages = 0usize;

        loop {
            let page = self.service.get_tables(&request).await?;
            pages += 1;

            let matched = page
                .tables
                .into_iter()
                .filter(|table| table.name == query.table_name)
                .map(|table| TableLocation::Found(table.location.unwrap_or_default()));
            // later pages overwrite earlier matches under `Last`
            let matched = match self.match_policy {
                MatchPolicy::First => matched.take(1).last(),
                MatchPolicy::Last => matched.last(),
            };
            if let Some(found) = matched {
                location = found;
                if self.match_policy == MatchPolicy::First {
                    break;
                }
            }

            match page.next_token {
                Some(token) if !token.is_empty() => request.next_token = Some(token),
                _ => break,
            }
        }

        log::debug!("Scanned {pages} page(s) of database {}", query.database_name);
        Ok(location)
    }

    async fn point_lookup(&self, query: &TableLocationQuery) -> Result<TableLocation> {
        let request = GetTableRequest {
            database_name: query.database_name.clone(),
            table_name: query.table_name.clone(),
            catalog_id: self.catalog_id.clone(),
        };
        let table = self.service.get_table(&request).await?;
        Ok(table
            .map(|table| table.location.unwrap_or_default())
            .into())
    }
}
