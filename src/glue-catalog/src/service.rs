use async_trait::async_trait;

use crate::Result;

/// One page request of the "list tables in database" call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetTablesRequest {
    pub database_name: String,
    pub catalog_id: Option<String>,
    pub next_token: Option<String>,
}

/// Point query for a single table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetTableRequest {
    pub database_name: String,
    pub table_name: String,
    pub catalog_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    /// Storage location from the table's storage descriptor, if it has one.
    pub location: Option<String>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, location: Option<&str>) -> Self {
        Self {
            name: name.into(),
            location: location.map(str::to_string),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TablesPage {
    pub tables: Vec<TableDescriptor>,
    /// Present while the service has more pages.
    pub next_token: Option<String>,
}

/// The catalog service as seen by the locator.
///
/// A failed call is reported as an error carrying the service's own message.
/// `get_table` answers `Ok(None)` when the table does not exist.
#[async_trait]
pub trait CatalogService: Send + Sync + std::fmt::Debug {
    async fn get_tables(&self, request: &GetTablesRequest) -> Result<TablesPage>;

    async fn get_table(&self, request: &GetTableRequest) -> Result<Option<TableDescriptor>>;
}
