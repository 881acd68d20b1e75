//! Resolves `(database, table)` pairs to storage locations through a catalog
//! service, following continuation tokens page by page.

mod error;
mod glue;
mod locator;
mod query;
mod service;

pub use crate::{
    error::{Error, Result},
    glue::GlueCatalogService,
    locator::TableLocator,
    query::{TableLocation, TableLocationQuery},
    service::{CatalogService, GetTableRequest, GetTablesRequest, TableDescriptor, TablesPage},
};
