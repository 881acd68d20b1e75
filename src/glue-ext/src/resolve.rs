use std::{collections::HashMap, ffi::CStr, sync::Arc};

use arrow_array::{Array, ArrayRef, StringArray};
use arrow_schema::{DataType, Field};
use common_error::{LocatorError, LocatorResult};
use futures::{StreamExt, stream};
use glue_catalog::{TableLocation, TableLocationQuery};
use tracing::instrument;

use crate::{LocatorState, ScalarFunction};

pub const FUNCTION_NAME: &str = "resolve_table_location";

/// `resolve_table_location(database_name, table_name) -> location`.
///
/// Rows with a null argument and rows naming a table the catalog does not
/// know produce null. A table registered without a storage location produces
/// an empty string.
#[derive(Debug, Clone)]
pub struct ResolveTableLocation {
    state: Arc<LocatorState>,
}

impl ResolveTableLocation {
    pub fn new(state: Arc<LocatorState>) -> Self {
        Self { state }
    }
}

/// A string argument, possibly a single value broadcast across the batch.
enum StringArg<'a> {
    Values(&'a StringArray),
    AllNull,
}

impl<'a> StringArg<'a> {
    fn try_new(position: usize, array: &'a ArrayRef) -> LocatorResult<Self> {
        match array.data_type() {
            DataType::Utf8 => array
                .as_any()
                .downcast_ref::<StringArray>()
                .map(Self::Values)
                .ok_or_else(|| {
                    LocatorError::InternalError(format!("argument {position} is not a StringArray"))
                }),
            DataType::Null => Ok(Self::AllNull),
            other => Err(LocatorError::TypeError(format!(
                "{FUNCTION_NAME} expects Utf8 arguments, argument {position} is {other}"
            ))),
        }
    }

    fn value(&self, len: usize, row: usize) -> Option<&'a str> {
        match *self {
            Self::Values(array) => {
                let row = if array.len() == 1 && len != 1 { 0 } else { row };
                array.is_valid(row).then(|| array.value(row))
            }
            Self::AllNull => None,
        }
    }
}

fn check_arity(count: usize) -> LocatorResult<()> {
    if count == 2 {
        Ok(())
    } else {
        Err(LocatorError::TypeError(format!(
            "{FUNCTION_NAME} takes 2 arguments (database_name, table_name), got {count}"
        )))
    }
}

/// Batch length after broadcasting length-one arguments.
fn batch_len(args: &[ArrayRef]) -> LocatorResult<usize> {
    let len = args.iter().map(|a| a.len()).max().unwrap_or(0);
    if let Some(bad) = args.iter().find(|a| a.len() != len && a.len() != 1) {
        return Err(LocatorError::ValueError(format!(
            "{FUNCTION_NAME} arguments must have the same length, got {} and {len}",
            bad.len()
        )));
    }
    Ok(len)
}

impl ScalarFunction for ResolveTableLocation {
    fn name(&self) -> &CStr {
        c"resolve_table_location"
    }

    fn return_field(&self, args: &[Field]) -> LocatorResult<Field> {
        check_arity(args.len())?;
        for (position, field) in args.iter().enumerate() {
            if !matches!(field.data_type(), DataType::Utf8 | DataType::Null) {
                return Err(LocatorError::TypeError(format!(
                    "{FUNCTION_NAME} expects Utf8 arguments, {} is {}",
                    if position == 0 { "database_name" } else { "table_name" },
                    field.data_type()
                )));
            }
        }
        Ok(Field::new(FUNCTION_NAME, DataType::Utf8, true))
    }

    #[instrument(skip_all, name = "ResolveTableLocation::call")]
    fn call(&self, args: &[ArrayRef]) -> LocatorResult<ArrayRef> {
        check_arity(args.len())?;
        let len = batch_len(args)?;
        let database = StringArg::try_new(0, &args[0])?;
        let table = StringArg::try_new(1, &args[1])?;

        // each distinct pair is looked up once, rows point into `queries`
        let mut queries: Vec<TableLocationQuery> = Vec::new();
        let mut seen: HashMap<(&str, &str), usize> = HashMap::new();
        let rows: Vec<Option<usize>> = (0..len)
            .map(|row| {
                let (db, tbl) = (database.value(len, row)?, table.value(len, row)?);
                Some(*seen.entry((db, tbl)).or_insert_with(|| {
                    queries.push(TableLocationQuery::new(db, tbl));
                    queries.len() - 1
                }))
            })
            .collect();

        let outcomes = self.resolve_all(queries.clone())?;

        let raise_error_on_failure = self.state.config().raise_error_on_failure;
        let mut locations: Vec<Option<String>> = Vec::with_capacity(queries.len());
        for (query, outcome) in queries.iter().zip(outcomes) {
            match outcome {
                Ok(location) => locations.push(location.into_option()),
                Err(err) if raise_error_on_failure => return Err(err),
                Err(err) => {
                    log::warn!("Unable to resolve {query}, returning null: {err}");
                    locations.push(None);
                }
            }
        }

        let output: StringArray = rows
            .into_iter()
            .map(|slot| slot.and_then(|slot| locations[slot].as_deref()))
            .collect();
        Ok(Arc::new(output))
    }
}

impl ResolveTableLocation {
    /// Resolves every query on the IO runtime, at most `max_concurrent_lookups`
    /// at a time, returning outcomes in query order.
    fn resolve_all(
        &self,
        queries: Vec<TableLocationQuery>,
    ) -> LocatorResult<Vec<LocatorResult<TableLocation>>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let locator = self.state.locator().clone();
        let max_concurrent = self.state.config().max_concurrent_lookups.max(1);
        log::debug!(
            "Resolving {} distinct table(s) with up to {max_concurrent} concurrent lookups",
            queries.len()
        );

        let mut outcomes = self.state.runtime().block_on(async move {
            stream::iter(queries.into_iter().enumerate().map(|(i, query)| {
                let locator = locator.clone();
                async move { (i, locator.resolve_query(&query).await.map_err(LocatorError::from)) }
            }))
            .buffer_unordered(max_concurrent)
            .collect::<Vec<_>>()
            .await
        })?;

        outcomes.sort_by_key(|(i, _)| *i);
        Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
    }
}
