use common_error::LocatorError;
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Error getting the tables of database {database}: {message}"))]
    UnableToListTables { database: String, message: String },

    #[snafu(display("Error getting table {database}.{table}: {message}"))]
    UnableToGetTable {
        database: String,
        table: String,
        message: String,
    },

    #[snafu(display("Unable to load credentials: {source}"))]
    UnableToLoadCredentials { source: glue_credentials::Error },

    #[snafu(display("Lookup of {database}.{table} did not finish within {timeout_ms}ms"))]
    LookupTimedOut {
        database: String,
        table: String,
        timeout_ms: u64,
    },

    #[snafu(display("Invalid catalog configuration: {message}"))]
    InvalidConfig { message: String },
}

impl From<Error> for LocatorError {
    fn from(err: Error) -> Self {
        match err {
            Error::UnableToLoadCredentials { source } => source.into(),
            Error::LookupTimedOut { timeout_ms, .. } => Self::Timeout(timeout_ms),
            Error::InvalidConfig { message } => Self::ConfigError(message),
            err @ (Error::UnableToListTables { .. } | Error::UnableToGetTable { .. }) => {
                Self::ServiceError(err.to_string())
            }
        }
    }
}
