use std::path::PathBuf;

use common_error::LocatorError;
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display(
        "Secret was not materialised at the expected location: {}",
        path.display()
    ))]
    SecretNotProvisioned { path: PathBuf },

    #[snafu(display("Unable to read secret file {}: {}", path.display(), source))]
    UnableToReadSecret {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to parse secret file {}: {}", path.display(), source))]
    UnableToParseSecret {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("Secret file {} is missing required field `{}`", path.display(), field))]
    MissingField { path: PathBuf, field: &'static str },

    #[snafu(display(
        "Secret file {} has an invalid expiration_time {:?}: {}",
        path.display(),
        value,
        source
    ))]
    InvalidExpiration {
        path: PathBuf,
        value: String,
        source: chrono::ParseError,
    },
}

impl From<Error> for LocatorError {
    fn from(err: Error) -> Self {
        Self::CredentialsUnavailable(err.to_string())
    }
}
