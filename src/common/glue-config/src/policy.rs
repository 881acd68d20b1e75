use std::{fmt::Display, str::FromStr};

use common_error::LocatorError;
use serde::{Deserialize, Serialize};

/// Where the catalog client obtains its identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialsSource {
    /// Rotated credentials materialised on local disk by the secret agent.
    #[default]
    SecretFile,
    /// The AWS SDK default provider chain (env, profile, IMDS, ...).
    Ambient,
}

/// What to do when the secret file has not been materialised yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSecretPolicy {
    /// Fail the lookup with a "credentials not provisioned" error.
    #[default]
    Fail,
    /// Hand out an empty identity and let the service reject it.
    Anonymous,
}

/// Which of several equally named tables wins when listing pages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Stop paging at the first exact name match.
    #[default]
    First,
    /// Walk every page and keep the last match.
    Last,
}

/// How a table is looked up in the catalog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMode {
    /// Page through every table of the database and match by name.
    #[default]
    ListTables,
    /// Single point query for the named table.
    GetTable,
}

macro_rules! impl_policy_parsing {
    ($ty:ty, $what:literal, { $($text:literal => $variant:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = LocatorError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($variant),)+
                    other => Err(LocatorError::ConfigError(format!(
                        "Invalid {}: {other:?}, expected one of: {}",
                        $what,
                        [$($text),+].join(", ")
                    ))),
                }
            }
        }

        impl Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let text = match self {
                    $(v if *v == $variant => $text,)+
                    _ => unreachable!(),
                };
                write!(f, "{text}")
            }
        }
    };
}

impl_policy_parsing!(CredentialsSource, "credentials source", {
    "secret_file" => CredentialsSource::SecretFile,
    "ambient" => CredentialsSource::Ambient,
});

impl_policy_parsing!(MissingSecretPolicy, "missing secret policy", {
    "fail" => MissingSecretPolicy::Fail,
    "anonymous" => MissingSecretPolicy::Anonymous,
});

impl_policy_parsing!(MatchPolicy, "match policy", {
    "first" => MatchPolicy::First,
    "last" => MatchPolicy::Last,
});

impl_policy_parsing!(LookupMode, "lookup mode", {
    "list_tables" => LookupMode::ListTables,
    "get_table" => LookupMode::GetTable,
});
