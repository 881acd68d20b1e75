mod config;
mod obfuscated;
mod policy;

pub use crate::{
    config::{DEFAULT_SECRET_DIR, GlueConfig},
    obfuscated::ObfuscatedString,
    policy::{CredentialsSource, LookupMode, MatchPolicy, MissingSecretPolicy},
};
