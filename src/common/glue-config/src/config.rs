use std::{
    fmt::{Display, Formatter},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use common_error::{LocatorError, LocatorResult};
use serde::{Deserialize, Serialize};

use crate::{CredentialsSource, LookupMode, MatchPolicy, MissingSecretPolicy};

/// Directory under which the secret agent materialises rotated credentials.
pub const DEFAULT_SECRET_DIR: &str = "/var/run/secrets";

const ENV_DOMAIN: &str = "DOMAIN";
const ENV_ACCOUNT: &str = "AWS_ACCOUNT";
const ENV_ROLE: &str = "AWS_ROLE";
const ENV_CATALOG_ID: &str = "CATALOG_ID";
const ENV_REGION: &str = "GLUE_REGION";
const ENV_AWS_REGION: &str = "AWS_REGION";
const ENV_SECRET_DIR: &str = "GLUE_SECRET_DIR";
const ENV_CREDENTIALS_SOURCE: &str = "GLUE_CREDENTIALS_SOURCE";
const ENV_MISSING_SECRET_POLICY: &str = "GLUE_MISSING_SECRET_POLICY";
const ENV_MATCH_POLICY: &str = "GLUE_MATCH_POLICY";
const ENV_LOOKUP_MODE: &str = "GLUE_LOOKUP_MODE";
const ENV_CREDENTIALS_TTL_SECS: &str = "GLUE_CREDENTIALS_TTL_SECS";
const ENV_REFRESH_BUFFER_SECS: &str = "GLUE_REFRESH_BUFFER_SECS";
const ENV_CONNECT_TIMEOUT_MS: &str = "GLUE_CONNECT_TIMEOUT_MS";
const ENV_READ_TIMEOUT_MS: &str = "GLUE_READ_TIMEOUT_MS";
const ENV_OPERATION_TIMEOUT_MS: &str = "GLUE_OPERATION_TIMEOUT_MS";
const ENV_NUM_TRIES: &str = "GLUE_NUM_TRIES";
const ENV_MAX_CONCURRENT_LOOKUPS: &str = "GLUE_MAX_CONCURRENT_LOOKUPS";
const ENV_RAISE_ERROR_ON_FAILURE: &str = "GLUE_RAISE_ERROR_ON_FAILURE";

/// Upper bound on the credential TTL and refresh buffer, one year.
const MAX_CREDENTIAL_WINDOW_SECS: u64 = 366 * 24 * 60 * 60;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GlueConfig {
    pub domain: Option<String>,
    pub account: Option<String>,
    pub role: Option<String>,
    pub catalog_id: Option<String>,
    pub region: Option<String>,
    pub secret_dir: PathBuf,
    pub credentials_source: CredentialsSource,
    pub missing_secret_policy: MissingSecretPolicy,
    pub match_policy: MatchPolicy,
    pub lookup_mode: LookupMode,
    pub default_credentials_ttl_secs: u64,
    pub refresh_buffer_secs: u64,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub operation_timeout_ms: u64,
    pub num_tries: u32,
    pub max_concurrent_lookups: usize,
    pub raise_error_on_failure: bool,
}

impl Default for GlueConfig {
    fn default() -> Self {
        Self {
            domain: None,
            account: None,
            role: None,
            catalog_id: None,
            region: None,
            secret_dir: PathBuf::from(DEFAULT_SECRET_DIR),
            credentials_source: CredentialsSource::default(),
            missing_secret_policy: MissingSecretPolicy::default(),
            match_policy: MatchPolicy::default(),
            lookup_mode: LookupMode::default(),
            default_credentials_ttl_secs: 300,
            refresh_buffer_secs: 0,
            connect_timeout_ms: 10_000,
            read_timeout_ms: 30_000,
            operation_timeout_ms: 60_000,
            // retries belong to the caller, one attempt per request
            num_tries: 1,
            max_concurrent_lookups: 8,
            raise_error_on_failure: true,
        }
    }
}

impl GlueConfig {
    /// Builds and validates a config from the process environment.
    pub fn from_env() -> LocatorResult<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Builds and validates a config from an arbitrary variable lookup.
    pub fn from_env_with<F>(lookup: F) -> LocatorResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self {
            domain: var(ENV_DOMAIN),
            account: var(ENV_ACCOUNT),
            role: var(ENV_ROLE),
            catalog_id: var(ENV_CATALOG_ID),
            region: var(ENV_REGION).or_else(|| var(ENV_AWS_REGION)),
            ..Self::default()
        };

        if let Some(dir) = var(ENV_SECRET_DIR) {
            config.secret_dir = PathBuf::from(dir);
        }
        parse_into(&var, ENV_CREDENTIALS_SOURCE, &mut config.credentials_source)?;
        parse_into(&var, ENV_MISSING_SECRET_POLICY, &mut config.missing_secret_policy)?;
        parse_into(&var, ENV_MATCH_POLICY, &mut config.match_policy)?;
        parse_into(&var, ENV_LOOKUP_MODE, &mut config.lookup_mode)?;
        parse_into(&var, ENV_CREDENTIALS_TTL_SECS, &mut config.default_credentials_ttl_secs)?;
        parse_into(&var, ENV_REFRESH_BUFFER_SECS, &mut config.refresh_buffer_secs)?;
        parse_into(&var, ENV_CONNECT_TIMEOUT_MS, &mut config.connect_timeout_ms)?;
        parse_into(&var, ENV_READ_TIMEOUT_MS, &mut config.read_timeout_ms)?;
        parse_into(&var, ENV_OPERATION_TIMEOUT_MS, &mut config.operation_timeout_ms)?;
        parse_into(&var, ENV_NUM_TRIES, &mut config.num_tries)?;
        parse_into(&var, ENV_MAX_CONCURRENT_LOOKUPS, &mut config.max_concurrent_lookups)?;
        parse_into(&var, ENV_RAISE_ERROR_ON_FAILURE, &mut config.raise_error_on_failure)?;

        config.validate()?;
        Ok(config)
    }

    /// Checks that every identifier the configured sources need is present and
    /// that the numeric settings are in range.
    pub fn validate(&self) -> LocatorResult<()> {
        let mut missing = vec![];
        if self.credentials_source == CredentialsSource::SecretFile {
            for (name, value) in [
                (ENV_DOMAIN, &self.domain),
                (ENV_ACCOUNT, &self.account),
                (ENV_ROLE, &self.role),
            ] {
                if value.as_deref().is_none_or(str::is_empty) {
                    missing.push(name);
                }
            }
        }
        if self.catalog_id.as_deref().is_none_or(str::is_empty) {
            missing.push(ENV_CATALOG_ID);
        }
        if self.region.as_deref().is_none_or(str::is_empty) {
            missing.push(ENV_REGION);
        }
        if !missing.is_empty() {
            return Err(LocatorError::ConfigError(format!(
                "Environment variables {} must be set",
                missing.join(", ")
            )));
        }

        if self.num_tries == 0 {
            return Err(LocatorError::ConfigError(
                "num_tries must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent_lookups == 0 {
            return Err(LocatorError::ConfigError(
                "max_concurrent_lookups must be greater than zero".to_string(),
            ));
        }
        for (name, secs) in [
            (ENV_CREDENTIALS_TTL_SECS, self.default_credentials_ttl_secs),
            (ENV_REFRESH_BUFFER_SECS, self.refresh_buffer_secs),
        ] {
            if secs > MAX_CREDENTIAL_WINDOW_SECS {
                return Err(LocatorError::ConfigError(format!(
                    "{name} must be at most {MAX_CREDENTIAL_WINDOW_SECS} seconds, got {secs}"
                )));
            }
        }
        Ok(())
    }

    /// Location of the rotated secret for the configured domain, account and role.
    pub fn secret_file_path(&self) -> LocatorResult<PathBuf> {
        match (&self.domain, &self.account, &self.role) {
            (Some(domain), Some(account), Some(role)) => Ok(self
                .secret_dir
                .join(domain)
                .join(format!("arn_aws_iam__{account}_role_{role}.json"))),
            _ => Err(LocatorError::ConfigError(format!(
                "{ENV_DOMAIN}, {ENV_ACCOUNT} and {ENV_ROLE} are required to locate the secret file"
            ))),
        }
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    #[must_use]
    pub fn multiline_display(&self) -> Vec<String> {
        let mut res = vec![];
        if let Some(domain) = &self.domain {
            res.push(format!("Domain = {domain}"));
        }
        if let Some(account) = &self.account {
            res.push(format!("Account = {account}"));
        }
        if let Some(role) = &self.role {
            res.push(format!("Role = {role}"));
        }
        if let Some(catalog_id) = &self.catalog_id {
            res.push(format!("Catalog id = {catalog_id}"));
        }
        if let Some(region) = &self.region {
            res.push(format!("Region = {region}"));
        }
        res.push(format!("Secret dir = {}", self.secret_dir.display()));
        res.push(format!("Credentials source = {}", self.credentials_source));
        res.push(format!(
            "Missing secret policy = {}",
            self.missing_secret_policy
        ));
        res.push(format!("Match policy = {}", self.match_policy));
        res.push(format!("Lookup mode = {}", self.lookup_mode));
        res.push(format!(
            "Default credentials ttl = {}s",
            self.default_credentials_ttl_secs
        ));
        res.push(format!("Refresh buffer = {}s", self.refresh_buffer_secs));
        res.push(format!("Connect timeout = {}ms", self.connect_timeout_ms));
        res.push(format!("Read timeout = {}ms", self.read_timeout_ms));
        res.push(format!("Operation timeout = {}ms", self.operation_timeout_ms));
        res.push(format!("Max tries = {}", self.num_tries));
        res.push(format!(
            "Max concurrent lookups = {}",
            self.max_concurrent_lookups
        ));
        res.push(format!(
            "Raise error on failure = {}",
            self.raise_error_on_failure
        ));
        res
    }
}

impl Display for GlueConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        write!(f, "GlueConfig\n{}", self.multiline_display().join("\n"))
    }
}

fn parse_into<T, V>(var: &V, key: &str, target: &mut T) -> LocatorResult<()>
where
    T: FromStr,
    T::Err: Display,
    V: Fn(&str) -> Option<String>,
{
    if let Some(raw) = var(key) {
        *target = raw.parse::<T>().map_err(|e| {
            LocatorError::ConfigError(format!("Invalid value for {key}: {raw:?} ({e})"))
        })?;
    }
    Ok(())
}
