use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use aws_credential_types::{
    Credentials,
    provider::{ProvideCredentials, error::CredentialsError, future},
};

use crate::{CredentialCache, CredentialRecord};

pub const PROVIDER_NAME: &str = "GlueSecretFile";

/// Hands the cached identity to the AWS SDK on every signed request.
///
/// The SDK is expected to run with its own identity cache disabled so that a
/// rotation on disk becomes visible on the very next request.
#[derive(Clone, Debug)]
pub struct SecretFileCredentialsProvider {
    cache: Arc<CredentialCache>,
}

impl SecretFileCredentialsProvider {
    pub fn new(cache: Arc<CredentialCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<CredentialCache> {
        &self.cache
    }

    fn load(&self) -> Result<Credentials, CredentialsError> {
        let record = self
            .cache
            .get_credentials()
            .map_err(CredentialsError::provider_error)?;
        Ok(to_sdk_credentials(&record))
    }
}

impl ProvideCredentials for SecretFileCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::ready(self.load())
    }
}

fn to_sdk_credentials(record: &CredentialRecord) -> Credentials {
    let session_token = Some(record.session_token())
        .filter(|token| !token.is_empty())
        .map(|token| token.as_string().clone());
    let expiry = record.expiration().map(|expiration| {
        let secs = expiration.timestamp().max(0) as u64;
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    });
    Credentials::new(
        record.access_key(),
        record.secret_key().as_string(),
        session_token,
        expiry,
        PROVIDER_NAME,
    )
}
