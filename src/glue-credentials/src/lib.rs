//! Lazily refreshed cache over credentials that an out-of-process agent
//! rotates onto local disk.
//!
//! The cache holds one [`CredentialRecord`] at a time. Callers on the fast path
//! share a read lock; a stale or missing record is reloaded by exactly one
//! caller while the others wait for, and then observe, the new record.

mod cache;
mod clock;
mod error;
mod provider;
mod record;
mod source;

pub use crate::{
    cache::CredentialCache,
    clock::{Clock, SystemClock},
    error::{Error, Result},
    provider::{PROVIDER_NAME, SecretFileCredentialsProvider},
    record::CredentialRecord,
    source::{SecretFile, SecretSource},
};
