use std::{
    fmt::{Debug, Formatter},
    path::Path,
};

use chrono::{DateTime, NaiveDateTime, Utc};
use common_glue_config::ObfuscatedString;
use serde::Deserialize;
use snafu::{OptionExt, ResultExt};

use crate::error::{
    InvalidExpirationSnafu, MissingFieldSnafu, Result, UnableToParseSecretSnafu,
};

/// On-disk layout written by the secret agent. Extra fields are ignored.
#[derive(Deserialize)]
struct SecretDocument {
    access_key: Option<String>,
    secret_key: Option<String>,
    session_token: Option<String>,
    expiration_time: Option<String>,
}

/// A temporary identity for the catalog and object-store services.
///
/// A record is either empty (no identity) or has all three key fields set.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct CredentialRecord {
    access_key: String,
    secret_key: ObfuscatedString,
    session_token: ObfuscatedString,
    expiration: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<ObfuscatedString>,
        session_token: impl Into<ObfuscatedString>,
        expiration: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: session_token.into(),
            expiration,
        }
    }

    /// The anonymous identity.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.access_key.is_empty()
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn secret_key(&self) -> &ObfuscatedString {
        &self.secret_key
    }

    pub fn session_token(&self) -> &ObfuscatedString {
        &self.session_token
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    /// Parses the JSON secret document found at `path`.
    ///
    /// All three key fields must be present and non-empty; a record is never
    /// returned half populated.
    pub fn from_json(path: &Path, bytes: &[u8]) -> Result<Self> {
        let doc: SecretDocument =
            serde_json::from_slice(bytes).context(UnableToParseSecretSnafu { path })?;

        let required = |value: Option<String>, field: &'static str| {
            value
                .filter(|v| !v.trim().is_empty())
                .context(MissingFieldSnafu { path, field })
        };
        let access_key = required(doc.access_key, "access_key")?;
        let secret_key = required(doc.secret_key, "secret_key")?;
        let session_token = required(doc.session_token, "session_token")?;

        let expiration = match doc.expiration_time.filter(|v| !v.trim().is_empty()) {
            Some(value) => Some(parse_expiration(&value).context(InvalidExpirationSnafu {
                path,
                value: value.clone(),
            })?),
            None => None,
        };

        Ok(Self::new(access_key, secret_key, session_token, expiration))
    }
}

/// Accepts RFC 3339 timestamps and, for agents that omit the offset, naive
/// ISO-8601 timestamps which are taken to be UTC.
fn parse_expiration(value: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc())
        })
}

impl Debug for CredentialRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("empty", &self.is_empty())
            .field("secret_key", &self.secret_key)
            .field("session_token", &self.session_token)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;
    use crate::Error;

    fn parse(json: &str) -> Result<CredentialRecord> {
        CredentialRecord::from_json(Path::new("/secrets/test.json"), json.as_bytes())
    }

    #[test]
    fn parses_complete_document() {
        let record = parse(
            r#"{
                "access_key": "ASIAEXAMPLE",
                "secret_key": "secret",
                "session_token": "token",
                "expiration_time": "2030-01-02T03:04:05Z",
                "lease_id": "ignored"
            }"#,
        )
        .unwrap();
        assert_eq!(record.access_key(), "ASIAEXAMPLE");
        assert_eq!(record.secret_key().as_string(), "secret");
        assert_eq!(record.session_token().as_string(), "token");
        assert_eq!(
            record.expiration(),
            Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap())
        );
        assert!(!record.is_empty());
    }

    #[rstest]
    #[case("2030-01-02T03:04:05+01:00", Utc.with_ymd_and_hms(2030, 1, 2, 2, 4, 5).unwrap())]
    #[case("2030-01-02T03:04:05.000Z", Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap())]
    #[case("2030-01-02T03:04:05", Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap())]
    fn accepts_iso_8601_variants(#[case] raw: &str, #[case] expected: DateTime<Utc>) {
        let json = format!(
            r#"{{"access_key":"a","secret_key":"s","session_token":"t","expiration_time":"{raw}"}}"#
        );
        assert_eq!(parse(&json).unwrap().expiration(), Some(expected));
    }

    #[rstest]
    #[case(r#"{"access_key":"a","secret_key":"s","session_token":"t"}"#)]
    #[case(r#"{"access_key":"a","secret_key":"s","session_token":"t","expiration_time":null}"#)]
    fn expiration_is_optional(#[case] json: &str) {
        assert_eq!(parse(json).unwrap().expiration(), None);
    }

    #[rstest]
    #[case(r#"{"secret_key":"s","session_token":"t"}"#, "access_key")]
    #[case(r#"{"access_key":"a","session_token":"t"}"#, "secret_key")]
    #[case(r#"{"access_key":"a","secret_key":"s"}"#, "session_token")]
    #[case(r#"{"access_key":"","secret_key":"s","session_token":"t"}"#, "access_key")]
    fn missing_fields_are_hard_failures(#[case] json: &str, #[case] field: &str) {
        match parse(json).unwrap_err() {
            Error::MissingField { field: missing, .. } => assert_eq!(missing, field),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[rstest]
    #[case("")]
    #[case(r#"{"access_key":"a","secret_ke"#)]
    #[case("not json")]
    fn truncated_or_malformed_files_fail_cleanly(#[case] json: &str) {
        let err = parse(json).unwrap_err();
        assert!(matches!(err, Error::UnableToParseSecret { .. }), "{err}");
        assert!(err.to_string().contains("/secrets/test.json"));
    }

    #[test]
    fn bad_expiration_is_reported() {
        let err = parse(
            r#"{"access_key":"a","secret_key":"s","session_token":"t","expiration_time":"tomorrow"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidExpiration { .. }), "{err}");
    }

    #[test]
    fn debug_output_hides_key_material() {
        let record = CredentialRecord::new("ASIAEXAMPLE", "very-secret", "session", None);
        let rendered = format!("{record:?}");
        assert!(!rendered.contains("ASIAEXAMPLE"));
        assert!(!rendered.contains("very-secret"));
    }
}
