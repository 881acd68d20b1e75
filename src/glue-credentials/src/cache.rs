use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use common_error::LocatorResult;
use common_glue_config::{GlueConfig, MissingSecretPolicy};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use snafu::ResultExt;

use crate::{
    Clock, CredentialRecord, SecretFile, SecretSource, SystemClock,
    error::{Result, SecretNotProvisionedSnafu, UnableToReadSecretSnafu},
};

struct CachedRecord {
    record: Arc<CredentialRecord>,
    valid_until: DateTime<Utc>,
}

/// Read-mostly cache over a rotated secret.
///
/// Fresh records are served under a shared read lock. A stale record is
/// reloaded under the upgradable read lock, which admits plain readers but
/// only one upgrader, so concurrent staleness costs a single disk read. The
/// new record is published by upgrading to the write lock and swapping the
/// `Arc`, so no reader ever sees a mix of old and new fields.
pub struct CredentialCache {
    source: Box<dyn SecretSource>,
    clock: Arc<dyn Clock>,
    missing_secret_policy: MissingSecretPolicy,
    default_ttl: TimeDelta,
    refresh_buffer: TimeDelta,
    state: RwLock<Option<CachedRecord>>,
    refreshes: AtomicU64,
}

impl CredentialCache {
    pub fn new(source: impl SecretSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            clock: Arc::new(SystemClock),
            missing_secret_policy: MissingSecretPolicy::default(),
            default_ttl: TimeDelta::minutes(5),
            refresh_buffer: TimeDelta::zero(),
            state: RwLock::new(None),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Cache over the secret file the configured domain, account and role map to.
    pub fn from_config(config: &GlueConfig) -> LocatorResult<Self> {
        let cache = Self::new(SecretFile::new(config.secret_file_path()?))
            .with_missing_secret_policy(config.missing_secret_policy)
            .with_default_ttl(Duration::from_secs(config.default_credentials_ttl_secs))
            .with_refresh_buffer(Duration::from_secs(config.refresh_buffer_secs));
        Ok(cache)
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_missing_secret_policy(mut self, policy: MissingSecretPolicy) -> Self {
        self.missing_secret_policy = policy;
        self
    }

    /// Lifetime given to records whose secret carries no expiration.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        self
    }

    /// Reload this long before the stated expiration.
    #[must_use]
    pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = TimeDelta::from_std(buffer).unwrap_or(TimeDelta::MAX);
        self
    }

    /// Number of successful reloads from the secret source.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Returns a usable identity, reloading the secret when the cached one is
    /// missing or expired.
    pub fn get_credentials(&self) -> Result<Arc<CredentialRecord>> {
        {
            let guard = self.state.read();
            if let Some(record) = self.fresh(guard.as_ref(), self.clock.now()) {
                return Ok(record);
            }
        }

        let guard = self.state.upgradable_read();
        // another caller may have reloaded while we queued for the upgradable lock
        let now = self.clock.now();
        if let Some(record) = self.fresh(guard.as_ref(), now) {
            return Ok(record);
        }

        match self.load(now)? {
            Some(cached) => {
                let record = cached.record.clone();
                let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
                *guard = Some(cached);
                Ok(record)
            }
            None => Ok(Arc::new(CredentialRecord::empty())),
        }
    }

    /// A buffer reaching past the representable time range counts as stale.
    fn fresh(
        &self,
        cached: Option<&CachedRecord>,
        now: DateTime<Utc>,
    ) -> Option<Arc<CredentialRecord>> {
        let deadline = now.checked_add_signed(self.refresh_buffer)?;
        cached
            .filter(|c| deadline < c.valid_until)
            .map(|c| c.record.clone())
    }

    fn load(&self, now: DateTime<Utc>) -> Result<Option<CachedRecord>> {
        let path = self.source.location();
        let Some(bytes) = self
            .source
            .read()
            .context(UnableToReadSecretSnafu { path })?
        else {
            return match self.missing_secret_policy {
                MissingSecretPolicy::Fail => SecretNotProvisionedSnafu { path }.fail(),
                MissingSecretPolicy::Anonymous => {
                    log::warn!(
                        "Secret not materialised at {}, continuing with anonymous credentials",
                        path.display()
                    );
                    Ok(None)
                }
            };
        };

        let record = CredentialRecord::from_json(path, &bytes)?;
        let valid_until = record.expiration().unwrap_or_else(|| {
            now.checked_add_signed(self.default_ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        self.refreshes.fetch_add(1, Ordering::SeqCst);

        if valid_until <= now {
            log::warn!(
                "Reloaded credentials from {} are already expired (expiration: {valid_until})",
                path.display()
            );
        } else {
            log::info!(
                "Reloaded credentials from {}, valid until {valid_until}",
                path.display()
            );
        }

        Ok(Some(CachedRecord {
            record: Arc::new(record),
            valid_until,
        }))
    }
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("source", &self.source)
            .field("missing_secret_policy", &self.missing_secret_policy)
            .field("refreshes", &self.refresh_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        path::{Path, PathBuf},
        sync::{Barrier, Mutex},
        thread,
    };

    use chrono::TimeZone;

    use super::*;
    use crate::Error;

    #[derive(Debug)]
    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(now)))
        }

        fn advance(&self, by: TimeDelta) {
            *self.0.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    /// Secret source that counts reads and can be rewritten between them.
    #[derive(Debug)]
    struct CountingSource {
        path: PathBuf,
        contents: Mutex<Option<String>>,
        reads: AtomicU64,
        read_delay: Duration,
    }

    impl CountingSource {
        fn new(contents: Option<String>) -> Arc<Self> {
            Self::with_delay(contents, Duration::ZERO)
        }

        fn with_delay(contents: Option<String>, read_delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                path: PathBuf::from("/var/run/secrets/test/arn_aws_iam__1_role_r.json"),
                contents: Mutex::new(contents),
                reads: AtomicU64::new(0),
                read_delay,
            })
        }

        fn rewrite(&self, contents: Option<String>) {
            *self.contents.lock().unwrap() = contents;
        }

        fn reads(&self) -> u64 {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl SecretSource for Arc<CountingSource> {
        fn location(&self) -> &Path {
            &self.path
        }

        fn read(&self) -> std::io::Result<Option<Vec<u8>>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if !self.read_delay.is_zero() {
                thread::sleep(self.read_delay);
            }
            Ok(self.contents.lock().unwrap().clone().map(String::into_bytes))
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn secret(access_key: &str, expiration: Option<DateTime<Utc>>) -> Option<String> {
        let expiration = expiration
            .map(|e| format!(r#","expiration_time":"{}""#, e.to_rfc3339()))
            .unwrap_or_default();
        Some(format!(
            r#"{{"access_key":"{access_key}","secret_key":"secret-{access_key}","session_token":"token-{access_key}"{expiration}}}"#
        ))
    }

    fn cache(source: &Arc<CountingSource>, clock: &Arc<ManualClock>) -> CredentialCache {
        CredentialCache::new(source.clone()).with_clock(clock.clone())
    }

    #[test]
    fn valid_record_is_served_without_rereading() {
        let clock = ManualClock::at(t0());
        let source = CountingSource::new(secret("AKIA1", Some(t0() + TimeDelta::hours(1))));
        let cache = cache(&source, &clock);

        let first = cache.get_credentials().unwrap();
        assert_eq!(first.access_key(), "AKIA1");
        assert_eq!(first.secret_key().as_string(), "secret-AKIA1");
        assert_eq!(first.session_token().as_string(), "token-AKIA1");
        assert_eq!(first.expiration(), Some(t0() + TimeDelta::hours(1)));

        clock.advance(TimeDelta::minutes(30));
        let second = cache.get_credentials().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.reads(), 1);
        assert_eq!(cache.refresh_count(), 1);
    }

    #[test]
    fn expired_record_triggers_exactly_one_reload() {
        let clock = ManualClock::at(t0());
        let source = CountingSource::new(secret("AKIA1", Some(t0() + TimeDelta::seconds(10))));
        let cache = cache(&source, &clock);
        assert_eq!(cache.get_credentials().unwrap().access_key(), "AKIA1");

        source.rewrite(secret("AKIA2", Some(t0() + TimeDelta::hours(1))));
        clock.advance(TimeDelta::seconds(10));

        assert_eq!(cache.get_credentials().unwrap().access_key(), "AKIA2");
        assert_eq!(cache.get_credentials().unwrap().access_key(), "AKIA2");
        assert_eq!(source.reads(), 2);
    }

    #[test]
    fn concurrent_callers_share_a_single_reload() {
        const CALLERS: usize = 16;

        let clock = ManualClock::at(t0());
        let source = CountingSource::with_delay(
            secret("AKIA1", Some(t0() + TimeDelta::seconds(10))),
            Duration::from_millis(50),
        );
        let cache = cache(&source, &clock);
        cache.get_credentials().unwrap();

        source.rewrite(secret("AKIA2", Some(t0() + TimeDelta::hours(1))));
        clock.advance(TimeDelta::minutes(1));

        let barrier = Barrier::new(CALLERS);
        let observed: Vec<Arc<CredentialRecord>> = thread::scope(|s| {
            let handles: Vec<_> = (0..CALLERS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache.get_credentials().unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(source.reads(), 2);
        assert_eq!(cache.refresh_count(), 2);
        for record in &observed {
            assert_eq!(record.access_key(), "AKIA2");
            assert_eq!(record.secret_key().as_string(), "secret-AKIA2");
            assert_eq!(record.session_token().as_string(), "token-AKIA2");
        }
    }

    #[test]
    fn concurrent_readers_of_a_valid_record_never_reload() {
        let clock = ManualClock::at(t0());
        let source = CountingSource::new(secret("AKIA1", Some(t0() + TimeDelta::hours(1))));
        let cache = cache(&source, &clock);
        cache.get_credentials().unwrap();

        thread::scope(|s| {
            for _ in 0..32 {
                s.spawn(|| {
                    for _ in 0..100 {
                        assert_eq!(cache.get_credentials().unwrap().access_key(), "AKIA1");
                    }
                });
            }
        });

        assert_eq!(source.reads(), 1);
        assert_eq!(cache.refresh_count(), 1);
    }

    #[test]
    fn missing_secret_fails_every_time_under_fail_policy() {
        let clock = ManualClock::at(t0());
        let source = CountingSource::new(None);
        let cache = cache(&source, &clock);

        for _ in 0..3 {
            let err = cache.get_credentials().unwrap_err();
            assert!(matches!(err, Error::SecretNotProvisioned { .. }), "{err}");
            assert!(err.to_string().contains("arn_aws_iam__1_role_r.json"));
        }
        assert_eq!(cache.refresh_count(), 0);
    }

    #[test]
    fn missing_secret_is_anonymous_every_time_under_anonymous_policy() {
        let clock = ManualClock::at(t0());
        let source = CountingSource::new(None);
        let cache =
            cache(&source, &clock).with_missing_secret_policy(MissingSecretPolicy::Anonymous);

        for _ in 0..3 {
            assert!(cache.get_credentials().unwrap().is_empty());
        }
        // anonymous results are not cached, the agent may materialise the file any moment
        assert_eq!(source.reads(), 3);

        source.rewrite(secret("AKIA1", Some(t0() + TimeDelta::hours(1))));
        assert_eq!(cache.get_credentials().unwrap().access_key(), "AKIA1");
    }

    #[test]
    fn malformed_secret_is_a_hard_failure_and_not_cached() {
        let clock = ManualClock::at(t0());
        let source = CountingSource::new(Some(r#"{"access_key":"AKIA1","secr"#.to_string()));
        let cache =
            cache(&source, &clock).with_missing_secret_policy(MissingSecretPolicy::Anonymous);

        let err = cache.get_credentials().unwrap_err();
        assert!(matches!(err, Error::UnableToParseSecret { .. }), "{err}");

        source.rewrite(secret("AKIA1", Some(t0() + TimeDelta::hours(1))));
        assert_eq!(cache.get_credentials().unwrap().access_key(), "AKIA1");
    }

    #[test]
    fn failed_reload_keeps_no_stale_record() {
        let clock = ManualClock::at(t0());
        let source = CountingSource::new(secret("AKIA1", Some(t0() + TimeDelta::seconds(5))));
        let cache = cache(&source, &clock);
        cache.get_credentials().unwrap();

        source.rewrite(Some(String::new()));
        clock.advance(TimeDelta::seconds(6));
        assert!(cache.get_credentials().is_err());
        assert!(cache.get_credentials().is_err());
        assert_eq!(source.reads(), 3);
    }

    #[test]
    fn record_without_expiration_uses_default_ttl() {
        let clock = ManualClock::at(t0());
        let source = CountingSource::new(secret("AKIA1", None));
        let cache = cache(&source, &clock).with_default_ttl(Duration::from_secs(60));

        cache.get_credentials().unwrap();
        clock.advance(TimeDelta::seconds(59));
        cache.get_credentials().unwrap();
        assert_eq!(source.reads(), 1);

        clock.advance(TimeDelta::seconds(1));
        cache.get_credentials().unwrap();
        assert_eq!(source.reads(), 2);
    }

    #[test]
    fn refresh_buffer_reloads_ahead_of_expiration() {
        let clock = ManualClock::at(t0());
        let source = CountingSource::new(secret("AKIA1", Some(t0() + TimeDelta::minutes(10))));
        let cache = cache(&source, &clock).with_refresh_buffer(Duration::from_secs(120));

        cache.get_credentials().unwrap();
        clock.advance(TimeDelta::minutes(7));
        cache.get_credentials().unwrap();
        assert_eq!(source.reads(), 1);

        clock.advance(TimeDelta::minutes(1));
        cache.get_credentials().unwrap();
        assert_eq!(source.reads(), 2);
    }

    #[test]
    fn out_of_range_refresh_buffer_reloads_instead_of_panicking() {
        let clock = ManualClock::at(t0());
        let source = CountingSource::new(secret("AKIA1", Some(t0() + TimeDelta::hours(1))));
        let cache = cache(&source, &clock)
            .with_refresh_buffer(Duration::from_secs(10_000_000_000_000));

        assert_eq!(cache.get_credentials().unwrap().access_key(), "AKIA1");
        assert_eq!(cache.get_credentials().unwrap().access_key(), "AKIA1");
        assert_eq!(source.reads(), 2);
    }

    #[test]
    fn out_of_range_default_ttl_never_expires() {
        let clock = ManualClock::at(t0());
        let source = CountingSource::new(secret("AKIA1", None));
        let cache = cache(&source, &clock).with_default_ttl(Duration::MAX);

        cache.get_credentials().unwrap();
        clock.advance(TimeDelta::days(365 * 100));
        cache.get_credentials().unwrap();
        assert_eq!(source.reads(), 1);
    }

    #[test]
    fn expiration_equal_to_now_counts_as_expired() {
        let clock = ManualClock::at(t0());
        let source = CountingSource::new(secret("AKIA1", Some(t0() + TimeDelta::seconds(1))));
        let cache = cache(&source, &clock);
        cache.get_credentials().unwrap();

        clock.advance(TimeDelta::seconds(1));
        cache.get_credentials().unwrap();
        assert_eq!(source.reads(), 2);
    }

    #[test]
    fn reads_the_configured_secret_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = GlueConfig {
            domain: Some("analytics".to_string()),
            account: Some("123456789012".to_string()),
            role: Some("reader".to_string()),
            secret_dir: dir.path().to_path_buf(),
            ..GlueConfig::default()
        };
        let path = config.secret_file_path().unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            secret("AKIAFILE", Some(Utc::now() + TimeDelta::hours(1))).unwrap(),
        )
        .unwrap();

        let cache = CredentialCache::from_config(&config).unwrap();
        assert_eq!(cache.get_credentials().unwrap().access_key(), "AKIAFILE");
    }
}
