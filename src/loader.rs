//! Fetch-cache orchestrator
//!
//! For every (domain, entity) pair the loader decides between the cached
//! record and a refetch, persists fresh records and falls back to a stale
//! cached record when the upstream fails. All loads of a run share one frozen
//! reference instant.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::config::{Settings, SourceUrls};
use crate::dataset::{Dataset, Record};
use crate::fetch::{FetchError, JsonFetcher};
use crate::sources::{
    Domain, JhuHistory, JhuTimeline, NormalizeError, OwidVaccination, RkiDistrictHistory,
    RkiDistrictSnapshot, SourceAdapter,
};

/// Errors that can occur when loading one entity
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// Loading failed and there is no usable cached record
    #[error("no data for {domain} {key}: {cause}")]
    CacheMiss {
        domain: Domain,
        key: String,
        cause: String,
    },
}

#[derive(Debug, Error)]
enum CachedReadError {
    #[error("cache read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cached record is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where a loaded record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Cache entry younger than the invalidation window
    Cache,
    /// Freshly fetched and written to the cache
    Network,
    /// Refetch failed; stale cache entry used instead
    StaleFallback,
}

/// A record together with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub record: T,
    pub origin: Origin,
}

/// Loader tunables
#[derive(Debug, Clone)]
pub struct LoadSettings {
    pub cache_invalidation: chrono::Duration,
    pub debug: bool,
    pub request_timeout: Duration,
}

impl From<&Settings> for LoadSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            cache_invalidation: settings.cache_invalidation(),
            debug: settings.debug,
            request_timeout: settings.request_timeout(),
        }
    }
}

/// One entity to load
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Job {
    pub domain: Domain,
    pub key: String,
}

impl Job {
    pub fn new(domain: Domain, key: impl Into<String>) -> Self {
        Self {
            domain,
            key: key.into(),
        }
    }
}

/// A job whose load failed, cache fallback included
#[derive(Debug)]
pub struct LoadFailure {
    pub job: Job,
    pub error: LoadError,
}

/// Outcome of a whole load phase
#[derive(Debug, Default)]
pub struct LoadReport {
    pub dataset: Dataset,
    pub origins: HashMap<Job, Origin>,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    fn absorb(&mut self, jobs: Vec<Job>, results: Vec<Result<Loaded<Record>, LoadError>>) {
        for (job, result) in jobs.into_iter().zip(results) {
            match result {
                Ok(loaded) => {
                    self.dataset.insert(job.domain, job.key.clone(), loaded.record);
                    self.origins.insert(job, loaded.origin);
                }
                Err(error) => self.failures.push(LoadFailure { job, error }),
            }
        }
    }
}

/// The upstream adapters of a run
#[derive(Debug, Clone, Default)]
pub struct Sources {
    pub vaccination: OwidVaccination,
    pub global_cases: JhuHistory,
    pub global_timeline: JhuTimeline,
    pub district_snapshot: RkiDistrictSnapshot,
    /// Overrides the case report layer URL of the district history
    pub district_history_url: Option<String>,
}

impl Sources {
    fn district_history(&self, districts: HashMap<String, String>) -> RkiDistrictHistory {
        match &self.district_history_url {
            Some(url) => RkiDistrictHistory::with_url(url.clone(), districts),
            None => RkiDistrictHistory::new(districts),
        }
    }
}

impl From<&SourceUrls> for Sources {
    fn from(urls: &SourceUrls) -> Self {
        Self {
            vaccination: urls
                .vaccination
                .as_ref()
                .map_or_else(OwidVaccination::new, OwidVaccination::with_url),
            global_cases: urls
                .global_cases
                .as_ref()
                .map_or_else(JhuHistory::new, JhuHistory::with_base_url),
            global_timeline: urls
                .global_timeline
                .as_ref()
                .map_or_else(JhuTimeline::new, JhuTimeline::with_base_url),
            district_snapshot: urls
                .district_snapshot
                .as_ref()
                .map_or_else(RkiDistrictSnapshot::new, RkiDistrictSnapshot::with_url),
            district_history_url: urls.district_history.clone(),
        }
    }
}

type SharedResponse = Result<Arc<Value>, String>;

/// Decides cache hit vs. refetch per entity and applies the fallback chain
pub struct Loader<F, C> {
    fetcher: F,
    cache: C,
    settings: LoadSettings,
    /// Frozen reference instant of this run
    now: DateTime<Utc>,
    /// Responses covering every entity, fetched at most once per URL
    shared: Mutex<HashMap<String, Arc<OnceCell<SharedResponse>>>>,
}

impl<F: JsonFetcher, C: CacheStore> Loader<F, C> {
    pub fn new(fetcher: F, cache: C, settings: LoadSettings, now: DateTime<Utc>) -> Self {
        Self {
            fetcher,
            cache,
            settings,
            now,
            shared: Mutex::new(HashMap::new()),
        }
    }

    /// Reference day of this run (UTC calendar day)
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    /// Cache key namespaced by debug mode, domain and entity
    pub fn cache_key(&self, domain: Domain, key: &str) -> String {
        let prefix = if self.settings.debug { "debug-" } else { "" };
        format!("{}api-cache-{}-{}", prefix, domain.cache_name(), key)
    }

    /// Loads one entity through `adapter`
    ///
    /// Issues at most one network call and at most one cache write.
    pub async fn load<A: SourceAdapter>(
        &self,
        adapter: &A,
        key: &str,
    ) -> Result<Loaded<A::Record>, LoadError> {
        let domain = adapter.domain();
        let cache_key = self.cache_key(domain, key);
        let cache_exists = self.cache.exists(&cache_key);

        if !self.settings.debug && cache_exists && self.is_fresh(&cache_key) {
            match self.read_cached::<A::Record>(&cache_key) {
                Ok(record) => {
                    debug!(%domain, key, "using cached data");
                    return Ok(Loaded {
                        record,
                        origin: Origin::Cache,
                    });
                }
                Err(e) => warn!(%domain, key, error = %e, "cached data unreadable, updating"),
            }
        }

        debug!(%domain, key, "updating cached data");
        let cause = match self.refresh(adapter, key).await {
            Ok(record) => {
                self.store(&cache_key, &record);
                return Ok(Loaded {
                    record,
                    origin: Origin::Network,
                });
            }
            Err(cause) => cause,
        };

        if !cache_exists {
            warn!(%domain, key, error = %cause, "loading new data failed and no cache found");
            return Err(LoadError::CacheMiss {
                domain,
                key: key.to_string(),
                cause: cause.to_string(),
            });
        }

        match self.read_cached::<A::Record>(&cache_key) {
            Ok(record) => {
                warn!(%domain, key, error = %cause, "loading new data failed, using cached data as fallback");
                Ok(Loaded {
                    record,
                    origin: Origin::StaleFallback,
                })
            }
            Err(read_error) => {
                warn!(%domain, key, error = %cause, cache_error = %read_error, "loading new data failed and cache is unusable");
                Err(LoadError::CacheMiss {
                    domain,
                    key: key.to_string(),
                    cause: format!("{}; {}", cause, read_error),
                })
            }
        }
    }

    /// Loads every job and builds the dataset of the run
    ///
    /// Duplicate jobs are loaded once. District histories run after the
    /// snapshots because their requests need the district ids.
    pub async fn load_all(&self, sources: &Sources, jobs: &[Job]) -> LoadReport {
        let mut seen = HashSet::new();
        let unique: Vec<Job> = jobs
            .iter()
            .filter(|job| seen.insert((*job).clone()))
            .cloned()
            .collect();
        let (history_jobs, first_jobs): (Vec<Job>, Vec<Job>) = unique
            .into_iter()
            .partition(|job| job.domain == Domain::LocalHistory);

        let mut report = LoadReport::default();

        let no_districts = sources.district_history(HashMap::new());
        let results = join_all(
            first_jobs
                .iter()
                .map(|job| self.load_record(sources, &no_districts, job)),
        )
        .await;
        report.absorb(first_jobs, results);

        if !history_jobs.is_empty() {
            let history = sources.district_history(report.dataset.district_ids());
            let results = join_all(
                history_jobs
                    .iter()
                    .map(|job| self.load_record(sources, &history, job)),
            )
            .await;
            report.absorb(history_jobs, results);
        }

        report
    }

    async fn load_record(
        &self,
        sources: &Sources,
        history: &RkiDistrictHistory,
        job: &Job,
    ) -> Result<Loaded<Record>, LoadError> {
        match job.domain {
            Domain::Vaccination => self
                .load(&sources.vaccination, &job.key)
                .await
                .map(|loaded| loaded.map(Record::Vaccination)),
            Domain::GlobalCases => self
                .load(&sources.global_cases, &job.key)
                .await
                .map(|loaded| loaded.map(Record::Series)),
            Domain::GlobalTimeline => self
                .load(&sources.global_timeline, &job.key)
                .await
                .map(|loaded| loaded.map(Record::Series)),
            Domain::LocalSnapshot => self
                .load(&sources.district_snapshot, &job.key)
                .await
                .map(|loaded| loaded.map(Record::District)),
            Domain::LocalHistory => self
                .load(history, &job.key)
                .await
                .map(|loaded| loaded.map(Record::Series)),
        }
    }

    fn is_fresh(&self, cache_key: &str) -> bool {
        self.cache
            .modified_at(cache_key)
            .map_or(false, |stored_at| {
                let age = self.now - stored_at;
                age >= chrono::Duration::zero() && age < self.settings.cache_invalidation
            })
    }

    fn read_cached<T: DeserializeOwned>(&self, cache_key: &str) -> Result<T, CachedReadError> {
        let bytes = self.cache.read(cache_key)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn store<T: Serialize>(&self, cache_key: &str, record: &T) {
        let written = serde_json::to_vec(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            .and_then(|bytes| self.cache.write(cache_key, &bytes));
        if let Err(e) = written {
            warn!(cache_key, error = %e, "failed to write cache entry");
        }
    }

    async fn refresh<A: SourceAdapter>(&self, adapter: &A, key: &str) -> Result<A::Record, LoadError> {
        let request = adapter.request(key, self.today())?;
        debug!(url = %request.url, shared = request.shared, "requesting");

        let raw = if request.shared {
            self.fetch_shared(&request.url).await?
        } else {
            Arc::new(self.fetch(&request.url).await?)
        };
        Ok(adapter.normalize(key, &raw)?)
    }

    async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        let timeout = self.settings.request_timeout;
        tokio::time::timeout(timeout, self.fetcher.fetch_json(url))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                seconds: timeout.as_secs(),
            })?
    }

    /// Fetches a response shared by several entities once; concurrent callers
    /// wait for the first request and reuse its outcome
    async fn fetch_shared(&self, url: &str) -> Result<Arc<Value>, FetchError> {
        let cell = {
            let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(shared.entry(url.to_string()).or_default())
        };

        let outcome = cell
            .get_or_init(|| async {
                self.fetch(url)
                    .await
                    .map(Arc::new)
                    .map_err(|e| e.to_string())
            })
            .await;

        outcome.clone().map_err(|message| FetchError::Shared {
            url: url.to_string(),
            message,
        })
    }
}

impl<T> Loaded<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Loaded<U> {
        Loaded {
            record: f(self.record),
            origin: self.origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheManager;
    use crate::sources::CaseSeries;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Answers from a fixed table of URL fragments and counts every call
    #[derive(Default)]
    struct ScriptedFetcher {
        responses: Vec<(String, Value)>,
        fail: bool,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn with(responses: Vec<(&str, Value)>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|(fragment, value)| (fragment.to_string(), value))
                    .collect(),
                ..Default::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl JsonFetcher for ScriptedFetcher {
        fn fetch_json<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value, FetchError>> {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                if self.fail {
                    return Err(FetchError::Status {
                        status: 503,
                        url: url.to_string(),
                    });
                }
                self.responses
                    .iter()
                    .find(|(fragment, _)| url.contains(fragment.as_str()))
                    .map(|(_, value)| value.clone())
                    .ok_or_else(|| FetchError::Status {
                        status: 404,
                        url: url.to_string(),
                    })
            }
            .boxed()
        }
    }

    fn settings() -> LoadSettings {
        LoadSettings {
            cache_invalidation: chrono::Duration::minutes(60),
            debug: false,
            request_timeout: Duration::from_secs(5),
        }
    }

    fn history_response() -> Value {
        json!({
            "timeline": {
                "cases": {
                    "5/16/21": 100,
                    "5/17/21": 110,
                    "5/18/21": 125,
                    "5/19/21": 130,
                    "5/20/21": 150
                }
            }
        })
    }

    fn expected_series() -> CaseSeries {
        CaseSeries {
            daily_new_cases: vec![20, 5, 15, 10],
            last_updated_date: NaiveDate::from_ymd_opt(2021, 5, 20).unwrap(),
        }
    }

    fn cache_in(dir: &TempDir) -> CacheManager {
        CacheManager::with_dir(dir.path().to_path_buf())
    }

    #[tokio::test]
    async fn test_fresh_fetch_is_written_to_cache() {
        let dir = TempDir::new().unwrap();
        let loader = Loader::new(
            ScriptedFetcher::with(vec![("/historical/DEU", history_response())]),
            cache_in(&dir),
            settings(),
            Utc::now(),
        );

        let loaded = loader.load(&JhuHistory::new(), "DEU").await.unwrap();

        assert_eq!(loaded.origin, Origin::Network);
        assert_eq!(loaded.record, expected_series());
        assert!(dir.path().join("api-cache-global-cases-DEU.json").exists());
    }

    #[tokio::test]
    async fn test_cache_hit_within_window_makes_no_network_call() {
        let dir = TempDir::new().unwrap();
        let first = Loader::new(
            ScriptedFetcher::with(vec![("/historical/DEU", history_response())]),
            cache_in(&dir),
            settings(),
            Utc::now(),
        );
        let fetched = first.load(&JhuHistory::new(), "DEU").await.unwrap();

        let second = Loader::new(ScriptedFetcher::failing(), cache_in(&dir), settings(), Utc::now());
        let cached = second.load(&JhuHistory::new(), "DEU").await.unwrap();

        assert_eq!(cached.origin, Origin::Cache);
        assert_eq!(cached.record, fetched.record);
        assert_eq!(second.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_stale_cache_is_used_when_refetch_fails() {
        let dir = TempDir::new().unwrap();
        let first = Loader::new(
            ScriptedFetcher::with(vec![("/historical/DEU", history_response())]),
            cache_in(&dir),
            settings(),
            Utc::now(),
        );
        first.load(&JhuHistory::new(), "DEU").await.unwrap();

        let later = Utc::now() + chrono::Duration::hours(2);
        let second = Loader::new(ScriptedFetcher::failing(), cache_in(&dir), settings(), later);
        let loaded = second.load(&JhuHistory::new(), "DEU").await.unwrap();

        assert_eq!(loaded.origin, Origin::StaleFallback);
        assert_eq!(loaded.record, expected_series());
        assert_eq!(second.fetcher.calls(), 1);
    }

    /// Collects formatted log output in memory
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn test_stale_fallback_is_logged() {
        let dir = TempDir::new().unwrap();
        let first = Loader::new(
            ScriptedFetcher::with(vec![("/historical/DEU", history_response())]),
            cache_in(&dir),
            settings(),
            Utc::now(),
        );
        first.load(&JhuHistory::new(), "DEU").await.unwrap();

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let later = Utc::now() + chrono::Duration::hours(2);
        let second = Loader::new(ScriptedFetcher::failing(), cache_in(&dir), settings(), later);
        let loaded = second.load(&JhuHistory::new(), "DEU").await.unwrap();

        assert_eq!(loaded.origin, Origin::StaleFallback);
        let output = logs.text();
        assert!(output.contains("using cached data as fallback"), "{output}");
        assert!(output.contains("DEU"));
    }

    #[tokio::test]
    async fn test_cache_entry_from_the_future_is_refetched() {
        let dir = TempDir::new().unwrap();
        let first = Loader::new(
            ScriptedFetcher::with(vec![("/historical/DEU", history_response())]),
            cache_in(&dir),
            settings(),
            Utc::now(),
        );
        first.load(&JhuHistory::new(), "DEU").await.unwrap();

        let earlier = Utc::now() - chrono::Duration::days(2);
        let second = Loader::new(
            ScriptedFetcher::with(vec![("/historical/DEU", history_response())]),
            cache_in(&dir),
            settings(),
            earlier,
        );
        let loaded = second.load(&JhuHistory::new(), "DEU").await.unwrap();

        assert_eq!(loaded.origin, Origin::Network);
        assert_eq!(second.fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_cache_is_refetched_when_upstream_works() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        cache
            .write("api-cache-global-cases-DEU", br#"{"daily_new_cases":[1],"last_updated_date":"2021-01-01"}"#)
            .unwrap();

        let later = Utc::now() + chrono::Duration::hours(2);
        let loader = Loader::new(
            ScriptedFetcher::with(vec![("/historical/DEU", history_response())]),
            cache,
            settings(),
            later,
        );
        let loaded = loader.load(&JhuHistory::new(), "DEU").await.unwrap();

        assert_eq!(loaded.origin, Origin::Network);
        assert_eq!(loaded.record, expected_series());
    }

    #[tokio::test]
    async fn test_failure_without_cache_is_a_cache_miss() {
        let dir = TempDir::new().unwrap();
        let loader = Loader::new(ScriptedFetcher::failing(), cache_in(&dir), settings(), Utc::now());

        let result = loader.load(&JhuHistory::new(), "DEU").await;

        assert!(matches!(
            result,
            Err(LoadError::CacheMiss { domain: Domain::GlobalCases, ref key, .. }) if key == "DEU"
        ));
    }

    #[tokio::test]
    async fn test_malformed_response_falls_back_to_cache() {
        let dir = TempDir::new().unwrap();
        let first = Loader::new(
            ScriptedFetcher::with(vec![("/historical/DEU", history_response())]),
            cache_in(&dir),
            settings(),
            Utc::now(),
        );
        first.load(&JhuHistory::new(), "DEU").await.unwrap();

        let later = Utc::now() + chrono::Duration::hours(2);
        let second = Loader::new(
            ScriptedFetcher::with(vec![("/historical/DEU", json!({ "message": "rate limited" }))]),
            cache_in(&dir),
            settings(),
            later,
        );
        let loaded = second.load(&JhuHistory::new(), "DEU").await.unwrap();

        assert_eq!(loaded.origin, Origin::StaleFallback);
        assert_eq!(loaded.record, expected_series());
    }

    #[tokio::test]
    async fn test_debug_mode_bypasses_fresh_cache_and_uses_own_namespace() {
        let dir = TempDir::new().unwrap();
        let first = Loader::new(
            ScriptedFetcher::with(vec![("/historical/DEU", history_response())]),
            cache_in(&dir),
            LoadSettings {
                debug: true,
                ..settings()
            },
            Utc::now(),
        );
        first.load(&JhuHistory::new(), "DEU").await.unwrap();
        let second = Loader::new(
            ScriptedFetcher::with(vec![("/historical/DEU", history_response())]),
            cache_in(&dir),
            LoadSettings {
                debug: true,
                ..settings()
            },
            Utc::now(),
        );
        let loaded = second.load(&JhuHistory::new(), "DEU").await.unwrap();

        assert_eq!(loaded.origin, Origin::Network);
        assert_eq!(second.fetcher.calls(), 1);
        assert!(dir.path().join("debug-api-cache-global-cases-DEU.json").exists());
        assert!(!dir.path().join("api-cache-global-cases-DEU.json").exists());
    }

    #[tokio::test]
    async fn test_timeout_routes_through_fallback() {
        let dir = TempDir::new().unwrap();
        let slow = ScriptedFetcher {
            delay: Some(Duration::from_secs(10)),
            ..ScriptedFetcher::with(vec![("/historical/DEU", history_response())])
        };
        let loader = Loader::new(
            slow,
            cache_in(&dir),
            LoadSettings {
                request_timeout: Duration::from_millis(20),
                ..settings()
            },
            Utc::now(),
        );

        let result = loader.load(&JhuHistory::new(), "DEU").await;

        let Err(LoadError::CacheMiss { cause, .. }) = result else {
            panic!("expected a cache miss after the timeout");
        };
        assert!(cause.contains("did not respond"));
    }

    #[tokio::test]
    async fn test_shared_response_is_fetched_once() {
        let dir = TempDir::new().unwrap();
        let document = json!({
            "DEU": { "population": 83900471.0, "total_vaccinations_per_hundred": 50.0, "last_updated_date": "2021-05-20" },
            "CAN": { "population": 38067913.0, "total_vaccinations_per_hundred": 55.0, "last_updated_date": "2021-05-20" },
            "USA": { "population": 332915074.0, "total_vaccinations_per_hundred": 82.0, "last_updated_date": "2021-05-19" }
        });
        let loader = Loader::new(
            ScriptedFetcher::with(vec![("owid-covid-latest", document)]),
            cache_in(&dir),
            settings(),
            Utc::now(),
        );
        let jobs = vec![
            Job::new(Domain::Vaccination, "DEU"),
            Job::new(Domain::Vaccination, "CAN"),
            Job::new(Domain::Vaccination, "USA"),
        ];

        let report = loader.load_all(&Sources::default(), &jobs).await;

        assert!(report.failures.is_empty());
        assert_eq!(loader.fetcher.calls(), 1);
        assert_eq!(
            report.dataset.vaccination("USA").map(|r| r.total_vaccinations_per_hundred),
            Some(82.0)
        );
    }

    #[tokio::test]
    async fn test_duplicate_jobs_are_loaded_once() {
        let dir = TempDir::new().unwrap();
        let loader = Loader::new(
            ScriptedFetcher::with(vec![("/historical/DEU", history_response())]),
            cache_in(&dir),
            settings(),
            Utc::now(),
        );
        let jobs = vec![
            Job::new(Domain::GlobalCases, "DEU"),
            Job::new(Domain::GlobalCases, "DEU"),
        ];

        let report = loader.load_all(&Sources::default(), &jobs).await;

        assert_eq!(loader.fetcher.calls(), 1);
        assert_eq!(report.origins.len(), 1);
    }

    #[tokio::test]
    async fn test_configured_source_urls_are_requested() {
        let dir = TempDir::new().unwrap();
        let loader = Loader::new(
            ScriptedFetcher::with(vec![("mirror.local/cases/DEU", history_response())]),
            cache_in(&dir),
            settings(),
            Utc::now(),
        );
        let urls = SourceUrls {
            global_cases: Some("http://mirror.local/cases".to_string()),
            ..SourceUrls::default()
        };

        let report = loader
            .load_all(&Sources::from(&urls), &[Job::new(Domain::GlobalCases, "DEU")])
            .await;

        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(
            report.dataset.series(Domain::GlobalCases, "DEU"),
            Some(&expected_series())
        );
    }

    #[tokio::test]
    async fn test_district_history_uses_snapshot_district_id() {
        let dir = TempDir::new().unwrap();
        let loader = Loader::new(
            ScriptedFetcher::with(vec![
                (
                    "RKI_Landkreisdaten",
                    json!({ "features": [ { "attributes": { "RS": "09772", "GEN": "Augsburg", "cases7_per_100k": 40.0 } } ] }),
                ),
                (
                    "09772",
                    json!({ "features": [ { "attributes": { "Meldedatum": 1621468800000_i64, "AnzahlFall": 12 } } ] }),
                ),
            ]),
            cache_in(&dir),
            settings(),
            Utc::now(),
        );
        let jobs = vec![
            Job::new(Domain::LocalHistory, "A"),
            Job::new(Domain::LocalSnapshot, "A"),
        ];

        let report = loader.load_all(&Sources::default(), &jobs).await;

        assert!(report.failures.is_empty(), "{:?}", report.failures);
        let series = report.dataset.series(Domain::LocalHistory, "A").unwrap();
        assert_eq!(series.daily_new_cases, vec![12]);
    }

    #[tokio::test]
    async fn test_failed_entities_are_absent_and_reported() {
        let dir = TempDir::new().unwrap();
        let loader = Loader::new(ScriptedFetcher::failing(), cache_in(&dir), settings(), Utc::now());
        let jobs = vec![
            Job::new(Domain::LocalSnapshot, "A"),
            Job::new(Domain::LocalHistory, "A"),
        ];

        let report = loader.load_all(&Sources::default(), &jobs).await;

        assert_eq!(report.failures.len(), 2);
        assert!(!report.dataset.contains(Domain::LocalSnapshot, "A"));
        assert!(!report.dataset.contains(Domain::LocalHistory, "A"));
    }
}
