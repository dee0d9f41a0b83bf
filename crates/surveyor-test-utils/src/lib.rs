//! Shared test utilities for surveyor integration tests.
//!
//! Provides in-process fakes for every external capability (plan generator,
//! search, content fetch, screenshot capture) with failure and delay
//! injection plus call recording, and helpers to build a mission controller
//! over a temporary snapshot directory.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

use surveyor_core::orchestrator::MissionController;
use surveyor_core::plan::PlanProducer;
use surveyor_core::providers::{
    Capabilities, CaptureResult, ContentFetcher, ExtractedContent, PlanGenerator, SearchChannel,
    SearchHit, SearchProvider, VisualCapturer,
};
use surveyor_core::snapshot::FsSnapshotStore;
use surveyor_core::stage::{FanOutLimits, MissionLimits, StageRegistry};
use surveyor_core::state::MissionId;

// ---------------------------------------------------------------------------
// Concurrency tracking
// ---------------------------------------------------------------------------

/// Tracks how many calls are in flight and the highest count seen.
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlightGuard<'a>(&'a InFlight);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Plan generator
// ---------------------------------------------------------------------------

/// Plan generator that answers every prompt the same way.
#[derive(Debug)]
pub struct ScriptedPlanner {
    response: Option<Value>,
    fail: bool,
    panic: bool,
    calls: AtomicUsize,
}

impl ScriptedPlanner {
    /// Always returns `value` as the generated plan.
    pub fn returning(value: Value) -> Self {
        Self {
            response: Some(value),
            fail: false,
            panic: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Behaves like a generator with no credentials: returns nothing.
    pub fn unavailable() -> Self {
        Self {
            response: None,
            fail: false,
            panic: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always errors, like an unreachable endpoint.
    pub fn failing() -> Self {
        Self {
            response: None,
            fail: true,
            panic: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Panics on every call.
    pub fn panicking() -> Self {
        Self {
            response: None,
            fail: false,
            panic: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlanGenerator for ScriptedPlanner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _prompt: &str) -> Result<Option<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic {
            panic!("plan generator crashed");
        }
        if self.fail {
            bail!("plan generator unreachable");
        }
        Ok(self.response.clone())
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Search fake: each query yields `hits_per_query` hits with URLs derived
/// from the query text.
#[derive(Debug)]
pub struct FakeSearch {
    hits_per_query: usize,
    failing: HashSet<String>,
    delay: Duration,
    calls: Mutex<Vec<(String, SearchChannel)>>,
    in_flight: InFlight,
}

impl Default for FakeSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSearch {
    pub fn new() -> Self {
        Self {
            hits_per_query: 2,
            failing: HashSet::new(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: InFlight::default(),
        }
    }

    pub fn hits_per_query(mut self, n: usize) -> Self {
        self.hits_per_query = n;
        self
    }

    pub fn failing_on(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every `(query, channel)` received, in call order.
    pub fn calls(&self) -> Vec<(String, SearchChannel)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.in_flight.peak()
    }

    /// The URL the fake returns for hit `i` of `query`.
    pub fn url_for(query: &str, i: usize) -> String {
        format!("https://search.test/{}/{i}", slug(query))
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, query: &str, channel: SearchChannel) -> Result<Vec<SearchHit>> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), channel));
        let _guard = self.in_flight.enter();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.contains(query) {
            bail!("search failed for {query:?}");
        }
        Ok((0..self.hits_per_query)
            .map(|i| SearchHit {
                title: format!("{query} #{i}"),
                url: Self::url_for(query, i),
                snippet: format!("snippet for {query}"),
                platform: (channel == SearchChannel::Social).then(|| "instagram".to_string()),
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Content fetch
// ---------------------------------------------------------------------------

/// Fetch fake: returns fixed text for every URL unless told otherwise.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    failing: HashSet<String>,
    empty: HashSet<String>,
    panicking: HashSet<String>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    in_flight: InFlight,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// `url` yields no usable content.
    pub fn empty_on(mut self, url: &str) -> Self {
        self.empty.insert(url.to_string());
        self
    }

    /// Fetching `url` panics.
    pub fn panicking_on(mut self, url: &str) -> Self {
        self.panicking.insert(url.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.in_flight.peak()
    }
}

#[async_trait]
impl ContentFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<ExtractedContent>> {
        self.calls.lock().unwrap().push(url.to_string());
        let _guard = self.in_flight.enter();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panicking.contains(url) {
            panic!("fetcher exploded on {url}");
        }
        if self.failing.contains(url) {
            bail!("connection reset fetching {url}");
        }
        if self.empty.contains(url) {
            return Ok(None);
        }
        Ok(Some(ExtractedContent {
            url: url.to_string(),
            content: format!("Extracted text from {url}"),
            method: "fake".to_string(),
            content_type: None,
        }))
    }
}

// ---------------------------------------------------------------------------
// Visual capture
// ---------------------------------------------------------------------------

/// Capture fake: succeeds unless the URL is marked failing, in which case it
/// reports an unsuccessful capture (not an error).
#[derive(Debug, Default)]
pub struct FakeCapturer {
    failing: HashSet<String>,
    delay: Duration,
    calls: Mutex<Vec<(String, MissionId)>>,
    in_flight: InFlight,
}

impl FakeCapturer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<(String, MissionId)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.in_flight.peak()
    }
}

#[async_trait]
impl VisualCapturer for FakeCapturer {
    async fn capture(&self, url: &str, mission_id: &MissionId) -> Result<CaptureResult> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), mission_id.clone()));
        let _guard = self.in_flight.enter();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.contains(url) {
            return Ok(CaptureResult {
                success: false,
                url: url.to_string(),
                filepath: None,
                error: Some("browser crashed".to_string()),
            });
        }
        Ok(CaptureResult {
            success: true,
            url: url.to_string(),
            filepath: Some(format!("/captures/{mission_id}/{}.png", slug(url))),
            error: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Wiring helpers
// ---------------------------------------------------------------------------

/// The fakes behind a [`Capabilities`] bundle, kept for assertions.
#[derive(Debug, Clone)]
pub struct FakeProviders {
    pub search: Arc<FakeSearch>,
    pub fetcher: Arc<FakeFetcher>,
    pub capturer: Arc<FakeCapturer>,
}

impl FakeProviders {
    pub fn new(search: FakeSearch, fetcher: FakeFetcher, capturer: FakeCapturer) -> Self {
        Self {
            search: Arc::new(search),
            fetcher: Arc::new(fetcher),
            capturer: Arc::new(capturer),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            search: self.search.clone(),
            fetcher: self.fetcher.clone(),
            capturer: self.capturer.clone(),
        }
    }
}

impl Default for FakeProviders {
    fn default() -> Self {
        Self::new(FakeSearch::new(), FakeFetcher::new(), FakeCapturer::new())
    }
}

/// Small ceilings and short timeouts for tests.
pub fn test_limits() -> MissionLimits {
    MissionLimits {
        search: FanOutLimits::new(2, Duration::from_secs(2)),
        extraction: FanOutLimits::new(3, Duration::from_secs(2)),
        capture: FanOutLimits::new(1, Duration::from_secs(2)),
    }
}

/// A snapshot store rooted in a fresh temporary directory. Keep the
/// `TempDir` alive for the duration of the test.
pub fn temp_store() -> (TempDir, Arc<FsSnapshotStore>) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let store = Arc::new(FsSnapshotStore::new(dir.path().join("sessions")));
    (dir, store)
}

/// Build a controller over fakes. `generator = None` means fallback only.
pub fn controller(
    providers: &FakeProviders,
    generator: Option<Arc<dyn PlanGenerator>>,
    store: Arc<FsSnapshotStore>,
) -> MissionController {
    MissionController::new(
        PlanProducer::new(generator, Duration::from_secs(2)),
        Arc::new(StageRegistry::new(providers.capabilities(), test_limits())),
        store,
    )
}

fn slug(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}
