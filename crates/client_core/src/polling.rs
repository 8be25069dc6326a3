//! Periodic polling that keeps local observable state in step with a remote resource.
//!
//! Every tick spawns one fetch. Fetches are not de-duplicated, so a slow response can
//! complete after a newer one; each fetch carries a sequence number and a result applies
//! only when it is newer than the last applied one. Stopping a session cancels the timer
//! but leaves in-flight fetches running; their results are discarded.

use std::{
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use shared::{
    domain::GifName,
    protocol::{CurrentGifResponse, GifListResponse},
};
use tokio::{
    sync::{watch, Notify},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, warn};
use url::Url;

use crate::{BalloonClient, ClientResult};

pub const CURRENT_GIF_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const GIF_LIST_POLL_INTERVAL: Duration = Duration::from_millis(5000);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[async_trait]
pub trait PollSource<T>: Send + Sync {
    /// Human readable name used in diagnostics.
    fn label(&self) -> &str;
    async fn fetch(&self) -> ClientResult<T>;
}

/// A GET endpoint returning a JSON payload `P`, reduced to the polled value by `extract`.
pub struct JsonEndpoint<P, T> {
    client: BalloonClient,
    url: Url,
    extract: fn(P) -> T,
    accept_error_bodies: bool,
    _payload: PhantomData<fn() -> P>,
}

impl<P, T> JsonEndpoint<P, T> {
    pub fn new(client: BalloonClient, url: Url, extract: fn(P) -> T) -> Self {
        Self {
            client,
            url,
            extract,
            accept_error_bodies: false,
            _payload: PhantomData,
        }
    }

    /// Also decode non-2xx responses whose body is valid `P` instead of failing them.
    pub fn accepting_error_bodies(mut self) -> Self {
        self.accept_error_bodies = true;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl JsonEndpoint<CurrentGifResponse, Option<GifName>> {
    pub fn current_gif(client: &BalloonClient) -> Self {
        Self::new(client.clone(), client.endpoint(&["current"]), |body| {
            body.current_gif
        })
        .accepting_error_bodies()
    }
}

impl JsonEndpoint<GifListResponse, Vec<GifName>> {
    pub fn gif_list(client: &BalloonClient) -> Self {
        Self::new(client.clone(), client.endpoint(&["list"]), |body| body.gifs)
    }
}

#[async_trait]
impl<P, T> PollSource<T> for JsonEndpoint<P, T>
where
    P: DeserializeOwned + Send + 'static,
    T: Send + 'static,
{
    fn label(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch(&self) -> ClientResult<T> {
        let payload: P = if self.accept_error_bodies {
            self.client.get_json_any_status(self.url.clone()).await?
        } else {
            self.client.get_json(self.url.clone()).await?
        };
        Ok((self.extract)(payload))
    }
}

/// Shared observable slot. `None` until the first successful load.
pub struct Observable<T> {
    tx: Arc<watch::Sender<Option<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T: Clone> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Observable<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.tx.subscribe()
    }

    pub fn replace(&self, value: T) {
        self.tx.send_replace(Some(value));
    }

    /// Mutates a loaded value in place; subscribers are notified only when `modify`
    /// returns `true`. Does nothing while the value is still loading.
    pub fn modify(&self, modify: impl FnOnce(&mut T) -> bool) -> bool {
        self.tx.send_if_modified(|slot| match slot {
            Some(value) => modify(value),
            None => false,
        })
    }
}

#[derive(Default)]
struct PollSession {
    live: AtomicBool,
    issued: AtomicU64,
    applied: AtomicU64,
    failures: AtomicU64,
    trigger: Notify,
}

enum ApplyOutcome {
    Applied,
    Unchanged,
    Stale,
    TornDown,
}

/// A running poll loop for one remote resource.
pub struct PollingStateSync<T> {
    label: String,
    state: Observable<T>,
    session: Arc<PollSession>,
    timer: JoinHandle<()>,
}

impl<T> PollingStateSync<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Starts polling into a fresh observable. Must be called inside a tokio runtime.
    pub fn start(source: Arc<dyn PollSource<T>>, interval: Duration) -> Self {
        Self::start_with_state(source, interval, Observable::new())
    }

    /// Starts polling into an existing observable, e.g. one already shared with a
    /// controller that mutates it locally.
    pub fn start_with_state(
        source: Arc<dyn PollSource<T>>,
        interval: Duration,
        state: Observable<T>,
    ) -> Self {
        let interval = interval.max(MIN_POLL_INTERVAL);
        let label = source.label().to_string();
        let session = Arc::new(PollSession::default());
        session.live.store(true, Ordering::SeqCst);

        debug!(source = %label, interval_ms = interval.as_millis() as u64, "poll: started");
        let timer = tokio::spawn(run_timer(
            source,
            interval,
            state.clone(),
            Arc::clone(&session),
        ));

        Self {
            label,
            state,
            session,
            timer,
        }
    }

    pub fn state(&self) -> &Observable<T> {
        &self.state
    }

    pub fn current(&self) -> Option<T> {
        self.state.get()
    }
}

impl<T> PollingStateSync<T> {
    /// Fires one extra tick right away without disturbing the regular schedule.
    pub fn poll_now(&self) {
        self.session.trigger.notify_one();
    }

    pub fn failure_count(&self) -> u64 {
        self.session.failures.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.session.live.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        if self.session.live.swap(false, Ordering::SeqCst) {
            self.timer.abort();
            debug!(source = %self.label, "poll: stopped");
        }
    }
}

impl<T> Drop for PollingStateSync<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_timer<T>(
    source: Arc<dyn PollSource<T>>,
    interval: Duration,
    state: Observable<T>,
    session: Arc<PollSession>,
) where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = session.trigger.notified() => {}
        }
        if !session.live.load(Ordering::SeqCst) {
            break;
        }

        let seq = session.issued.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::spawn(fetch_and_apply(
            Arc::clone(&source),
            state.clone(),
            Arc::clone(&session),
            seq,
        ));
    }
}

async fn fetch_and_apply<T>(
    source: Arc<dyn PollSource<T>>,
    state: Observable<T>,
    session: Arc<PollSession>,
    seq: u64,
) where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let result = source.fetch().await;

    let value = match result {
        Ok(value) => value,
        Err(err) => {
            if session.live.load(Ordering::SeqCst) {
                session.failures.fetch_add(1, Ordering::SeqCst);
                warn!(source = source.label(), seq, error = %err, "poll: fetch failed, keeping previous state");
            }
            return;
        }
    };

    let mut outcome = ApplyOutcome::Unchanged;
    state.tx.send_if_modified(|slot| {
        if !session.live.load(Ordering::SeqCst) {
            outcome = ApplyOutcome::TornDown;
            return false;
        }
        if session.applied.fetch_max(seq, Ordering::SeqCst) >= seq {
            outcome = ApplyOutcome::Stale;
            return false;
        }
        if slot.as_ref() == Some(&value) {
            return false;
        }
        *slot = Some(value);
        outcome = ApplyOutcome::Applied;
        true
    });

    match outcome {
        ApplyOutcome::Applied => debug!(source = source.label(), seq, "poll: state updated"),
        ApplyOutcome::Unchanged => {}
        ApplyOutcome::Stale => debug!(
            source = source.label(),
            seq,
            applied = session.applied.load(Ordering::SeqCst),
            "poll: discarded out-of-order response"
        ),
        ApplyOutcome::TornDown => {
            debug!(source = source.label(), seq, "poll: discarded response after stop")
        }
    }
}

#[cfg(test)]
#[path = "tests/polling_tests.rs"]
mod tests;
