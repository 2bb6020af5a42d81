//! Telemetry poll scheduler
//!
//! One scheduling task owns the [`PollerState`]. Every timer tick spawns a
//! tick task that fetches all fields concurrently; finished ticks come back
//! to the scheduling task, which is the only place a snapshot is published.
//!
//! Publish rules:
//! - a tick is published only once all its fields have resolved
//! - a tick older than the last published one is dropped, so a slow early
//!   tick can never overwrite a faster later one
//! - nothing is published once the [`CancelToken`] is cancelled

use reqwest::Url;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::fields::Field;
use super::merge::{self, TickFetch};
use super::TelemetrySnapshot;
use crate::fetch::{FetchError, HttpFetcher};
use crate::state::SnapshotFeed;

/// Cancellation flag shared by the scheduler and every in-flight operation
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        loop {
            // enregistré avant le test du flag : pas de réveil perdu
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Result of one tick as handed back to the scheduler
#[derive(Debug)]
pub struct TickOutcome {
    pub tick: u64,
    pub result: Result<TickFetch, FetchError>,
}

/// Polling state owned by the scheduling task
pub struct PollerState {
    current: Arc<TelemetrySnapshot>,
    next_tick: u64,
    last_published: u64,
    publisher: watch::Sender<Arc<TelemetrySnapshot>>,
    token: CancelToken,
}

impl PollerState {
    pub fn new(token: CancelToken) -> (Self, SnapshotFeed) {
        let current = Arc::new(TelemetrySnapshot::default());
        let (publisher, feed) = watch::channel(current.clone());
        let state = Self {
            current,
            next_tick: 0,
            last_published: 0,
            publisher,
            token,
        };
        (state, feed)
    }

    /// Allocate the id of a new tick; ids follow start order
    pub fn begin_tick(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    pub fn current(&self) -> Arc<TelemetrySnapshot> {
        self.current.clone()
    }

    /// Single mutation entry point. Returns true when the outcome was published.
    pub fn apply_snapshot(&mut self, outcome: TickOutcome) -> bool {
        if self.token.is_cancelled() {
            debug!("[poller] tick {} discarded: poller cancelled", outcome.tick);
            return false;
        }
        if outcome.tick <= self.last_published {
            debug!(
                "[poller] tick {} discarded: tick {} already published",
                outcome.tick, self.last_published
            );
            return false;
        }

        let next = match outcome.result {
            Ok(fetch) => merge::merge(&self.current, outcome.tick, fetch),
            Err(e) => {
                warn!("[poller] tick {} failed before dispatch: {}", outcome.tick, e);
                merge::failed_tick(&self.current, outcome.tick, &e)
            }
        };

        let next = Arc::new(next);
        self.current = next.clone();
        self.last_published = outcome.tick;
        self.publisher.send_replace(next);
        true
    }
}

fn resolve_urls(fetcher: &HttpFetcher) -> Result<[Url; 7], FetchError> {
    let [lat, lon, heading, speeds, hazards, health, all] = Field::ALL.map(|field| fetcher.url(field.path()));
    Ok([lat?, lon?, heading?, speeds?, hazards?, health?, all?])
}

/// Fetch every field of one tick. URLs are resolved up front, then all
/// requests are in flight together.
pub async fn run_tick(fetcher: &HttpFetcher, tick: u64) -> TickOutcome {
    let result = match resolve_urls(fetcher) {
        Ok([lat, lon, heading, speeds, hazards, health, all]) => {
            let (latitude, longitude, heading, speeds, hazards, health, all) = tokio::join!(
                fetcher.get_url(lat),
                fetcher.get_url(lon),
                fetcher.get_url(heading),
                fetcher.get_url(speeds),
                fetcher.get_url(hazards),
                fetcher.get_url(health),
                fetcher.get_url(all),
            );

            Ok(TickFetch {
                latitude,
                longitude,
                heading,
                speeds,
                hazards,
                health,
                all,
            })
        }
        Err(e) => Err(e),
    };

    TickOutcome { tick, result }
}

/// Handle returned by [`start`]
pub struct Cancellable {
    token: CancelToken,
    feed: SnapshotFeed,
    task: JoinHandle<()>,
}

impl Cancellable {
    /// Stop the timer and discard every tick still in flight
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// New receiver on the published snapshots
    pub fn subscribe(&self) -> SnapshotFeed {
        self.feed.clone()
    }

    pub fn latest(&self) -> Arc<TelemetrySnapshot> {
        self.feed.borrow().clone()
    }

    /// Wait for the scheduling task to exit after `cancel`
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!("[poller] scheduler task ended abnormally: {}", e);
        }
    }
}

/// Start polling every `interval`; the first tick fires immediately
pub fn start(fetcher: HttpFetcher, interval: Duration) -> Cancellable {
    start_with_token(fetcher, interval, CancelToken::new())
}

pub fn start_with_token(fetcher: HttpFetcher, interval: Duration, token: CancelToken) -> Cancellable {
    let (state, feed) = PollerState::new(token.clone());
    let task = tokio::spawn(schedule(state, fetcher, interval, token.clone()));
    Cancellable { token, feed, task }
}

async fn schedule(mut state: PollerState, fetcher: HttpFetcher, interval: Duration, token: CancelToken) {
    info!(
        "[poller] started (interval {} ms, field timeout {} ms)",
        interval.as_millis(),
        fetcher.timeout().as_millis()
    );

    let mut timer = tokio::time::interval(interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight: JoinSet<Option<TickOutcome>> = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => break,

            Some(joined) = in_flight.join_next() => match joined {
                Ok(Some(outcome)) => {
                    let tick = outcome.tick;
                    if state.apply_snapshot(outcome) {
                        debug!("[poller] published tick {}", tick);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("[poller] tick task failed: {}", e),
            },

            _ = timer.tick() => {
                let tick = state.begin_tick();
                let fetcher = fetcher.clone();
                let token = token.clone();
                in_flight.spawn(async move {
                    let outcome = run_tick(&fetcher, tick).await;
                    // résultat arrivé après l'annulation : jeté
                    if token.is_cancelled() {
                        None
                    } else {
                        Some(outcome)
                    }
                });
            }
        }
    }

    in_flight.abort_all();
    info!("[poller] stopped after {} ticks", state.current().tick);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(text: &str) -> Result<String, FetchError> {
        Ok(text.to_string())
    }

    fn fetch_with_latitude(lat: &str) -> TickFetch {
        TickFetch {
            latitude: ok(lat),
            longitude: ok("-111.9"),
            heading: ok("0"),
            speeds: ok("null"),
            hazards: ok("[]"),
            health: ok("null"),
            all: ok("[]"),
        }
    }

    #[test]
    fn test_tick_ids_follow_start_order() {
        let (mut state, _feed) = PollerState::new(CancelToken::new());
        assert_eq!(state.begin_tick(), 1);
        assert_eq!(state.begin_tick(), 2);
        assert_eq!(state.begin_tick(), 3);
    }

    #[test]
    fn test_late_older_tick_does_not_clobber() {
        let (mut state, feed) = PollerState::new(CancelToken::new());
        let a = state.begin_tick();
        let b = state.begin_tick();

        // B (démarré après) termine en premier
        assert!(state.apply_snapshot(TickOutcome { tick: b, result: Ok(fetch_with_latitude("2.0")) }));
        assert!(!state.apply_snapshot(TickOutcome { tick: a, result: Ok(fetch_with_latitude("1.0")) }));

        let published = feed.borrow().clone();
        assert_eq!(published.tick, b);
        assert_eq!(published.latitude.as_deref(), Some("2.0"));
    }

    #[test]
    fn test_in_order_ticks_both_publish() {
        let (mut state, feed) = PollerState::new(CancelToken::new());
        let a = state.begin_tick();
        let b = state.begin_tick();
        assert!(state.apply_snapshot(TickOutcome { tick: a, result: Ok(fetch_with_latitude("1.0")) }));
        assert!(state.apply_snapshot(TickOutcome { tick: b, result: Ok(fetch_with_latitude("2.0")) }));
        assert_eq!(feed.borrow().latitude.as_deref(), Some("2.0"));
    }

    #[test]
    fn test_cancelled_state_publishes_nothing() {
        let token = CancelToken::new();
        let (mut state, feed) = PollerState::new(token.clone());
        let tick = state.begin_tick();
        token.cancel();
        assert!(!state.apply_snapshot(TickOutcome { tick, result: Ok(fetch_with_latitude("1.0")) }));
        assert_eq!(feed.borrow().tick, 0);
        assert_eq!(feed.borrow().latitude, None);
    }

    #[test]
    fn test_failed_tick_keeps_snapshot_and_sets_error() {
        let (mut state, feed) = PollerState::new(CancelToken::new());
        let first = state.begin_tick();
        state.apply_snapshot(TickOutcome { tick: first, result: Ok(fetch_with_latitude("33.4")) });

        let second = state.begin_tick();
        let published = state.apply_snapshot(TickOutcome {
            tick: second,
            result: Err(FetchError::InvalidUrl("http://[".into())),
        });
        assert!(published);
        let snapshot = feed.borrow().clone();
        assert_eq!(snapshot.latitude.as_deref(), Some("33.4"));
        assert!(snapshot.last_error.is_some());
    }

    #[test]
    fn test_published_snapshots_are_distinct_values() {
        let (mut state, feed) = PollerState::new(CancelToken::new());
        let before = feed.borrow().clone();
        let tick = state.begin_tick();
        state.apply_snapshot(TickOutcome { tick, result: Ok(fetch_with_latitude("1.0")) });
        // l'ancien snapshot n'a pas été modifié en place
        assert_eq!(before.tick, 0);
        assert_eq!(before.latitude, None);
        assert!(!Arc::ptr_eq(&before, &feed.borrow()));
    }

    #[tokio::test]
    async fn test_cancel_token_wakes_waiters() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        tokio::task::yield_now().await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter not woken")
            .unwrap();

        // déjà annulé : retour immédiat
        token.cancelled().await;
        assert!(token.is_cancelled());
    }
}
