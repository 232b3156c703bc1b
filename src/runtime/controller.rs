use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use chrono::Utc;
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
    time,
};

use crate::geo::GeoFix;
use crate::settings::TrackerSettings;
use crate::tracking::{LiveStats, Pace, RunSession, RunState, RunSummary, Unit};

use super::events::{self, emit, RunEvent};
use super::feed::FixFeed;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Serialises commands, fixes and ticks against one [`RunSession`].
///
/// Every mutation takes the session mutex, so a fix racing a `pause` is
/// resolved by whichever acquires the lock first and is never half-applied.
#[derive(Clone)]
pub struct RunController {
    session: Arc<Mutex<RunSession>>,
    settings: TrackerSettings,
    events: broadcast::Sender<RunEvent>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    feed: Arc<Mutex<FixFeed>>,
    pending_source: Arc<Mutex<Option<mpsc::Receiver<GeoFix>>>>,
}

impl RunController {
    pub fn new(settings: TrackerSettings) -> Self {
        let settings = settings.with_env_overrides();
        Self {
            session: Arc::new(Mutex::new(new_session(&settings))),
            settings,
            events: events::channel(),
            ticker: Arc::new(Mutex::new(None)),
            feed: Arc::new(Mutex::new(FixFeed::new())),
            pending_source: Arc::new(Mutex::new(None)),
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    /// Hands over the location provider's channel; consumed by the next `start`.
    pub async fn attach_fix_source(&self, fixes: mpsc::Receiver<GeoFix>) -> Result<()> {
        if self.feed.lock().await.is_attached() {
            bail!("a fix source is already feeding the active run");
        }
        *self.pending_source.lock().await = Some(fixes);
        Ok(())
    }

    pub async fn snapshot(&self) -> LiveStats {
        self.session.lock().await.live_stats()
    }

    pub async fn state(&self) -> RunState {
        self.session.lock().await.state()
    }

    pub async fn current_distance(&self, unit: Unit) -> f64 {
        self.session.lock().await.current_distance(unit)
    }

    pub async fn current_pace(&self, unit: Unit) -> Pace {
        self.session.lock().await.current_pace(unit)
    }

    pub async fn average_pace(&self, unit: Unit) -> Pace {
        self.session.lock().await.average_pace(unit)
    }

    pub async fn elapsed(&self) -> Duration {
        self.session.lock().await.elapsed()
    }

    pub async fn path(&self) -> Vec<GeoFix> {
        self.session.lock().await.path().fixes().to_vec()
    }

    pub async fn set_unit(&self, unit: Unit) -> LiveStats {
        let stats = {
            let mut guard = self.session.lock().await;
            guard.set_unit(unit);
            guard.live_stats()
        };
        emit(&self.events, RunEvent::StateChanged(stats.clone()));
        stats
    }

    /// Starts a run seeded with `initial_fix`. A finished run is replaced by a
    /// fresh session; an active one is a state error.
    pub async fn start(&self, initial_fix: GeoFix) -> Result<LiveStats> {
        // Held until the feed and ticker are in place so a racing `stop`
        // always sees a fully started run.
        let mut guard = self.session.lock().await;
        if guard.state() == RunState::Finished {
            *guard = new_session(&self.settings);
        }
        let stats = guard.start(initial_fix, Utc::now())?;

        match self.pending_source.lock().await.take() {
            Some(fixes) => {
                self.feed
                    .lock()
                    .await
                    .attach(self.session.clone(), self.events.clone(), fixes)?;
            }
            None => log_warn!("run started without a fix source; distance will stay at zero"),
        }

        self.spawn_ticker().await;
        drop(guard);

        emit(&self.events, RunEvent::StateChanged(stats.clone()));
        Ok(stats)
    }

    pub async fn pause(&self) -> Result<LiveStats> {
        let stats = self.session.lock().await.pause(Utc::now())?;
        emit(&self.events, RunEvent::StateChanged(stats.clone()));
        Ok(stats)
    }

    pub async fn resume(&self) -> Result<LiveStats> {
        let stats = self.session.lock().await.resume(Utc::now())?;
        emit(&self.events, RunEvent::StateChanged(stats.clone()));
        Ok(stats)
    }

    /// Finishes the run. The state transition, feed cancellation and ticker
    /// abort all happen under the session lock; the feed task has exited by
    /// the time this returns.
    pub async fn stop(&self) -> Result<RunSummary> {
        let (summary, stats) = {
            let mut guard = self.session.lock().await;
            let summary = guard.stop(Utc::now())?;
            self.feed.lock().await.cancel();
            self.cancel_ticker().await;
            (summary, guard.live_stats())
        };

        self.feed.lock().await.detach().await?;

        log_info!(
            "run {} completed: {:.2} {} at {}",
            summary.id,
            summary.distance(summary.unit),
            summary.unit,
            summary.average_pace
        );

        emit(&self.events, RunEvent::StateChanged(stats));
        emit(&self.events, RunEvent::RunCompleted(summary.clone()));
        Ok(summary)
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let session = self.session.clone();
        let events = self.events.clone();
        let tick_interval = self.settings.tick_interval();
        let heartbeat_every = self.settings.heartbeat_every_ticks.max(1);

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            let mut ticks: u32 = 0;
            loop {
                interval.tick().await;

                let stats = {
                    let mut guard = session.lock().await;
                    if matches!(guard.state(), RunState::Idle | RunState::Finished) {
                        break;
                    }
                    guard.tick(Utc::now())
                };

                ticks = ticks.wrapping_add(1);
                if ticks % heartbeat_every == 0 {
                    emit(&events, RunEvent::Tick(stats));
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    pub async fn ticker_running(&self) -> bool {
        self.ticker
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

fn new_session(settings: &TrackerSettings) -> RunSession {
    RunSession::new(settings.gate, settings.pace, settings.unit)
}
