use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::geo::GeoFix;
use crate::tracking::{FixOutcome, RunSession};

use super::events::{emit, RunEvent};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Owns the task draining the location provider's fix channel.
pub struct FixFeed {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl FixFeed {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    pub fn attach(
        &mut self,
        session: Arc<Mutex<RunSession>>,
        events: broadcast::Sender<RunEvent>,
        fixes: mpsc::Receiver<GeoFix>,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("fix feed already attached");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(feed_loop(session, events, fixes, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Signals the loop to exit without waiting for it.
    pub fn cancel(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }

    /// Waits for a cancelled (or exhausted) loop to finish.
    async fn join(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            handle.await.context("fix feed task failed to join")
        } else {
            Ok(())
        }
    }

    /// Cancels the loop if still live and waits for it to finish.
    pub async fn detach(&mut self) -> Result<()> {
        self.cancel();
        self.join().await
    }
}

impl Default for FixFeed {
    fn default() -> Self {
        Self::new()
    }
}

async fn feed_loop(
    session: Arc<Mutex<RunSession>>,
    events: broadcast::Sender<RunEvent>,
    mut fixes: mpsc::Receiver<GeoFix>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("fix feed shutting down");
                break;
            }
            next = fixes.recv() => {
                let Some(fix) = next else {
                    log_info!("fix source closed");
                    break;
                };

                let (outcome, stats) = {
                    let mut guard = session.lock().await;
                    let outcome = guard.ingest_fix(fix, Utc::now());
                    (outcome, guard.live_stats())
                };

                match outcome {
                    FixOutcome::Accepted => emit(&events, RunEvent::Progress(stats)),
                    FixOutcome::Rejected(_) => {}
                    FixOutcome::Dropped => log_debug!("fix dropped while {}", stats.state),
                }
            }
        }
    }
}
