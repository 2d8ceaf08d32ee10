//! Background driver for the Scheduler (spec §4.6): on every tick, advances
//! to the next item if the player reports it ended, then unconditionally
//! nudges virtual time forward by `tick / active_sessions` — two independent
//! steps every iteration, not an if/else.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, error, trace};

use super::Scheduler;

pub struct Ticker {
    scheduler: Arc<Scheduler>,
    period: Duration,
    stop: Option<tokio::sync::watch::Receiver<bool>>,
}

impl Ticker {
    pub fn new(
        scheduler: Arc<Scheduler>,
        period: Duration,
        stop: Option<tokio::sync::watch::Receiver<bool>>,
    ) -> Self {
        Self {
            scheduler,
            period,
            stop,
        }
    }

    pub async fn run(mut self) {
        debug!(period_ms = self.period.as_millis() as u64, "starting scheduler ticker");
        let mut ticks = interval(self.period);

        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    trace!("scheduler tick");
                    if let Err(e) = self.tick().await {
                        error!("scheduler tick failed: {}", e);
                    }
                }
                _ = Self::wait_for_stop(&mut self.stop) => {
                    debug!("scheduler ticker received stop signal");
                    break;
                }
            }
        }
    }

    async fn tick(&self) -> Result<(), crate::errors::SchedulerError> {
        if self.scheduler.player.has_ended().await {
            self.scheduler.advance(false).await?;
        }
        self.scheduler.advance_virtual_time(self.period).await;
        Ok(())
    }

    async fn wait_for_stop(stop: &mut Option<tokio::sync::watch::Receiver<bool>>) {
        match stop {
            Some(rx) => {
                let _ = rx.wait_for(|stopped| *stopped).await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
