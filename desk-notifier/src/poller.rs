use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{sync::watch, time::MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{
    error::PollError,
    seen::SeenWindow,
    sink::{Notification, NotificationSink},
    source::FeedSource,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Notifying,
}

pub struct Poller {
    source: Box<dyn FeedSource>,
    sink: Arc<dyn NotificationSink>,
    interval: Duration,
    seen: SeenWindow,
    play_sound: bool,
    state: PollState,
}

impl Poller {
    pub fn new(
        source: Box<dyn FeedSource>,
        sink: Arc<dyn NotificationSink>,
        interval: Duration,
        window: Duration,
        play_sound: bool,
    ) -> Self {
        Self {
            source,
            sink,
            interval,
            seen: SeenWindow::new(window),
            play_sound,
            state: PollState::Idle,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// One tick: fetch, pick eligible items that are recent and unseen, and
    /// notify for each. Returns how many notifications fired.
    pub async fn poll_once(&mut self, now: DateTime<Utc>) -> Result<usize, PollError> {
        self.state = PollState::Polling;
        let items = match self.source.fetch().await {
            Ok(items) => items,
            Err(e) => {
                self.state = PollState::Idle;
                return Err(e);
            }
        };

        self.seen.evict(now);
        let eligible: Vec<_> = items.into_iter().filter(|item| item.eligible).collect();
        let badge_count = eligible.len();

        let mut fresh = Vec::new();
        for item in eligible {
            if self.seen.within(item.timestamp, now) && self.seen.insert(&item.id, item.timestamp) {
                fresh.push(item);
            }
        }

        if fresh.is_empty() {
            self.state = PollState::Idle;
            return Ok(0);
        }

        self.state = PollState::Notifying;
        let source = self.source.name();
        for item in &fresh {
            let notification = Notification {
                source,
                title: item.title.clone(),
                body: item.body.clone(),
                badge_count,
                play_sound: self.play_sound,
            };
            if let Err(e) = self.sink.notify(&notification).await {
                warn!(source, item_id = %item.id, "failed to deliver notification: {}", e);
            }
        }

        self.state = PollState::Idle;
        Ok(fresh.len())
    }

    /// Polls on a fixed interval until `shutdown` flips to `true` or its
    /// sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let source = self.source.name();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(source, interval_secs = self.interval.as_secs(), "poller started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_once(Utc::now()).await {
                        Ok(0) => debug!(source, "nothing new"),
                        Ok(n) => debug!(source, notified = n, "poll complete"),
                        Err(e) => error!(source, "poll failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(source, "poller stopped");
    }
}
