//! Fixed-interval feed refresh

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::feed::{ContactFeed, FeedSource};

/// Refreshes the feed every `interval` until shutdown
pub struct Poller {
    feed: Arc<ContactFeed>,
    source: Arc<dyn FeedSource>,
    interval: Duration,
}

impl Poller {
    pub fn new(feed: Arc<ContactFeed>, source: Arc<dyn FeedSource>, interval: Duration) -> Self {
        Self {
            feed,
            source,
            interval,
        }
    }

    /// Spawn the loop; a zero interval disables polling
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
        if self.interval.is_zero() {
            info!("Contact polling disabled");
            return None;
        }
        Some(tokio::spawn(async move { self.run(shutdown).await }))
    }

    /// Run the poll loop
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "Contact poller started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.feed.refresh(self.source.as_ref(), "poll").await;
                    debug!(?outcome, "Poll tick");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Contact poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::tests::FixedSource;

    #[tokio::test]
    async fn test_zero_interval_is_disabled() {
        let (_tx, rx) = watch::channel(false);
        let poller = Poller::new(
            Arc::new(ContactFeed::new()),
            Arc::new(FixedSource::new(&[1])),
            Duration::ZERO,
        );
        assert!(poller.spawn(rx).is_none());
    }

    #[tokio::test]
    async fn test_polls_until_shutdown() {
        let feed = Arc::new(ContactFeed::new());
        let (tx, rx) = watch::channel(false);
        let mut generations = feed.subscribe();

        let handle = Poller::new(
            feed.clone(),
            Arc::new(FixedSource::new(&[1, 2])),
            Duration::from_millis(10),
        )
        .spawn(rx)
        .unwrap();

        // first tick fires immediately
        generations.changed().await.unwrap();
        assert_eq!(feed.contacts().len(), 2);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
