//! Mock live-incident feed.
//!
//! A background task fabricates an incident every 5 to 10 seconds inside
//! the configured bounds. Incidents are kept in a bounded ring buffer for
//! replay to new subscribers and fanned out to connected clients over a
//! broadcast channel.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crime_forecast_grid_models::GeoBox;
use crime_forecast_server_models::{ApiLiveIncident, LiveIncidentType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast;

/// Incidents retained for replay.
pub const BUFFER_CAPACITY: usize = 500;

/// Incidents replayed to a new subscriber.
pub const REPLAY_COUNT: usize = 50;

const CHANNEL_CAPACITY: usize = 64;
const MIN_INTERVAL_MS: u64 = 5_000;
const MAX_INTERVAL_MS: u64 = 10_000;

/// Recent incidents plus a channel announcing new ones.
pub struct LiveFeed {
    recent: Mutex<VecDeque<ApiLiveIncident>>,
    tx: broadcast::Sender<ApiLiveIncident>,
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveFeed {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            recent: Mutex::new(VecDeque::with_capacity(BUFFER_CAPACITY)),
            tx,
        }
    }

    /// Records `incident` and announces it to current subscribers.
    pub fn publish(&self, incident: ApiLiveIncident) {
        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        if recent.len() == BUFFER_CAPACITY {
            recent.pop_front();
        }
        recent.push_back(incident.clone());
        self.tx.send(incident).ok();
    }

    /// The last `count` incidents, oldest first.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<ApiLiveIncident> {
        let recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        recent
            .iter()
            .skip(recent.len().saturating_sub(count))
            .cloned()
            .collect()
    }

    /// The last `count` incidents and a receiver for everything published
    /// after them. Taken under one lock so nothing is missed or repeated.
    #[must_use]
    pub fn subscribe_with_replay(
        &self,
        count: usize,
    ) -> (Vec<ApiLiveIncident>, broadcast::Receiver<ApiLiveIncident>) {
        let recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        let rx = self.tx.subscribe();
        let replay = recent
            .iter()
            .skip(recent.len().saturating_sub(count))
            .cloned()
            .collect();
        (replay, rx)
    }
}

/// Fabricates one incident uniformly inside `bounds`.
pub fn random_incident<R: Rng + ?Sized>(
    rng: &mut R,
    bounds: &GeoBox,
    now: DateTime<Utc>,
) -> ApiLiveIncident {
    let incident_type = LiveIncidentType::ALL[rng.gen_range(0..LiveIncidentType::ALL.len())];
    ApiLiveIncident {
        id: uuid::Uuid::new_v4().to_string(),
        incident_type,
        occurred_at: now,
        lat: rng.gen_range(bounds.south..bounds.north),
        lng: rng.gen_range(bounds.west..bounds.east),
    }
}

/// Starts the generator task. It runs until the runtime shuts down.
pub fn spawn_generator(feed: Arc<LiveFeed>, bounds: GeoBox) -> tokio::task::JoinHandle<()> {
    log::info!(
        "Starting mock incident generator inside south={} west={} north={} east={}",
        bounds.south,
        bounds.west,
        bounds.north,
        bounds.east
    );
    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        loop {
            let delay = rng.gen_range(MIN_INTERVAL_MS..=MAX_INTERVAL_MS);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            let incident = random_incident(&mut rng, &bounds, Utc::now());
            log::debug!(
                "Mock incident {} ({}) at {:.5},{:.5}",
                incident.id,
                incident.incident_type,
                incident.lat,
                incident.lng
            );
            feed.publish(incident);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incident(n: usize) -> ApiLiveIncident {
        ApiLiveIncident {
            id: n.to_string(),
            incident_type: LiveIncidentType::Theft,
            occurred_at: Utc::now(),
            lat: 0.0,
            lng: 0.0,
        }
    }

    #[test]
    fn ring_buffer_keeps_the_newest_incidents() {
        let feed = LiveFeed::new();
        for n in 0..BUFFER_CAPACITY + 20 {
            feed.publish(incident(n));
        }
        let all = feed.recent(usize::MAX);
        assert_eq!(all.len(), BUFFER_CAPACITY);
        assert_eq!(all[0].id, "20");
        assert_eq!(all[BUFFER_CAPACITY - 1].id, (BUFFER_CAPACITY + 19).to_string());
    }

    #[test]
    fn publish_without_subscribers_still_buffers() {
        let feed = LiveFeed::new();
        feed.publish(incident(7));
        let recent = feed.recent(REPLAY_COUNT);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "7");
    }

    #[test]
    fn replay_returns_last_incidents_oldest_first() {
        let feed = LiveFeed::new();
        for n in 0..60 {
            feed.publish(incident(n));
        }
        let (replay, _rx) = feed.subscribe_with_replay(REPLAY_COUNT);
        assert_eq!(replay.len(), REPLAY_COUNT);
        assert_eq!(replay[0].id, "10");
        assert_eq!(replay[49].id, "59");
    }

    #[test]
    fn subscriber_receives_only_later_incidents() {
        let feed = LiveFeed::new();
        feed.publish(incident(1));
        let (replay, mut rx) = feed.subscribe_with_replay(REPLAY_COUNT);
        feed.publish(incident(2));

        assert_eq!(replay.len(), 1);
        assert_eq!(rx.try_recv().unwrap().id, "2");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn random_incidents_stay_inside_bounds() {
        let bounds = GeoBox::new(37.703, -122.527, 37.833, -122.349);
        let mut rng = StdRng::seed_from_u64(7);
        let now = Utc::now();
        for _ in 0..200 {
            let i = random_incident(&mut rng, &bounds, now);
            assert!(bounds.contains(i.lat, i.lng));
            assert_eq!(i.occurred_at, now);
        }
    }
}
