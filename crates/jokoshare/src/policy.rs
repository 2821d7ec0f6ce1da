//! When is a change worth sending to peers.
//!
//! The link updates every frame, but peers only need to hear about entering/leaving the game right away.
//! Everything else is rate limited by time and by distance.
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransmissionPolicy {
    /// how long the online/offline state must hold before it counts
    pub online_debounce: Duration,
    /// minimum time between two transmissions caused by identity or position changes
    pub location_interval: Duration,
    /// minimum continent space displacement since the last transmitted position
    pub distance_threshold: f64,
}

impl Default for TransmissionPolicy {
    fn default() -> Self {
        Self {
            online_debounce: Duration::from_secs(5),
            location_interval: Duration::from_secs(5),
            distance_threshold: 50.0,
        }
    }
}

impl TransmissionPolicy {
    /// `since` is the time elapsed since the last offline observation. `None` means we never saw one.
    pub fn debounce_elapsed(&self, since: Option<Duration>) -> bool {
        since.map_or(true, |since| since >= self.online_debounce)
    }

    /// `since` is the time elapsed since the last transmission. `None` means nothing was sent yet.
    pub fn location_due(&self, since: Option<Duration>) -> bool {
        since.map_or(true, |since| since >= self.location_interval)
    }

    pub fn displacement_due(&self, since: Option<Duration>, displacement: f64) -> bool {
        self.location_due(since) && displacement >= self.distance_threshold
    }
}
