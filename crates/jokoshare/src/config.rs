use std::time::Duration;

use joko_core::prelude::*;

use crate::policy::TransmissionPolicy;

pub const CONFIG_FILE_NAME: &str = "jokoshare.json";
/// upper bounds for the millisecond settings. deadlines are computed as `Instant + Duration`, which must not overflow
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const MAX_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);
pub const MAX_API_TIMEOUT: Duration = Duration::from_secs(60);

/// Stored as `jokoshare.json` in the data dir. Missing fields take their default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// name of the shared memory. gw2 uses `MumbleLink` unless started with `-mumble <name>`
    pub mumble_link_name: String,
    pub poll_interval_ms: u64,
    /// how long the link has to stay online (or offline) before we believe it
    pub online_debounce_secs: f64,
    pub location_transmission_secs: f64,
    /// continent units
    pub distance_transmission_threshold: f64,
    pub api_timeout_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub api_language: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            mumble_link_name: jokolink::DEFAULT_MUMBLELINK_NAME.to_string(),
            poll_interval_ms: 50,
            online_debounce_secs: 5.0,
            location_transmission_secs: 5.0,
            distance_transmission_threshold: 50.0,
            api_timeout_ms: 3000,
            shutdown_timeout_ms: 1000,
            api_language: jokoapi::Gw2Api::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl ShareConfig {
    pub fn load(dir: &joko_core::Dir) -> Result<Self> {
        joko_core::init::load_or_create_json(dir, CONFIG_FILE_NAME)
    }

    pub fn policy(&self) -> TransmissionPolicy {
        TransmissionPolicy {
            online_debounce: seconds(self.online_debounce_secs),
            location_interval: seconds(self.location_transmission_secs),
            distance_threshold: self.distance_transmission_threshold.max(0.0),
        }
    }
    /// never zero, so the tracker doesn't spin
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1)).min(MAX_POLL_INTERVAL)
    }
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms).min(MAX_SHUTDOWN_TIMEOUT)
    }
    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms).min(MAX_API_TIMEOUT)
    }
}

/// negative, nan or huge values from a hand edited config become zero
fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;
    use similar_asserts::assert_eq;

    #[test]
    fn defaults_match_the_plugin() {
        let config = ShareConfig::default();
        assert_eq!(config.mumble_link_name, "MumbleLink");
        assert_eq!(config.policy(), TransmissionPolicy::default());
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ShareConfig =
            from_str(r#"{"poll_interval_ms": 20, "api_language": "de"}"#).expect("bad config");
        assert_eq!(config.poll_interval(), Duration::from_millis(20));
        assert_eq!(config.api_language, "de");
        assert_eq!(config.distance_transmission_threshold, 50.0);
    }

    #[rstest]
    #[case(-1.0, Duration::ZERO)]
    #[case(f64::NAN, Duration::ZERO)]
    #[case(2.5, Duration::from_millis(2500))]
    fn debounce_seconds_are_sanitized(#[case] secs: f64, #[case] expected: Duration) {
        let config = ShareConfig {
            online_debounce_secs: secs,
            ..Default::default()
        };
        assert_eq!(config.policy().online_debounce, expected);
    }

    #[test]
    fn huge_durations_are_clamped() {
        let config = ShareConfig {
            poll_interval_ms: u64::MAX,
            shutdown_timeout_ms: u64::MAX,
            api_timeout_ms: u64::MAX,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), MAX_POLL_INTERVAL);
        assert_eq!(config.shutdown_timeout(), MAX_SHUTDOWN_TIMEOUT);
        assert_eq!(config.api_timeout(), MAX_API_TIMEOUT);
        // deadlines built from them stay representable
        let now = std::time::Instant::now();
        assert!(now.checked_add(config.poll_interval()).is_some());
        assert!(now.checked_add(config.shutdown_timeout()).is_some());
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let config = ShareConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }
}
