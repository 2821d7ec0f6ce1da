//! Inbound side. The voice client calls these handlers from whatever thread it likes.
use std::sync::Mutex;

use joko_core::prelude::*;

use crate::cache::PeerPresenceCache;
use crate::record::{display_text, ParticipantId, SessionId};
use crate::tracker::{PeerTransport, TrackerControl};
use crate::wire::{self, Command};

/// Asks the host to redraw the info panel of a participant.
pub trait DisplayRefresh {
    fn request_display_refresh(&self, session: SessionId, participant: ParticipantId);
}

pub struct PeerHub<T, D> {
    cache: Arc<PeerPresenceCache>,
    tracker: TrackerControl,
    transport: T,
    display: D,
    /// the participant whose info panel is open
    displayed: Mutex<Option<(SessionId, ParticipantId)>>,
}

impl<T: PeerTransport, D: DisplayRefresh> PeerHub<T, D> {
    pub fn new(
        cache: Arc<PeerPresenceCache>,
        tracker: TrackerControl,
        transport: T,
        display: D,
    ) -> Self {
        Self {
            cache,
            tracker,
            transport,
            display,
            displayed: Mutex::new(None),
        }
    }

    pub fn cache(&self) -> &Arc<PeerPresenceCache> {
        &self.cache
    }

    /// Malformed commands are logged and dropped. They never reach the cache.
    pub fn on_command_received(&self, session: SessionId, payload: &str) {
        match wire::parse_command(payload) {
            Ok(Some(Command::PresenceUpdate {
                participant,
                record,
            })) => {
                debug!(%session, %participant, "received presence");
                self.cache.upsert(session, participant, record);
                self.refresh_if_displayed(session, Some(participant));
            }
            Ok(Some(Command::PresenceRequest { participant })) => {
                debug!(%session, %participant, "presence requested");
                if let Err(e) = self.tracker.request_send_to(session, participant) {
                    warn!(?e, %session, %participant, "can't answer presence request");
                }
            }
            Ok(None) => trace!(%session, "ignoring command of another plugin"),
            Err(e) => warn!(?e, %session, payload, "dropping malformed command"),
        }
    }

    pub fn on_session_established(&self, session: SessionId) {
        info!(%session, "session established");
        if let Err(e) = self.tracker.request_broadcast(session) {
            warn!(?e, %session, "can't announce presence");
        }
    }

    pub fn on_session_disconnected(&self, session: SessionId) {
        let removed = self.cache.remove_all(session);
        info!(%session, removed, "session disconnected. dropped peer records");
        self.refresh_if_displayed(session, None);
    }

    pub fn on_server_stopped(&self, session: SessionId) {
        let removed = self.cache.remove_all(session);
        info!(%session, removed, "server stopped. dropped peer records");
        self.refresh_if_displayed(session, None);
    }

    /// kicked or left
    pub fn on_participant_removed(&self, session: SessionId, participant: ParticipantId) {
        if self.cache.remove(session, participant) {
            debug!(%session, %participant, "dropped peer record");
            self.refresh_if_displayed(session, Some(participant));
        }
    }

    /// Text for the info panel of `participant`. Empty if we know nothing about them.
    ///
    /// Opening the panel of someone new asks them for their record, so the panel fills in without waiting for their next update.
    pub fn info_data(&self, session: SessionId, participant: ParticipantId) -> String {
        let is_new = {
            let mut displayed = self.lock_displayed();
            let is_new = displayed.map(|(_, p)| p) != Some(participant);
            *displayed = Some((session, participant));
            is_new
        };
        if is_new {
            self.request_presence(session, participant);
        }
        self.cache
            .get(session, participant)
            .map(|record| display_text(&record))
            .unwrap_or_default()
    }

    /// the info panel was closed
    pub fn clear_displayed(&self) {
        *self.lock_displayed() = None;
    }

    fn request_presence(&self, session: SessionId, participant: ParticipantId) {
        let Some(own) = self.transport.own_participant(session) else {
            debug!(%session, "own participant id is unknown. not requesting presence");
            return;
        };
        if own == participant {
            return;
        }
        let payload = wire::encode_request(own);
        if let Err(e) = self
            .transport
            .send_to_peers(session, &payload, Some(participant))
        {
            warn!(?e, %session, %participant, "failed to request presence");
        }
    }

    /// `None` matches any participant of `session`
    fn refresh_if_displayed(&self, session: SessionId, participant: Option<ParticipantId>) {
        let displayed = *self.lock_displayed();
        if let Some((s, p)) = displayed {
            if s == session && participant.map_or(true, |participant| participant == p) {
                self.display.request_display_refresh(s, p);
            }
        }
    }

    fn lock_displayed(&self) -> std::sync::MutexGuard<'_, Option<(SessionId, ParticipantId)>> {
        self.displayed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::ShareConfig;
    use crate::record::PresenceRecord;
    use crate::tracker::test::{
        grid_map, identity, FakeMaps, FakePois, FakeTransport, FakeWorlds, StillFeed,
    };
    use crate::tracker::{PresenceTracker, TrackerHandle};
    use rstest::*;
    use similar_asserts::assert_eq;
    use std::time::{Duration, Instant};

    #[derive(Clone, Default)]
    struct FakeDisplay(Arc<Mutex<Vec<(SessionId, ParticipantId)>>>);
    impl DisplayRefresh for FakeDisplay {
        fn request_display_refresh(&self, session: SessionId, participant: ParticipantId) {
            self.0.lock().unwrap().push((session, participant));
        }
    }

    struct Harness {
        hub: PeerHub<FakeTransport, FakeDisplay>,
        display: FakeDisplay,
        transport: FakeTransport,
        tracker_transport: FakeTransport,
        handle: TrackerHandle,
    }

    #[fixture]
    fn harness() -> Harness {
        let tracker_transport = FakeTransport {
            session: Some(SessionId(1)),
            ..Default::default()
        };
        let handle = PresenceTracker::spawn(
            &ShareConfig {
                poll_interval_ms: 5,
                ..Default::default()
            },
            StillFeed,
            tracker_transport.clone(),
            FakeMaps(HashMap::from([(15, grid_map(15))])),
            FakeWorlds::default(),
            FakePois::default(),
        )
        .expect("failed to spawn tracker");
        let transport = FakeTransport {
            session: Some(SessionId(1)),
            ..Default::default()
        };
        let display = FakeDisplay::default();
        let hub = PeerHub::new(
            Arc::new(PeerPresenceCache::new()),
            handle.control(),
            transport.clone(),
            display.clone(),
        );
        Harness {
            hub,
            display,
            transport,
            tracker_transport,
            handle,
        }
    }

    fn remote_record() -> PresenceRecord {
        let mut record = PresenceRecord::default();
        record.apply_identity(&identity(15), Some(&grid_map(15)), Some("Anvil Rock"));
        record
    }

    fn update_from(participant: u16) -> String {
        wire::encode_update(ParticipantId(participant), &remote_record()).expect("failed to encode")
    }

    #[rstest]
    fn updates_land_in_the_cache(harness: Harness) {
        harness.hub.on_command_received(SessionId(1), &update_from(4));
        assert_eq!(
            harness.hub.cache().get(SessionId(1), ParticipantId(4)),
            Some(remote_record())
        );
        // nobody is displayed yet
        assert!(harness.display.0.lock().unwrap().is_empty());
        harness.handle.stop();
    }

    #[rstest]
    #[case("")]
    #[case("GW2INFO")]
    #[case("GW2INFO 4")]
    #[case("GW2INFO abc {}")]
    #[case(r#"GW2INFO 4 {"n":"Joko Norn""#)]
    #[case("REQUESTGW2INFO")]
    #[case("SOMEOTHERPLUGIN 1 2 3")]
    fn malformed_commands_are_dropped(harness: Harness, #[case] payload: &str) {
        harness.hub.on_command_received(SessionId(1), &update_from(4));
        harness.hub.on_command_received(SessionId(1), payload);
        assert_eq!(harness.hub.cache().len(), 1);
        assert_eq!(
            harness.hub.cache().get(SessionId(1), ParticipantId(4)),
            Some(remote_record())
        );
        harness.handle.stop();
    }

    #[rstest]
    fn displayed_participant_is_refreshed(harness: Harness) {
        harness.hub.on_command_received(SessionId(1), &update_from(4));
        let text = harness.hub.info_data(SessionId(1), ParticipantId(4));
        assert!(text.contains("Joko Norn"));
        harness.hub.on_command_received(SessionId(1), &update_from(5));
        harness.hub.on_command_received(SessionId(1), &update_from(4));
        assert_eq!(
            *harness.display.0.lock().unwrap(),
            vec![(SessionId(1), ParticipantId(4))]
        );
        harness.hub.on_participant_removed(SessionId(1), ParticipantId(4));
        assert_eq!(harness.display.0.lock().unwrap().len(), 2);
        assert_eq!(harness.hub.info_data(SessionId(1), ParticipantId(4)), "");
        harness.handle.stop();
    }

    #[rstest]
    fn selecting_a_new_participant_requests_their_record(harness: Harness) {
        harness.hub.info_data(SessionId(1), ParticipantId(4));
        harness.hub.info_data(SessionId(1), ParticipantId(4));
        harness.hub.info_data(SessionId(1), ParticipantId(6));
        let sent = harness.transport.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![
                (
                    SessionId(1),
                    "REQUESTGW2INFO 1".to_string(),
                    Some(ParticipantId(4))
                ),
                (
                    SessionId(1),
                    "REQUESTGW2INFO 1".to_string(),
                    Some(ParticipantId(6))
                ),
            ]
        );
        harness.handle.stop();
    }

    #[rstest]
    fn disconnect_drops_only_that_session(harness: Harness) {
        harness.hub.on_command_received(SessionId(1), &update_from(4));
        harness.hub.on_command_received(SessionId(2), &update_from(4));
        harness.hub.on_session_disconnected(SessionId(1));
        assert_eq!(harness.hub.cache().get(SessionId(1), ParticipantId(4)), None);
        assert!(harness.hub.cache().get(SessionId(2), ParticipantId(4)).is_some());
        harness.hub.on_server_stopped(SessionId(2));
        assert!(harness.hub.cache().is_empty());
        harness.handle.stop();
    }

    #[rstest]
    fn new_session_gets_our_presence(harness: Harness) {
        // the tracker itself broadcasts to its current session 1. session 2 is only reached through the hub
        harness.hub.on_session_established(SessionId(2));
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let announced = harness
                .tracker_transport
                .sent
                .lock()
                .unwrap()
                .iter()
                .find(|(session, _, target)| *session == SessionId(2) && target.is_none())
                .map(|(_, payload, _)| payload.clone());
            if let Some(payload) = announced {
                match wire::parse_command(&payload) {
                    Ok(Some(Command::PresenceUpdate { participant, .. })) => {
                        assert_eq!(participant, ParticipantId(1));
                    }
                    other => panic!("unexpected payload {payload}: {other:?}"),
                }
                break;
            }
            assert!(Instant::now() < deadline, "session was never announced to");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(harness.transport.sent.lock().unwrap().is_empty());
        harness.handle.stop();
    }

    #[rstest]
    fn requests_are_answered_by_the_tracker(harness: Harness) {
        harness
            .hub
            .on_command_received(SessionId(1), "REQUESTGW2INFO 9");
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let answered = harness
                .tracker_transport
                .sent
                .lock()
                .unwrap()
                .iter()
                .any(|(_, _, target)| *target == Some(ParticipantId(9)));
            if answered {
                break;
            }
            assert!(Instant::now() < deadline, "request was never answered");
            std::thread::sleep(Duration::from_millis(5));
        }
        // the hub itself doesn't send anything for a request
        assert!(harness.transport.sent.lock().unwrap().is_empty());
        harness.handle.stop();
    }
}
