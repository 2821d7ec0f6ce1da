//! The local side: turns link snapshots into a [PresenceRecord] and decides when to send it.
//!
//! [Presence] is the state machine. It is driven by [Presence::step] with an explicit `now`, so it never looks at the clock itself.
//! [PresenceTracker] owns a [Presence] on a dedicated thread, polls the link every tick and talks to the peer transport.
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use flume::RecvTimeoutError;
use joko_core::prelude::*;
use jokolink::MumbleIdentity;

use crate::config::ShareConfig;
use crate::geometry::{distance, to_continent_space, SourceSpace};
use crate::poi::{PoiCatalogue, PoiIndex};
use crate::policy::TransmissionPolicy;
use crate::record::{MapInfo, ParticipantId, PresenceRecord, SessionId};
use crate::wire;

/// The live link. None of these may block.
pub trait LinkFeed {
    /// called once at the start of every tick, before the getters
    fn refresh(&mut self) {}
    fn is_active(&mut self) -> bool;
    fn is_this_application(&mut self) -> bool;
    fn identity(&mut self) -> MumbleIdentity;
    /// meters, y is up
    fn avatar_position(&mut self) -> DVec3;

    fn sample(&mut self) -> FeedSample {
        self.refresh();
        FeedSample {
            is_active: self.is_active(),
            is_this_application: self.is_this_application(),
            identity: self.identity(),
            avatar_position: self.avatar_position(),
        }
    }
}

pub trait MapData {
    fn get_map(&self, map_id: u32) -> Option<MapInfo>;
}

pub trait WorldNames {
    fn world_names(&self) -> Option<HashMap<u32, String>>;
}

impl<T: MapData + ?Sized> MapData for Arc<T> {
    fn get_map(&self, map_id: u32) -> Option<MapInfo> {
        (**self).get_map(map_id)
    }
}
impl<T: WorldNames + ?Sized> WorldNames for Arc<T> {
    fn world_names(&self) -> Option<HashMap<u32, String>> {
        (**self).world_names()
    }
}

/// The voice client side of things. `send_to_peers` with `target: None` sends to everyone in the session.
pub trait PeerTransport {
    fn current_session(&self) -> Option<SessionId>;
    /// our own participant id in `session`. it is the sender id of our updates.
    fn own_participant(&self, session: SessionId) -> Option<ParticipantId>;
    fn send_to_peers(
        &self,
        session: SessionId,
        payload: &str,
        target: Option<ParticipantId>,
    ) -> Result<()>;
}

/// One poll of the link.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedSample {
    pub is_active: bool,
    pub is_this_application: bool,
    pub identity: MumbleIdentity,
    pub avatar_position: DVec3,
}
impl FeedSample {
    pub fn online(&self) -> bool {
        self.is_active && self.is_this_application
    }
}

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    Linked = 1,
    Unlinked = 1 << 1,
    Identity = 1 << 2,
    Position = 1 << 3,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickOutcome {
    pub changes: BitFlags<PresenceChange>,
    /// a copy of the record, if it should be sent to peers
    pub transmit: Option<PresenceRecord>,
}

/// Everything the tracker remembers between ticks. Only [Presence::step] writes to it.
#[derive(Debug, Clone, Default)]
pub struct TrackerState {
    pub linked: bool,
    pub prev_online: bool,
    /// start of the latest offline stretch
    pub last_offline: Option<Instant>,
    pub last_transmission: Option<Instant>,
    pub prev_identity: MumbleIdentity,
    pub prev_avatar_position: DVec3,
    /// continent position of the last transmitted record
    pub transmitted_position: Option<DVec2>,
    /// map of the current identity, if the lookup worked
    pub current_map: Option<MapInfo>,
    pub record: PresenceRecord,
}
impl TrackerState {
    /// forget the previous snapshot, so that the next link repopulates the record from scratch
    fn reset_tracking(&mut self) {
        self.prev_identity = Default::default();
        self.prev_avatar_position = DVec3::ZERO;
        self.transmitted_position = None;
        self.current_map = None;
    }
}

pub struct Presence<M, W, C> {
    policy: TransmissionPolicy,
    maps: M,
    worlds: W,
    pois: PoiIndex<C>,
    state: TrackerState,
}

impl<M: MapData, W: WorldNames, C: PoiCatalogue> Presence<M, W, C> {
    pub fn new(policy: TransmissionPolicy, maps: M, worlds: W, pois: C) -> Self {
        Self {
            policy,
            maps,
            worlds,
            pois: PoiIndex::new(pois),
            state: Default::default(),
        }
    }

    pub fn current(&self) -> &PresenceRecord {
        &self.state.record
    }
    pub fn state(&self) -> &TrackerState {
        &self.state
    }
    pub fn is_linked(&self) -> bool {
        self.state.linked
    }

    pub fn step(&mut self, sample: FeedSample, now: Instant) -> TickOutcome {
        let mut changes = BitFlags::empty();
        let mut dirty = false;
        let online = sample.online();

        // the gw2 link is only updated in game. loading screens and character select look like being offline.
        if !online && (self.state.prev_online || self.state.last_offline.is_none()) {
            self.state.last_offline = Some(now);
        }
        let since_offline = self
            .state
            .last_offline
            .map(|t| now.saturating_duration_since(t));

        if online && !self.state.linked && self.policy.debounce_elapsed(since_offline) {
            info!("Guild Wars 2 linked");
            self.state.linked = true;
            changes.insert(PresenceChange::Linked);
            dirty = true;
        }
        if !online && self.state.linked && self.policy.debounce_elapsed(since_offline) {
            info!("Guild Wars 2 unlinked");
            self.state.linked = false;
            self.state.reset_tracking();
            self.state.record.clear();
            changes.insert(PresenceChange::Unlinked);
            dirty = true;
        }

        if online && self.state.linked {
            let since_transmission = self
                .state
                .last_transmission
                .map(|t| now.saturating_duration_since(t));
            if sample.identity != self.state.prev_identity {
                debug!(?sample.identity, "new identity");
                self.update_identity(&sample.identity);
                changes.insert(PresenceChange::Identity);
                if self.policy.location_due(since_transmission) {
                    dirty = true;
                }
            }
            if sample.avatar_position != self.state.prev_avatar_position {
                self.update_position(sample.avatar_position);
                changes.insert(PresenceChange::Position);
                let displacement = self.state.transmitted_position.map_or(f64::INFINITY, |t| {
                    distance(t, self.state.record.character_continent_position)
                });
                if self.policy.displacement_due(since_transmission, displacement) {
                    dirty = true;
                }
            }
            self.state.prev_identity = sample.identity;
            self.state.prev_avatar_position = sample.avatar_position;
        }
        self.state.prev_online = online;

        let transmit = dirty.then(|| {
            self.state.last_transmission = Some(now);
            self.state.transmitted_position = self
                .state
                .linked
                .then_some(self.state.record.character_continent_position);
            self.state.record.clone()
        });
        TickOutcome { changes, transmit }
    }

    fn update_identity(&mut self, identity: &MumbleIdentity) {
        let map = self.maps.get_map(identity.map_id);
        if map.is_none() {
            debug!(identity.map_id, "map lookup failed. using fallback names");
        }
        let worlds = self.worlds.world_names();
        let world_name = worlds
            .as_ref()
            .and_then(|names| names.get(&identity.world_id))
            .map(String::as_str);
        self.state
            .record
            .apply_identity(identity, map.as_ref(), world_name);
        self.state.current_map = map;
    }

    fn update_position(&mut self, avatar_position: DVec3) {
        let record = &mut self.state.record;
        if let Some(map) = self.state.current_map.as_ref() {
            match to_continent_space(
                avatar_position,
                SourceSpace::Mumble,
                map.map_id,
                map.map_rect,
                map.continent_rect,
            ) {
                Ok(position) => record.character_continent_position = position,
                Err(e) => debug!(?e, "keeping previous continent position"),
            }
        }
        let waypoint = self
            .pois
            .find_closest(record.character_continent_position, record.map_id);
        record.apply_waypoint(waypoint.as_ref());
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum TrackerError {
    #[error("failed to spawn the tracker thread")]
    #[diagnostic(help("presence sharing is unavailable until the plugin is reloaded"))]
    Spawn(#[source] std::io::Error),
    #[error("the tracker thread is not running")]
    NotRunning,
}

#[derive(Debug)]
enum TrackerMessage {
    SendTo {
        session: SessionId,
        participant: ParticipantId,
    },
    Broadcast {
        session: SessionId,
    },
    Stop,
}

/// Cloneable way to poke the tracker thread from other threads.
#[derive(Debug, Clone)]
pub struct TrackerControl {
    sender: flume::Sender<TrackerMessage>,
}
impl TrackerControl {
    /// send our current record to `participant` alone
    pub fn request_send_to(
        &self,
        session: SessionId,
        participant: ParticipantId,
    ) -> Result<(), TrackerError> {
        self.sender
            .send(TrackerMessage::SendTo {
                session,
                participant,
            })
            .map_err(|_| TrackerError::NotRunning)
    }
    /// send our current record to everyone in `session`
    pub fn request_broadcast(&self, session: SessionId) -> Result<(), TrackerError> {
        self.sender
            .send(TrackerMessage::Broadcast { session })
            .map_err(|_| TrackerError::NotRunning)
    }
}

pub struct TrackerHandle {
    control: TrackerControl,
    thread: Option<JoinHandle<()>>,
    exited: flume::Receiver<()>,
    shutdown_timeout: Duration,
}

impl TrackerHandle {
    pub fn control(&self) -> TrackerControl {
        self.control.clone()
    }

    /// Asks the tracker to stop and waits up to the shutdown timeout.
    /// Returns false if the thread didn't make it in time. It is detached then, and will exit after its current tick.
    pub fn stop(mut self) -> bool {
        let _ = self.control.sender.send(TrackerMessage::Stop);
        let Some(thread) = self.thread.take() else {
            return true;
        };
        match self.exited.recv_timeout(self.shutdown_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if thread.join().is_err() {
                    error!("tracker thread panicked");
                }
                info!("tracker thread has exited");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout = ?self.shutdown_timeout, "tracker thread did not exit in time. detaching it");
                false
            }
        }
    }
}
impl Drop for TrackerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.control.sender.send(TrackerMessage::Stop);
        }
    }
}

pub struct PresenceTracker<F, T, M, W, C> {
    feed: F,
    transport: T,
    presence: Presence<M, W, C>,
    poll_interval: Duration,
    receiver: flume::Receiver<TrackerMessage>,
}

impl<F, T, M, W, C> PresenceTracker<F, T, M, W, C>
where
    F: LinkFeed + Send + 'static,
    T: PeerTransport + Send + 'static,
    M: MapData + Send + 'static,
    W: WorldNames + Send + 'static,
    C: PoiCatalogue + Send + 'static,
{
    /// Starts polling on a dedicated thread.
    pub fn spawn(
        config: &ShareConfig,
        feed: F,
        transport: T,
        maps: M,
        worlds: W,
        pois: C,
    ) -> Result<TrackerHandle, TrackerError> {
        let (sender, receiver) = flume::unbounded();
        let (exited_sender, exited) = flume::bounded(1);
        let tracker = Self {
            feed,
            transport,
            presence: Presence::new(config.policy(), maps, worlds, pois),
            poll_interval: config.poll_interval(),
            receiver,
        };
        let thread = std::thread::Builder::new()
            .name("jokoshare-tracker".to_string())
            .spawn(move || {
                tracker.run();
                let _ = exited_sender.send(());
            })
            .map_err(TrackerError::Spawn)?;
        info!(interval = ?config.poll_interval(), "tracker thread started");
        Ok(TrackerHandle {
            control: TrackerControl { sender },
            thread: Some(thread),
            exited,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    fn run(mut self) {
        loop {
            let tick_start = Instant::now();
            let sample = self.feed.sample();
            let outcome = self.presence.step(sample, tick_start);
            if let Some(record) = outcome.transmit {
                self.broadcast(&record);
            }
            // wait for the next tick, but stay responsive to requests and stop
            let deadline = tick_start + self.poll_interval;
            loop {
                match self.receiver.recv_deadline(deadline) {
                    Ok(TrackerMessage::SendTo {
                        session,
                        participant,
                    }) => {
                        debug!(%session, %participant, "sending presence on request");
                        self.send(session, Some(participant), self.presence.current());
                    }
                    Ok(TrackerMessage::Broadcast { session }) => {
                        self.send(session, None, self.presence.current());
                    }
                    Ok(TrackerMessage::Stop) | Err(RecvTimeoutError::Disconnected) => {
                        self.shutdown();
                        return;
                    }
                    Err(RecvTimeoutError::Timeout) => break,
                }
            }
        }
    }

    /// peers keep showing our last record unless we tell them that we are gone
    fn shutdown(&self) {
        info!("tracker stopping. sending offline presence");
        self.broadcast(&PresenceRecord::default());
    }

    fn broadcast(&self, record: &PresenceRecord) {
        match self.transport.current_session() {
            Some(session) => self.send(session, None, record),
            None => debug!("not connected to any session. skipping broadcast"),
        }
    }

    fn send(&self, session: SessionId, target: Option<ParticipantId>, record: &PresenceRecord) {
        let Some(sender) = self.transport.own_participant(session) else {
            warn!(%session, "own participant id is unknown. skipping send");
            return;
        };
        let payload = match wire::encode_update(sender, record) {
            Ok(payload) => payload,
            Err(e) => {
                error!(?e, "failed to encode presence");
                return;
            }
        };
        if let Err(e) = self.transport.send_to_peers(session, &payload, target) {
            warn!(?e, %session, ?target, "failed to send presence");
        }
    }
}
