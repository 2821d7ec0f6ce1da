use std::sync::{Mutex, MutexGuard};

use joko_core::prelude::*;

use crate::record::{ParticipantId, PresenceRecord, RemotePresenceRecord, SessionId};

type Key = (SessionId, ParticipantId);

/// Records of other participants. One entry per participant per session.
///
/// Everything goes through a single lock. The cache only holds the peers of the connected sessions, so contention is not a concern.
#[derive(Debug, Default)]
pub struct PeerPresenceCache {
    records: Mutex<HashMap<Key, RemotePresenceRecord>>,
}

impl PeerPresenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// a panic while holding the lock cannot leave a half written entry behind, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, HashMap<Key, RemotePresenceRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn upsert(&self, session: SessionId, participant: ParticipantId, record: PresenceRecord) {
        let received_at = OffsetDateTime::now_utc();
        let mut records = self.lock();
        let entry = records
            .entry((session, participant))
            .or_insert_with(|| RemotePresenceRecord {
                session,
                participant,
                record: PresenceRecord::default(),
                received_at,
                updates: 0,
            });
        entry.record = record;
        entry.received_at = received_at;
        entry.updates = entry.updates.saturating_add(1);
    }

    /// returns true if there was an entry
    pub fn remove(&self, session: SessionId, participant: ParticipantId) -> bool {
        self.lock().remove(&(session, participant)).is_some()
    }

    /// returns the number of evicted entries
    pub fn remove_all(&self, session: SessionId) -> usize {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|(s, _), _| *s != session);
        before - records.len()
    }

    pub fn get(&self, session: SessionId, participant: ParticipantId) -> Option<PresenceRecord> {
        self.lock()
            .get(&(session, participant))
            .map(|remote| remote.record.clone())
    }

    pub fn get_remote(
        &self,
        session: SessionId,
        participant: ParticipantId,
    ) -> Option<RemotePresenceRecord> {
        self.lock().get(&(session, participant)).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// every session that has at least one entry, sorted
    pub fn sessions(&self) -> Vec<SessionId> {
        let mut sessions: Vec<SessionId> = self.lock().keys().map(|(s, _)| *s).collect();
        sessions.sort_unstable();
        sessions.dedup();
        sessions
    }
}
