//! Shares what a Guild Wars 2 player is doing (character, map, world, nearest waypoint) with the other participants of a voice session.
//!
//! The local side lives in [tracker]. It polls the mumble link and sends a [record::PresenceRecord] whenever it changed enough.
//! The remote side lives in [hub]. It keeps the records of peers in a [cache::PeerPresenceCache] for the info panel.
pub mod cache;
pub mod config;
pub mod geometry;
pub mod hub;
pub mod poi;
pub mod policy;
pub mod record;
pub mod sources;
pub mod tracker;
pub mod wire;

use std::io::BufRead;

use joko_core::prelude::*;
use jokoapi::Gw2Api;
use jokolink::MumbleFile;

use config::ShareConfig;
use record::{ParticipantId, SessionId};
use sources::{ApiSource, MumbleFeed};
use tracker::{PeerTransport, PresenceTracker};

/// Stand in for a voice client. It pretends to be connected to a single session and logs whatever we would send.
struct LogTransport;
impl LogTransport {
    const SESSION: SessionId = SessionId(1);
    const OWN_ID: ParticipantId = ParticipantId(1);
}
impl PeerTransport for LogTransport {
    fn current_session(&self) -> Option<SessionId> {
        Some(Self::SESSION)
    }
    fn own_participant(&self, _session: SessionId) -> Option<ParticipantId> {
        Some(Self::OWN_ID)
    }
    fn send_to_peers(
        &self,
        session: SessionId,
        payload: &str,
        target: Option<ParticipantId>,
    ) -> Result<()> {
        info!(%session, ?target, payload, "send");
        Ok(())
    }
}

/// Runs the tracker against the local link file until stdin sees a newline or EOF.
pub fn start_jokoshare() -> Result<()> {
    let (data_dir_path, jdir) =
        joko_core::init::get_jokoshare_dir().wrap_err("failed to create jokoshare dir")?;
    let log_file_flush_guard =
        joko_core::trace::install_tracing(&jdir).wrap_err("failed to install tracing")?;
    joko_core::trace::install_panic_hook();
    info!(?data_dir_path, "jokoshare data dir");

    let config = ShareConfig::load(&jdir).wrap_err("failed to load config")?;
    info!(?config, "loaded config");

    let feed = MumbleFeed::new(MumbleFile::from_link_name(&config.mumble_link_name));
    let api = Arc::new(ApiSource::new(Gw2Api::new(
        config.api_timeout(),
        config.api_language.clone(),
    )));
    let handle = PresenceTracker::spawn(
        &config,
        feed,
        LogTransport,
        api.clone(),
        api.clone(),
        api,
    )?;

    let mut line = String::new();
    if let Err(e) = std::io::stdin().lock().read_line(&mut line) {
        warn!(?e, "failed to read stdin. stopping");
    }
    if !handle.stop() {
        warn!("tracker thread was detached");
    }
    std::mem::drop(log_file_flush_guard);
    Ok(())
}
