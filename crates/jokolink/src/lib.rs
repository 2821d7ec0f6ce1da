//! Jokolink is a crate to deal with Mumble Link data exposed by Guild Wars 2.

//! On windows, gw2 writes the link into shared memory. On linux, the jokolink dll running inside wine copies that
//! shared memory into `/dev/shm/MumbleLink`, so native applications can simply read a file.
//! [MumbleFile] reads such a file and keeps the latest snapshot around.

pub mod ctypes;

use ctypes::{CIdentity, CMumbleLink, C_MUMBLE_LINK_SIZE};
use glam::DVec3;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// The default mumble link name. can only be changed by passing the `-mumble` options to gw2 for multiboxing
pub const DEFAULT_MUMBLELINK_NAME: &str = "MumbleLink";
/// The application name that gw2 writes into the link
pub const GW2_APP_NAME: &str = "Guild Wars 2";

/// The link stays active for this long after the last tick change.
/// gw2 only bumps the tick when it renders a frame, which can be slower than the poll rate of a reader.
pub const ACTIVE_GRACE: Duration = Duration::from_secs(1);

/// The part of the identity json that is relevant for presence.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MumbleIdentity {
    pub name: String,
    pub profession: u32,
    pub map_id: u32,
    pub world_id: u32,
    pub team_color_id: u32,
    pub commander: bool,
}
impl From<CIdentity> for MumbleIdentity {
    fn from(id: CIdentity) -> Self {
        Self {
            name: id.name,
            profession: id.profession,
            map_id: id.map_id,
            world_id: id.world_id,
            team_color_id: id.team_color_id,
            commander: id.commander,
        }
    }
}

/// A decoded link.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LinkSnapshot {
    pub ui_tick: u32,
    pub app_name: String,
    /// meters. y is up.
    pub avatar_position: DVec3,
    pub identity: MumbleIdentity,
}
impl LinkSnapshot {
    pub fn from_cmumble_link(cml: &CMumbleLink) -> Result<Self> {
        let identity = cml.get_identity()?;
        let [x, y, z] = cml.f_avatar_position;
        Ok(Self {
            ui_tick: cml.ui_tick,
            app_name: cml.app_name(),
            avatar_position: DVec3::new(x as f64, y as f64, z as f64),
            identity: identity.into(),
        })
    }
}

/// Reads the mumble link from a file every time [MumbleFile::refresh] is called.
pub struct MumbleFile {
    path: PathBuf,
    file: Option<File>,
    buffer: Vec<u8>,
    previous_tick: u32,
    last_tick_change: Option<Instant>,
    active: bool,
    latest: LinkSnapshot,
}

impl MumbleFile {
    /// `/dev/shm/{link_name}`
    pub fn from_link_name(link_name: &str) -> Self {
        Self::new(Path::new("/dev/shm").join(link_name))
    }
    /// The file doesn't need to exist yet. gw2 (or jokolink) might not be running.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!(?path, "using mumble link file");
        Self {
            path,
            file: None,
            buffer: Vec::with_capacity(C_MUMBLE_LINK_SIZE),
            previous_tick: 0,
            last_tick_change: None,
            active: false,
            latest: Default::default(),
        }
    }

    /// re-reads the link. see [Self::refresh_at]
    pub fn refresh(&mut self) -> Result<()> {
        self.refresh_at(Instant::now())
    }

    /// re-reads the link. The link is active if the ui tick moved within [ACTIVE_GRACE] before `now`.
    pub fn refresh_at(&mut self, now: Instant) -> Result<()> {
        let cml = match self.read_link() {
            Ok(cml) => cml,
            Err(e) => {
                // drop the handle so that we reopen the file if it gets recreated
                self.file = None;
                self.active = false;
                self.last_tick_change = None;
                return Err(e);
            }
        };
        let tick_moved = cml.ui_tick != 0 && cml.ui_tick != self.previous_tick;
        self.previous_tick = cml.ui_tick;
        if tick_moved {
            self.last_tick_change = Some(now);
            match LinkSnapshot::from_cmumble_link(&cml) {
                Ok(snapshot) => self.latest = snapshot,
                Err(e) => {
                    // the game might be in the middle of writing the identity
                    warn!(?e, "failed to decode mumble link. keeping previous snapshot");
                }
            }
        }
        self.active = cml.ui_tick != 0
            && self
                .last_tick_change
                .map_or(false, |t| now.saturating_duration_since(t) < ACTIVE_GRACE);
        Ok(())
    }

    fn read_link(&mut self) -> Result<CMumbleLink> {
        let file = match self.file.take() {
            Some(file) => file,
            None => File::open(&self.path)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to open mumble file {:?}", self.path))?,
        };
        let file = self.file.insert(file);
        file.rewind().into_diagnostic()?;
        self.buffer.clear();
        Read::by_ref(file)
            .take(C_MUMBLE_LINK_SIZE as u64)
            .read_to_end(&mut self.buffer)
            .into_diagnostic()
            .wrap_err("failed to read link buffer from mumble file")?;
        Ok(CMumbleLink::from_bytes(&self.buffer))
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
    pub fn is_gw2(&self) -> bool {
        self.latest.app_name == GW2_APP_NAME
    }
    pub fn snapshot(&self) -> &LinkSnapshot {
        &self.latest
    }
}
