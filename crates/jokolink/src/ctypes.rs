use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};

/// The total size of the CMumbleLink struct.
pub const C_MUMBLE_LINK_SIZE: usize = std::mem::size_of::<CMumbleLink>();

/// Byte for byte layout of the link as gw2 writes it. Decode it into [crate::LinkSnapshot] before use.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CMumbleLink {
    /// always 2 for gw2
    pub ui_version: u32,
    /// bumped on every frame the game writes the link. stands still in loading screens and character select
    pub ui_tick: u32,
    /// meters
    pub f_avatar_position: [f32; 3],
    pub f_avatar_front: [f32; 3],
    pub f_avatar_top: [f32; 3],
    /// utf-16, null terminated
    pub name: [u16; 256],
    pub f_camera_position: [f32; 3],
    pub f_camera_front: [f32; 3],
    pub f_camera_top: [f32; 3],
    /// utf-16 json of [CIdentity], null terminated
    pub identity: [u16; 256],
    pub context_len: u32,
    /// raw, we don't look inside
    pub context: [u8; 256],
    // followed by a 4kb description that gw2 leaves empty. not part of our copy
}

impl Default for CMumbleLink {
    fn default() -> Self {
        Self {
            ui_version: 0,
            ui_tick: 0,
            f_avatar_position: [0.0; 3],
            f_avatar_front: [0.0; 3],
            f_avatar_top: [0.0; 3],
            name: [0; 256],
            f_camera_position: [0.0; 3],
            f_camera_front: [0.0; 3],
            f_camera_top: [0.0; 3],
            identity: [0; 256],
            context_len: 0,
            context: [0; 256],
        }
    }
}

impl CMumbleLink {
    /// copies the link out of raw bytes. missing trailing bytes are treated as zeroes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buffer = [0u8; C_MUMBLE_LINK_SIZE];
        let len = bytes.len().min(C_MUMBLE_LINK_SIZE);
        buffer[..len].copy_from_slice(&bytes[..len]);
        // SAFETY: buffer has exactly the size of CMumbleLink, and every field is made of integer or float arrays,
        // so every bit pattern is a valid value. read_unaligned because a byte buffer has no alignment guarantees
        unsafe { std::ptr::read_unaligned(buffer.as_ptr() as *const CMumbleLink) }
    }

    /// name of the application that wrote the link
    pub fn app_name(&self) -> String {
        widestring::U16CStr::from_slice_truncate(&self.name)
            .map(|name| name.to_string_lossy())
            .unwrap_or_default()
    }

    /// parses the identity json.
    /// An uninitialized link has an empty identity, which we treat as a default identity instead of an error.
    pub fn get_identity(&self) -> Result<CIdentity> {
        let id = widestring::U16CStr::from_slice_truncate(&self.identity)
            .into_diagnostic()
            .wrap_err("identity has no null terminator")?;
        if id.is_empty() {
            return Ok(CIdentity::default());
        }
        let id = id
            .to_string()
            .into_diagnostic()
            .wrap_err_with(|| format!("identity is not valid utf-16: {id:?}"))?;
        serde_json::from_str::<CIdentity>(&id)
            .into_diagnostic()
            .wrap_err_with(|| format!("identity is not valid json: {id}"))
    }

    /// raw bytes of the struct. useful to write test link files.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; C_MUMBLE_LINK_SIZE];
        // SAFETY: bytes has exactly the size of CMumbleLink and write_unaligned has no alignment requirement.
        unsafe { std::ptr::write_unaligned(bytes.as_mut_ptr() as *mut CMumbleLink, *self) };
        bytes
    }
}

/// The identity json. Fields that gw2 leaves out (older clients, uninitialized links) take their default.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CIdentity {
    pub name: String,
    /// core profession. same ids as `/v2/professions`
    pub profession: u32,
    /// elite specialization or 0
    pub spec: u32,
    /// not the api's race ids
    pub race: u32,
    pub map_id: u32,
    /// the shard id. not a home world in the megaserver era
    pub world_id: u32,
    /// `/v2/colors` id, 0 is white
    pub team_color_id: u32,
    pub commander: bool,
    /// vertical field of view in radians
    pub fov: f32,
    /// ui size setting, 0 (small) to 3 (larger)
    pub uisz: u32,
}

/// encodes `s` into a null terminated utf-16 array. truncates if it doesn't fit.
pub fn to_wide_array(s: &str) -> [u16; 256] {
    let mut array = [0u16; 256];
    for (slot, unit) in array.iter_mut().take(255).zip(s.encode_utf16()) {
        *slot = unit;
    }
    array
}
