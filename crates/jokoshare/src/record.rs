use joko_core::prelude::*;
use jokolink::MumbleIdentity;

use crate::geometry::Rect;
use crate::poi::PointOfInterest;

/// connection to a voice server. a client can be connected to multiple servers at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

/// id of a client inside a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub u16);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The map details needed to name a map and to convert positions into continent space.
#[derive(Debug, Clone, PartialEq)]
pub struct MapInfo {
    pub map_id: u32,
    pub map_name: String,
    pub region_id: u32,
    pub region_name: String,
    pub continent_id: u32,
    pub continent_name: String,
    pub default_floor: i32,
    pub map_rect: Rect,
    pub continent_rect: Rect,
}
impl From<jokoapi::end_point::maps::Map> for MapInfo {
    fn from(map: jokoapi::end_point::maps::Map) -> Self {
        Self {
            map_id: map.id,
            map_name: map.name,
            region_id: map.region_id,
            region_name: map.region_name,
            continent_id: map.continent_id,
            continent_name: map.continent_name,
            default_floor: map.default_floor,
            map_rect: map.map_rect.into(),
            continent_rect: map.continent_rect.into(),
        }
    }
}

/// What a participant is doing right now. This is the unit that gets synchronized between peers.
///
/// The default value is the offline record.
/// Field names on the wire are kept short, as the record is sent on every significant change.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PresenceRecord {
    #[serde(rename = "n")]
    pub character_name: String,
    #[serde(rename = "p")]
    pub profession: u32,
    #[serde(rename = "m")]
    pub map_id: u32,
    #[serde(rename = "mn")]
    pub map_name: String,
    #[serde(rename = "r")]
    pub region_id: u32,
    #[serde(rename = "rn")]
    pub region_name: String,
    #[serde(rename = "c")]
    pub continent_id: u32,
    #[serde(rename = "cn")]
    pub continent_name: String,
    #[serde(rename = "w")]
    pub world_id: u32,
    #[serde(rename = "wn")]
    pub world_name: String,
    #[serde(rename = "t")]
    pub team_color_id: u32,
    #[serde(rename = "cm")]
    pub commander: bool,
    #[serde(rename = "pos")]
    pub character_continent_position: DVec2,
    #[serde(rename = "wp")]
    pub waypoint_id: u32,
    #[serde(rename = "wpn")]
    pub waypoint_name: String,
    #[serde(rename = "wpp")]
    pub waypoint_continent_position: DVec2,
}

impl PresenceRecord {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_offline(&self) -> bool {
        *self == Self::default()
    }

    /// copies the identity and names the map and world. missing lookups fall back to synthesized names.
    pub fn apply_identity(
        &mut self,
        identity: &MumbleIdentity,
        map: Option<&MapInfo>,
        world_name: Option<&str>,
    ) {
        self.character_name = identity.name.clone();
        self.profession = identity.profession;
        self.map_id = identity.map_id;
        self.world_id = identity.world_id;
        self.team_color_id = identity.team_color_id;
        self.commander = identity.commander;
        match map {
            Some(map) => {
                self.map_name = map.map_name.clone();
                self.region_id = map.region_id;
                self.region_name = map.region_name.clone();
                self.continent_id = map.continent_id;
                self.continent_name = map.continent_name.clone();
            }
            None => {
                self.map_name = format!("Map {}", self.map_id);
                self.region_id = 0;
                self.region_name = "Unknown region".to_string();
                self.continent_id = 0;
                self.continent_name = "Unknown continent".to_string();
            }
        }
        self.world_name = match world_name {
            Some(name) => name.to_string(),
            None => format!("World {}", self.world_id),
        };
    }

    pub fn apply_waypoint(&mut self, waypoint: Option<&PointOfInterest>) {
        match waypoint {
            Some(wp) => {
                self.waypoint_id = wp.id;
                self.waypoint_name = wp.display_name();
                self.waypoint_continent_position = wp.coord;
            }
            None => {
                self.waypoint_id = 0;
                self.waypoint_name.clear();
                self.waypoint_continent_position = DVec2::ZERO;
            }
        }
    }
}

/// A record received from another participant.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePresenceRecord {
    pub session: SessionId,
    pub participant: ParticipantId,
    pub record: PresenceRecord,
    pub received_at: OffsetDateTime,
    /// how many times this participant sent us a record since we started caching it
    pub updates: u32,
}

/// core profession names. ids match the v2/professions order used by the mumble identity
pub fn profession_name(profession: u32) -> Option<&'static str> {
    Some(match profession {
        1 => "Guardian",
        2 => "Warrior",
        3 => "Engineer",
        4 => "Ranger",
        5 => "Thief",
        6 => "Elementalist",
        7 => "Mesmer",
        8 => "Necromancer",
        9 => "Revenant",
        _ => return None,
    })
}

/// The text shown in the info panel of a participant. Empty for offline records.
pub fn display_text(record: &PresenceRecord) -> String {
    if record.is_offline() {
        return String::new();
    }
    let mut lines = vec![];
    let profession = profession_name(record.profession)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Profession {}", record.profession));
    lines.push(format!("Character: {} ({profession})", record.character_name));
    if record.commander {
        lines.push("Commander: yes".to_string());
    }
    lines.push(format!("World: {}", record.world_name));
    lines.push(format!(
        "Map: {} ({}, {})",
        record.map_name, record.region_name, record.continent_name
    ));
    if !record.waypoint_name.is_empty() {
        lines.push(format!("Nearest waypoint: {}", record.waypoint_name));
    }
    lines.join("\n")
}
