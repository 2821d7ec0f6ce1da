//! The real collaborators: the GW2 api and the mumble link file.
use std::sync::Mutex;

use joko_core::prelude::*;
use jokoapi::end_point::continents::{FloorMap, FloorMapById};
use jokoapi::end_point::maps::MapById;
use jokoapi::end_point::worlds::{World, Worlds};
use jokoapi::Gw2Api;
use jokolink::{MumbleFile, MumbleIdentity};

use crate::poi::{PoiCatalogue, PointOfInterest};
use crate::record::MapInfo;
use crate::tracker::{LinkFeed, MapData, WorldNames};

/// Answers map, world and poi lookups from the api.
///
/// Successful responses are kept for the lifetime of the source. Failures are logged and retried on the next lookup.
pub struct ApiSource {
    api: Gw2Api,
    maps: Mutex<HashMap<u32, MapInfo>>,
    worlds: Mutex<Option<HashMap<u32, String>>>,
}

impl ApiSource {
    pub fn new(api: Gw2Api) -> Self {
        Self {
            api,
            maps: Default::default(),
            worlds: Default::default(),
        }
    }
}

impl MapData for ApiSource {
    fn get_map(&self, map_id: u32) -> Option<MapInfo> {
        if let Some(map) = lock(&self.maps).get(&map_id) {
            return Some(map.clone());
        }
        match self.api.fetch(&MapById(map_id)) {
            Ok(map) => {
                let map = MapInfo::from(map);
                lock(&self.maps).insert(map_id, map.clone());
                Some(map)
            }
            Err(e) => {
                warn!(?e, map_id, "failed to fetch map");
                None
            }
        }
    }
}

impl WorldNames for ApiSource {
    fn world_names(&self) -> Option<HashMap<u32, String>> {
        if let Some(worlds) = lock(&self.worlds).as_ref() {
            return Some(worlds.clone());
        }
        match self.api.fetch(&Worlds) {
            Ok(worlds) => {
                let worlds = world_names_of(worlds);
                info!(count = worlds.len(), "fetched world names");
                *lock(&self.worlds) = Some(worlds.clone());
                Some(worlds)
            }
            Err(e) => {
                warn!(?e, "failed to fetch world names");
                None
            }
        }
    }
}

impl PoiCatalogue for ApiSource {
    /// the waypoints on the default floor of the map. [crate::poi::PoiIndex] memoises them.
    fn points_of_interest(&self, map_id: u32) -> Option<Vec<PointOfInterest>> {
        let map = self.get_map(map_id)?;
        let end_point = FloorMapById {
            continent_id: map.continent_id,
            floor_id: map.default_floor,
            region_id: map.region_id,
            map_id,
        };
        match self.api.fetch(&end_point) {
            Ok(floor_map) => Some(waypoints_of(floor_map)),
            Err(e) => {
                warn!(?e, map_id, "failed to fetch points of interest");
                None
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub fn world_names_of(worlds: Vec<World>) -> HashMap<u32, String> {
    worlds.into_iter().map(|w| (w.id, w.name)).collect()
}

/// keeps the response order
pub fn waypoints_of(floor_map: FloorMap) -> Vec<PointOfInterest> {
    floor_map
        .points_of_interest
        .into_values()
        .filter(|poi| poi.is_waypoint())
        .map(|poi| PointOfInterest {
            id: poi.id,
            name: poi.name,
            coord: DVec2::from_array(poi.coord),
        })
        .collect()
}

/// [LinkFeed] over the link file. A missing or unreadable file is just an inactive link.
pub struct MumbleFeed {
    link: MumbleFile,
    failing: bool,
}

impl MumbleFeed {
    pub fn new(link: MumbleFile) -> Self {
        Self {
            link,
            failing: false,
        }
    }
}

impl LinkFeed for MumbleFeed {
    fn refresh(&mut self) {
        match self.link.refresh() {
            Ok(()) => {
                if self.failing {
                    info!("mumble link is readable again");
                    self.failing = false;
                }
            }
            Err(e) => {
                // the game is probably not running. only report the first failure of a streak
                if !self.failing {
                    warn!(?e, "failed to read mumble link");
                    self.failing = true;
                }
            }
        }
    }
    fn is_active(&mut self) -> bool {
        self.link.is_active()
    }
    fn is_this_application(&mut self) -> bool {
        self.link.is_gw2()
    }
    fn identity(&mut self) -> MumbleIdentity {
        self.link.snapshot().identity.clone()
    }
    fn avatar_position(&mut self) -> DVec3 {
        self.link.snapshot().avatar_position
    }
}
