//! Nearest point of interest lookup.
use joko_core::prelude::*;

use crate::geometry::distance;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: u32,
    pub name: String,
    /// continent coordinates
    pub coord: DVec2,
}
impl PointOfInterest {
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("Waypoint {}", self.id)
        } else {
            self.name.clone()
        }
    }
}

/// Source of the points of interest of a map.
///
/// The candidates must be returned in a stable order (the order of the upstream response),
/// because ties in [PoiIndex::find_closest] go to the first candidate.
pub trait PoiCatalogue {
    /// `None` if the catalogue of this map is unavailable right now
    fn points_of_interest(&self, map_id: u32) -> Option<Vec<PointOfInterest>>;
}

impl<T: PoiCatalogue + ?Sized> PoiCatalogue for Arc<T> {
    fn points_of_interest(&self, map_id: u32) -> Option<Vec<PointOfInterest>> {
        (**self).points_of_interest(map_id)
    }
}

/// Memoises catalogue responses per map. Failures are not memoised, so the next lookup asks again.
///
/// Owned by the tracker, so it needs no lock.
pub struct PoiIndex<C> {
    catalogue: C,
    maps: HashMap<u32, Vec<PointOfInterest>>,
}

impl<C: PoiCatalogue> PoiIndex<C> {
    pub fn new(catalogue: C) -> Self {
        Self {
            catalogue,
            maps: Default::default(),
        }
    }

    fn candidates(&mut self, map_id: u32) -> Option<&[PointOfInterest]> {
        if !self.maps.contains_key(&map_id) {
            let pois = self.catalogue.points_of_interest(map_id)?;
            self.maps.insert(map_id, pois);
        }
        self.maps.get(&map_id).map(Vec::as_slice)
    }

    /// first encountered minimum wins
    pub fn find_closest(&mut self, position: DVec2, map_id: u32) -> Option<PointOfInterest> {
        let candidates = self.candidates(map_id)?;
        closest(candidates, position).cloned()
    }
}

fn closest(candidates: &[PointOfInterest], position: DVec2) -> Option<&PointOfInterest> {
    let mut best: Option<(&PointOfInterest, f64)> = None;
    for poi in candidates {
        let d = distance(poi.coord, position);
        match best {
            Some((_, best_distance)) if d >= best_distance => {}
            _ => best = Some((poi, d)),
        }
    }
    best.map(|(poi, _)| poi)
}
