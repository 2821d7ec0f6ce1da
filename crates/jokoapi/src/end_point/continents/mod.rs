use indexmap::IndexMap;

use crate::prelude::*;

use super::maps::MapId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: u32,
    /// some waypoints and landmarks are unnamed
    #[serde(default)]
    pub name: String,
    /// `landmark`, `waypoint`, `vista` or `unlock`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub floor: i32,
    /// continent coordinates
    pub coord: [f64; 2],
}
impl PointOfInterest {
    pub fn is_waypoint(&self) -> bool {
        self.kind == "waypoint"
    }
}

/// The subset of a floor's map details that we care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorMap {
    #[serde(default)]
    pub name: String,
    /// keyed by poi id as string. the order of the response is kept, so that the nearest search is deterministic.
    #[serde(default)]
    pub points_of_interest: IndexMap<String, PointOfInterest>,
}

/// `/v2/continents/{continent}/floors/{floor}/regions/{region}/maps/{map}`
pub struct FloorMapById {
    pub continent_id: u32,
    pub floor_id: i32,
    pub region_id: u32,
    pub map_id: MapId,
}
impl EndPoint for FloorMapById {
    type RType = FloorMap;
    fn path(&self) -> String {
        format!(
            "/continents/{}/floors/{}/regions/{}/maps/{}",
            self.continent_id, self.floor_id, self.region_id, self.map_id
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn points_of_interest_keep_response_order() {
        let floor_map: FloorMap = serde_json::from_str(
            r#"{
                "name": "Queensdale",
                "points_of_interest": {
                    "9": {"id": 9, "name": "Shaemoor Waypoint", "type": "waypoint", "floor": 1, "coord": [10.5, 20.0]},
                    "1": {"id": 1, "type": "landmark", "floor": 1, "coord": [1.0, 2.0]}
                }
            }"#,
        )
        .expect("failed to parse floor map");
        let ids: Vec<u32> = floor_map.points_of_interest.values().map(|p| p.id).collect();
        assert_eq!(ids, vec![9, 1]);
        assert!(floor_map.points_of_interest["9"].is_waypoint());
        assert!(floor_map.points_of_interest["1"].name.is_empty());
    }

    #[test]
    fn floor_map_url() {
        let ep = FloorMapById {
            continent_id: 1,
            floor_id: 1,
            region_id: 4,
            map_id: 15,
        };
        assert_eq!(
            ep.url("en").expect("failed to build url").as_str(),
            "https://api.guildwars2.com/v2/continents/1/floors/1/regions/4/maps/15?lang=en"
        );
    }
}
