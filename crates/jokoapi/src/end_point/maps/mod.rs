use crate::prelude::*;

pub type MapId = u32;

/// `[[min_x, min_y], [max_x, max_y]]`
pub type ApiRect = [[f64; 2]; 2];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Map {
    pub id: MapId,
    pub name: String,
    #[serde(default)]
    pub default_floor: i32,
    #[serde(default)]
    pub region_id: u32,
    #[serde(default)]
    pub region_name: String,
    #[serde(default)]
    pub continent_id: u32,
    #[serde(default)]
    pub continent_name: String,
    /// map rect in map coordinates (inches). y goes up.
    pub map_rect: ApiRect,
    /// the same rect in continent coordinates. y goes down.
    pub continent_rect: ApiRect,
}

/// `/v2/maps/{id}`
pub struct MapById(pub MapId);
impl EndPoint for MapById {
    type RType = Map;
    fn path(&self) -> String {
        format!("/maps/{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use similar_asserts::assert_eq;

    const QUEENSDALE: &str = r#"{
        "id": 15, "name": "Queensdale", "min_level": 1, "max_level": 15,
        "default_floor": 1, "type": "Public", "floors": [0, 1, 2],
        "region_id": 4, "region_name": "Kryta",
        "continent_id": 1, "continent_name": "Tyria",
        "map_rect": [[-43008, -27648], [43008, 30720]],
        "continent_rect": [[9856, 11648], [13440, 14080]]
    }"#;

    #[test]
    fn parse_map() {
        let map: Map = serde_json::from_str(QUEENSDALE).expect("failed to parse map");
        assert_eq!(map.name, "Queensdale");
        assert_eq!(map.region_name, "Kryta");
        assert_eq!(map.continent_id, 1);
        assert_eq!(map.map_rect, [[-43008.0, -27648.0], [43008.0, 30720.0]]);
        assert_eq!(map.continent_rect[1], [13440.0, 14080.0]);
    }

    #[test]
    fn map_url() {
        let url = MapById(15).url("en").expect("failed to build url");
        assert_eq!(url.as_str(), "https://api.guildwars2.com/v2/maps/15?lang=en");
    }
}
