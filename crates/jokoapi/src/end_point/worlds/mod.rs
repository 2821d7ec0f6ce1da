use crate::prelude::*;

pub type WorldId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub id: WorldId,
    pub name: String,
    #[serde(default)]
    pub population: String,
}

/// `/v2/worlds?ids=all`
pub struct Worlds;
impl EndPoint for Worlds {
    type RType = Vec<World>;
    fn path(&self) -> String {
        "/worlds".to_string()
    }
    fn query(&self) -> Vec<(&'static str, String)> {
        vec![("ids", "all".to_string())]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn worlds_url_requests_all_ids() {
        let url = Worlds.url("de").expect("failed to build url");
        assert_eq!(
            url.as_str(),
            "https://api.guildwars2.com/v2/worlds?ids=all&lang=de"
        );
    }

    #[test]
    fn worlds_without_population() {
        let worlds: Vec<World> =
            serde_json::from_str(r#"[{"id": 1001, "name": "Anvil Rock"}]"#).expect("bad json");
        assert_eq!(worlds[0].id, 1001);
        assert_eq!(worlds[0].name, "Anvil Rock");
    }
}
