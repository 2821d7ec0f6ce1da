use serde::de::DeserializeOwned;
use url::Url;

use crate::prelude::{IntoDiagnostic, Result, WrapErr, API_BASE_V2_URL};

pub mod continents;
pub mod maps;
pub mod worlds;

/// An endpoint of the v2 api. the base url and the `lang` query param are added by [EndPoint::url]
pub trait EndPoint {
    type RType: DeserializeOwned;
    /// path relative to `/v2`. must start with `/`
    fn path(&self) -> String;
    /// extra query parameters
    fn query(&self) -> Vec<(&'static str, String)> {
        vec![]
    }
    fn url(&self, language: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{API_BASE_V2_URL}{}", self.path()))
            .into_diagnostic()
            .wrap_err("failed to build endpoint url")?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in self.query() {
                pairs.append_pair(key, &value);
            }
            pairs.append_pair("lang", language);
        }
        Ok(url)
    }
}
