//! Blocking client for the few GW2 API endpoints that jokoshare needs to annotate a presence record.
//! resources:
//! 1. https://wiki.guildwars2.com/wiki/API:2/maps
//! 2. https://wiki.guildwars2.com/wiki/API:2/continents
//! 3. https://wiki.guildwars2.com/wiki/API:2/worlds
pub mod end_point;

use std::time::Duration;

use prelude::*;
pub use end_point::EndPoint;

pub(crate) mod prelude {
    pub type HttpClient = ureq::Agent;
    pub use crate::end_point::EndPoint;
    pub use miette::{IntoDiagnostic, Result, WrapErr};
    pub use serde::{Deserialize, Serialize};
    const API_BASE_URL: &str = "https://api.guildwars2.com";
    pub const API_BASE_V2_URL: &str = const_format::concatcp!(API_BASE_URL, "/v2");
}

/// Thin wrapper around a [ureq::Agent] with a global timeout, so that a slow api can never stall the caller for longer than that.
#[derive(Clone)]
pub struct Gw2Api {
    client: HttpClient,
    language: String,
}

impl Gw2Api {
    pub const DEFAULT_LANGUAGE: &'static str = "en";

    pub fn new(timeout: Duration, language: impl Into<String>) -> Self {
        let client = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("jokoshare/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            client,
            language: language.into(),
        }
    }

    pub fn fetch<E: EndPoint>(&self, end_point: &E) -> Result<E::RType> {
        let url = end_point.url(&self.language)?;
        tracing::debug!(%url, "fetching");
        self.client
            .request_url("GET", &url)
            .call()
            .into_diagnostic()
            .wrap_err_with(|| format!("request to {url} failed"))?
            .into_json::<E::RType>()
            .into_diagnostic()
            .wrap_err_with(|| {
                format!(
                    "couldn't convert json result of {url} to rust type {}",
                    std::any::type_name::<E::RType>()
                )
            })
    }
}
