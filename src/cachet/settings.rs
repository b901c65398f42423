//! config file options for the cachet client

use std::time::Duration;

use serde::Deserialize;
use serde_with::{formats::Flexible, serde_as, DurationSeconds};
use url::Url;

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
/// where to find cachet and how to authenticate against it
pub struct CachetSettings {
    /// base url of the cachet installation, without the `/api/v1` suffix
    pub url: Url,
    /// api token, sent as `X-Cachet-Token`
    pub token: String,
    /// timeout of a single http request
    #[serde_as(as = "DurationSeconds<u64, Flexible>")]
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
    #[serde(default = "default_components_per_page")]
    pub components_per_page: u32,
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_components_per_page() -> u32 {
    100
}
