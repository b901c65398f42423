use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{
    filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
    EnvFilter,
};

use crate::settings::Settings;

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_owned()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl LogSettings {
    pub fn global() -> &'static Self {
        &Settings::global().log
    }

    fn filter(&self) -> Result<EnvFilter> {
        let level = tracing::Level::from_str(self.level.as_str())
            .with_context(|| format!("invalid log level {}", self.level))?;

        Ok(EnvFilter::default()
            .add_directive(LevelFilter::from_level(level).into())
            .add_directive("hyper=warn".parse()?)
            .add_directive("reqwest=warn".parse()?))
    }
}

pub fn setup_logging() -> Result<()> {
    let filter_layer = LogSettings::global().filter()?;

    let fmt_layer = fmt::layer();

    let registry = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer);

    #[cfg(feature = "console")]
    let registry = registry.with(console_subscriber::spawn());

    registry.init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_is_case_insensitive() {
        for level in ["debug", "Debug", "TRACE", "warn"] {
            let settings = LogSettings {
                level: level.to_owned(),
            };
            assert!(settings.filter().is_ok(), "{}", level);
        }
    }

    #[test]
    fn invalid_level() {
        let settings = LogSettings {
            level: "loud".to_owned(),
        };
        assert!(settings.filter().is_err());
    }
}
