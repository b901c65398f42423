use anyhow::{Context, Result};
use clap::{Arg, Command};
use config::{Config, Environment, File};
use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::{
    alertmanager_webhook_receiver::AlertReceiverSettings, cachet::CachetSettings,
    log::LogSettings, reconciler::ReconcilerSettings,
    telemetry_endpoint::TelemetryEndpointSettings,
};

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// prefix of environment variables overriding the config file, nested keys
/// are separated by `__`, e.g. `CACHET_RELAY__CACHET__TOKEN`
const ENV_PREFIX: &str = "CACHET_RELAY";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub alert_webhook_receiver: AlertReceiverSettings,
    pub cachet: CachetSettings,
    #[serde(default)]
    pub reconciler: ReconcilerSettings,
    #[serde(default)]
    pub log: LogSettings,
    pub telemetry_endpoint: TelemetryEndpointSettings,
}

impl Settings {
    pub fn global() -> &'static Self {
        SETTINGS.get_or_init(|| {
            match Self::load().context("failed to load config and command line arguments") {
                Ok(settings) => settings,
                Err(err) => {
                    // tracing wasn't setup yet
                    panic!("{:#?}", err);
                }
            }
        })
    }

    fn load() -> Result<Self> {
        let opts = Command::new(clap::crate_name!())
            .version(clap::crate_version!())
            .about(clap::crate_description!())
            .author(clap::crate_authors!())
            .arg(
                Arg::new("config")
                    .help("path of config file")
                    .takes_value(true)
                    .short('c')
                    .long("config")
                    .default_value("./config.yaml"),
            )
            .arg(
                Arg::new("level")
                    .help("log level")
                    .possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
                    .ignore_case(true)
                    .takes_value(true)
                    .long("log"),
            )
            .get_matches();

        let config_path = opts.value_of("config").context("no config path")?;

        let mut settings = Self::from_sources(config_path)?;

        if let Some(level) = opts.value_of("level") {
            settings.log.level = level.to_string();
        }

        Ok(settings)
    }

    /// config file (optional, any format the config crate understands)
    /// overridden by environment variables
    fn from_sources(config_path: &str) -> Result<Self> {
        Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("can't load config")?
            .try_deserialize()
            .context("can't load config")
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, time::Duration};

    use super::*;

    #[test]
    fn load_config_file() {
        let path = std::env::temp_dir().join(format!("cachet-relay-{}.yaml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(
            br#"
alert_webhook_receiver:
  bind_address: 127.0.0.1
  port: 8080
  token: hunter2
telemetry_endpoint:
  bind_address: 0.0.0.0
  port: 9090
cachet:
  url: https://status.example.com
  token: cachet-token
  timeout: 3
reconciler:
  label_name: service
  squash_incident: true
"#,
        )
        .unwrap();

        let settings = Settings::from_sources(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.alert_webhook_receiver.port, 8080);
        assert_eq!(settings.alert_webhook_receiver.token.as_deref(), Some("hunter2"));
        assert_eq!(settings.cachet.url.as_str(), "https://status.example.com/");
        assert_eq!(settings.cachet.timeout, Duration::from_secs(3));
        assert_eq!(settings.cachet.components_per_page, 100);
        assert_eq!(settings.reconciler.label_name, "service");
        assert!(settings.reconciler.squash_incident);
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn defaults() {
        let path = std::env::temp_dir().join(format!("cachet-relay-defaults-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[alert_webhook_receiver]
bind_address = "::"
port = 80

[telemetry_endpoint]
bind_address = "::"
port = 9090

[cachet]
url = "http://cachet"
token = "t"
"#,
        )
        .unwrap();

        let settings = Settings::from_sources(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.alert_webhook_receiver.token, None);
        assert_eq!(settings.cachet.timeout, Duration::from_secs(10));
        assert_eq!(settings.reconciler.label_name, "alertname");
        assert!(!settings.reconciler.squash_incident);
    }
}
