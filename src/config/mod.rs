use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub player: PlayerConfig,
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub scheduler: SchedulerConfig,
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Identity that scopes all packets to a specific player instance.
    pub player_name: String,
    /// Fraction of the library to keep in the discard pile. Clamped to [0, 1].
    pub dont_repeat_for: f64,
    /// Hard cap on discard pile size. `None` means no cap.
    pub max_dont_repeat_for: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Ticker period in milliseconds. Defaults to 250ms per the spec.
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Hostnames recognized as supported remote video providers.
    pub allowed_hosts: Vec<String>,
    pub fetch_timeout_ms: u64,
    /// YouTube Data API v3 key, used to resolve exact video length.
    /// Without one, title lookup still works (via oEmbed) but length
    /// falls back to 0.
    pub youtube_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            player: PlayerConfig {
                player_name: "default".to_string(),
                dont_repeat_for: 0.0,
                max_dont_repeat_for: None,
            },
            database: DatabaseConfig {
                url: "sqlite://./jukebox.db".to_string(),
                max_connections: Some(10),
            },
            web: WebConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            scheduler: SchedulerConfig {
                tick_interval_ms: 250,
            },
            remote: RemoteConfig {
                allowed_hosts: vec![
                    "www.youtube.com".to_string(),
                    "youtube.com".to_string(),
                    "youtu.be".to_string(),
                ],
                fetch_timeout_ms: 5_000,
                youtube_api_key: None,
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        let mut config = if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(&config_file)?;
            toml::from_str(&contents)?
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_file, contents)?;
            default_config
        };

        config.player.dont_repeat_for = config.player.dont_repeat_for.clamp(0.0, 1.0);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Writes `toml_contents` to a uniquely-named temp file, points
    /// `CONFIG_FILE` at it for the duration of `run`, then cleans both up.
    fn with_config_file<R>(toml_contents: &str, run: impl FnOnce() -> R) -> R {
        let path = std::env::temp_dir().join(format!(
            "jukebox-scheduler-test-config-{}.toml",
            fastrand::u64(..)
        ));
        let mut file = std::fs::File::create(&path).expect("create temp config file");
        file.write_all(toml_contents.as_bytes())
            .expect("write temp config file");
        drop(file);

        std::env::set_var("CONFIG_FILE", &path);
        let result = run();
        std::env::remove_var("CONFIG_FILE");
        std::fs::remove_file(&path).ok();
        result
    }

    #[test]
    fn load_clamps_out_of_range_dont_repeat_for() {
        // The original python implementation never clamped this; the spec
        // explicitly overrides that and clamps to [0, 1]. This exercises
        // the clamp as it actually runs, inside `Config::load`.
        let config = with_config_file(
            r#"
            [player]
            player_name = "default"
            dont_repeat_for = 1.7

            [database]
            url = "sqlite::memory:"

            [web]
            host = "0.0.0.0"
            port = 8080

            [scheduler]
            tick_interval_ms = 250

            [remote]
            allowed_hosts = ["www.youtube.com"]
            fetch_timeout_ms = 5000
            "#,
            || Config::load().expect("load should succeed"),
        );
        assert_eq!(config.player.dont_repeat_for, 1.0);

        let config = with_config_file(
            r#"
            [player]
            player_name = "default"
            dont_repeat_for = -0.3

            [database]
            url = "sqlite::memory:"

            [web]
            host = "0.0.0.0"
            port = 8080

            [scheduler]
            tick_interval_ms = 250

            [remote]
            allowed_hosts = ["www.youtube.com"]
            fetch_timeout_ms = 5000
            "#,
            || Config::load().expect("load should succeed"),
        );
        assert_eq!(config.player.dont_repeat_for, 0.0);
    }
}
