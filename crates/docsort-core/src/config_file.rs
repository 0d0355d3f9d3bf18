use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api: Option<ApiConfig>,
    pub run: Option<RunConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    pub num_workers: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub include_other: Option<bool>,
}

/// Platform config directory path: `<config_dir>/docsort/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("docsort").join("config.toml"))
}

/// Load config by cascading CWD `.docsort.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(&PathBuf::from(".docsort.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &PathBuf) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        api: Some(ApiConfig {
            model: overlay
                .api
                .as_ref()
                .and_then(|a| a.model.clone())
                .or_else(|| base.api.as_ref().and_then(|a| a.model.clone())),
            base_url: overlay
                .api
                .as_ref()
                .and_then(|a| a.base_url.clone())
                .or_else(|| base.api.as_ref().and_then(|a| a.base_url.clone())),
            key_path: overlay
                .api
                .as_ref()
                .and_then(|a| a.key_path.clone())
                .or_else(|| base.api.as_ref().and_then(|a| a.key_path.clone())),
        }),
        run: Some(RunConfig {
            num_workers: overlay
                .run
                .as_ref()
                .and_then(|r| r.num_workers)
                .or_else(|| base.run.as_ref().and_then(|r| r.num_workers)),
            request_timeout_secs: overlay
                .run
                .as_ref()
                .and_then(|r| r.request_timeout_secs)
                .or_else(|| base.run.as_ref().and_then(|r| r.request_timeout_secs)),
            max_retries: overlay
                .run
                .as_ref()
                .and_then(|r| r.max_retries)
                .or_else(|| base.run.as_ref().and_then(|r| r.max_retries)),
            max_tokens: overlay
                .run
                .as_ref()
                .and_then(|r| r.max_tokens)
                .or_else(|| base.run.as_ref().and_then(|r| r.max_tokens)),
            temperature: overlay
                .run
                .as_ref()
                .and_then(|r| r.temperature)
                .or_else(|| base.run.as_ref().and_then(|r| r.temperature)),
            include_other: overlay
                .run
                .as_ref()
                .and_then(|r| r.include_other)
                .or_else(|| base.run.as_ref().and_then(|r| r.include_other)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_toml() {
        let config = ConfigFile {
            api: Some(ApiConfig {
                model: Some("deepseek-chat".to_string()),
                ..Default::default()
            }),
            run: Some(RunConfig {
                num_workers: Some(4),
                ..Default::default()
            }),
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.api.unwrap().model.unwrap(), "deepseek-chat");
        assert_eq!(parsed.run.unwrap().num_workers.unwrap(), 4);
    }

    #[test]
    fn absent_fields_deserialize_as_none() {
        let toml_str = "[api]\nmodel = \"deepseek-chat\"\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        assert!(parsed.api.unwrap().key_path.is_none());
        assert!(parsed.run.is_none());
    }

    #[test]
    fn merge_overlay_wins() {
        let base = ConfigFile {
            api: Some(ApiConfig {
                model: Some("deepseek-chat".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            api: Some(ApiConfig {
                model: Some("deepseek-reasoner".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        assert_eq!(merged.api.unwrap().model.unwrap(), "deepseek-reasoner");
    }

    #[test]
    fn merge_base_preserved_when_overlay_absent() {
        let base = ConfigFile {
            run: Some(RunConfig {
                request_timeout_secs: Some(60),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, ConfigFile::default());
        assert_eq!(merged.run.unwrap().request_timeout_secs.unwrap(), 60);
    }
}
