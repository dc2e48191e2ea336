use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, info, trace, warn};

pub const CONFIG_ENV_VAR: &str = "CRESCENTRC";
pub const STORE_LOCATION_KEY: &str = "store.location";
pub const ZIKR_FALLBACK_KEY: &str = "zikr.fallback";
pub const LOCATION_PLACEHOLDER_KEY: &str = "prayer.location_placeholder";

const DEFAULT_ZIKR: &str = "سبحان الله وبحمده";
const DEFAULT_LOCATION_PLACEHOLDER: &str = "حدد موقعك";

#[derive(Debug, Clone)]
pub struct Config {
    map: HashMap<String, String>,
    pub loaded_files: Vec<PathBuf>,
}

impl Config {
    pub fn defaults() -> Self {
        let mut map = HashMap::new();
        map.insert("color".to_string(), "on".to_string());
        map.insert(ZIKR_FALLBACK_KEY.to_string(), DEFAULT_ZIKR.to_string());
        map.insert(
            LOCATION_PLACEHOLDER_KEY.to_string(),
            DEFAULT_LOCATION_PLACEHOLDER.to_string(),
        );

        Self {
            map,
            loaded_files: vec![],
        }
    }

    #[tracing::instrument(skip(rc_override))]
    pub fn load(rc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Self::defaults();

        if let Some(path) = resolve_rc_path(rc_override)? {
            info!(rc = %path.display(), "loading config");
            cfg.load_file(&path)?;
        } else {
            debug!("no config file found; using defaults");
        }

        Ok(cfg)
    }

    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in overrides {
            let key = k.strip_prefix("rc.").unwrap_or(&k).to_string();
            debug!(key = %key, value = %v, "applying override");
            self.map.insert(key, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub fn zikr_fallback(&self) -> String {
        self.get_or(ZIKR_FALLBACK_KEY, DEFAULT_ZIKR)
    }

    pub fn location_placeholder(&self) -> String {
        self.get_or(LOCATION_PLACEHOLDER_KEY, DEFAULT_LOCATION_PLACEHOLDER)
    }

    #[tracing::instrument(skip(self))]
    fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let path = expand_tilde(path);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        self.loaded_files.push(path.clone());

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        for (line_num, raw_line) in text.lines().enumerate() {
            let mut line = raw_line.trim();
            if let Some((before, _)) = line.split_once('#') {
                line = before.trim();
            }
            if line.is_empty() {
                continue;
            }

            if let Some(include_rest) = line.strip_prefix("include ") {
                let include_path = resolve_include_path(&base_dir, include_rest.trim())?;
                debug!(
                    file = %path.display(),
                    include = %include_path.display(),
                    line = line_num + 1,
                    "processing include"
                );

                if include_path.exists() {
                    self.load_file(&include_path)?;
                } else {
                    warn!(include = %include_path.display(), "include file does not exist; skipping");
                }
                continue;
            }

            let (k, v) = line.split_once('=').ok_or_else(|| {
                anyhow!(
                    "invalid config line {}:{}: {}",
                    path.display(),
                    line_num + 1,
                    raw_line
                )
            })?;

            let key = k.trim().to_string();
            let value = v.trim().to_string();
            trace!(key = %key, value = %value, "loaded config key");
            self.map.insert(key, value);
        }

        Ok(())
    }
}

/// Path of the widget store: `--store`, then `store.location`, then the
/// platform data directory.
#[tracing::instrument(skip(cfg, override_path))]
pub fn resolve_store_path(cfg: &Config, override_path: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(path.to_path_buf());
    }

    if let Some(cfg_value) = cfg.get(STORE_LOCATION_KEY) {
        return Ok(expand_tilde(Path::new(&cfg_value)));
    }

    let data_dir =
        dirs::data_dir().ok_or_else(|| anyhow!("cannot determine platform data directory"))?;
    Ok(data_dir.join("crescent").join("widget_data.json"))
}

#[tracing::instrument(skip(override_path))]
fn resolve_rc_path(override_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(rc_env) = std::env::var(CONFIG_ENV_VAR) {
        if rc_env == "/dev/null" {
            return Ok(None);
        }
        return Ok(Some(PathBuf::from(rc_env)));
    }

    let Some(home) = dirs::home_dir() else {
        warn!("cannot determine home directory; skipping ~/.crescentrc");
        return Ok(None);
    };
    let candidate = home.join(".crescentrc");
    if candidate.exists() {
        return Ok(Some(candidate));
    }

    Ok(None)
}

fn resolve_include_path(base_dir: &Path, include: &str) -> anyhow::Result<PathBuf> {
    if include.trim().is_empty() {
        return Err(anyhow!("include path cannot be empty"));
    }

    let expanded = expand_tilde(Path::new(include));
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base_dir.join(expanded))
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}
