use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, info, trace, warn};

const DEFAULT_SERVER_URL: &str = "http://localhost:8000/api/";

#[derive(Debug, Clone)]
pub struct Config {
    map: HashMap<String, String>,
}

impl Config {
    #[tracing::instrument(skip(rc_override))]
    pub fn load(rc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Config {
            map: HashMap::new(),
        };

        cfg.map
            .insert("data.location".to_string(), "~/.taskdeck".to_string());
        cfg.map
            .insert("server.url".to_string(), DEFAULT_SERVER_URL.to_string());
        cfg.map.insert("color".to_string(), "on".to_string());

        let rc_path = resolve_rc_path(rc_override)?;
        if let Some(path) = rc_path {
            info!(rc = %path.display(), "loading taskdeckrc");
            cfg.load_file(&path)?;
        } else {
            debug!("no taskdeckrc found; using defaults");
        }

        Ok(cfg)
    }

    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in overrides {
            debug!(key = %key, value = %value, "applying override");
            self.map.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn server_url(&self) -> String {
        self.get("server.url")
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }

    #[tracing::instrument(skip(self))]
    fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let path = expand_tilde(path);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        for (line_num, raw_line) in text.lines().enumerate() {
            let mut line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((before, _)) = line.split_once('#') {
                line = before.trim();
            }
            if line.is_empty() {
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

#[tracing::instrument(skip(cfg, override_dir))]
pub fn resolve_data_dir(cfg: &Config, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = if let Some(path) = override_dir {
        path.to_path_buf()
    } else if let Some(cfg_value) = cfg.get("data.location") {
        expand_tilde(Path::new(&cfg_value))
    } else {
        default_data_dir()?
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

#[tracing::instrument(skip(override_path))]
fn resolve_rc_path(override_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(rc_env) = std::env::var("TASKDECKRC") {
        if rc_env == "/dev/null" {
            return Ok(None);
        }
        return Ok(Some(PathBuf::from(rc_env)));
    }

    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    let candidate = home.join(".taskdeckrc");
    if candidate.exists() {
        return Ok(Some(candidate));
    }

    warn!("no ~/.taskdeckrc present");
    Ok(None)
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(".taskdeck"))
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

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{Config, resolve_data_dir};

    #[test]
    fn rc_file_overrides_defaults_and_cli_overrides_win() {
        let temp = tempdir().expect("tempdir");
        let rc = temp.path().join("taskdeckrc");
        fs::write(
            &rc,
            "# comment\nserver.url = http://backend:9000/api/\ncolor = off # inline\n",
        )
        .expect("write rc");

        let mut cfg = Config::load(Some(rc.as_path())).expect("load config");
        assert_eq!(cfg.server_url(), "http://backend:9000/api/");
        assert_eq!(cfg.get("color"), Some("off".to_string()));

        cfg.apply_overrides([("server.url".to_string(), "http://other/".to_string())]);
        assert_eq!(cfg.server_url(), "http://other/");
    }

    #[test]
    fn invalid_config_line_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let rc = temp.path().join("taskdeckrc");
        fs::write(&rc, "server.url http://missing-equals/\n").expect("write rc");

        assert!(Config::load(Some(rc.as_path())).is_err());
    }

    #[test]
    fn data_dir_override_wins_and_is_created() {
        let temp = tempdir().expect("tempdir");
        let rc = temp.path().join("taskdeckrc");
        fs::write(&rc, "").expect("write rc");
        let cfg = Config::load(Some(rc.as_path())).expect("load config");

        let target = temp.path().join("nested/data");
        let resolved = resolve_data_dir(&cfg, Some(target.as_path())).expect("resolve");
        assert_eq!(resolved, target);
        assert!(target.exists());
    }
}
