use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::session::SessionIdentity;

/// One configured pull action: which remote mailbox to drain and where it lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub host: String,
    pub mailbox: String,
    pub action: String,
    /// Source directory of the filesystem-backed session: a `file://` URL or a plain path.
    pub source: String,
    /// File name suffixes never listed (uploads still in progress, temp files).
    #[serde(default)]
    pub exclude_suffixes: Vec<String>,
}

impl ActionConfig {
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity::new(&self.host, &self.mailbox, &self.action)
    }

    /// Resolve `source` to a local directory. Accepts `file:///srv/outbox` or `/srv/outbox`.
    pub fn source_dir(&self) -> Result<PathBuf> {
        if self.source.contains("://") {
            let parsed = url::Url::parse(&self.source)
                .with_context(|| format!("invalid source URL: {}", self.source))?;
            if parsed.scheme() != "file" {
                anyhow::bail!(
                    "unsupported source scheme '{}' (only file:// sources are built in)",
                    parsed.scheme()
                );
            }
            return parsed
                .to_file_path()
                .map_err(|_| anyhow::anyhow!("source URL is not a local path: {}", self.source));
        }
        Ok(PathBuf::from(&self.source))
    }
}

/// Global configuration loaded from `~/.config/pullmgr/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullConfig {
    /// Root under which remote relative paths are mirrored.
    pub local_root: PathBuf,
    /// Queued bytes above which `fetch` opens a second session.
    pub byte_threshold: u64,
    /// Minimum acceptable transfer rate in KB/sec; `None` disables the rate monitor.
    #[serde(default)]
    pub min_rate_kbps: Option<f64>,
    /// Rate monitor sampling interval.
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
    /// Override for the state directory (manifests, transfer log). XDG state home if unset.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

fn default_monitor_interval_ms() -> u64 {
    1000
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            local_root: PathBuf::from("inbox"),
            byte_threshold: 100 * 1024 * 1024,
            min_rate_kbps: None,
            monitor_interval_ms: default_monitor_interval_ms(),
            state_dir: None,
            actions: Vec::new(),
        }
    }
}

impl PullConfig {
    /// Find an action by `host/mailbox/action`, or by bare action name when it is unique.
    pub fn find_action(&self, selector: &str) -> Result<&ActionConfig> {
        let parts: Vec<&str> = selector.split('/').collect();
        let matches: Vec<&ActionConfig> = match parts.as_slice() {
            [host, mailbox, action] => self
                .actions
                .iter()
                .filter(|a| a.host == *host && a.mailbox == *mailbox && a.action == *action)
                .collect(),
            [action] => self.actions.iter().filter(|a| a.action == *action).collect(),
            _ => anyhow::bail!("action must be 'host/mailbox/action' or an action name: {selector}"),
        };
        match matches.as_slice() {
            [one] => Ok(one),
            [] => anyhow::bail!("no configured action matches '{selector}'"),
            _ => anyhow::bail!("'{selector}' is ambiguous; use host/mailbox/action"),
        }
    }

    /// State directory: `state_dir` if configured, else `~/.local/state/pullmgr`.
    pub fn state_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.state_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("pullmgr")?;
        Ok(xdg_dirs.get_state_home().join("pullmgr"))
    }

    /// Directory holding one manifest per action.
    pub fn manifest_dir(&self) -> Result<PathBuf> {
        Ok(self.state_dir()?.join("lists"))
    }

    /// SQLite transfer log read by the rate monitor.
    pub fn transfer_log_path(&self) -> Result<PathBuf> {
        Ok(self.state_dir()?.join("transfers.db"))
    }

    pub fn monitor_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.monitor_interval_ms.max(1))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pullmgr")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Path of the options store that holds the persisted priority state.
pub fn options_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pullmgr")?;
    Ok(xdg_dirs.place_config_file("options.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PullConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<PullConfig> {
    if !path.exists() {
        let default_cfg = PullConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: PullConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PullConfig {
        toml::from_str(
            r#"
            local_root = "/var/spool/pullmgr"
            byte_threshold = 300
            min_rate_kbps = 10.0

            [[actions]]
            host = "partner"
            mailbox = "acme"
            action = "receive"
            source = "file:///srv/acme/outbox"
            exclude_suffixes = [".part"]

            [[actions]]
            host = "partner"
            mailbox = "globex"
            action = "receive"
            source = "/srv/globex/outbox"

            [[actions]]
            host = "bank"
            mailbox = "ops"
            action = "statements"
            source = "/srv/bank"
        "#,
        )
        .unwrap()
    }

    #[test]
    fn default_config_values() {
        let cfg = PullConfig::default();
        assert_eq!(cfg.byte_threshold, 100 * 1024 * 1024);
        assert_eq!(cfg.monitor_interval_ms, 1000);
        assert!(cfg.min_rate_kbps.is_none());
        assert!(cfg.actions.is_empty());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = sample();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: PullConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.byte_threshold, 300);
        assert_eq!(parsed.min_rate_kbps, Some(10.0));
        assert_eq!(parsed.actions, cfg.actions);
        assert_eq!(parsed.monitor_interval_ms, 1000);
    }

    #[test]
    fn find_action_by_full_spec_and_unique_name() {
        let cfg = sample();
        let a = cfg.find_action("partner/globex/receive").unwrap();
        assert_eq!(a.mailbox, "globex");
        let b = cfg.find_action("statements").unwrap();
        assert_eq!(b.host, "bank");
    }

    #[test]
    fn find_action_rejects_ambiguous_and_unknown() {
        let cfg = sample();
        assert!(cfg.find_action("receive").is_err());
        assert!(cfg.find_action("nope").is_err());
        assert!(cfg.find_action("a/b").is_err());
    }

    #[test]
    fn source_dir_accepts_file_url_and_plain_path() {
        let cfg = sample();
        assert_eq!(
            cfg.actions[0].source_dir().unwrap(),
            PathBuf::from("/srv/acme/outbox")
        );
        assert_eq!(
            cfg.actions[1].source_dir().unwrap(),
            PathBuf::from("/srv/globex/outbox")
        );
        let mut ftp = cfg.actions[0].clone();
        ftp.source = "ftp://example.com/out".to_string();
        assert!(ftp.source_dir().is_err());
    }

    #[test]
    fn load_or_init_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("config.toml");
        let cfg = load_or_init_at(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.byte_threshold, PullConfig::default().byte_threshold);
        let again = load_or_init_at(&path).unwrap();
        assert_eq!(again.local_root, cfg.local_root);
    }
}
