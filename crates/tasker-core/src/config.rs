use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use tracing::{debug, info, trace, warn};

use crate::datastore::DEFAULT_STORAGE_KEY;

const DATA_LOCATION: &str = "data.location";
const STORAGE_KEY: &str = "storage.key";
const DEFAULT_COMMAND: &str = "default.command";
const COLOR: &str = "color";

const KNOWN_KEYS: [&str; 4] = [DATA_LOCATION, STORAGE_KEY, DEFAULT_COMMAND, COLOR];

/// Settings read from `~/.taskerrc` (or `--taskerrc` / `TASKERRC`) and `--rc`.
#[derive(Debug, Clone)]
pub struct Config {
    map: HashMap<String, String>,
    pub loaded_files: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let map = [
            (DATA_LOCATION, "~/.tasker"),
            (STORAGE_KEY, DEFAULT_STORAGE_KEY),
            (DEFAULT_COMMAND, "list"),
            (COLOR, "on"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            map,
            loaded_files: vec![],
        }
    }
}

enum RcLine<'a> {
    Blank,
    Include(&'a str),
    Setting { key: &'a str, value: &'a str },
}

fn parse_rc_line(raw: &str) -> Option<RcLine<'_>> {
    let line = raw.split_once('#').map_or(raw, |(before, _)| before).trim();
    if line.is_empty() {
        return Some(RcLine::Blank);
    }
    if let Some(target) = line.strip_prefix("include ") {
        return Some(RcLine::Include(target.trim()));
    }
    let (key, value) = line.split_once('=')?;
    Some(RcLine::Setting {
        key: key.trim(),
        value: value.trim(),
    })
}

impl Config {
    #[tracing::instrument(skip(rc_override))]
    pub fn load(rc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Config::default();

        match resolve_rc_path(rc_override) {
            Some(path) => {
                info!(rc = %path.display(), "loading taskerrc");
                cfg.load_file(&path, &mut vec![])?;
            }
            None => debug!("no taskerrc found; using defaults"),
        }

        Ok(cfg)
    }

    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in overrides {
            let key = k.strip_prefix("rc.").unwrap_or(&k);
            debug!(key, value = %v, "applying override");
            self.set(key, v);
        }
    }

    fn set(&mut self, key: &str, value: String) {
        if !KNOWN_KEYS.contains(&key) {
            warn!(key, "unknown setting; ignoring");
            return;
        }
        self.map.insert(key.to_string(), value);
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.map
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn storage_key(&self) -> String {
        self.get(STORAGE_KEY)
            .unwrap_or(DEFAULT_STORAGE_KEY)
            .to_string()
    }

    pub fn default_command(&self) -> String {
        self.get(DEFAULT_COMMAND).unwrap_or("list").to_string()
    }

    pub fn color(&self) -> anyhow::Result<bool> {
        match self.get(COLOR) {
            None => Ok(true),
            Some(raw) => parse_flag(raw).ok_or_else(|| anyhow!("invalid color setting: {raw}")),
        }
    }

    /// `--data` wins over `data.location`; a leading `~` is the home directory.
    pub fn data_dir(&self, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
        if let Some(dir) = override_dir {
            return Ok(dir.to_path_buf());
        }
        let location = self
            .get(DATA_LOCATION)
            .ok_or_else(|| anyhow!("{DATA_LOCATION} is empty"))?;
        Ok(expand_tilde(Path::new(location)))
    }

    /// `chain` holds the canonical paths of the files currently being read,
    /// outermost first.
    fn load_file(&mut self, path: &Path, chain: &mut Vec<PathBuf>) -> anyhow::Result<()> {
        let path = expand_tilde(path);
        let text =
            fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let canonical = fs::canonicalize(&path)
            .with_context(|| format!("failed to resolve {}", path.display()))?;

        self.loaded_files.push(path.clone());
        chain.push(canonical);

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        for (idx, raw_line) in text.lines().enumerate() {
            let line_num = idx + 1;
            let parsed = parse_rc_line(raw_line).ok_or_else(|| {
                anyhow!("invalid config line {}:{line_num}: {raw_line}", path.display())
            })?;

            match parsed {
                RcLine::Blank => {}
                RcLine::Setting { key, value } => {
                    trace!(key, value, "loaded config key");
                    self.set(key, value.to_string());
                }
                RcLine::Include(target) => {
                    let target = base_dir.join(expand_tilde(Path::new(target)));
                    if !target.exists() {
                        warn!(include = %target.display(), "include file does not exist; skipping");
                        continue;
                    }
                    let target_canonical = fs::canonicalize(&target)
                        .with_context(|| format!("failed to resolve {}", target.display()))?;
                    if chain.contains(&target_canonical) {
                        bail!("include cycle at {}:{line_num}", path.display());
                    }
                    debug!(include = %target.display(), line = line_num, "processing include");
                    self.load_file(&target, chain)?;
                }
            }
        }

        chain.pop();
        Ok(())
    }
}

/// Boolean vocabulary shared by every on/off setting.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "y" | "yes" | "on" | "true" => Some(true),
        "0" | "n" | "no" | "off" | "false" => Some(false),
        _ => None,
    }
}

fn resolve_rc_path(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }

    if let Ok(from_env) = std::env::var("TASKERRC") {
        return (from_env != "/dev/null").then(|| PathBuf::from(from_env));
    }

    dirs::home_dir()
        .map(|home| home.join(".taskerrc"))
        .filter(|candidate| candidate.exists())
}

fn expand_tilde(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
