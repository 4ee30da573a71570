use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use camino::Utf8PathBuf;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{ArtifactMode, DispatchMode, IdRange};
use crate::error::RankscanError;

pub const DEFAULT_CONFIG_FILE: &str = "rankscan.json";
pub const DEFAULT_BASE_URL: &str = "https://ncore.pro/profile.php?id=";
pub const DEFAULT_START: u64 = 1;
pub const DEFAULT_END: u64 = 1_812_000;
pub const DEFAULT_CONCURRENCY: usize = 50;
pub const DEFAULT_FLUSH_EVERY: usize = 100;
pub const DEFAULT_OUTPUT: &str = "output.log";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const NICK_VARS: [&str; 2] = ["RANKSCAN_NICK", "NICK"];
const PASS_VARS: [&str; 2] = ["RANKSCAN_PASS", "PASS"];
const ENV_FILES: [&str; 2] = [".env.local", ".env"];

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub end: Option<u64>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub flush_every: Option<usize>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub dispatch: Option<DispatchMode>,
    #[serde(default)]
    pub mode: Option<ArtifactMode>,
    #[serde(default)]
    pub extraction: Option<ExtractionEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ExtractionEntry {
    #[serde(default)]
    pub container_selector: Option<String>,
    #[serde(default)]
    pub label_selector: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub delimiter: Option<String>,
}

/// Where the rank lives on a profile page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRule {
    pub container_selector: String,
    pub label_selector: String,
    pub label: String,
    pub delimiter: String,
}

impl Default for ExtractionRule {
    fn default() -> Self {
        Self {
            container_selector: ".userbox_tartalom_mini".to_string(),
            label_selector: ".profil_jobb_elso2".to_string(),
            label: "Helyezés:".to_string(),
            delimiter: ".".to_string(),
        }
    }
}

/// CLI-level overrides, applied on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub concurrency: Option<usize>,
    pub flush_every: Option<usize>,
    pub output: Option<String>,
    pub dispatch: Option<DispatchMode>,
    pub mode: Option<ArtifactMode>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub range: IdRange,
    pub concurrency: usize,
    pub flush_every: usize,
    pub output: Utf8PathBuf,
    pub timeout_secs: u64,
    pub dispatch: DispatchMode,
    pub mode: ArtifactMode,
    pub extraction: ExtractionRule,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `rankscan.json` when present. A missing default file is
    /// not an error; every field has a default.
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, RankscanError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| RankscanError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| RankscanError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, RankscanError> {
        let start = overrides.start.or(config.start).unwrap_or(DEFAULT_START);
        let end = overrides.end.or(config.end).unwrap_or(DEFAULT_END);
        let range = IdRange::new(start, end)?;

        let concurrency = overrides
            .concurrency
            .or(config.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(RankscanError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let flush_every = overrides
            .flush_every
            .or(config.flush_every)
            .unwrap_or(DEFAULT_FLUSH_EVERY);
        if flush_every == 0 {
            return Err(RankscanError::InvalidConfig(
                "flush_every must be at least 1".to_string(),
            ));
        }

        let output = overrides
            .output
            .or(config.output)
            .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
        if output.trim().is_empty() {
            return Err(RankscanError::InvalidConfig(
                "output path must not be empty".to_string(),
            ));
        }

        let base_url = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(RankscanError::InvalidConfig(format!(
                "base_url must be an http(s) URL: {base_url}"
            )));
        }

        let defaults = ExtractionRule::default();
        let extraction = match config.extraction {
            Some(entry) => ExtractionRule {
                container_selector: entry
                    .container_selector
                    .unwrap_or(defaults.container_selector),
                label_selector: entry.label_selector.unwrap_or(defaults.label_selector),
                label: entry.label.unwrap_or(defaults.label),
                delimiter: entry.delimiter.unwrap_or(defaults.delimiter),
            },
            None => defaults,
        };

        Ok(ResolvedConfig {
            base_url,
            range,
            concurrency,
            flush_every,
            output: Utf8PathBuf::from(output),
            timeout_secs: config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            dispatch: overrides.dispatch.or(config.dispatch).unwrap_or_default(),
            mode: overrides.mode.or(config.mode).unwrap_or_default(),
            extraction,
        })
    }
}

/// Session credentials, read once at startup and never changed during a run.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    nick: String,
    pass: String,
}

impl Credentials {
    pub fn new(nick: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            pass: pass.into(),
        }
    }

    /// Reads `.env.local` and `.env` from `dir`, then the process environment.
    /// Variables already set in the environment win over file values.
    pub fn from_env(dir: &Path) -> Result<Self, RankscanError> {
        Self::from_env_with(dir, |key| std::env::var(key).ok())
    }

    /// Like [`Credentials::from_env`], with `env` standing in for the process
    /// environment.
    pub fn from_env_with<F>(dir: &Path, env: F) -> Result<Self, RankscanError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut file_vars = HashMap::new();
        // Earlier files take precedence.
        for name in ENV_FILES.iter().rev() {
            let path = dir.join(name);
            if let Ok(content) = fs::read_to_string(&path) {
                file_vars.extend(parse_env_file(&content));
            }
        }
        let lookup = |key: &str| env(key).or_else(|| file_vars.get(key).cloned());
        Self::from_lookup(lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, RankscanError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let nick = first_non_empty(&lookup, &NICK_VARS)
            .ok_or(RankscanError::MissingCredential(NICK_VARS[0]))?;
        let pass = first_non_empty(&lookup, &PASS_VARS)
            .ok_or(RankscanError::MissingCredential(PASS_VARS[0]))?;
        Ok(Self { nick, pass })
    }

    pub fn cookie_header(&self) -> String {
        format!("nick={}; pass={}", self.nick, self.pass)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("nick", &self.nick)
            .field("pass", &"<redacted>")
            .finish()
    }
}

fn first_non_empty<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn env_line_regex() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        Regex::new(r"^\s*(?:export\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.*?)\s*$")
            .expect("static env line pattern is valid")
    })
}

/// Parses `KEY=value` lines, skipping blanks and `#` comments. Matching outer
/// quotes are removed from values.
pub fn parse_env_file(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some(captures) = env_line_regex().captures(trimmed) else {
            continue;
        };
        let key = captures[1].to_string();
        let raw = &captures[2];
        let value = ['"', '\'']
            .iter()
            .find_map(|quote| {
                raw.strip_prefix(*quote)
                    .and_then(|rest| rest.strip_suffix(*quote))
            })
            .unwrap_or(raw);
        vars.insert(key, value.to_string());
    }
    vars
}
