//! Multi-site configuration and secrets.
//!
//! # Storage layout
//!
//! ```text
//! ~/.config/nostrpress/
//!   config.yaml   (sites + global defaults — mode 0600)
//!   secrets       (private key — mode 0600)
//! ```
//!
//! Without a config file every value comes from the environment
//! (`POSTS_DIR`, `BLOG_URL`, `AUTHOR_ID`, `RELAY_LIST`, `PUBLISHED_INDEX`).
//!
//! # API pattern
//!
//! Every function takes the home directory explicitly (`fn_at(home, …)`), so
//! tests can point it at a `TempDir`. The binary resolves it once with
//! [`home`].
//!
//! Environment access goes through an [`Env`] snapshot; tests build one with
//! [`Env::from_pairs`] and never touch the process environment.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{config_io_err, ConfigError};

pub const DEFAULT_POSTS_DIR: &str = "./posts";
const ENV_SITE_NAME: &str = "default";

// ---------------------------------------------------------------------------
// 1. Environment snapshot
// ---------------------------------------------------------------------------

/// A frozen view of the environment variables nostrpress reads.
#[derive(Debug, Clone, Default)]
pub struct Env {
    vars: HashMap<String, String>,
}

impl Env {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Non-empty, trimmed value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// `DRY_RUN=1` (or `true`) requests a dry run.
    pub fn dry_run(&self) -> bool {
        matches!(self.get("DRY_RUN"), Some(v) if v == "1" || v.eq_ignore_ascii_case("true"))
    }
}

// ---------------------------------------------------------------------------
// 2. File model
// ---------------------------------------------------------------------------

/// On-disk shape of `config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_site: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relays: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blog_url: Option<String>,
    #[serde(default)]
    pub sites: BTreeMap<String, SiteEntry>,
}

/// One entry under `sites:`. Unset values fall back to the global ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteEntry {
    pub posts_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blog_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relays: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_index: Option<PathBuf>,
}

/// Fully resolved settings for one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub name: String,
    pub posts_dir: PathBuf,
    pub blog_url: Option<String>,
    pub author_id: Option<String>,
    pub relays: Vec<String>,
    pub published_index: Option<PathBuf>,
}

impl SiteConfig {
    /// Fails with [`ConfigError::NoRelays`] when the relay list is empty.
    pub fn require_relays(&self) -> Result<&[String], ConfigError> {
        if self.relays.is_empty() {
            return Err(ConfigError::NoRelays {
                site: self.name.clone(),
            });
        }
        Ok(&self.relays)
    }

    /// Fails with [`ConfigError::PostsDirNotFound`] when `posts_dir` is not a directory.
    pub fn require_posts_dir(&self) -> Result<&Path, ConfigError> {
        if !self.posts_dir.is_dir() {
            return Err(ConfigError::PostsDirNotFound {
                path: self.posts_dir.clone(),
            });
        }
        Ok(&self.posts_dir)
    }
}

// ---------------------------------------------------------------------------
// 3. Paths
// ---------------------------------------------------------------------------

/// The user's home directory, from `dirs::home_dir()`.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

/// `<home>/.config/nostrpress/`
pub fn config_dir_at(home: &Path) -> PathBuf {
    home.join(".config").join("nostrpress")
}

/// `<home>/.config/nostrpress/config.yaml`
pub fn config_path_at(home: &Path) -> PathBuf {
    config_dir_at(home).join("config.yaml")
}

/// `<home>/.config/nostrpress/secrets`
pub fn secrets_path_at(home: &Path) -> PathBuf {
    config_dir_at(home).join("secrets")
}

/// Expand a leading `~/` against `home`.
pub fn expand_home(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) if path.to_string_lossy().starts_with("~/") => home.join(rest),
        _ => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// 4. Load / save
// ---------------------------------------------------------------------------

/// Load `config.yaml`, or `None` when it does not exist.
pub fn load_config_at(home: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| config_io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(Some(ConfigFile::default()));
    }
    serde_yaml::from_str(&contents)
        .map(Some)
        .map_err(|e| ConfigError::Parse { path, source: e })
}

/// Atomically save `config.yaml`.
///
/// Write flow: serialize → `config.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_config_at(home: &Path, config: &ConfigFile) -> Result<(), ConfigError> {
    let dir = ensure_config_dir(home)?;
    let path = config_path_at(home);
    let tmp_path = dir.join("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml).map_err(|e| config_io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path).map_err(|e| config_io_err(&path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 5. Site resolution
// ---------------------------------------------------------------------------

/// Resolve the settings for `site` (or the default site).
///
/// With no config file the environment supplies every value and `site` must
/// be `None`. With a config file, site values override global ones and `~/`
/// in paths is expanded.
pub fn resolve_site_at(
    home: &Path,
    site: Option<&str>,
    env: &Env,
) -> Result<SiteConfig, ConfigError> {
    let Some(config) = load_config_at(home)? else {
        if let Some(name) = site {
            return Err(ConfigError::UnknownSite {
                name: name.to_owned(),
                available: "none".to_owned(),
            });
        }
        return Ok(from_env(env, home));
    };

    let target = site
        .map(str::to_owned)
        .or_else(|| config.default_site.clone())
        .or_else(|| single_site(&config));

    let Some((name, entry)) = target
        .as_deref()
        .and_then(|t| config.sites.get_key_value(t))
    else {
        return Err(ConfigError::UnknownSite {
            name: target.unwrap_or_default(),
            available: available_sites(&config),
        });
    };

    Ok(SiteConfig {
        name: name.clone(),
        posts_dir: expand_home(&entry.posts_dir, home),
        blog_url: non_empty(entry.blog_url.as_ref().or(config.blog_url.as_ref())),
        author_id: non_empty(entry.author_id.as_ref().or(config.author_id.as_ref())),
        relays: clean_relays(
            entry
                .relays
                .as_ref()
                .unwrap_or(&config.relays)
                .iter()
                .map(String::as_str),
        ),
        published_index: entry
            .published_index
            .as_ref()
            .map(|p| expand_home(p, home)),
    })
}

/// Resolve every configured site, in name order. Fails with
/// [`ConfigError::NoSites`] when there is nothing to iterate.
pub fn resolve_all_sites_at(home: &Path, env: &Env) -> Result<Vec<SiteConfig>, ConfigError> {
    let names = site_names_at(home)?;
    if names.is_empty() {
        return Err(ConfigError::NoSites);
    }
    names
        .iter()
        .map(|n| resolve_site_at(home, Some(n), env))
        .collect()
}

/// Names of all configured sites, sorted.
pub fn site_names_at(home: &Path) -> Result<Vec<String>, ConfigError> {
    Ok(load_config_at(home)?
        .map(|c| c.sites.into_keys().collect())
        .unwrap_or_default())
}

fn from_env(env: &Env, home: &Path) -> SiteConfig {
    SiteConfig {
        name: ENV_SITE_NAME.to_owned(),
        posts_dir: expand_home(
            Path::new(env.get("POSTS_DIR").unwrap_or(DEFAULT_POSTS_DIR)),
            home,
        ),
        blog_url: env.get("BLOG_URL").map(str::to_owned),
        author_id: env.get("AUTHOR_ID").map(str::to_owned),
        relays: env
            .get("RELAY_LIST")
            .map(|raw| clean_relays(raw.split(',')))
            .unwrap_or_default(),
        published_index: env
            .get("PUBLISHED_INDEX")
            .map(|p| expand_home(Path::new(p), home)),
    }
}

fn single_site(config: &ConfigFile) -> Option<String> {
    match config.sites.len() {
        1 => config.sites.keys().next().cloned(),
        _ => None,
    }
}

fn available_sites(config: &ConfigFile) -> String {
    if config.sites.is_empty() {
        "none".to_owned()
    } else {
        config.sites.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Trimmed, non-empty relay URLs with duplicates dropped; first occurrence wins.
fn clean_relays<'a>(relays: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    relays
        .into_iter()
        .map(str::trim)
        .filter(|r| !r.is_empty() && seen.insert(*r))
        .map(str::to_owned)
        .collect()
}

// ---------------------------------------------------------------------------
// 6. Add site
// ---------------------------------------------------------------------------

/// Insert or replace the site `name`. The first site added becomes the
/// default; `make_default` forces it. Returns the updated file.
pub fn add_site_at(
    home: &Path,
    name: &str,
    entry: SiteEntry,
    make_default: bool,
) -> Result<ConfigFile, ConfigError> {
    let mut config = load_config_at(home)?.unwrap_or_default();
    let replaced = config.sites.insert(name.to_owned(), entry).is_some();
    if make_default || config.default_site.is_none() {
        config.default_site = Some(name.to_owned());
    }
    save_config_at(home, &config)?;
    tracing::info!(
        "{} site {name}",
        if replaced { "updated" } else { "added" }
    );
    Ok(config)
}

// ---------------------------------------------------------------------------
// 7. Private key
// ---------------------------------------------------------------------------

/// Raw private key text: `NOSTR_PRIVATE_KEY` first, then the secrets file.
///
/// The secrets file holds either the bare key on its own (`nsec1…` or hex) or
/// a `NOSTR_PRIVATE_KEY=…` line, optionally quoted. Decoding the key is the
/// caller's job.
pub fn load_private_key_at(home: &Path, env: &Env) -> Result<String, ConfigError> {
    if let Some(key) = env.get("NOSTR_PRIVATE_KEY") {
        return Ok(key.to_owned());
    }

    let secrets = secrets_path_at(home);
    if secrets.exists() {
        let content = std::fs::read_to_string(&secrets).map_err(|e| config_io_err(&secrets, e))?;
        if let Some(key) = parse_secrets(&content) {
            return Ok(key);
        }
    }
    Err(ConfigError::MissingPrivateKey { secrets })
}

fn parse_secrets(content: &str) -> Option<String> {
    let trimmed = content.trim();
    let is_bare = !trimmed.contains('=') && !trimmed.contains(char::is_whitespace);
    if is_bare && !trimmed.is_empty() {
        return Some(trimmed.to_owned());
    }
    content.lines().find_map(|line| {
        let value = line.trim().strip_prefix("NOSTR_PRIVATE_KEY=")?;
        let unquoted = value.trim().trim_matches(|c| c == '"' || c == '\'');
        (!unquoted.is_empty()).then(|| unquoted.to_owned())
    })
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn ensure_config_dir(home: &Path) -> Result<PathBuf, ConfigError> {
    let dir = config_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| config_io_err(&dir, e))?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| config_io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| config_io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
