//! Authentication cookies for sites that need a logged-in session.
//!
//! Cookies are kept as a JSON array in `cookies.json` (the shape browser
//! exporters produce). The extractor reads a Netscape `cookies.txt` export,
//! which [`CookieStore::sync_export`] regenerates from the JSON store.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, FileSystemError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::paths::PathValidator;

/// Timeout for validity probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// User agent sent with validity probes.
pub const PROBE_USER_AGENT: &str = "Mozilla/5.0";

const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";

fn default_cookie_path() -> String {
    "/".to_string()
}

/// Accepts integer, float or numeric-string expiry values.
fn deserialize_expiry<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    })
}

/// A single stored cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie domain, e.g. `.tiktok.com`.
    #[serde(default)]
    pub domain: String,
    /// Cookie name.
    #[serde(default)]
    pub name: String,
    /// Cookie value.
    #[serde(default)]
    pub value: String,
    /// Expiry as unix seconds; `None` for session cookies.
    #[serde(
        default,
        deserialize_with = "deserialize_expiry",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiry: Option<i64>,
    /// Cookie path.
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Only sent over HTTPS.
    #[serde(default)]
    pub secure: bool,
    /// Fields this tool does not interpret, kept on rewrite.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Cookie {
    /// Whether this cookie belongs to `suffix` (e.g. `tiktok.com`).
    #[must_use]
    pub fn matches_domain(&self, suffix: &str) -> bool {
        self.domain.ends_with(suffix)
    }

    /// One tab-separated line of a Netscape cookie file.
    #[must_use]
    pub fn to_netscape_line(&self) -> String {
        let include_subdomains = if self.domain.starts_with('.') {
            "TRUE"
        } else {
            "FALSE"
        };
        let secure = if self.secure { "TRUE" } else { "FALSE" };
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.domain,
            include_subdomains,
            self.path,
            secure,
            self.expiry.unwrap_or(0),
            self.name,
            self.value
        )
    }
}

/// Sites whose session cookie can be validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    /// TikTok.
    TikTok,
    /// X, formerly Twitter.
    X,
}

impl Site {
    /// Every site with a validity probe.
    pub const ALL: [Self; 2] = [Self::TikTok, Self::X];

    /// Name of the session cookie.
    #[must_use]
    pub const fn session_cookie(self) -> &'static str {
        match self {
            Self::TikTok => "sessionid",
            Self::X => "auth_token",
        }
    }

    /// Domain suffix the session cookie must belong to.
    #[must_use]
    pub const fn domain_suffix(self) -> &'static str {
        match self {
            Self::TikTok => "tiktok.com",
            Self::X => "twitter.com",
        }
    }

    /// Authenticated endpoint used by the probe.
    #[must_use]
    pub const fn probe_url(self) -> &'static str {
        match self {
            Self::TikTok => "https://www.tiktok.com/api/me/",
            Self::X => "https://twitter.com/home",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TikTok => write!(f, "TikTok"),
            Self::X => write!(f, "X/Twitter"),
        }
    }
}

/// Result of checking a site's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieStatus {
    /// No session cookie stored for the site.
    Missing,
    /// The site accepted the session.
    Valid,
    /// The site rejected the session or could not be reached.
    Invalid,
}

impl fmt::Display for CookieStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Valid => write!(f, "valid"),
            Self::Invalid => write!(f, "invalid or expired"),
        }
    }
}

/// A cookie with a known expiry, formatted for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieExpiry {
    /// Cookie domain.
    pub domain: String,
    /// Cookie name.
    pub name: String,
    /// Expiry as `YYYY-MM-DD HH:MM:SS` UTC.
    pub expires_at: String,
}

/// Checks whether a session cookie is still accepted by its site.
#[cfg_attr(test, mockall::automock)]
pub trait CookieValidator: Send + Sync {
    /// Whether `session_value` is a live session for `site`.
    fn validate(&self, site: Site, session_value: &str) -> bool;
}

/// [`CookieValidator`] that calls the site's authenticated endpoint.
#[derive(Debug, Clone)]
pub struct HttpCookieValidator {
    timeout: Duration,
}

impl Default for HttpCookieValidator {
    fn default() -> Self {
        Self {
            timeout: PROBE_TIMEOUT,
        }
    }
}

impl HttpCookieValidator {
    /// Validator with the default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn probe(&self, site: Site, session_value: &str) -> reqwest::Result<bool> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .user_agent(PROBE_USER_AGENT)
            .build()?;
        let response = client
            .get(site.probe_url())
            .header(
                reqwest::header::COOKIE,
                format!("{}={session_value}", site.session_cookie()),
            )
            .send()?;

        if response.status() != reqwest::StatusCode::OK {
            debug!("{} probe returned {}", site, response.status());
            return Ok(false);
        }
        match site {
            Site::TikTok => Ok(response.text()?.contains("\"user\"")),
            Site::X => Ok(response.url().as_str().contains("twitter.com")),
        }
    }
}

impl CookieValidator for HttpCookieValidator {
    fn validate(&self, site: Site, session_value: &str) -> bool {
        match self.probe(site, session_value) {
            Ok(valid) => valid,
            Err(e) => {
                warn!(context = "Cookies", "{} validity probe failed: {}", site, e);
                false
            }
        }
    }
}

/// The JSON cookie store and its Netscape export.
pub struct CookieStore {
    path: PathBuf,
    export_path: PathBuf,
    fs: Arc<dyn FileSystem>,
    validator: PathValidator,
}

impl fmt::Debug for CookieStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieStore")
            .field("path", &self.path)
            .field("export_path", &self.export_path)
            .finish_non_exhaustive()
    }
}

impl CookieStore {
    /// Store at `path` exporting to `export_path`, on the real file system.
    pub fn open(path: impl Into<PathBuf>, export_path: impl Into<PathBuf>) -> Self {
        Self::with_fs(path, export_path, Arc::new(RealFileSystem))
    }

    /// Store over a custom file system.
    pub fn with_fs(
        path: impl Into<PathBuf>,
        export_path: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            path: path.into(),
            export_path: export_path.into(),
            validator: PathValidator::new(Arc::clone(&fs)),
            fs,
        }
    }

    /// Path of `cookies.json`.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the Netscape export.
    #[must_use]
    pub fn export_path(&self) -> &Path {
        &self.export_path
    }

    /// Stored cookies. Missing or malformed files read as empty.
    #[must_use]
    pub fn read(&self) -> Vec<Cookie> {
        let content = match self.fs.read_to_string(&self.path) {
            Ok(content) => content,
            Err(Error::FileSystem(FileSystemError::NotFound { .. })) => return Vec::new(),
            Err(e) => {
                warn!(context = "Cookies", "Failed to read cookies: {}", e);
                return Vec::new();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(
                context = "Cookies",
                "Cookie file {} is malformed, treating as empty: {}",
                self.path.display(),
                e
            );
            Vec::new()
        })
    }

    fn parse(json: &str) -> Result<Vec<Cookie>> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| Error::Cookie(format!("invalid JSON: {e}")))?;
        if !value.is_array() {
            return Err(Error::Cookie("expected a JSON array of cookies".to_string()));
        }
        serde_json::from_value(value).map_err(|e| Error::Cookie(format!("invalid cookie: {e}")))
    }

    fn persist(&self, cookies: &[Cookie]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            self.fs.create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(cookies)?;
        self.fs.write_atomic(&self.path, &json)?;
        self.sync_export(cookies)
    }

    /// Replace the store with a pasted JSON array. Returns the cookie count.
    pub fn replace(&self, json: &str) -> Result<usize> {
        let cookies = Self::parse(json)?;
        self.persist(&cookies)?;
        info!("Replaced cookies ({} entries)", cookies.len());
        Ok(cookies.len())
    }

    /// Replace the store with the JSON array in `source`.
    pub fn import(&self, source: &Path) -> Result<usize> {
        let source = self.validator.validate(source, true, false)?;
        let json = self.fs.read_to_string(&source)?;
        let cookies = Self::parse(&json)?;
        self.persist(&cookies)?;
        info!("Imported {} cookies from {}", cookies.len(), source.display());
        Ok(cookies.len())
    }

    /// Copy `cookies.json` to `destination`.
    pub fn export(&self, destination: &Path) -> Result<PathBuf> {
        if !self.fs.is_file(&self.path) {
            return Err(Error::Cookie(format!(
                "no cookie file to export at {}",
                self.path.display()
            )));
        }
        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let parent = self.validator.validate(parent, true, true)?;
        let target = destination
            .file_name()
            .map_or_else(|| parent.clone(), |name| parent.join(name));
        self.fs.copy(&self.path, &target)?;
        info!("Exported cookies to {}", target.display());
        Ok(target)
    }

    /// Remove the store and its export. Returns whether anything was removed.
    pub fn delete(&self) -> Result<bool> {
        let mut removed = false;
        for path in [&self.path, &self.export_path] {
            if self.fs.exists(path) {
                self.fs.remove_file(path)?;
                removed = true;
            }
        }
        Ok(removed)
    }

    /// Cookies carrying an expiry, in stored order.
    #[must_use]
    pub fn expirations(&self) -> Vec<CookieExpiry> {
        self.read()
            .into_iter()
            .filter_map(|cookie| {
                let expires_at = DateTime::from_timestamp(cookie.expiry?, 0)?
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string();
                Some(CookieExpiry {
                    domain: cookie.domain,
                    name: cookie.name,
                    expires_at,
                })
            })
            .collect()
    }

    /// Value of the session cookie for `site`, last match wins.
    #[must_use]
    pub fn session_value(&self, site: Site) -> Option<String> {
        self.read()
            .into_iter()
            .rev()
            .find(|c| c.matches_domain(site.domain_suffix()) && c.name == site.session_cookie())
            .map(|c| c.value)
    }

    /// Check the stored session for `site`.
    pub fn status(&self, site: Site, validator: &dyn CookieValidator) -> CookieStatus {
        match self.session_value(site) {
            None => CookieStatus::Missing,
            Some(value) if validator.validate(site, &value) => CookieStatus::Valid,
            Some(_) => CookieStatus::Invalid,
        }
    }

    /// Write `cookies` to `path` in Netscape format.
    pub fn write_netscape(&self, path: &Path, cookies: &[Cookie]) -> Result<()> {
        let mut content = String::from(NETSCAPE_HEADER);
        content.push('\n');
        for cookie in cookies {
            content.push_str(&cookie.to_netscape_line());
            content.push('\n');
        }
        self.fs.write_atomic(path, &content)
    }

    /// Regenerate the Netscape export from `cookies`; an empty set removes it.
    pub fn sync_export(&self, cookies: &[Cookie]) -> Result<()> {
        if cookies.is_empty() {
            if self.fs.exists(&self.export_path) {
                self.fs.remove_file(&self.export_path)?;
            }
            return Ok(());
        }
        self.write_netscape(&self.export_path, cookies)
    }

    /// Cookie file for the extractor, refreshed from the JSON store.
    ///
    /// Returns `None` when no cookies are stored. Export failures are logged
    /// and downloads proceed unauthenticated.
    pub fn extractor_cookie_file(&self) -> Option<PathBuf> {
        let cookies = self.read();
        if cookies.is_empty() {
            return None;
        }
        match self.sync_export(&cookies) {
            Ok(()) => Some(self.export_path.clone()),
            Err(e) => {
                warn!(context = "Cookies", "Failed to export cookies: {}", e);
                None
            }
        }
    }
}
