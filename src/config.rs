// =============================================================================
// config.rs — WHERE TO LOOK AND WHERE TO WRITE
// =============================================================================
//
// Everything tunable lives here and is read once at startup. The resulting
// Config is passed down explicitly; nothing below main reaches for globals.
//
// All values can be overridden via environment variables prefixed with
// CLARKE_BELT_. A .env file in the working directory is honoured too.
// =============================================================================

use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Runtime configuration for one sync run.
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // SOURCES
    // =========================================================================

    /// Site root. Relative links found in the listings are appended to this,
    /// so it must end with a slash.
    /// Default: https://www.lyngsat.com/
    pub base_url: String,

    /// Listing pages to harvest. Entries without a scheme are resolved
    /// against `base_url`.
    pub source_pages: Vec<String>,

    /// Absolute record links must match this pattern to be accepted as-is.
    /// The default admits pages directly under the site root only, which keeps
    /// out the `tracker/` pages linked from inclination notes.
    pub record_url_pattern: String,

    /// Marker text that distinguishes active listing tables from archived
    /// ones. Only tables whose markup contains it are harvested.
    pub listing_marker: String,

    /// Transport-level timeout for each page request.
    pub http_timeout: Duration,

    // =========================================================================
    // STORAGE
    // =========================================================================

    /// Redis connection URL for the snapshot store.
    pub redis_url: String,

    /// Namespace for the store's keys (`<table>:active`, `<table>:closed`).
    pub table: String,

    // =========================================================================
    // LOGGING
    // =========================================================================

    /// Default log filter when RUST_LOG is not set.
    pub log_level: String,

    /// Emit log lines as JSON objects instead of human-readable text.
    pub log_json: bool,
}

const DEFAULT_BASE_URL: &str = "https://www.lyngsat.com/";
const DEFAULT_SOURCE_PAGES: &str = "asia.html,america.html,atlantic.html,europe.html";
const DEFAULT_RECORD_URL_PATTERN: &str = r"^https?://www\.lyngsat\.com/[^/]+\.html$";

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            source_pages: split_list(DEFAULT_SOURCE_PAGES),
            record_url_pattern: DEFAULT_RECORD_URL_PATTERN.to_string(),
            listing_marker: "Verdana".to_string(),
            http_timeout: Duration::from_secs(30),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            table: "satellites".to_string(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        // Missing .env is fine.
        let _ = dotenvy::dotenv();

        let defaults = Config::default();

        Config {
            base_url: env_or_default("CLARKE_BELT_BASE_URL", DEFAULT_BASE_URL),
            source_pages: split_list(&env_or_default(
                "CLARKE_BELT_SOURCE_PAGES",
                DEFAULT_SOURCE_PAGES,
            )),
            record_url_pattern: env_or_default(
                "CLARKE_BELT_RECORD_URL_PATTERN",
                DEFAULT_RECORD_URL_PATTERN,
            ),
            listing_marker: env_or_default("CLARKE_BELT_LISTING_MARKER", &defaults.listing_marker),
            http_timeout: Duration::from_secs(
                env_or_default("CLARKE_BELT_HTTP_TIMEOUT_SECS", "30")
                    .parse()
                    .unwrap_or(30),
            ),
            redis_url: env_or_default("CLARKE_BELT_REDIS_URL", &defaults.redis_url),
            table: env_or_default("CLARKE_BELT_TABLE", &defaults.table),
            log_level: env_or_default("CLARKE_BELT_LOG_LEVEL", &defaults.log_level),
            log_json: matches!(
                env_or_default("CLARKE_BELT_LOG_JSON", "false").to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            ),
        }
    }

    /// Resolve the configured source pages into absolute URLs, checking the
    /// base URL on the way.
    pub fn source_urls(&self) -> Result<Vec<String>, ConfigError> {
        let base = self.parsed_base_url()?;

        if self.source_pages.is_empty() {
            return Err(ConfigError::NoSourcePages);
        }

        self.source_pages
            .iter()
            .map(|page| {
                base.join(page)
                    .map(String::from)
                    .map_err(|e| ConfigError::SourcePage {
                        value: page.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect()
    }

    fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.base_url).map_err(|e| ConfigError::BaseUrl {
            value: self.base_url.clone(),
            reason: e.to_string(),
        })?;

        if !self.base_url.ends_with('/') {
            return Err(ConfigError::BaseUrl {
                value: self.base_url.clone(),
                reason: "must end with '/'".to_string(),
            });
        }

        Ok(url)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
