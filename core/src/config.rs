//! Client configuration.

use std::env;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_MAPPING_PATH: &str = "ApiMap.json";
pub const DEFAULT_BASE_URL: &str = "https://api.evident.io";
pub const DEFAULT_BASE_PATH: &str = "/api/v2/";

/// Keys, endpoint location and mapping document for one client.
///
/// Immutable once handed to `ApiClient`, which owns it for its lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub secret_key: String,
    pub public_key: String,
    pub mapping_path: PathBuf,
    pub base_url: String,
    pub base_path: String,
    /// Log a structured record of every request.
    pub verbose: bool,
}

impl ClientConfig {
    pub fn new(secret_key: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            public_key: public_key.into(),
            mapping_path: PathBuf::from(DEFAULT_MAPPING_PATH),
            base_url: DEFAULT_BASE_URL.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            verbose: false,
        }
    }

    /// Read settings from `APIMAP_*` environment variables.
    ///
    /// Missing keys are left empty and rejected later by verification;
    /// everything else falls back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::new(
            env::var("APIMAP_SECRET_KEY").unwrap_or_default(),
            env::var("APIMAP_PUBLIC_KEY").unwrap_or_default(),
        );
        if let Ok(path) = env::var("APIMAP_MAPPING_PATH") {
            config.mapping_path = PathBuf::from(path);
        }
        if let Ok(url) = env::var("APIMAP_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(path) = env::var("APIMAP_BASE_PATH") {
            config.base_path = path;
        }
        if let Ok(flag) = env::var("APIMAP_VERBOSE") {
            config.verbose = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        config
    }

    pub fn with_mapping_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mapping_path = path.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = path.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("secret_key", &"***")
            .field("public_key", &self.public_key)
            .field("mapping_path", &self.mapping_path)
            .field("base_url", &self.base_url)
            .field("base_path", &self.base_path)
            .field("verbose", &self.verbose)
            .finish()
    }
}

/// True when `key` starts with at least 88 non-whitespace characters.
pub fn is_valid_key(key: &str) -> bool {
    key.chars().take_while(|c| !c.is_whitespace()).count() >= 88
}
