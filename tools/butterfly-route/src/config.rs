//! Routing configuration, read from TOML
//!
//! ```toml
//! zoom = 14
//! max_settled = 1048576
//! ```

use std::path::Path;

use butterfly_common::tiles::{DEFAULT_ZOOM, MAX_ZOOM};
use butterfly_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default cap on settled search states
pub const DEFAULT_MAX_SETTLED: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingConfig {
    /// Tile zoom level for new networks
    pub zoom: u8,
    /// Searches stop after settling this many (edge, vertex) states
    pub max_settled: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            max_settled: DEFAULT_MAX_SETTLED,
        }
    }
}

impl RoutingConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.zoom > MAX_ZOOM {
            return Err(Error::Config(format!(
                "zoom {} exceeds the maximum of {MAX_ZOOM}",
                self.zoom
            )));
        }
        if self.max_settled == 0 {
            return Err(Error::Config("max_settled must be positive".to_string()));
        }
        Ok(())
    }
}
