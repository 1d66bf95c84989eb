//! Semantic version helper shared by the `world`/`scene` CLI `--version` output.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SplashVersion {
    pub version: String,
    pub target: String,
}

impl SplashVersion {
    pub fn get() -> SplashVersion {
        SplashVersion {
            version: env!("CARGO_PKG_VERSION").to_string(),
            target: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }
}

impl fmt::Display for SplashVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.version, self.target)
    }
}
