//! Compile-time build metadata reported by `zapgate version`.

use serde::Serialize;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = match option_env!("ZAPGATE_BUILD_COMMIT") {
    Some(c) => c,
    None => "unknown",
};

/// Version plus commit, e.g. `0.1.0 (abc1234)`.
pub fn version_string() -> String {
    format!("{VERSION} ({COMMIT})")
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub commit: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: VERSION,
            commit: COMMIT,
        }
    }
}
