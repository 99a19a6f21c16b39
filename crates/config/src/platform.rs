// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::env;

/// Environment variable that forces a host profile regardless of the
/// detected OS/architecture.
pub const FORCE_PLATFORM_ENV: &str = "LLM_FORCE_PLATFORM";

const APPLE_M3: &str = "apple_m3";

/// host capability profile.
///
/// A profile may recommend a capacity ceiling. That recommendation is only
/// applied when the configuration file leaves `max_loaded_models` unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    pub name: String,
    pub max_loaded_models: Option<u32>,
    pub unified_memory: bool,
}

impl PlatformProfile {
    /// Detect the profile for the current process, honouring
    /// [`FORCE_PLATFORM_ENV`].
    pub fn detect() -> Self {
        let forced = env::var(FORCE_PLATFORM_ENV).ok();
        Self::resolve(forced.as_deref(), env::consts::OS, env::consts::ARCH)
    }

    /// Pure resolution used by [`PlatformProfile::detect`].
    pub fn resolve(forced: Option<&str>, os: &str, arch: &str) -> Self {
        if let Some(forced) = forced.map(str::trim).filter(|f| !f.is_empty()) {
            let name = forced.to_lowercase();
            return match name.as_str() {
                "apple_m3" | "apple-m3" | "apple" => Self::apple_silicon(),
                _ => Self::generic(name),
            };
        }

        if os == "macos" && (arch == "aarch64" || arch.starts_with("arm")) {
            return Self::apple_silicon();
        }

        Self::generic(os.to_lowercase())
    }

    fn apple_silicon() -> Self {
        Self {
            name: APPLE_M3.to_string(),
            max_loaded_models: Some(1),
            unified_memory: true,
        }
    }

    fn generic(name: String) -> Self {
        Self {
            name,
            max_loaded_models: None,
            unified_memory: false,
        }
    }
}
