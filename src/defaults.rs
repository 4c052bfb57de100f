//! Default values for checkout-pool configuration.
//!
//! This module provides centralized default values used by the library and
//! the CLI, ensuring consistency and avoiding duplication.

use std::path::PathBuf;
use std::time::Duration;

/// Default number of checkouts that may exist at once.
pub const DEFAULT_MAX_CHECKOUTS: usize = 4;

/// Default delay between a checkout's last release and its removal.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Default `git fetch --depth`.
pub const DEFAULT_GIT_DEPTH: u32 = 1;

/// Default git executable, resolved through `PATH`.
pub const DEFAULT_GIT_PROGRAM: &str = "git";

/// Config file looked up in the current directory when none is given.
pub const CONFIG_FILE_NAME: &str = "checkout-pool.yaml";

/// Returns the default base directory for checkouts.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/checkout-pool` (XDG Base Directory)
/// - macOS: `~/Library/Caches/checkout-pool`
/// - Windows: `{FOLDERID_LocalAppData}\checkout-pool`
///
/// Falls back to `.checkout-pool` in the current directory if the
/// platform cache directory cannot be determined.
///
/// This can be overridden by the `--root` CLI flag, the
/// `CHECKOUT_POOL_ROOT` environment variable, or `base_dir` in the config file.
pub fn default_base_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".checkout-pool"))
        .join("checkout-pool")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_dir_returns_path() {
        let base_dir = default_base_dir();
        assert!(base_dir.ends_with("checkout-pool"));
    }

    #[test]
    fn test_default_base_dir_is_absolute_or_fallback() {
        let base_dir = default_base_dir();
        // Either absolute (normal case) or relative fallback
        assert!(
            base_dir.is_absolute() || base_dir.starts_with(".checkout-pool"),
            "Expected absolute path or fallback, got: {:?}",
            base_dir
        );
    }
}
