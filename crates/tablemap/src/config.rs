//! Process-wide settings.
//!
//! # Environment Variables
//!
//! - `TABLEMAP_STATEMENT_CACHE_SIZE`: maximum entries per statement cache
//!   (default 500). Read once, the first time a cache size is needed.
//!
//! Generic binding mode is switched at runtime with
//! [`set_generic_binding_mode`].

use std::env;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Environment variable holding the statement cache bound.
pub const STATEMENT_CACHE_SIZE_ENV: &str = "TABLEMAP_STATEMENT_CACHE_SIZE";

/// Cache bound used when the environment does not set one.
pub const DEFAULT_STATEMENT_CACHE_SIZE: usize = 500;

static GENERIC_BINDING: AtomicBool = AtomicBool::new(false);

static STATEMENT_CACHE_SIZE: LazyLock<usize> = LazyLock::new(|| {
    let configured = env::var(STATEMENT_CACHE_SIZE_ENV).ok();
    parse_cache_size(configured.as_deref())
});

/// Bind every non-NULL parameter untyped and let the driver infer its type.
///
/// Meant for drivers whose typed binding rejects values the database would
/// accept. Affects all writers in the process.
pub fn set_generic_binding_mode(enabled: bool) {
    GENERIC_BINDING.store(enabled, Ordering::Relaxed);
    tracing::debug!(enabled, "Generic binding mode changed");
}

/// Check if generic binding mode is enabled.
#[must_use]
pub fn generic_binding_mode() -> bool {
    GENERIC_BINDING.load(Ordering::Relaxed)
}

/// Maximum entries kept by each statement cache.
#[must_use]
pub fn statement_cache_size() -> usize {
    *STATEMENT_CACHE_SIZE
}

fn parse_cache_size(configured: Option<&str>) -> usize {
    match configured.map(str::trim) {
        None | Some("") => DEFAULT_STATEMENT_CACHE_SIZE,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(
                value = raw,
                default = DEFAULT_STATEMENT_CACHE_SIZE,
                "Ignoring invalid {STATEMENT_CACHE_SIZE_ENV}"
            );
            DEFAULT_STATEMENT_CACHE_SIZE
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cache_size() {
        assert_eq!(parse_cache_size(None), 500);
        assert_eq!(parse_cache_size(Some("")), 500);
        assert_eq!(parse_cache_size(Some(" 64 ")), 64);
        assert_eq!(parse_cache_size(Some("0")), 0);
        assert_eq!(parse_cache_size(Some("lots")), 500);
        assert_eq!(parse_cache_size(Some("-3")), 500);
    }

    #[test]
    fn test_statement_cache_size_is_stable() {
        assert_eq!(statement_cache_size(), statement_cache_size());
    }
}
