//! Environment variable utilities
//!
//! Typed lookups with defaults, used by `PoolConfig::from_env`.
//!
//! ```ignore
//! use rksync_core::env::{env_get, env_get_bool, env_get_millis};
//!
//! let workers: usize = env_get("RKS_NUM_WORKERS", 4);
//! let debug = env_get_bool("RKS_DEBUG", false);
//! let park = env_get_millis("RKS_PARK_TIMEOUT_MS", 10);
//! ```

use std::str::FromStr;
use std::time::Duration;

/// Parse `key` as `T`, falling back to `default` when unset or malformed
#[inline]
pub fn env_get<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

/// Boolean lookup.
///
/// "1", "true", "yes" and "on" (any case) are true; "0", "false", "no"
/// and "off" are false; anything else yields `default`.
pub fn env_get_bool(key: &str, default: bool) -> bool {
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Millisecond duration lookup
#[inline]
pub fn env_get_millis(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_get(key, default_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test owns a distinct variable name; tests run in parallel.

    #[test]
    fn test_unset_returns_default() {
        let v: usize = env_get("__RKS_TEST_UNSET__", 7);
        assert_eq!(v, 7);
        assert!(env_get_bool("__RKS_TEST_UNSET__", true));
        assert_eq!(env_get_millis("__RKS_TEST_UNSET__", 25), Duration::from_millis(25));
    }

    #[test]
    fn test_parse_with_whitespace() {
        std::env::set_var("__RKS_TEST_NUM__", " 12 ");
        let v: usize = env_get("__RKS_TEST_NUM__", 0);
        assert_eq!(v, 12);
        std::env::remove_var("__RKS_TEST_NUM__");
    }

    #[test]
    fn test_malformed_returns_default() {
        std::env::set_var("__RKS_TEST_BAD__", "twelve");
        let v: u64 = env_get("__RKS_TEST_BAD__", 3);
        assert_eq!(v, 3);
        std::env::remove_var("__RKS_TEST_BAD__");
    }

    #[test]
    fn test_bool_spellings() {
        for (raw, expected) in [("1", true), ("ON", true), ("Yes", true), ("off", false), ("0", false)] {
            std::env::set_var("__RKS_TEST_BOOL__", raw);
            assert_eq!(env_get_bool("__RKS_TEST_BOOL__", !expected), expected, "{}", raw);
        }
        std::env::set_var("__RKS_TEST_BOOL__", "maybe");
        assert!(env_get_bool("__RKS_TEST_BOOL__", true));
        assert!(!env_get_bool("__RKS_TEST_BOOL__", false));
        std::env::remove_var("__RKS_TEST_BOOL__");
    }
}
