//! Environment-variable configuration.
//!
//! | Variable | Default | Constraint |
//! |---|---|---|
//! | `KEYWIRE_API_KEY` | (none, required) | non-empty |
//! | `KEYWIRE_A` | 2 | `>= 2` |
//! | `KEYWIRE_B` | 3 | `>= 2a - 1` |
//! | `KEYWIRE_PORT` | 3000 | valid u16 |
//!
//! Validation happens up front so a misconfigured server never opens its
//! listener.

use crate::errors::ConfigError;

/// Variable holding the shared secret.
pub const ENV_API_KEY: &str = "KEYWIRE_API_KEY";
/// Variable holding the tree's lower fan-out bound `a`.
pub const ENV_TREE_MIN: &str = "KEYWIRE_A";
/// Variable holding the tree's upper fan-out bound `b`.
pub const ENV_TREE_MAX: &str = "KEYWIRE_B";
/// Variable holding the listening port.
pub const ENV_PORT: &str = "KEYWIRE_PORT";

const DEFAULT_TREE_MIN: usize = 2;
const DEFAULT_TREE_MAX: usize = 3;
const DEFAULT_PORT: u16 = 3000;

/// Validated server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Shared secret compared byte-for-byte with `AuthRequest` keys.
    pub api_key: String,
    /// Tree lower fan-out bound `a`.
    pub tree_min: usize,
    /// Tree upper fan-out bound `b`.
    pub tree_max: usize,
    /// TCP listening port; `0` lets the OS pick (useful in tests).
    pub port: u16,
}

impl ServerConfig {
    /// Load and validate configuration from the process environment.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] naming the offending variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Separated from [`Self::from_env`] so tests can validate without
    /// mutating process-global state.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] naming the offending variable.
    pub fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let api_key = lookup(ENV_API_KEY)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::Missing(ENV_API_KEY))?;

        let tree_min = parse_or(&lookup, ENV_TREE_MIN, DEFAULT_TREE_MIN, "an integer")?;
        let tree_max = parse_or(&lookup, ENV_TREE_MAX, DEFAULT_TREE_MAX, "an integer")?;
        if tree_min < 2 || tree_max < 2 * tree_min - 1 {
            return Err(ConfigError::InvalidTreeBounds { min: tree_min, max: tree_max });
        }

        let port = parse_or(&lookup, ENV_PORT, DEFAULT_PORT, "a port in [0, 65535]")?;

        Ok(Self { api_key, tree_min, tree_max, port })
    }
}

fn parse_or<N: std::str::FromStr>(
    lookup: impl Fn(&'static str) -> Option<String>,
    name: &'static str,
    default: N,
    expected: &'static str,
) -> Result<N, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, expected, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(name, value)| (*name, (*value).to_owned())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_secret_is_set() {
        let config = ServerConfig::from_lookup(lookup_from(&[(ENV_API_KEY, "secret")]))
            .expect("valid configuration");
        assert_eq!(
            config,
            ServerConfig { api_key: "secret".into(), tree_min: 2, tree_max: 3, port: 3000 }
        );
    }

    #[test]
    fn missing_secret_is_rejected() {
        assert_eq!(
            ServerConfig::from_lookup(lookup_from(&[])),
            Err(ConfigError::Missing(ENV_API_KEY))
        );
        assert_eq!(
            ServerConfig::from_lookup(lookup_from(&[(ENV_API_KEY, "")])),
            Err(ConfigError::Missing(ENV_API_KEY))
        );
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            (ENV_API_KEY, "secret"),
            (ENV_TREE_MIN, "3"),
            (ENV_TREE_MAX, "6"),
            (ENV_PORT, "4100"),
        ]))
        .expect("valid configuration");
        assert_eq!(config.tree_min, 3);
        assert_eq!(config.tree_max, 6);
        assert_eq!(config.port, 4100);
    }

    #[test]
    fn non_integer_values_are_rejected() {
        let result = ServerConfig::from_lookup(lookup_from(&[
            (ENV_API_KEY, "secret"),
            (ENV_TREE_MIN, "two"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { name: ENV_TREE_MIN, .. })));

        let result = ServerConfig::from_lookup(lookup_from(&[
            (ENV_API_KEY, "secret"),
            (ENV_PORT, "70000"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { name: ENV_PORT, .. })));
    }

    #[test]
    fn unbalanced_tree_bounds_are_rejected() {
        let result = ServerConfig::from_lookup(lookup_from(&[
            (ENV_API_KEY, "secret"),
            (ENV_TREE_MIN, "1"),
        ]));
        assert_eq!(result, Err(ConfigError::InvalidTreeBounds { min: 1, max: 3 }));

        let result = ServerConfig::from_lookup(lookup_from(&[
            (ENV_API_KEY, "secret"),
            (ENV_TREE_MIN, "3"),
            (ENV_TREE_MAX, "4"),
        ]));
        assert_eq!(result, Err(ConfigError::InvalidTreeBounds { min: 3, max: 4 }));
    }
}
