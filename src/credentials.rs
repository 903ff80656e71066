//! Credential resolution
//!
//! Credentials are picked by walking an ordered list of resolvers and taking
//! the first one that produces a result:
//!
//! 1. an explicit access/secret pair on the [`FetcherConfig`]
//! 2. `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY` (or the legacy
//!    `AWS_ACCESS_KEY`/`AWS_SECRET_KEY`) in the process environment
//! 3. anonymous, unsigned requests
//!
//! Resolvers are pure functions of the config and an environment lookup, so
//! the chain can be tested without touching the real process environment.

use std::fmt;

use crate::config::FetcherConfig;

/// Environment variable lookup
pub type EnvLookup = dyn Fn(&str) -> Option<String>;

/// A single step in the credential chain
pub type CredentialResolver = fn(&FetcherConfig, &EnvLookup) -> Option<Credentials>;

/// Resolvers in priority order
pub const RESOLVERS: &[CredentialResolver] = &[explicit, environment, anonymous];

/// Access key material
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("access_key", &self.access_key)
            .field("secret_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}

/// Resolved credentials, tagged with where they came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Explicit(KeyPair),
    Environment(KeyPair),
    Anonymous,
}

impl Credentials {
    pub fn key_pair(&self) -> Option<&KeyPair> {
        match self {
            Credentials::Explicit(pair) | Credentials::Environment(pair) => Some(pair),
            Credentials::Anonymous => None,
        }
    }

    /// Short label for logging
    pub fn source(&self) -> &'static str {
        match self {
            Credentials::Explicit(_) => "explicit",
            Credentials::Environment(_) => "environment",
            Credentials::Anonymous => "anonymous",
        }
    }
}

/// Walk the resolver chain
pub fn resolve(config: &FetcherConfig, env: &EnvLookup) -> Credentials {
    RESOLVERS
        .iter()
        .find_map(|resolver| resolver(config, env))
        .unwrap_or(Credentials::Anonymous)
}

/// Reads the real process environment
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Caller-supplied pair. The access key decides; an absent secret is sent as empty.
pub fn explicit(config: &FetcherConfig, _env: &EnvLookup) -> Option<Credentials> {
    let access_key = non_empty(config.access_key.clone())?;
    Some(Credentials::Explicit(KeyPair {
        access_key,
        secret_key: config.secret_key.clone().unwrap_or_default(),
        session_token: None,
    }))
}

pub fn environment(_config: &FetcherConfig, env: &EnvLookup) -> Option<Credentials> {
    let access_key =
        non_empty(env("AWS_ACCESS_KEY_ID")).or_else(|| non_empty(env("AWS_ACCESS_KEY")))?;
    let secret_key = non_empty(env("AWS_SECRET_ACCESS_KEY"))
        .or_else(|| non_empty(env("AWS_SECRET_KEY")))
        .unwrap_or_default();
    Some(Credentials::Environment(KeyPair {
        access_key,
        secret_key,
        session_token: non_empty(env("AWS_SESSION_TOKEN")),
    }))
}

pub fn anonymous(_config: &FetcherConfig, _env: &EnvLookup) -> Option<Credentials> {
    Some(Credentials::Anonymous)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_explicit_wins_over_environment() {
        let config = FetcherConfig::new("b", "k").with_credentials("AKIAEXPLICIT", "s3cret");
        let env = env_from(&[
            ("AWS_ACCESS_KEY_ID", "AKIAENV"),
            ("AWS_SECRET_ACCESS_KEY", "envsecret"),
        ]);

        let creds = resolve(&config, &env);
        assert_eq!(creds.source(), "explicit");
        assert_eq!(creds.key_pair().unwrap().access_key, "AKIAEXPLICIT");
        assert_eq!(creds.key_pair().unwrap().secret_key, "s3cret");
    }

    #[test]
    fn test_environment_when_no_explicit_pair() {
        let config = FetcherConfig::new("b", "k");
        let env = env_from(&[
            ("AWS_ACCESS_KEY_ID", "AKIAENV"),
            ("AWS_SECRET_ACCESS_KEY", "envsecret"),
            ("AWS_SESSION_TOKEN", "token"),
        ]);

        let creds = resolve(&config, &env);
        assert_eq!(
            creds,
            Credentials::Environment(KeyPair {
                access_key: "AKIAENV".into(),
                secret_key: "envsecret".into(),
                session_token: Some("token".into()),
            })
        );
    }

    #[test]
    fn test_legacy_environment_names() {
        let config = FetcherConfig::new("b", "k");
        let env = env_from(&[("AWS_ACCESS_KEY", "AKIALEGACY"), ("AWS_SECRET_KEY", "legacy")]);

        let pair = resolve(&config, &env).key_pair().cloned().unwrap();
        assert_eq!(pair.access_key, "AKIALEGACY");
        assert_eq!(pair.secret_key, "legacy");
        assert_eq!(pair.session_token, None);
    }

    #[test]
    fn test_empty_values_are_skipped() {
        let mut config = FetcherConfig::new("b", "k");
        config.access_key = Some(String::new());
        let env = env_from(&[("AWS_ACCESS_KEY_ID", "")]);

        assert_eq!(resolve(&config, &env), Credentials::Anonymous);
    }

    #[test]
    fn test_anonymous_fallback() {
        let config = FetcherConfig::new("b", "k");
        assert_eq!(resolve(&config, &env_from(&[])), Credentials::Anonymous);
        assert!(Credentials::Anonymous.key_pair().is_none());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = FetcherConfig::new("b", "k").with_credentials("AKIA", "topsecret");
        let rendered = format!("{:?}", resolve(&config, &env_from(&[])));
        assert!(rendered.contains("AKIA"));
        assert!(!rendered.contains("topsecret"));
    }
}
