use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use crate::generator::DecodePolicy;

/// Simulator configuration loaded from `APPSIM_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Generation
    pub dataset: PathBuf,
    pub count: usize,
    pub decode: DecodePolicy,
    pub model_path: Option<PathBuf>,
    pub inference_timeout: Duration,

    // Target app
    pub target_url: Option<String>,
    pub target_token: Option<String>,
    pub dispatch_timeout: Duration,

    // Output
    pub run_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let explicit = var("APPSIM_DECODE")
            .map(|s| {
                s.parse::<DecodePolicy>()
                    .map_err(|e| anyhow!("APPSIM_DECODE: {e}"))
            })
            .transpose()?;
        let seed = var("APPSIM_SEED")
            .map(|s| s.trim().parse::<u64>().context("APPSIM_SEED must be a number"))
            .transpose()?;
        let decode = resolve_decode(explicit, seed, DecodePolicy::ArgMax);

        Ok(Self {
            dataset: var("APPSIM_DATASET")
                .unwrap_or_else(|| "user_interactions.csv".to_string())
                .into(),
            count: parse_or(var("APPSIM_COUNT"), 10, "APPSIM_COUNT")?,
            decode,
            model_path: var("APPSIM_MODEL_PATH").map(PathBuf::from),
            inference_timeout: Duration::from_millis(parse_or(
                var("APPSIM_INFERENCE_TIMEOUT_MS"),
                5000,
                "APPSIM_INFERENCE_TIMEOUT_MS",
            )?),
            target_url: var("APPSIM_TARGET_URL"),
            target_token: var("APPSIM_TARGET_TOKEN"),
            dispatch_timeout: Duration::from_millis(parse_or(
                var("APPSIM_DISPATCH_TIMEOUT_MS"),
                5000,
                "APPSIM_DISPATCH_TIMEOUT_MS",
            )?),
            run_dir: var("APPSIM_RUN_DIR").map(PathBuf::from),
        })
    }

    /// Log the effective settings with secrets masked.
    pub fn log_redacted(&self) {
        let model = match &self.model_path {
            Some(p) => p.display().to_string(),
            None => "markov".to_string(),
        };
        let run_dir = match &self.run_dir {
            Some(p) => p.display().to_string(),
            None => "[none]".to_string(),
        };
        let token = if self.target_token.is_some() {
            "[REDACTED]"
        } else {
            "[unset]"
        };
        info!(
            dataset = %self.dataset.display(),
            count = self.count,
            decode = %self.decode,
            model = model.as_str(),
            target = self.target_url.as_deref().unwrap_or("simulated"),
            target_token = token,
            inference_timeout_ms = self.inference_timeout.as_millis() as u64,
            dispatch_timeout_ms = self.dispatch_timeout.as_millis() as u64,
            run_dir = run_dir.as_str(),
            "Configuration"
        );
    }
}

/// Combine an explicitly chosen policy with an explicit seed. A seed on its
/// own selects seeded sampling; next to an explicit `argmax` it is ignored.
pub fn resolve_decode(
    explicit: Option<DecodePolicy>,
    seed: Option<u64>,
    current: DecodePolicy,
) -> DecodePolicy {
    match (explicit, seed) {
        (Some(DecodePolicy::ArgMax), Some(seed)) => {
            warn!(seed, "Seed ignored because the decode policy is argmax");
            DecodePolicy::ArgMax
        }
        (_, Some(seed)) => DecodePolicy::Sample { seed },
        (Some(policy), None) => policy,
        (None, None) => current,
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T, key: &str) -> Result<T> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| anyhow!("{key} must be a number, got '{v}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let c = config(&[]).unwrap();
        assert_eq!(c.dataset, PathBuf::from("user_interactions.csv"));
        assert_eq!(c.count, 10);
        assert_eq!(c.decode, DecodePolicy::ArgMax);
        assert!(c.model_path.is_none());
        assert!(c.target_url.is_none());
        assert_eq!(c.inference_timeout, Duration::from_secs(5));
    }

    #[test]
    fn sample_policy_takes_seed() {
        let c = config(&[("APPSIM_DECODE", "sample"), ("APPSIM_SEED", "77")]).unwrap();
        assert_eq!(c.decode, DecodePolicy::Sample { seed: 77 });
    }

    #[test]
    fn seed_alone_selects_sampling() {
        let c = config(&[("APPSIM_SEED", "77")]).unwrap();
        assert_eq!(c.decode, DecodePolicy::Sample { seed: 77 });
    }

    #[test]
    fn seed_ignored_next_to_explicit_argmax() {
        let c = config(&[("APPSIM_DECODE", "argmax"), ("APPSIM_SEED", "77")]).unwrap();
        assert_eq!(c.decode, DecodePolicy::ArgMax);
    }

    #[test]
    fn flag_seed_overrides_configured_policy() {
        // --seed without --decode on top of an env-configured policy
        let from_env = DecodePolicy::Sample { seed: 3 };
        assert_eq!(
            resolve_decode(None, Some(9), from_env),
            DecodePolicy::Sample { seed: 9 }
        );
        assert_eq!(
            resolve_decode(None, Some(9), DecodePolicy::ArgMax),
            DecodePolicy::Sample { seed: 9 }
        );
        assert_eq!(resolve_decode(None, None, from_env), from_env);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let c = config(&[("APPSIM_TARGET_URL", "  ")]).unwrap();
        assert!(c.target_url.is_none());
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(config(&[("APPSIM_COUNT", "many")]).is_err());
        assert!(config(&[("APPSIM_DECODE", "greedy")]).is_err());
        assert!(config(&[("APPSIM_DECODE", "sample"), ("APPSIM_SEED", "x")]).is_err());
    }
}
