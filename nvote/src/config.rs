use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use common::{
    error::{Error, ErrorKind::WeightOverflow},
    secret_sharing::Params,
};

/// Polling policy for conditions that clear by waiting, e.g. not enough partials yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub interval_ms: u64,
    pub backoff_factor: u32,
    pub max_interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            backoff_factor: 2,
            max_interval_ms: 5_000,
            max_attempts: 20,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectionConfig {
    pub committee_size: usize,
    pub threshold: usize,
    /// Voter `i` is registered with `voting_weights[i]`.
    pub voting_weights: Vec<u64>,
    pub run_id: u64,
    pub retry: RetryConfig,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            committee_size: 3,
            threshold: 2,
            voting_weights: vec![1, 2, 3],
            run_id: 0,
            retry: RetryConfig::default(),
        }
    }
}

impl ElectionConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(json)?;
        config.params()?;
        config.total_weight()?;
        Ok(config)
    }

    pub fn params(&self) -> Result<Params, Error> {
        Params::new(self.committee_size, self.threshold)
    }

    pub fn voters(&self) -> usize {
        self.voting_weights.len()
    }

    pub fn total_weight(&self) -> Result<u64, Error> {
        self.voting_weights
            .iter()
            .try_fold(0u64, |acc, w| acc.checked_add(*w))
            .ok_or_else(|| WeightOverflow("voting_weights").into())
    }
}
