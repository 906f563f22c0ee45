use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filters::Filter;
use crate::multicut::{SolveOptions, Solver};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Offsets and filters are mutually exclusive in one run")]
    OffsetsAndFilters,
    #[error("Filters require sigma values")]
    SigmasRequired,
    #[error("Sigmas given without filters")]
    SigmasWithoutFilters,
    #[error("Cannot pair {n_filters} filters with {n_sigmas} sigmas")]
    FilterSigmaArity { n_filters: usize, n_sigmas: usize },
    #[error("Offset list must not be empty")]
    EmptyOffsets,
    #[error("Filter list must not be empty")]
    EmptyFilters,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccumulationMode {
    /// Statistics straight off a dense 3-D boundary map.
    Boundary,
    /// Per-offset statistics off a 4-D affinity stack.
    Affinity,
    /// Statistics off dense filter responses, one channel per (filter, sigma).
    Filtered,
}

/// Immutable per-run feature configuration, passed explicitly into every
/// accumulation call. Feature dimensionality is a pure function of this value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offsets: Option<Vec<[i64; 3]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigmas: Option<Vec<f64>>,
    #[serde(default)]
    pub halo: [usize; 3],
    pub block_shape: [usize; 3],
}

impl FeatureConfig {
    pub fn boundary(block_shape: [usize; 3]) -> Self {
        Self {
            block_shape,
            ..Self::default()
        }
    }

    pub fn affinity(block_shape: [usize; 3], offsets: Vec<[i64; 3]>) -> Self {
        Self {
            offsets: Some(offsets),
            block_shape,
            ..Self::default()
        }
    }

    pub fn filtered(
        block_shape: [usize; 3],
        filters: Vec<Filter>,
        sigmas: Vec<f64>,
        halo: [usize; 3],
    ) -> Self {
        Self {
            filters: Some(filters),
            sigmas: Some(sigmas),
            halo,
            block_shape,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.offsets.is_some() && self.filters.is_some() {
            return Err(ConfigError::OffsetsAndFilters);
        }
        if let Some(offsets) = &self.offsets {
            if offsets.is_empty() {
                return Err(ConfigError::EmptyOffsets);
            }
        }
        match (&self.filters, &self.sigmas) {
            (Some(filters), Some(sigmas)) => {
                if filters.is_empty() {
                    return Err(ConfigError::EmptyFilters);
                }
                let paired = filters.len() == sigmas.len()
                    || filters.len() == 1
                    || sigmas.len() == 1;
                if !paired || sigmas.is_empty() {
                    return Err(ConfigError::FilterSigmaArity {
                        n_filters: filters.len(),
                        n_sigmas: sigmas.len(),
                    });
                }
            }
            (Some(_), None) => return Err(ConfigError::SigmasRequired),
            (None, Some(_)) => return Err(ConfigError::SigmasWithoutFilters),
            (None, None) => {}
        }
        Ok(())
    }

    pub fn mode(&self) -> AccumulationMode {
        if self.offsets.is_some() {
            AccumulationMode::Affinity
        } else if self.filters.is_some() {
            AccumulationMode::Filtered
        } else {
            AccumulationMode::Boundary
        }
    }

    /// The (filter, sigma) channel list: zipped at equal arity, otherwise the
    /// single-element side is broadcast.
    pub fn filter_pairs(&self) -> ConfigResult<Vec<(Filter, f64)>> {
        self.validate()?;
        let (filters, sigmas) = match (&self.filters, &self.sigmas) {
            (Some(f), Some(s)) => (f, s),
            _ => return Ok(Vec::new()),
        };
        let pairs = if filters.len() == sigmas.len() {
            filters.iter().copied().zip(sigmas.iter().copied()).collect()
        } else if filters.len() == 1 {
            sigmas.iter().map(|&s| (filters[0], s)).collect()
        } else {
            filters.iter().map(|&f| (f, sigmas[0])).collect()
        };
        Ok(pairs)
    }

    /// Number of accumulation channels for this configuration.
    pub fn n_channels(&self) -> ConfigResult<usize> {
        self.validate()?;
        Ok(match self.mode() {
            AccumulationMode::Boundary => 1,
            AccumulationMode::Affinity => self.offsets.as_ref().map(Vec::len).unwrap_or(0),
            AccumulationMode::Filtered => self.filter_pairs()?.len(),
        })
    }
}

fn default_n_threads() -> usize {
    1
}

/// Solver selection: a name plus the shared solve options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub solver: Solver,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<f64>,
    #[serde(default = "default_n_threads")]
    pub n_threads: usize,
}

impl SolverConfig {
    pub fn options(&self) -> SolveOptions {
        SolveOptions {
            time_limit: self.time_limit.map(Duration::from_secs_f64),
            n_threads: self.n_threads,
            ..SolveOptions::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    pub fn from_file_name(file_name: &str) -> anyhow::Result<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(anyhow::anyhow!(
                "Unsupported file extension for file: {}",
                file_name
            )),
        }
    }
}

pub fn load_config<T: DeserializeOwned + 'static>(path: &str) -> anyhow::Result<T> {
    let format = FileFormat::from_file_name(path)?;
    let serialized = std::fs::read_to_string(path)?;
    let config = match format {
        FileFormat::Yaml => serde_yml::from_str(&serialized)?,
        FileFormat::Json => serde_json::from_str(&serialized)?,
    };
    Ok(config)
}
