//! Settings loading.
//!
//! Values come from an optional `party-graph.toml` in the working directory,
//! an optional explicit file, then `PARTY_GRAPH__SECTION__KEY` environment
//! variables, in increasing priority.

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::graph::{ClusterConfig, NeighborConfig};
use crate::layout::LayoutConfig;

pub const DEFAULT_CONFIG_FILE: &str = "party-graph.toml";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub neighbors: NeighborConfig,

    #[serde(default)]
    pub clusters: ClusterConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub viewer: ViewerConfig,
}

/// Soft limits; exceeding them is logged, never fatal.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct BudgetConfig {
    #[serde(default = "default_warn_build_ms")]
    pub warn_build_ms: u64,

    #[serde(default = "default_warn_edge_count")]
    pub warn_edge_count: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            warn_build_ms: default_warn_build_ms(),
            warn_edge_count: default_warn_edge_count(),
        }
    }
}

fn default_warn_build_ms() -> u64 {
    1500
}

fn default_warn_edge_count() -> usize {
    20_000
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ViewerConfig {
    #[serde(default = "default_width")]
    pub width: f32,

    #[serde(default = "default_height")]
    pub height: f32,

    #[serde(default = "default_max_k")]
    pub max_k: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            max_k: default_max_k(),
        }
    }
}

fn default_width() -> f32 {
    1440.0
}

fn default_height() -> f32 {
    920.0
}

fn default_max_k() -> usize {
    12
}

/// `PARTY_GRAPH__NEIGHBORS__MAX_EVENTS=500` sets `neighbors.max_events`.
fn environment() -> Environment {
    Environment::with_prefix("PARTY_GRAPH")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            Config::builder().add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(environment())
            .build()
            .context("failed to read settings")?
            .try_deserialize::<Settings>()
            .context("invalid settings")?;

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.neighbors.k, 4);
        assert!((settings.neighbors.threshold - 0.15).abs() < f32::EPSILON);
        assert_eq!(settings.clusters.min_cluster_size, 2);
        assert_eq!(settings.budget.warn_build_ms, 1500);
        assert_eq!(settings.viewer.max_k, 12);
    }

    #[test]
    fn environment_overrides_nested_keys() {
        let variables = [
            ("PARTY_GRAPH__NEIGHBORS__K", "7"),
            ("PARTY_GRAPH__NEIGHBORS__MAX_EVENTS", "500"),
            ("PARTY_GRAPH__LAYOUT__CENTER_CLEANUP", "false"),
            ("PARTYGRAPH_NEIGHBORS_K", "9"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect::<config::Map<String, String>>();

        let settings = Config::builder()
            .add_source(environment().source(Some(variables)))
            .build()
            .unwrap()
            .try_deserialize::<Settings>()
            .unwrap();

        assert_eq!(settings.neighbors.k, 7);
        assert_eq!(settings.neighbors.max_events, 500);
        assert!(!settings.layout.center_cleanup);
        assert_eq!(settings.clusters, ClusterConfig::default());
    }

    #[test]
    fn partial_sections_fall_back_to_defaults() {
        let settings = Config::builder()
            .add_source(File::from_str(
                "[neighbors]\nk = 7\n\n[layout]\ncenter_cleanup = false\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize::<Settings>()
            .unwrap();

        assert_eq!(settings.neighbors.k, 7);
        assert_eq!(settings.neighbors.max_events, 2000);
        assert!(!settings.layout.center_cleanup);
        assert_eq!(settings.layout.iterations, 300);
        assert_eq!(settings.budget, BudgetConfig::default());
    }
}
