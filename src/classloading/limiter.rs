//! Per-loader activity counters
//!
//! Counts resource opens and unit loads for each loader name, so tests and
//! diagnostics can assert that expensive resources are not read repeatedly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use super::listener::LoaderEventListener;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimiterError {
    #[error("loader name '{name}' has not been observed; valid names: {known:?}")]
    UnknownLoader { name: String, known: Vec<String> },
}

#[derive(Debug, Default)]
struct PerLoaderStats {
    opened_resources: DashMap<String, AtomicUsize>,
    loaded_units: DashMap<String, AtomicUsize>,
}

fn increment(counters: &DashMap<String, AtomicUsize>, name: &str) {
    if let Some(counter) = counters.get(name) {
        counter.fetch_add(1, Ordering::Relaxed);
        return;
    }
    counters
        .entry(name.to_string())
        .or_default()
        .fetch_add(1, Ordering::Relaxed);
}

fn count(counters: &DashMap<String, AtomicUsize>, name: &str) -> usize {
    counters
        .get(name)
        .map(|counter| counter.load(Ordering::Relaxed))
        .unwrap_or(0)
}

/// Listener recording per-loader resource and unit statistics
#[derive(Debug, Default)]
pub struct LoaderLimiter {
    stats: DashMap<String, Arc<PerLoaderStats>>,
}

impl LoaderLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn stats_for(&self, loader_name: &str) -> Arc<PerLoaderStats> {
        if let Some(stats) = self.stats.get(loader_name) {
            return Arc::clone(stats.value());
        }
        Arc::clone(self.stats.entry(loader_name.to_string()).or_default().value())
    }

    fn observed(&self, loader_name: &str) -> Result<Arc<PerLoaderStats>, LimiterError> {
        self.stats
            .get(loader_name)
            .map(|stats| Arc::clone(stats.value()))
            .ok_or_else(|| LimiterError::UnknownLoader {
                name: loader_name.to_string(),
                known: self.observed_loaders(),
            })
    }

    /// Times `resource_name` was opened through `loader_name`
    pub fn resource_open_count(
        &self,
        loader_name: &str,
        resource_name: &str,
    ) -> Result<usize, LimiterError> {
        Ok(count(&self.observed(loader_name)?.opened_resources, resource_name))
    }

    /// Times loading `unit_name` was requested from `loader_name`
    pub fn unit_load_count(
        &self,
        loader_name: &str,
        unit_name: &str,
    ) -> Result<usize, LimiterError> {
        Ok(count(&self.observed(loader_name)?.loaded_units, unit_name))
    }

    /// Loader names seen so far, sorted
    pub fn observed_loaders(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stats.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}

impl LoaderEventListener for LoaderLimiter {
    fn open_resource_stream(&self, resource_name: &str, loader_name: &str) {
        increment(&self.stats_for(loader_name).opened_resources, resource_name);
    }

    fn load_unit(&self, unit_name: &str, loader_name: &str) {
        increment(&self.stats_for(loader_name).loaded_units, unit_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_loader() {
        let limiter = LoaderLimiter::new();
        limiter.open_resource_stream("META-INF/services/x", "gen-1");
        limiter.open_resource_stream("META-INF/services/x", "gen-1");
        limiter.open_resource_stream("META-INF/services/x", "gen-2");
        limiter.load_unit("org.example.A", "gen-1");

        assert_eq!(limiter.resource_open_count("gen-1", "META-INF/services/x"), Ok(2));
        assert_eq!(limiter.resource_open_count("gen-2", "META-INF/services/x"), Ok(1));
        assert_eq!(limiter.resource_open_count("gen-2", "other"), Ok(0));
        assert_eq!(limiter.unit_load_count("gen-1", "org.example.A"), Ok(1));
    }

    #[test]
    fn test_unknown_loader_lists_observed_names() {
        let limiter = LoaderLimiter::new();
        limiter.load_unit("a", "gen-2");
        limiter.load_unit("a", "gen-1");

        let err = limiter.resource_open_count("gen-3", "x").unwrap_err();
        assert_eq!(
            err,
            LimiterError::UnknownLoader {
                name: "gen-3".to_string(),
                known: vec!["gen-1".to_string(), "gen-2".to_string()],
            }
        );
    }

    #[test]
    fn test_other_hooks_are_ignored() {
        let limiter = LoaderLimiter::new();
        limiter.enumerating_resource_urls("x", "gen-1");
        limiter.getting_url_from_resource("x", "gen-1");
        assert!(limiter.observed_loaders().is_empty());
    }
}
