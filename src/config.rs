//! Routing configuration.
//!
//! Every knob is runtime-mutable: the embedding system exposes them on its
//! admin surface and operators flip them while queries are in flight.
//! Readers therefore go through lock-free getters and must tolerate a value
//! changing between two reads of the same knob.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;

/// Strategy used to derive the query class from a logical plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierStrategy {
    /// Walk the plan tree and fingerprint its operator structure.
    StructuralShuttle,
    /// Replace literals with positional parameters and use the canonical
    /// plan string, so plans differing only in constants share a class.
    Parameterizer,
}

/// Configuration for the adaptive router.
#[derive(Debug)]
pub struct RouterConfig {
    /// Whether the routing table is adjusted according to measured execution
    /// times. When false, no feedback is emitted and the table freezes in
    /// its current state.
    training: AtomicBool,
    /// Size of the moving average on the execution times per query class,
    /// retained by the monitoring service.
    window_size: AtomicUsize,
    /// How much slower (percent of the fastest time) an adapter may be and
    /// still be considered for short-running queries. Zero keeps only the
    /// fastest adapter.
    short_running_similar_threshold: AtomicU32,
    /// Same band for long-running queries.
    long_running_similar_threshold: AtomicU32,
    /// Minimal execution time (ms) for a query to count as long-running.
    short_running_long_running_threshold_ms: AtomicU64,
    /// Query class derivation strategy.
    classifier: RwLock<ClassifierStrategy>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            training: AtomicBool::new(true),
            window_size: AtomicUsize::new(25),
            short_running_similar_threshold: AtomicU32::new(0),
            long_running_similar_threshold: AtomicU32::new(0),
            short_running_long_running_threshold_ms: AtomicU64::new(1000),
            classifier: RwLock::new(ClassifierStrategy::Parameterizer),
        }
    }
}

impl RouterConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the training flag at construction time.
    pub fn with_training(self, enabled: bool) -> Self {
        self.training.store(enabled, Ordering::Relaxed);
        self
    }

    /// Set the moving-average window at construction time.
    pub fn with_window_size(self, size: usize) -> Self {
        self.window_size.store(size, Ordering::Relaxed);
        self
    }

    /// Set the short-running similarity band at construction time.
    pub fn with_short_running_similar_threshold(self, percent: u32) -> Self {
        self.short_running_similar_threshold
            .store(percent, Ordering::Relaxed);
        self
    }

    /// Set the long-running similarity band at construction time.
    pub fn with_long_running_similar_threshold(self, percent: u32) -> Self {
        self.long_running_similar_threshold
            .store(percent, Ordering::Relaxed);
        self
    }

    /// Set the short/long regime boundary at construction time.
    pub fn with_short_running_long_running_threshold_ms(self, ms: u64) -> Self {
        self.short_running_long_running_threshold_ms
            .store(ms, Ordering::Relaxed);
        self
    }

    /// Set the classifier strategy at construction time.
    pub fn with_classifier(self, strategy: ClassifierStrategy) -> Self {
        *self.classifier.write() = strategy;
        self
    }

    pub fn training(&self) -> bool {
        self.training.load(Ordering::Relaxed)
    }

    pub fn set_training(&self, enabled: bool) {
        self.training.store(enabled, Ordering::Relaxed);
    }

    pub fn window_size(&self) -> usize {
        self.window_size.load(Ordering::Relaxed)
    }

    pub fn set_window_size(&self, size: usize) {
        self.window_size.store(size, Ordering::Relaxed);
    }

    pub fn short_running_similar_threshold(&self) -> u32 {
        self.short_running_similar_threshold.load(Ordering::Relaxed)
    }

    pub fn set_short_running_similar_threshold(&self, percent: u32) {
        self.short_running_similar_threshold
            .store(percent, Ordering::Relaxed);
    }

    pub fn long_running_similar_threshold(&self) -> u32 {
        self.long_running_similar_threshold.load(Ordering::Relaxed)
    }

    pub fn set_long_running_similar_threshold(&self, percent: u32) {
        self.long_running_similar_threshold
            .store(percent, Ordering::Relaxed);
    }

    pub fn short_running_long_running_threshold_ms(&self) -> u64 {
        self.short_running_long_running_threshold_ms
            .load(Ordering::Relaxed)
    }

    pub fn set_short_running_long_running_threshold_ms(&self, ms: u64) {
        self.short_running_long_running_threshold_ms
            .store(ms, Ordering::Relaxed);
    }

    /// The short/long regime boundary in nanoseconds.
    pub fn short_running_long_running_threshold_nanos(&self) -> u64 {
        self.short_running_long_running_threshold_ms() * 1_000_000
    }

    pub fn classifier(&self) -> ClassifierStrategy {
        *self.classifier.read()
    }

    pub fn set_classifier(&self, strategy: ClassifierStrategy) {
        *self.classifier.write() = strategy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RouterConfig::default();
        assert!(config.training());
        assert_eq!(config.window_size(), 25);
        assert_eq!(config.short_running_similar_threshold(), 0);
        assert_eq!(config.long_running_similar_threshold(), 0);
        assert_eq!(config.short_running_long_running_threshold_ms(), 1000);
        assert_eq!(config.classifier(), ClassifierStrategy::Parameterizer);
    }

    #[test]
    fn test_config_builder() {
        let config = RouterConfig::new()
            .with_short_running_similar_threshold(150)
            .with_window_size(10)
            .with_classifier(ClassifierStrategy::StructuralShuttle);

        assert_eq!(config.short_running_similar_threshold(), 150);
        assert_eq!(config.window_size(), 10);
        assert_eq!(config.classifier(), ClassifierStrategy::StructuralShuttle);
    }

    #[test]
    fn test_config_runtime_mutation() {
        let config = RouterConfig::default();
        config.set_training(false);
        config.set_short_running_long_running_threshold_ms(250);

        assert!(!config.training());
        assert_eq!(config.short_running_long_running_threshold_nanos(), 250_000_000);
    }
}
