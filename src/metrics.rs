use std::sync::Arc;

use prometheus::{Counter, Gauge, Histogram, HistogramOpts, Opts, Registry};

/// Prometheus metrics for the search engine
#[derive(Clone)]
pub struct SearchMetrics {
    // Counters
    pub documents_indexed: Counter,
    pub documents_deleted: Counter,
    pub searches_total: Counter,
    pub search_errors: Counter,

    // Gauges
    pub total_documents: Gauge,

    // Histograms
    pub index_latency: Histogram,
    pub search_latency: Histogram,

    // Registry
    registry: Arc<Registry>,
}

impl SearchMetrics {
    /// Create a new SearchMetrics instance
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let documents_indexed = Counter::with_opts(Opts::new(
            "krill_documents_indexed_total",
            "Total number of documents indexed",
        ))?;
        registry.register(Box::new(documents_indexed.clone()))?;

        let documents_deleted = Counter::with_opts(Opts::new(
            "krill_documents_deleted_total",
            "Total number of documents deleted",
        ))?;
        registry.register(Box::new(documents_deleted.clone()))?;

        let searches_total = Counter::with_opts(Opts::new(
            "krill_searches_total",
            "Total number of searches",
        ))?;
        registry.register(Box::new(searches_total.clone()))?;

        let search_errors = Counter::with_opts(Opts::new(
            "krill_search_errors_total",
            "Total number of search errors",
        ))?;
        registry.register(Box::new(search_errors.clone()))?;

        let total_documents = Gauge::with_opts(Opts::new(
            "krill_total_documents",
            "Current number of documents in the index",
        ))?;
        registry.register(Box::new(total_documents.clone()))?;

        let index_latency = Histogram::with_opts(
            HistogramOpts::new("krill_index_latency_seconds", "Index operation latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(index_latency.clone()))?;

        let search_latency = Histogram::with_opts(
            HistogramOpts::new("krill_search_latency_seconds", "Search operation latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(search_latency.clone()))?;

        Ok(Self {
            documents_indexed,
            documents_deleted,
            searches_total,
            search_errors,
            total_documents,
            index_latency,
            search_latency,
            registry: Arc::new(registry),
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Record an index operation
    pub fn record_index(&self, duration_secs: f64) {
        self.documents_indexed.inc();
        self.index_latency.observe(duration_secs);
    }

    /// Record a delete operation
    pub fn record_delete(&self) {
        self.documents_deleted.inc();
    }

    /// Record a search operation
    pub fn record_search(&self, duration_secs: f64) {
        self.searches_total.inc();
        self.search_latency.observe(duration_secs);
    }

    /// Record a search error
    pub fn record_search_error(&self) {
        self.search_errors.inc();
    }

    /// Update total documents gauge
    pub fn set_total_documents(&self, count: u64) {
        self.total_documents.set(count as f64);
    }
}

impl Default for SearchMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let metrics = SearchMetrics::new().unwrap();
        metrics.record_index(0.002);
        metrics.record_index(0.004);
        metrics.record_delete();
        metrics.record_search(0.001);
        assert_eq!(metrics.documents_indexed.get() as u64, 2);
        assert_eq!(metrics.documents_deleted.get() as u64, 1);
        assert_eq!(metrics.searches_total.get() as u64, 1);
    }

    #[test]
    fn test_document_gauge() {
        let metrics = SearchMetrics::new().unwrap();
        metrics.set_total_documents(42);
        assert_eq!(metrics.total_documents.get() as u64, 42);
    }
}
