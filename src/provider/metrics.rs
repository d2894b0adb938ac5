//! Prometheus metrics exposed by a [`Provider`](super::Provider).

use super::Cache;
use prometheus_client::collector::Collector;
use prometheus_client::encoding::{DescriptorEncoder, EncodeLabelSet, EncodeMetric};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::metrics::MetricType;
use prometheus_client::registry::Registry;

/// Labels of the per-specification results gauge.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResultLabels {
    /// The specification exactly as it was submitted.
    pub addr: String,
}

/// Provider metrics.
///
/// Cloning shares the underlying counters, so a clone registered elsewhere
/// observes the same values.
#[derive(Debug, Clone, Default)]
pub struct ProviderMetrics {
    lookups: Counter,
    failures: Counter,
}

impl ProviderMetrics {
    /// Registers every metric with `registry`.
    ///
    /// The per-specification results gauge is read from `cache` at scrape
    /// time, so its series are always those of one published snapshot.
    pub fn register(&self, registry: &mut Registry, cache: &Cache) {
        registry.register_collector(Box::new(ResultsCollector {
            cache: cache.clone(),
        }));
        registry.register(
            "dns_lookups",
            "The number of DNS lookups resolutions attempts",
            self.lookups.clone(),
        );
        registry.register(
            "dns_failures",
            "The number of DNS lookup failures",
            self.failures.clone(),
        );
    }

    /// Counts one lookup attempt.
    pub(crate) fn record_lookup(&self) {
        self.lookups.inc();
    }

    /// Counts one failed lookup.
    pub(crate) fn record_failure(&self) {
        self.failures.inc();
    }

    /// Gets the number of lookups attempted so far.
    pub fn lookups(&self) -> u64 {
        self.lookups.get()
    }

    /// Gets the number of lookups that failed so far.
    pub fn failures(&self) -> u64 {
        self.failures.get()
    }
}

/// Encodes `dns_provider_results`, one series per cached specification.
#[derive(Debug)]
struct ResultsCollector {
    cache: Cache,
}

impl Collector for ResultsCollector {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), std::fmt::Error> {
        let snapshot = self.cache.snapshot();
        let mut metric_encoder = encoder.encode_descriptor(
            "dns_provider_results",
            "The number of resolved endpoints for each configured address",
            None,
            MetricType::Gauge,
        )?;

        for (spec, addresses) in snapshot.iter() {
            let labels = ResultLabels { addr: spec.clone() };
            let gauge = ConstGauge::new(i64::try_from(addresses.len()).unwrap_or(i64::MAX));
            gauge.encode(metric_encoder.encode_family(&labels)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Reads every `dns_provider_results` series out of the text encoding of `registry`.
    pub(crate) fn results(registry: &Registry) -> BTreeMap<String, f64> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, registry).unwrap();

        buffer
            .lines()
            .filter_map(|line| line.split_once("dns_provider_results{addr=\""))
            .filter(|(prefix, _)| prefix.is_empty() || prefix.ends_with('_'))
            .filter_map(|(_, rest)| rest.split_once("\"} "))
            .map(|(addr, value)| (addr.to_string(), value.trim().parse().unwrap()))
            .collect()
    }

    fn addresses(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn results_series_follow_cache() {
        let mut registry = Registry::default();
        let cache = Cache::default();
        ProviderMetrics::default().register(&mut registry, &cache);
        assert!(results(&registry).is_empty());

        cache.update(|entries| {
            entries.put("dns+a:80", addresses(&["10.0.0.1:80", "10.0.0.2:80"]));
            entries.put("example.com:90", addresses(&["example.com:90"]));
            entries.put("dns+b:80", Vec::new());
        });
        assert_eq!(
            results(&registry),
            BTreeMap::from([
                ("dns+a:80".to_string(), 2.0),
                ("dns+b:80".to_string(), 0.0),
                ("example.com:90".to_string(), 1.0),
            ])
        );

        cache.update(|entries| {
            entries.delete("dns+a:80");
        });
        assert_eq!(
            results(&registry),
            BTreeMap::from([("dns+b:80".to_string(), 0.0), ("example.com:90".to_string(), 1.0)])
        );
    }

    #[test]
    fn staged_changes_are_not_exposed_before_publication() {
        let mut registry = Registry::default();
        let cache = Cache::default();
        ProviderMetrics::default().register(&mut registry, &cache);
        cache.update(|entries| entries.put("dns+a:80", addresses(&["10.0.0.1:80"])));

        let before = BTreeMap::from([("dns+a:80".to_string(), 1.0)]);
        cache.update(|entries| {
            entries.delete("dns+a:80");
            entries.put("dns+b:80", addresses(&["10.0.0.2:80", "10.0.0.3:80"]));
            assert_eq!(results(&registry), before);
            assert_eq!(cache.addresses(), addresses(&["10.0.0.1:80"]));
        });

        assert_eq!(
            results(&registry),
            BTreeMap::from([("dns+b:80".to_string(), 2.0)])
        );
    }

    #[test]
    fn counters() {
        let metrics = ProviderMetrics::default();
        metrics.record_lookup();
        metrics.record_lookup();
        metrics.record_failure();
        assert_eq!(metrics.lookups(), 2);
        assert_eq!(metrics.failures(), 1);

        let shared = metrics.clone();
        shared.record_lookup();
        assert_eq!(metrics.lookups(), 3);
    }
}
