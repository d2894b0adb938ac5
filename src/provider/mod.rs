//! Discovery provider: resolves specifications and caches their addresses.

use crate::{resolver::Resolver, LookupKind, Specification};
use futures_util::{stream, StreamExt};
use prometheus_client::registry::Registry;
use std::{collections::HashSet, time::Duration};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

mod cache;
pub use cache::{Cache, Resolved};

mod metrics;
pub use metrics::{ProviderMetrics, ResultLabels};

/// Default number of lookups a [`Provider`] keeps in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Default time a [`Provider`] allows a single lookup before treating it as failed.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors reported by a resolution cycle.
///
/// Either way the cycle has already been applied: failed specifications keep
/// the addresses they had before the cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Some lookups failed
    #[error("{failed} of {total} dns lookups failed")]
    Lookups {
        /// Number of failed lookups
        failed: usize,
        /// Number of lookups attempted
        total: usize,
    },
    /// The cycle was cancelled before every lookup finished
    #[error("resolution cancelled with {unresolved} lookups unresolved")]
    Cancelled {
        /// Number of lookups abandoned because of the cancellation
        unresolved: usize,
    },
}

/// Why a single lookup produced no result.
#[derive(Debug, thiserror::Error)]
enum LookupFailure<E> {
    #[error("{0}")]
    Resolver(E),
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("lookup cancelled")]
    Cancelled,
}

/// Self-refreshing cache of addresses discovered from a list of specifications.
///
/// # Usage
///
/// Something outside the provider calls [`Provider::resolve`] periodically
/// with the current list of specifications, and anything may call
/// [`Provider::addresses`] at any time to read the latest results.
///
/// A specification is either a literal `host:port` address, used as-is, or a
/// lookup of the form `scheme+name` (see [`Specification`]).
///
/// ## Failed lookups
///
/// A specification whose lookup fails keeps the addresses it resolved to in
/// the previous cycle; a lookup that succeeds with no records replaces them
/// with nothing. Specifications missing from a cycle's list are dropped.
///
/// ## Metrics
///
/// Once [`registered`](Provider::register), the provider exposes one
/// `dns_provider_results` series per tracked specification, labeled with the
/// specification and valued at its number of addresses.
#[derive(Debug)]
pub struct Provider<R> {
    resolver: R,
    name: Option<String>,
    concurrency: usize,
    lookup_timeout: Duration,
    cache: Cache,
    metrics: ProviderMetrics,
    cycle: Mutex<()>,
}

impl<R> Provider<R> {
    /// Creates a provider that performs lookups through `resolver`.
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            name: None,
            concurrency: DEFAULT_CONCURRENCY,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            cache: Cache::default(),
            metrics: ProviderMetrics::default(),
            cycle: Mutex::new(()),
        }
    }

    /// Sets the name identifying the provider in logs and metric names.
    ///
    /// Must be set before [`Provider::register`] to affect metric names.
    pub fn name(self, name: impl ToString) -> Self {
        Self {
            name: Some(name.to_string()),
            ..self
        }
    }

    /// Sets the maximum number of lookups in flight during a cycle.
    pub fn concurrency(self, concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            ..self
        }
    }

    /// Sets how long a single lookup may take before it counts as failed.
    pub fn lookup_timeout(self, lookup_timeout: Duration) -> Self {
        Self {
            lookup_timeout,
            ..self
        }
    }

    /// Registers the provider's metrics with `registry`, prefixed by the
    /// provider's name if it has one.
    pub fn register(self, registry: &mut Registry) -> Self {
        match &self.name {
            Some(name) => self
                .metrics
                .register(registry.sub_registry_with_prefix(name), &self.cache),
            None => self.metrics.register(registry, &self.cache),
        }
        self
    }

    /// Gets the current addresses of every tracked specification, flattened.
    ///
    /// Order is unspecified and an address produced by several
    /// specifications appears once per specification.
    pub fn addresses(&self) -> Vec<String> {
        self.cache.addresses()
    }

    /// Gets the current addresses of every tracked specification.
    pub fn resolved(&self) -> Resolved {
        Resolved::clone(&self.cache.snapshot())
    }

    /// Gets the provider's cache.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Gets the provider's metrics.
    pub fn metrics(&self) -> &ProviderMetrics {
        &self.metrics
    }
}

impl<R: Resolver> Provider<R> {
    /// Runs one resolution cycle over `specs`.
    ///
    /// See [`Provider::resolve_with_cancel`].
    pub async fn resolve<S: AsRef<str>>(&self, specs: &[S]) -> Result<(), Error> {
        self.resolve_with_cancel(specs, &CancellationToken::new())
            .await
    }

    /// Runs one resolution cycle over `specs`, abandoning outstanding lookups
    /// once `cancel` fires.
    ///
    /// Every specification in `specs` is tracked after the cycle and every
    /// other one is dropped. Lookups that fail, time out or are abandoned keep
    /// their previous addresses; the returned error only reports that this
    /// happened.
    pub async fn resolve_with_cancel<S: AsRef<str>>(
        &self,
        specs: &[S],
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let _cycle = self.cycle.lock().await;

        let mut batch = HashSet::<&str>::new();
        let specs = specs
            .iter()
            .map(|spec| spec.as_ref())
            .filter(|spec| batch.insert(*spec))
            .map(|spec| (spec, Specification::parse(spec)))
            .collect::<Vec<_>>();

        let (statics, lookups): (Vec<_>, Vec<_>) = specs
            .into_iter()
            .partition(|(_, parsed)| parsed.kind() == LookupKind::Static);
        let total = lookups.len();

        // Lookups run without touching the cache; results are merged at once below.
        let outcomes = stream::iter(lookups)
            .map(|(spec, parsed)| async move { (spec, self.lookup(parsed, cancel).await) })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut failed = 0;
        let mut unresolved = 0;
        let mut updates = statics
            .into_iter()
            .map(|(spec, parsed)| (spec, Some(vec![parsed.name().to_string()])))
            .collect::<Vec<_>>();
        for (spec, outcome) in outcomes {
            match outcome {
                Ok(addresses) => updates.push((spec, Some(addresses))),
                Err(e) => {
                    #[cfg(feature = "log")]
                    tracing::warn!(provider = ?self.name, %spec, error = %e, "dns resolution failed, keeping previous addresses");
                    if let LookupFailure::Cancelled = e {
                        unresolved += 1;
                    }
                    failed += 1;
                    self.metrics.record_failure();
                    updates.push((spec, None));
                }
            }
        }

        // Publishing the snapshot also publishes the results gauge, which is read from it.
        self.cache.update(|entries| {
            let stale = entries
                .keys()
                .filter(|spec| !batch.contains(spec))
                .map(str::to_string)
                .collect::<Vec<_>>();
            for spec in stale {
                #[cfg(feature = "log")]
                tracing::trace!(%spec, "dropping specification");
                entries.delete(&spec);
            }

            for (spec, addresses) in updates {
                match addresses {
                    Some(addresses) => entries.put(spec, addresses),
                    None if entries.get(spec).is_none() => entries.put(spec, Vec::new()),
                    None => {}
                }
            }
        });

        #[cfg(feature = "log")]
        tracing::debug!(provider = ?self.name, specs = batch.len(), lookups = total, failed, "resolution cycle complete");

        if unresolved > 0 {
            Err(Error::Cancelled { unresolved })
        } else if failed > 0 {
            Err(Error::Lookups { failed, total })
        } else {
            Ok(())
        }
    }

    /// Performs a single bounded lookup.
    async fn lookup(
        &self,
        spec: Specification<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, LookupFailure<R::Error>> {
        if cancel.is_cancelled() {
            return Err(LookupFailure::Cancelled);
        }

        self.metrics.record_lookup();
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(LookupFailure::Cancelled),
            res = tokio::time::timeout(self.lookup_timeout, self.resolver.resolve(spec.name(), spec.kind())) => match res {
                Ok(addresses) => addresses.map_err(LookupFailure::Resolver),
                Err(_) => Err(LookupFailure::Timeout(self.lookup_timeout)),
            },
        }
    }
}
