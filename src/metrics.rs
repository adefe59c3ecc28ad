//! Prometheus text exposition for `GET /metrics`.
//!
//! Stateless by design: the cache façade's [`crate::cache::CacheStats`] is
//! already the single source of truth for hit/miss/entry counts, so this
//! module just renders a fresh registry from whatever snapshot it's handed
//! rather than keeping a second, potentially-drifting set of counters.

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

use crate::cache::CacheStats;

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ErrorLabels {
    kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EncodeLabelValue)]
enum ErrorKind {
    ParseFailed,
    Unsupported,
}

pub fn render(stats: &CacheStats) -> String {
    let mut registry = Registry::default();

    let entries = Gauge::<i64>::default();
    entries.set(stats.entries as i64);
    registry.register(
        "cadabra_cache_entries",
        "Number of query results currently cached",
        entries,
    );

    let hits = Counter::<u64>::default();
    hits.inc_by(stats.hits);
    registry.register("cadabra_cache_hits", "Total cache hits", hits);

    let misses = Counter::<u64>::default();
    misses.inc_by(stats.misses);
    registry.register("cadabra_cache_misses", "Total cache misses", misses);

    let invalidations = Counter::<u64>::default();
    invalidations.inc_by(stats.invalidations);
    registry.register(
        "cadabra_invalidations",
        "Total cache entries removed by the invalidation decider",
        invalidations,
    );

    let analyze_errors = Family::<ErrorLabels, Counter>::default();
    analyze_errors
        .get_or_create(&ErrorLabels { kind: ErrorKind::ParseFailed })
        .inc_by(stats.parse_failed_errors);
    analyze_errors
        .get_or_create(&ErrorLabels { kind: ErrorKind::Unsupported })
        .inc_by(stats.unsupported_errors);
    registry.register(
        "cadabra_analyze_errors",
        "Total analysis failures, by kind",
        analyze_errors,
    );

    let mut buffer = String::new();
    encode(&mut buffer, &registry).expect("encoding to a String never fails");
    buffer
}
