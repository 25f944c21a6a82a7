//! Prometheus Exposition
//!
//! Renders per-group request counters and cache occupancy in the Prometheus
//! text format. Each scrape builds a fresh `prometheus::Registry` from the
//! current snapshots, so nothing is registered globally.

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, TextEncoder};

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::stats::GroupStatsSnapshot;

const NAMESPACE: &str = "meshcache";

/// Encode metrics for every group in `registry`.
///
/// Returns the content type to serve together with the encoded body.
pub fn encode_metrics(registry: &Registry) -> Result<(String, Vec<u8>)> {
    let prom = prometheus::Registry::new();

    let mut counters = Vec::new();
    for (name, _) in GroupStatsSnapshot::default().counters() {
        counters.push(counter(
            &prom,
            &format!("group_{}_total", name),
            &format!("Group {} count", name.replace('_', " ")),
        )?);
    }

    let evictions = counter(&prom, "cache_evictions_total", "Entries evicted from the local cache")?;
    let cache_bytes = gauge(&prom, "cache_bytes", "Bytes held in the local cache")?;
    let cache_items = gauge(&prom, "cache_items", "Entries held in the local cache")?;

    for group in registry.groups() {
        let labels = [group.name()];

        for (vec, (_, value)) in counters.iter().zip(group.stats().counters()) {
            vec.with_label_values(&labels).inc_by(value);
        }

        let cache = group.cache_stats();
        evictions.with_label_values(&labels).inc_by(cache.evictions);
        cache_bytes.with_label_values(&labels).set(cache.bytes as i64);
        cache_items.with_label_values(&labels).set(cache.items as i64);
    }

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prom.gather(), &mut buffer)
        .map_err(metrics_error)?;

    Ok((encoder.format_type().to_string(), buffer))
}

fn counter(prom: &prometheus::Registry, name: &str, help: &str) -> Result<IntCounterVec> {
    let vec = IntCounterVec::new(Opts::new(name, help).namespace(NAMESPACE), &["group"])
        .map_err(metrics_error)?;
    prom.register(Box::new(vec.clone())).map_err(metrics_error)?;
    Ok(vec)
}

fn gauge(prom: &prometheus::Registry, name: &str, help: &str) -> Result<IntGaugeVec> {
    let vec = IntGaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), &["group"])
        .map_err(metrics_error)?;
    prom.register(Box::new(vec.clone())).map_err(metrics_error)?;
    Ok(vec)
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("metrics encoding failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::DataSourceFn;

    #[tokio::test]
    async fn test_encodes_group_counters() {
        let registry = Registry::new();
        let group = registry.create(
            "scores",
            2 << 10,
            DataSourceFn(|key: &str| -> Result<Vec<u8>> { Ok(key.as_bytes().to_vec()) }),
        );
        group.get("Tom").await.unwrap();
        group.get("Tom").await.unwrap();

        let (content_type, body) = encode_metrics(&registry).unwrap();
        let text = String::from_utf8(body).unwrap();

        assert!(content_type.starts_with("text/plain"));
        assert!(text.contains(r#"meshcache_group_gets_total{group="scores"} 2"#));
        assert!(text.contains(r#"meshcache_group_cache_hits_total{group="scores"} 1"#));
        assert!(text.contains(r#"meshcache_cache_items{group="scores"} 1"#));
    }

    #[test]
    fn test_empty_registry_encodes() {
        let (_, body) = encode_metrics(&Registry::new()).unwrap();
        assert!(body.is_empty() || String::from_utf8(body).is_ok());
    }
}
