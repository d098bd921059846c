//! Request counters rendered in the Prometheus text exposition format.
//!
//! Counters are owned by `AppState`; there is no global registry.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

type LabelSet = Vec<(String, String)>;

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> LabelSet {
    let mut key: LabelSet = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

/// Monotonic counter family keyed by label values.
pub struct CounterVec {
    name: &'static str,
    help: &'static str,
    map: DashMap<LabelSet, AtomicU64>,
}

impl CounterVec {
    pub fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            map: DashMap::new(),
        }
    }

    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.name, self.help);
        let _ = writeln!(out, "# TYPE {} counter", self.name);

        let mut series: Vec<(String, u64)> = self
            .map
            .iter()
            .map(|r| {
                let labels = r
                    .key()
                    .iter()
                    .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                    .collect::<Vec<_>>()
                    .join(",");
                (labels, r.value().load(Ordering::Relaxed))
            })
            .collect();
        series.sort();

        for (labels, value) in series {
            let _ = writeln!(out, "{}{{{}}} {}", self.name, labels, value);
        }
    }
}

// Prometheus default buckets, kept in microseconds.
const BUCKETS_MICROS: [u64; 11] = [
    5_000, 10_000, 25_000, 50_000, 100_000, 250_000, 500_000, 1_000_000, 2_500_000, 5_000_000,
    10_000_000,
];

#[derive(Default)]
struct AtomicHistogram {
    count: AtomicU64,
    sum_micros: AtomicU64,
    buckets: [AtomicU64; BUCKETS_MICROS.len()],
}

/// Latency histogram family keyed by label values, rendered in seconds.
pub struct HistogramVec {
    name: &'static str,
    help: &'static str,
    map: DashMap<LabelSet, AtomicHistogram>,
}

impl HistogramVec {
    pub fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            map: DashMap::new(),
        }
    }

    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let hist = self.map.entry(label_key(labels)).or_default();
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum_micros.fetch_add(micros, Ordering::Relaxed);
        for (i, &bound) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= bound {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[cfg(test)]
    pub fn count(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|h| h.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.name, self.help);
        let _ = writeln!(out, "# TYPE {} histogram", self.name);

        let mut keys: Vec<LabelSet> = self.map.iter().map(|r| r.key().clone()).collect();
        keys.sort();

        for key in keys {
            let Some(hist) = self.map.get(&key) else {
                continue;
            };
            let labels = key
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                .collect::<Vec<_>>()
                .join(",");
            let prefix = if labels.is_empty() {
                String::new()
            } else {
                format!("{},", labels)
            };

            for (i, &bound) in BUCKETS_MICROS.iter().enumerate() {
                let le = bound as f64 / 1_000_000.0;
                let value = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", self.name, prefix, le, value);
            }
            let count = hist.count.load(Ordering::Relaxed);
            let sum = hist.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", self.name, prefix, count);
            let _ = writeln!(out, "{}_sum{{{}}} {}", self.name, labels, sum);
            let _ = writeln!(out, "{}_count{{{}}} {}", self.name, labels, count);
        }
    }
}

pub struct RequestMetrics {
    requests: CounterVec,
    latency: HistogramVec,
    dbchecks: CounterVec,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self {
            requests: CounterVec::new(
                "http_requests_total",
                "Total number of HTTP requests by method and path.",
            ),
            latency: HistogramVec::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds by method, path and status.",
            ),
            dbchecks: CounterVec::new(
                "dbcheck_total",
                "Total number of dbcheck calls by outcome.",
            ),
        }
    }

    /// Counts one request. Paths are recorded raw, so every distinct path
    /// requested (including unrouted ones) keeps its own series for the
    /// lifetime of the process.
    pub fn record_request(&self, method: &str, path: &str) {
        self.requests.inc(&[("method", method), ("path", path)]);
    }

    /// Records how long a request took and which status it ended with.
    pub fn record_response(&self, method: &str, path: &str, status: u16, elapsed: Duration) {
        let status = status.to_string();
        self.latency.observe(
            &[("method", method), ("path", path), ("status", status.as_str())],
            elapsed,
        );
    }

    pub fn record_dbcheck(&self, ok: bool) {
        let status = if ok { "ok" } else { "error" };
        self.dbchecks.inc(&[("status", status)]);
    }

    #[cfg(test)]
    pub fn requests(&self, method: &str, path: &str) -> u64 {
        self.requests.get(&[("method", method), ("path", path)])
    }

    #[cfg(test)]
    pub fn responses(&self, method: &str, path: &str, status: u16) -> u64 {
        let status = status.to_string();
        self.latency
            .count(&[("method", method), ("path", path), ("status", status.as_str())])
    }

    #[cfg(test)]
    pub fn dbchecks(&self, ok: bool) -> u64 {
        let status = if ok { "ok" } else { "error" };
        self.dbchecks.get(&[("status", status)])
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.requests.render(&mut out);
        self.latency.render(&mut out);
        self.dbchecks.render(&mut out);
        out
    }
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_order_does_not_matter() {
        let counter = CounterVec::new("c", "help");
        counter.inc(&[("method", "GET"), ("path", "/ping")]);
        counter.inc(&[("path", "/ping"), ("method", "GET")]);

        assert_eq!(counter.get(&[("method", "GET"), ("path", "/ping")]), 2);
        assert_eq!(counter.get(&[("method", "POST"), ("path", "/ping")]), 0);
    }

    #[test]
    fn test_render_exposition_format() {
        let metrics = RequestMetrics::new();
        metrics.record_request("GET", "/ping");
        metrics.record_request("GET", "/ping");
        metrics.record_request("GET", "/api/hello");
        metrics.record_dbcheck(false);

        let out = metrics.render();
        let expected = "\
# HELP http_requests_total Total number of HTTP requests by method and path.
# TYPE http_requests_total counter
http_requests_total{method=\"GET\",path=\"/api/hello\"} 1
http_requests_total{method=\"GET\",path=\"/ping\"} 2
# HELP http_request_duration_seconds HTTP request duration in seconds by method, path and status.
# TYPE http_request_duration_seconds histogram
# HELP dbcheck_total Total number of dbcheck calls by outcome.
# TYPE dbcheck_total counter
dbcheck_total{status=\"error\"} 1
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_render_latency_histogram() {
        let metrics = RequestMetrics::new();
        metrics.record_response("GET", "/ping", 200, Duration::from_millis(3));
        metrics.record_response("GET", "/ping", 200, Duration::from_millis(200));
        metrics.record_response("GET", "/nope", 404, Duration::from_millis(1));

        assert_eq!(metrics.responses("GET", "/ping", 200), 2);
        assert_eq!(metrics.responses("GET", "/nope", 404), 1);
        assert_eq!(metrics.responses("GET", "/ping", 500), 0);

        let out = metrics.render();
        let series = r#"method="GET",path="/ping",status="200""#;
        for line in [
            format!(r#"http_request_duration_seconds_bucket{{{},le="0.005"}} 1"#, series),
            format!(r#"http_request_duration_seconds_bucket{{{},le="0.1"}} 1"#, series),
            format!(r#"http_request_duration_seconds_bucket{{{},le="0.25"}} 2"#, series),
            format!(r#"http_request_duration_seconds_bucket{{{},le="10"}} 2"#, series),
            format!(r#"http_request_duration_seconds_bucket{{{},le="+Inf"}} 2"#, series),
            format!(r#"http_request_duration_seconds_sum{{{}}} 0.203"#, series),
            format!(r#"http_request_duration_seconds_count{{{}}} 2"#, series),
            r#"http_request_duration_seconds_count{method="GET",path="/nope",status="404"} 1"#
                .to_string(),
        ] {
            assert!(out.contains(&line), "missing `{}` in:\n{}", line, out);
        }
    }

    #[test]
    fn test_label_values_are_escaped() {
        let metrics = RequestMetrics::new();
        metrics.record_request("GET", "/a\"b\\c");

        let out = metrics.render();
        assert!(out.contains(r#"path="/a\"b\\c""#));
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let metrics = RequestMetrics::new();

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        metrics.record_request("GET", "/ping");
                    }
                });
            }
        });

        assert_eq!(metrics.requests("GET", "/ping"), 8000);
    }
}
