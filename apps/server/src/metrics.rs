//! Prometheus metrics for the filter service
//!
//! Collected in the default registry and exposed on `/metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, register_int_gauge_vec,
    HistogramVec, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::time::Instant;

/// Route label for requests that matched no route
pub const UNMATCHED_ROUTE: &str = "unmatched";

lazy_static! {
    // HTTP

    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tagql_http_requests_total",
        "Total number of HTTP requests",
        &["method", "route", "status"]
    )
    .expect("Failed to register HTTP_REQUESTS_TOTAL");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "tagql_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "route"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");

    pub static ref HTTP_REQUESTS_IN_FLIGHT: IntGaugeVec = register_int_gauge_vec!(
        "tagql_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
        &["method", "route"]
    )
    .expect("Failed to register HTTP_REQUESTS_IN_FLIGHT");

    pub static ref HTTP_REQUEST_SIZE_BYTES: HistogramVec = register_histogram_vec!(
        "tagql_http_request_size_bytes",
        "HTTP request body size in bytes",
        &["method", "route"],
        vec![100.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0]
    )
    .expect("Failed to register HTTP_REQUEST_SIZE_BYTES");

    // Filter compilation

    /// Compilations by outcome (`ok` or the error type)
    pub static ref FILTER_COMPILATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tagql_filter_compilations_total",
        "Total number of filter compilations",
        &["outcome"]
    )
    .expect("Failed to register FILTER_COMPILATIONS_TOTAL");

    /// Tag references (aliases) per compiled statement
    pub static ref FILTER_ALIASES: HistogramVec = register_histogram_vec!(
        "tagql_filter_aliases",
        "Tag references per compiled filter",
        &["kind_source"],
        vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0]
    )
    .expect("Failed to register FILTER_ALIASES");

    /// Entities returned per request
    pub static ref FILTER_RESULTS: HistogramVec = register_histogram_vec!(
        "tagql_filter_results",
        "Entities matched per request",
        &["endpoint"],
        vec![0.0, 1.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0]
    )
    .expect("Failed to register FILTER_RESULTS");

    // Database

    pub static ref DB_QUERY_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "tagql_db_query_duration_seconds",
        "Database query duration in seconds",
        &["query_type"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register DB_QUERY_DURATION_SECONDS");

    pub static ref DB_QUERY_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tagql_db_query_errors_total",
        "Total number of database query errors",
        &["query_type"]
    )
    .expect("Failed to register DB_QUERY_ERRORS_TOTAL");

    pub static ref DB_CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        "tagql_db_connections_active",
        "Number of active database connections"
    )
    .expect("Failed to register DB_CONNECTIONS_ACTIVE");

    pub static ref DB_CONNECTIONS_IDLE: IntGauge = register_int_gauge!(
        "tagql_db_connections_idle",
        "Number of idle database connections"
    )
    .expect("Failed to register DB_CONNECTIONS_IDLE");
}

/// Record duration and failure of one database round trip
pub fn observe_query<T, E>(query_type: &str, started: Instant, result: &Result<T, E>) {
    DB_QUERY_DURATION_SECONDS
        .with_label_values(&[query_type])
        .observe(started.elapsed().as_secs_f64());
    if result.is_err() {
        DB_QUERY_ERRORS_TOTAL.with_label_values(&[query_type]).inc();
    }
}

/// Outcome label of a compilation
pub fn compilation_outcome<T>(result: &Result<T, tagql_filter::Error>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(tagql_filter::Error::Syntax { .. }) => "syntax_error",
        Err(tagql_filter::Error::PathTooDeep { .. }) => "path_too_deep",
        Err(_) => "compile_error",
    }
}

/// Refresh the pool gauges from the live pool
pub fn record_pool(pool: &sqlx::PgPool) {
    let size = i64::from(pool.size());
    let idle = i64::try_from(pool.num_idle()).unwrap_or(i64::MAX);
    DB_CONNECTIONS_IDLE.set(idle);
    DB_CONNECTIONS_ACTIVE.set(size.saturating_sub(idle).max(0));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compilation_outcomes() {
        let ok: Result<(), tagql_filter::Error> = Ok(());
        assert_eq!(compilation_outcome(&ok), "ok");

        let syntax = tagql_filter::parse("site and and equip").map(|_| ());
        assert_eq!(compilation_outcome(&syntax), "syntax_error");

        let deep: Result<(), _> = Err(tagql_filter::Error::PathTooDeep { depth: 20, max: 16 });
        assert_eq!(compilation_outcome(&deep), "path_too_deep");

        let other: Result<(), _> = Err(tagql_filter::Error::InvalidIdentifier("x y".into()));
        assert_eq!(compilation_outcome(&other), "compile_error");
    }

    #[test]
    fn failed_queries_are_counted() {
        let before = DB_QUERY_ERRORS_TOTAL.with_label_values(&["unit_test"]).get();
        let failed: Result<(), &str> = Err("boom");
        observe_query("unit_test", Instant::now(), &failed);
        observe_query("unit_test", Instant::now(), &Ok::<(), &str>(()));
        assert_eq!(
            DB_QUERY_ERRORS_TOTAL.with_label_values(&["unit_test"]).get(),
            before + 1
        );
    }
}
