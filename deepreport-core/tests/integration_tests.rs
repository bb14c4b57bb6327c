//! Integration tests for deepreport-core infrastructure

use futures::FutureExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use deepreport_core::{
    config_error, plan_validation_error, process_concurrently, retry_async, with_timeout,
    ErrorContext, QueryResults, ReportConfig, ReportError, RetryConfig, SearchApi, SearchResult,
};

fn fast_retry(max_attempts: usize) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

#[tokio::test]
async fn test_error_handling() {
    let error = plan_validation_error!("Plan has no sections", "planner");

    match &error {
        ReportError::PlanValidation { message, context } => {
            assert_eq!(message, "Plan has no sections");
            assert_eq!(context.component, "planner");
            assert!(!context.error_id.is_empty());
        }
        _ => panic!("Expected PlanValidation error"),
    }
    assert!(error.is_fatal_to_run());

    // Should not panic
    error.log();

    let network_error = ReportError::Network {
        message: "Connection failed".to_string(),
        source: None,
        context: ErrorContext::new("test"),
    };
    assert!(network_error.is_recoverable());
    assert!(!network_error.is_fatal_to_run());
    assert!(network_error.retry_delay_ms().is_some());

    let config_error = config_error!("Invalid config", "test");
    assert!(!config_error.is_recoverable());
    assert!(config_error.retry_delay_ms().is_none());
}

#[test]
fn test_incomplete_report_message_lists_sections() {
    let error = ReportError::IncompleteReport {
        missing: vec!["Body".to_string(), "Conclusion".to_string()],
        context: ErrorContext::new("assembler"),
    };
    assert_eq!(
        error.to_string(),
        "Incomplete report, missing sections: Body, Conclusion"
    );
}

#[tokio::test]
async fn test_retry_recovers_from_transient_failures() {
    let attempt_count = Arc::new(AtomicUsize::new(0));

    let operation = {
        let attempt_count = Arc::clone(&attempt_count);
        move || {
            let count = attempt_count.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if count < 3 {
                    Err(ReportError::Network {
                        message: "Temporary failure".to_string(),
                        source: None,
                        context: ErrorContext::new("test"),
                    })
                } else {
                    Ok("success")
                }
            }
            .boxed()
        }
    };

    let result = retry_async(operation, fast_retry(3), "test_operation").await;
    assert_eq!(result.unwrap(), "success");
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_stops_on_unrecoverable_error() {
    let attempt_count = Arc::new(AtomicUsize::new(0));

    let operation = {
        let attempt_count = Arc::clone(&attempt_count);
        move || {
            attempt_count.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(ReportError::llm("bad request", "test")) }.boxed()
        }
    };

    let result = retry_async(operation, fast_retry(5), "test_operation").await;
    assert!(matches!(result, Err(ReportError::Llm { .. })));
    assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_timeout() {
    let result = with_timeout(
        async {
            sleep(Duration::from_millis(200)).await;
            "done"
        },
        20,
        "slow_operation",
    )
    .await;
    assert!(matches!(result, Err(ReportError::Timeout { duration_ms: 20, .. })));

    let result = with_timeout(async { "fast" }, 1000, "fast_operation").await;
    assert_eq!(result.unwrap(), "fast");
}

#[test]
fn test_timeout_blocking() {
    let result = tokio_test::block_on(with_timeout(async { 7 }, 100, "blocking"));
    assert_eq!(result.unwrap(), 7);
}

#[tokio::test]
async fn test_process_concurrently_respects_limit_and_order() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let results = process_concurrently((0..10).collect::<Vec<u64>>(), 3, {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        move |n| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(10 * (10 - n))).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                if n == 4 {
                    Err(ReportError::internal("boom", "test"))
                } else {
                    Ok(n * 2)
                }
            }
        }
    })
    .await;

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(results.len(), 10);
    assert!(results[4].is_err());
    for (i, result) in results.iter().enumerate().filter(|(i, _)| *i != 4) {
        assert_eq!(*result.as_ref().unwrap(), i as u64 * 2);
    }
}

#[test]
fn test_config_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deepreport.toml");

    let mut config = ReportConfig::default();
    config.search.api = SearchApi::Bing;
    config.max_search_depth = 4;
    config.save_to_file(&path).unwrap();

    let loaded = ReportConfig::from_file(&path).unwrap();
    assert_eq!(loaded.search.api, SearchApi::Bing);
    assert_eq!(loaded.max_search_depth, 4);
    assert_eq!(loaded.report_structure, config.report_structure);
    assert_eq!(loaded.assembly.separator, "\n\n");
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_config_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "number_of_queries = \"many\"").unwrap();

    assert!(matches!(
        ReportConfig::from_file(&path),
        Err(ReportError::Config { .. })
    ));
}

#[test]
fn test_degraded_query_results() {
    let degraded = QueryResults::degraded("rust async", "Tavily", "HTTP 429");
    assert!(degraded.is_degraded());
    assert_eq!(degraded.results[0].title, "Tavily Search Error");
    assert_eq!(degraded.results[0].content, "An error occurred: HTTP 429");
    assert_eq!(degraded.results[0].score, 0.0);
    assert!(degraded.results[0].raw_content.is_none());
}

#[test]
fn test_unscored_backend_result_is_not_degraded() {
    let results = QueryResults::new(
        "rust async",
        vec![SearchResult {
            title: "Untitled".to_string(),
            url: String::new(),
            content: "A result with no url and no score".to_string(),
            score: 0.0,
            raw_content: None,
        }],
    );
    assert!(!results.is_degraded());

    let json = serde_json::to_value(&results).unwrap();
    assert!(json.get("degraded").is_none());

    let degraded = serde_json::to_value(QueryResults::degraded("q", "Bing", "boom")).unwrap();
    let restored: QueryResults = serde_json::from_value(degraded).unwrap();
    assert!(restored.is_degraded());
}
