use std::fs::{create_dir_all, write};

use flatgist_core::config::FlattenConfig;
use flatgist_core::contract::{GistPayload, MockPublisher, PublishOutcome, RateLimit};
use flatgist_core::pipeline::{flatten_and_publish, PipelineError, PublishSettings};
use tempfile::tempdir;

fn settings(preflight: bool) -> PublishSettings {
    PublishSettings {
        description: "flatgist test".to_string(),
        token: "ghp_test_token".to_string(),
        preflight,
    }
}

fn sample_rate_limit() -> RateLimit {
    RateLimit {
        limit: 5000,
        remaining: 4999,
        reset: 1_700_000_000,
        used: 1,
    }
}

#[tokio::test]
async fn publishes_flattened_files_and_reports_url() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    create_dir_all(src.path().join("pkg")).unwrap();
    write(src.path().join("main.py"), "print(\"hi\")\n").unwrap();
    write(src.path().join("pkg/util.py"), "x = 1").unwrap();

    let mut publisher = MockPublisher::new();
    publisher.expect_check_connection().times(1).returning(|| Ok(200));
    publisher
        .expect_rate_limit()
        .withf(|token: &str| token == "ghp_test_token")
        .times(1)
        .returning(|_| Ok(sample_rate_limit()));
    publisher
        .expect_publish()
        .withf(|payload: &GistPayload, token: &str| {
            token == "ghp_test_token"
                && payload.public
                && payload.description == "flatgist test"
                && payload.files.len() == 2
                && payload.files["main.py"].content == r#"print(\"hi\")\n"#
                && payload.files["pkg_util.py"].content == "x = 1"
        })
        .times(1)
        .returning(|_, _| {
            Ok(PublishOutcome::Created {
                url: "https://gist.github.com/abc123".to_string(),
            })
        });

    let config = FlattenConfig::new(src.path(), out.path());
    let report = flatten_and_publish(&config, &settings(true), &publisher)
        .await
        .expect("pipeline should succeed");

    assert_eq!(
        report.outcome,
        Some(PublishOutcome::Created {
            url: "https://gist.github.com/abc123".to_string()
        })
    );
    let preflight = report.preflight.expect("preflight was requested");
    assert_eq!(preflight.status, 200);
    assert_eq!(preflight.rate_limit.remaining, 4999);
    assert_eq!(report.flattened.files.len(), 2);
}

#[tokio::test]
async fn empty_tree_is_a_no_op() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();

    let mut publisher = MockPublisher::new();
    publisher.expect_publish().never();

    let config = FlattenConfig::new(src.path(), out.path());
    let report = flatten_and_publish(&config, &settings(false), &publisher)
        .await
        .expect("empty tree should not fail");

    assert!(report.outcome.is_none());
    assert!(report.preflight.is_none());
    assert!(report.flattened.is_empty());
}

#[tokio::test]
async fn rejection_is_reported_not_raised() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    write(src.path().join("a.txt"), "a").unwrap();

    let mut publisher = MockPublisher::new();
    publisher.expect_publish().returning(|_, _| {
        Ok(PublishOutcome::Rejected {
            message: "Failed to create Gist. Status code: 401. Error: Bad credentials".to_string(),
        })
    });

    let config = FlattenConfig::new(src.path(), out.path());
    let report = flatten_and_publish(&config, &settings(false), &publisher)
        .await
        .expect("rejection is an outcome, not an error");

    let outcome = report.outcome.unwrap();
    assert!(!outcome.is_success());
    assert!(matches!(outcome, PublishOutcome::Rejected { ref message } if message.contains("401")));
}

#[tokio::test]
async fn transport_failure_surfaces_as_pipeline_error() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    write(src.path().join("a.txt"), "a").unwrap();

    let mut publisher = MockPublisher::new();
    publisher
        .expect_publish()
        .returning(|_, _| Err("operation timed out".into()));

    let config = FlattenConfig::new(src.path(), out.path());
    let err = flatten_and_publish(&config, &settings(false), &publisher)
        .await
        .unwrap_err();

    match err {
        PipelineError::Transport { stage, message } => {
            assert_eq!(stage, "publish");
            assert!(message.contains("timed out"));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_token_stops_before_any_request_or_staging() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    write(src.path().join("a.txt"), "a").unwrap();
    let staging = out.path().join("staging");

    let mut publisher = MockPublisher::new();
    publisher.expect_check_connection().never();
    publisher.expect_publish().never();

    let mut settings = settings(true);
    settings.token = "   ".to_string();
    let config = FlattenConfig::new(src.path(), &staging);
    let err = flatten_and_publish(&config, &settings, &publisher)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::EmptyToken));
    assert!(!staging.exists());
}

#[tokio::test]
async fn missing_source_fails_before_publish() {
    let out = tempdir().unwrap();

    let mut publisher = MockPublisher::new();
    publisher.expect_publish().never();

    let config = FlattenConfig::new(out.path().join("missing"), out.path().join("staging"));
    let err = flatten_and_publish(&config, &settings(false), &publisher)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Flatten(_)));
    assert!(err.to_string().contains("source stage"));
}
