//! Tests wiring a detector from files on disk

use fraudlens_cli::config::CliSettings;
use fraudlens_cli::{build_detector, load_fraud_config, loader};
use fraudlens_core::{Action, RiskLevel};
use std::fs;

const RULE: &str = r#"id: high_amount
name: High amount
action: review
risk_score: 40
conditions:
  - field: amount
    operator: greater_than
    value: 5000
"#;

#[tokio::test]
async fn test_detector_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let rules_dir = dir.path().join("rules");
    let lists_dir = dir.path().join("lists");
    fs::create_dir_all(&rules_dir).unwrap();
    fs::create_dir_all(&lists_dir).unwrap();

    fs::write(rules_dir.join("high_amount.yaml"), RULE).unwrap();
    fs::write(lists_dir.join("blacklist_user.txt"), "# known fraudsters\nmallory\n").unwrap();
    fs::write(
        dir.path().join("fraudlens.yaml"),
        "detector:\n  generator_timeout_ms: 1000\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("history.json"),
        r#"[{"id": "old_1", "user_id": "alice", "amount": "40", "currency": "USD",
             "status": "succeeded", "created_at": "2024-01-10T09:00:00Z"}]"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("transactions.jsonl"),
        concat!(
            r#"{"id": "tx_1", "user_id": "alice", "amount": "7500", "currency": "USD"}"#,
            "\n",
            r#"{"id": "tx_2", "user_id": "mallory", "amount": "5", "currency": "USD"}"#,
            "\n",
        ),
    )
    .unwrap();

    let settings = CliSettings {
        fraud_config: Some(dir.path().join("fraudlens.yaml")),
        rules_dir: Some(rules_dir),
        lists_dir: Some(lists_dir),
        history_file: Some(dir.path().join("history.json")),
        ..Default::default()
    };

    let detector = build_detector(&settings).await.unwrap();
    assert_eq!(detector.config().detector.generator_timeout_ms, 1000);
    assert_eq!(detector.rules().list_rules().await.unwrap().len(), 1);

    let transactions = loader::load_transactions(&dir.path().join("transactions.jsonl")).unwrap();
    assert_eq!(transactions.len(), 2);

    let first = detector.analyze_transaction(&transactions[0]).await;
    assert_eq!(first.matched_rules().count(), 1);
    assert_eq!(first.recommendation, Action::Review);
    // alice has a prior transaction on record
    assert!(!first.has_signal("behavioral_first_transaction"));

    let second = detector.analyze_transaction(&transactions[1]).await;
    assert_eq!(second.risk_level, RiskLevel::Critical);
    assert_eq!(second.recommendation, Action::Decline);
}

#[test]
fn test_invalid_fraud_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fraudlens.yaml");
    fs::write(&path, "scoring:\n  thresholds:\n    medium: 95\n").unwrap();

    let settings = CliSettings {
        fraud_config: Some(path),
        ..Default::default()
    };
    assert!(load_fraud_config(&settings).is_err());
    assert!(load_fraud_config(&CliSettings::default()).is_ok());
}
