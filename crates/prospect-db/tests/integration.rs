//! Offline unit tests for prospect-db pool configuration and row types.
//! These tests do not require a live database connection.

use prospect_core::{AppConfig, Environment};
use prospect_db::{DerivedProductRow, PoolConfig, SignalRow};
use rust_decimal::Decimal;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        providers_path: PathBuf::from("./config/providers.yaml"),
        scoring_path: PathBuf::from("./config/scoring.yaml"),
        daily_budget_usd: Decimal::from_str("5.00").unwrap(),
        ai_timeout_secs: 45,
        ai_cooldown_secs: 60,
        serp_api_key: None,
        serp_base_url: "https://google.serper.dev/search".to_string(),
        suggest_base_url: "https://suggestqueries.google.com/complete/search".to_string(),
        http_timeout_secs: 15,
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        evaluate_batch_size: 25,
        derive_batch_size: 10,
        gate_batch_size: 15,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`SignalRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn signal_row_has_expected_fields() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = SignalRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        source: "reddit".to_string(),
        source_url: Some("https://reddit.com/r/smallbusiness/abc".to_string()),
        title: "Invoice tracking is a nightmare".to_string(),
        description: None,
        upvotes: 140,
        comment_count: 32,
        content_hash: "deadbeef".to_string(),
        status: "raw".to_string(),
        status_reason: None,
        merged_into: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(row.id, 1);
    assert_eq!(row.source, "reddit");
    assert_eq!(row.status, "raw");
    assert_eq!(row.upvotes, 140);
    assert_eq!(row.comment_count, 32);
    assert!(row.description.is_none());
    assert!(row.merged_into.is_none());
}

/// Compile-time smoke test: confirm that [`DerivedProductRow`] has all
/// expected fields, and that `keywords()` unwraps the JSONB array.
#[test]
fn derived_product_row_keywords_unwraps_json_array() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = DerivedProductRow {
        id: 42_i64,
        public_id: Uuid::new_v4(),
        opportunity_id: 7_i64,
        derivative_type: "tool".to_string(),
        title: "Invoice Deadline Calculator".to_string(),
        slug: "invoice-deadline-calculator".to_string(),
        target_keywords: serde_json::json!(["invoice deadline calculator", 3, "net 30 calculator"]),
        build_effort: "1d".to_string(),
        competition_level: "unknown".to_string(),
        search_volume: "unknown".to_string(),
        product_form: "website".to_string(),
        monetization: serde_json::json!(["ads"]),
        score: 78_i16,
        status: "derived".to_string(),
        rejection_reason: None,
        idea_snapshot: serde_json::json!({}),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(row.opportunity_id, 7);
    assert_eq!(row.derivative_type, "tool");
    assert_eq!(row.status, "derived");
    // Non-string entries are skipped rather than stringified.
    assert_eq!(
        row.keywords(),
        vec![
            "invoice deadline calculator".to_string(),
            "net 30 calculator".to_string()
        ]
    );
}
