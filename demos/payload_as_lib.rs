//! # Payloadiff — library usage example
//!
//! Three ways to use payloadiff from Rust:
//!
//! 1. **From a config file**: talks to the configured store, like the CLI
//! 2. **In-memory store**: a full load / decide / save cycle, no network
//! 3. **Pure functions**: diff and reconcile two documents directly
//!
//! Run against a store:
//!   cargo run --example payload_as_lib -- payloadiff.toml acme
//!
//! Run the offline patterns:
//!   cargo run --example payload_as_lib

use std::sync::Arc;

use anyhow::Result;
use payloadiff::{
    presentation::writers::{all_writers, write_to_file},
    CompareSettings, ComparisonService, ComparisonSession, CustomerId, Decision,
    MemoryPayloadStore, Operator, PayloadStore, TreeDiffer, VisibilityFilter,
};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match (args.get(1), args.get(2)) {
        (Some(path), Some(customer)) => from_config_file(path, customer).await,
        _ => {
            in_memory_session().await?;
            pure_functions();
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 1: load config from a TOML file (same as the CLI does internally)
// ─────────────────────────────────────────────────────────────────────────────
async fn from_config_file(path: &str, customer: &str) -> Result<()> {
    println!("=== Pattern 1: from config file ({path}) ===\n");

    let cfg = payloadiff::AppConfig::load(path)?;
    let operator = Operator::new("example");
    let report = payloadiff::run_compare(&cfg, &operator, CustomerId::from(customer)).await?;

    for writer in all_writers() {
        let written = write_to_file(&*writer, &report, &cfg.output.dir)?;
        println!("Written: {}", written.display());
    }
    println!(
        "{customer}: {} diffs, {} outstanding",
        report.counts.raw, report.counts.outstanding
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 2: drive a session against the in-memory store
// ─────────────────────────────────────────────────────────────────────────────
async fn in_memory_session() -> Result<()> {
    println!("=== Pattern 2: in-memory session ===\n");

    let store = Arc::new(MemoryPayloadStore::new());
    store.put_template("acme", json!({"plan": "pro", "limits": {"seats": 10}, "tags": ["a"]}));
    store.put_saved_payload("acme", json!({"plan": "pro", "limits": {"seats": 4}, "tags": ["a", "b"]}));

    let service = ComparisonService::new(
        Arc::clone(&store) as Arc<dyn PayloadStore>,
        Arc::new(TreeDiffer::new()),
        CompareSettings::default(),
    );
    let mut session = ComparisonSession::new(Operator::new("example"));

    let _ = session.load(&service, CustomerId::from("acme")).await;
    for diff in session.visible_diffs(VisibilityFilter::LeavesOnly) {
        println!("  {} {:?}", diff.path.to_query_form(), diff.kind);
    }

    session.decide(Decision::apply_template("/limits/seats").into())?;
    session.decide(Decision::keep_customer("/tags/1").into())?;
    let _ = session.save(&service).await?;

    println!("saved payload: {}", store.saved_payload("acme").unwrap_or_default());
    println!("counts after save: {:?}\n", session.counts(VisibilityFilter::LeavesOnly));
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 3: no store, no session
// ─────────────────────────────────────────────────────────────────────────────
fn pure_functions() {
    println!("=== Pattern 3: pure functions ===\n");

    let template = json!({"a": 1, "b": {"c": 2}});
    let customer = json!({"a": "1", "b": {"c": 2, "d": 9}});

    let diffs = payloadiff::compare(&template, &customer);
    let outcome = payloadiff::reconcile(
        &customer,
        &template,
        diffs.iter().map(|d| Decision::apply_template(d.path.clone()).into()),
    );

    println!("{} diffs, reconciled to {}", diffs.len(), outcome.document);
    println!("fingerprint {} -> {}", outcome.before, outcome.after);
}
