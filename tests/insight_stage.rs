use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use purchase_insights::gateway::{ChatGateway, ChatRequest, ChatResponse, LlmError};
use purchase_insights::insights::{
    synthesize_and_write, synthesize_insights, write_insights, CustomerActivity,
};
use tempfile::tempdir;

/// Gateway that echoes the customer summary back and can be told to fail on
/// the Nth call (1-based).
struct ScriptedGateway {
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
}

impl ScriptedGateway {
    fn ok() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: None,
        }
    }

    fn failing_on(call: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: Some(call),
        }
    }
}

#[async_trait]
impl ChatGateway for ScriptedGateway {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(LlmError::provider("model exploded", Some(500)));
        }

        let question = req
            .messages
            .iter()
            .rev()
            .map(|m| m.content.clone())
            .next()
            .unwrap_or_default();
        Ok(ChatResponse {
            content: format!("insight for [{question}]"),
            input_tokens: Some(10),
            output_tokens: Some(10),
            latency: Duration::from_millis(1),
        })
    }
}

fn records(n: usize) -> Vec<CustomerActivity> {
    (0..n)
        .map(|i| CustomerActivity {
            name: format!("Cliente {i}"),
            total_purchases: i as i64 + 1,
            total_spent: 10.0 * (i as f64 + 1.0),
        })
        .collect()
}

#[tokio::test]
async fn all_records_yield_insights_in_fetch_order() {
    let gateway = ScriptedGateway::ok();
    let insights = synthesize_insights(&gateway, "llama3", &records(5))
        .await
        .unwrap();

    assert_eq!(insights.len(), 5);
    for (i, insight) in insights.iter().enumerate() {
        assert!(
            insight.contains(&format!("Cliente {i}")),
            "insight {i} out of order: {insight}"
        );
    }
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn failure_mid_loop_aborts_without_partial_results() {
    let gateway = ScriptedGateway::failing_on(3);
    let err = synthesize_insights(&gateway, "llama3", &records(5))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("model exploded"));
    // The loop stops at the failing call; records 4 and 5 are never sent.
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn failed_stage_persists_no_artifact() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("outputs").join("insights.csv");

    let gateway = ScriptedGateway::failing_on(3);
    let result = synthesize_and_write(&gateway, "llama3", &records(5), &out).await;
    assert!(result.is_err());

    // Persistence only happens after the whole loop succeeds, so a mid-loop
    // failure must leave no partial file behind.
    assert!(!out.exists());
    assert!(!out.parent().unwrap().exists());
}

#[tokio::test]
async fn successful_stage_persists_full_artifact() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("outputs").join("insights.csv");

    let gateway = ScriptedGateway::ok();
    let insights = synthesize_and_write(&gateway, "llama3", &records(3), &out)
        .await
        .unwrap();

    assert_eq!(insights.len(), 3);
    let content = std::fs::read_to_string(&out).unwrap();
    assert_eq!(content.lines().count(), 4);
}

#[test]
fn artifact_has_header_plus_one_row_per_insight() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("outputs").join("insights.csv");

    let insights: Vec<String> = (0..4).map(|i| format!("insight {i}")).collect();
    write_insights(&out, &insights).unwrap();

    let content = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "insight");
    assert_eq!(lines[1], "insight 0");
    assert_eq!(lines[4], "insight 3");
}

#[test]
fn artifact_is_overwritten_each_run() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("insights.csv");

    write_insights(&out, &["first run a".into(), "first run b".into()]).unwrap();
    write_insights(&out, &["second run".into()]).unwrap();

    let content = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines, vec!["insight", "second run"]);
}

#[test]
fn artifact_quotes_insights_containing_delimiters() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("insights.csv");

    write_insights(&out, &["com vírgula, e \"aspas\"".into()]).unwrap();

    let mut reader = csv::Reader::from_path(&out).unwrap();
    let record = reader.records().next().unwrap().unwrap();
    assert_eq!(&record[0], "com vírgula, e \"aspas\"");
}
