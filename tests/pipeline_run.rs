use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use purchase_insights::gateway::LlmError;
use purchase_insights::pipeline::{run_pipeline, PipelineError, RunOutcome, Stage};

/// Stage that flips a flag when run, optionally failing instead.
struct FlagStage {
    name: &'static str,
    ran: Arc<AtomicBool>,
    fail_with: Option<&'static str>,
}

impl FlagStage {
    fn ok(name: &'static str) -> (Box<dyn Stage>, Arc<AtomicBool>) {
        let ran = Arc::new(AtomicBool::new(false));
        (
            Box::new(Self {
                name,
                ran: ran.clone(),
                fail_with: None,
            }),
            ran,
        )
    }

    fn failing(name: &'static str, message: &'static str) -> (Box<dyn Stage>, Arc<AtomicBool>) {
        let ran = Arc::new(AtomicBool::new(false));
        (
            Box::new(Self {
                name,
                ran: ran.clone(),
                fail_with: Some(message),
            }),
            ran,
        )
    }
}

#[async_trait]
impl Stage for FlagStage {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(&self) -> Result<(), PipelineError> {
        self.ran.store(true, Ordering::SeqCst);
        match self.fail_with {
            Some(message) => Err(PipelineError::Gateway(LlmError::config(message))),
            None => Ok(()),
        }
    }
}

#[tokio::test]
async fn all_stages_succeed_in_order() {
    let (a, a_ran) = FlagStage::ok("a");
    let (b, b_ran) = FlagStage::ok("b");
    let (c, c_ran) = FlagStage::ok("c");

    let report = run_pipeline(&[a, b, c]).await;

    assert!(report.succeeded());
    assert_eq!(report.completed, vec!["a", "b", "c"]);
    assert!(a_ran.load(Ordering::SeqCst));
    assert!(b_ran.load(Ordering::SeqCst));
    assert!(c_ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn run_halts_at_first_failing_stage() {
    let (a, a_ran) = FlagStage::ok("a");
    let (b, b_ran) = FlagStage::failing("b", "b blew up");
    let (c, c_ran) = FlagStage::ok("c");

    let report = run_pipeline(&[a, b, c]).await;

    assert!(a_ran.load(Ordering::SeqCst));
    assert!(b_ran.load(Ordering::SeqCst));
    // Stage c's side effects must never occur.
    assert!(!c_ran.load(Ordering::SeqCst));

    assert_eq!(report.completed, vec!["a"]);
    match report.outcome {
        RunOutcome::Failed {
            index,
            stage,
            error,
        } => {
            assert_eq!(index, 1);
            assert_eq!(stage, "b");
            assert!(error.to_string().contains("b blew up"));
        }
        RunOutcome::Succeeded => panic!("run should have failed"),
    }
}

#[tokio::test]
async fn empty_pipeline_trivially_succeeds() {
    let report = run_pipeline(&[]).await;
    assert!(report.succeeded());
    assert!(report.completed.is_empty());
}

#[tokio::test]
async fn first_stage_failure_completes_nothing() {
    let (a, _) = FlagStage::failing("a", "no database");
    let (b, b_ran) = FlagStage::ok("b");

    let report = run_pipeline(&[a, b]).await;

    assert!(!report.succeeded());
    assert!(report.completed.is_empty());
    assert!(!b_ran.load(Ordering::SeqCst));
}
