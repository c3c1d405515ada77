//! Deadline and cancellation behaviour of the bounded evaluator.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jqrp_core::{BoundedEvaluator, CompiledQuery, CompiledQueryCache, EvaluationError, QueryOutput};
use jqrp_test_utils::{people, CannedProgram, SleepyProgram, StubCompiler, TickingProgram};
use serde_json::{json, Value};

const UNIT: Duration = Duration::from_millis(150);

fn evaluator_for(program: impl CompiledQuery + 'static, deadline: Option<Duration>) -> BoundedEvaluator {
    let compiler = Arc::new(StubCompiler::new(program));
    let cache = Arc::new(CompiledQueryCache::new(compiler, 8));
    BoundedEvaluator::new(cache, deadline)
}

struct PanickingProgram;

impl CompiledQuery for PanickingProgram {
    fn run(&self, _input: Value, _emit: &mut dyn FnMut(QueryOutput) -> ControlFlow<()>) {
        panic!("program blew up");
    }
}

#[tokio::test]
async fn test_deadline_wins_over_slow_execution() {
    let evaluator = evaluator_for(SleepyProgram::new(UNIT * 2), Some(UNIT));

    let started = Instant::now();
    let err = evaluator.evaluate(".", people()).await.unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err, EvaluationError::Timeout { deadline: UNIT });
    assert!(elapsed >= UNIT, "returned before the deadline: {:?}", elapsed);
    assert!(
        elapsed < UNIT * 2,
        "caller waited for the execution: {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_execution_wins_over_generous_deadline() {
    let evaluator = evaluator_for(SleepyProgram::new(UNIT / 10), Some(UNIT * 4));
    let results = evaluator.evaluate(".", json!({"id": 1})).await.unwrap();
    assert_eq!(results, vec![json!({"id": 1})]);
}

#[tokio::test]
async fn test_no_deadline_waits_for_completion() {
    let evaluator = evaluator_for(SleepyProgram::new(UNIT), None);

    let started = Instant::now();
    let results = evaluator.evaluate(".", json!([])).await.unwrap();

    assert!(started.elapsed() >= UNIT);
    assert_eq!(results, vec![json!([])]);
}

#[tokio::test]
async fn test_timed_out_execution_is_stopped() {
    let program = TickingProgram::new(Duration::from_millis(10), 10_000);
    let probe = program.clone();
    let evaluator = evaluator_for(program, Some(Duration::from_millis(50)));

    let err = evaluator.evaluate(".", Value::Null).await.unwrap_err();
    assert!(matches!(err, EvaluationError::Timeout { .. }));

    // The loser stops at its next checkpoint rather than running all ticks.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(probe.finished(), 1);
    assert!(probe.accepted() < 100, "accepted {} outputs", probe.accepted());
}

#[tokio::test]
async fn test_failure_output_discards_partial_results() {
    let program = CannedProgram::failing_after(vec![json!(1), json!(2)], "cannot index number");
    let err = evaluator_for(program, None)
        .evaluate(".", Value::Null)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        EvaluationError::Failed {
            reason: "cannot index number".to_string()
        }
    );
    assert!(err.is_query_fault());
}

#[tokio::test]
async fn test_compile_error_is_reported() {
    let err = evaluator_for(CannedProgram::default(), Some(UNIT))
        .evaluate("!broken", Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, EvaluationError::Compile(_)));
    assert!(err.is_query_fault());
}

#[tokio::test]
async fn test_panicking_program_is_aborted() {
    let err = evaluator_for(PanickingProgram, None)
        .evaluate(".", Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, EvaluationError::Aborted { .. }));
    assert!(!err.is_query_fault());
}

#[tokio::test]
async fn test_repeated_evaluation_compiles_once() {
    let compiler = Arc::new(StubCompiler::new(CannedProgram::values(vec![json!([1])])));
    let cache = Arc::new(CompiledQueryCache::new(compiler.clone(), 4));
    let evaluator = BoundedEvaluator::unbounded(cache);

    for _ in 0..5 {
        let results = evaluator.evaluate(".a", Value::Null).await.unwrap();
        assert_eq!(results, vec![json!([1])]);
    }
    assert_eq!(compiler.calls(), 1);
}
