//! Deadline-bounded query evaluation.
//!
//! A query is compiled (through the cache) and run on the blocking pool. With
//! a deadline configured the execution races a timer: whichever finishes
//! first decides the outcome. When the timer wins, the execution is told to
//! stop through a shared cancel flag, which it checks at every output. An
//! execution that produces no output for a long stretch keeps running until
//! its next checkpoint; its result is discarded either way.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinError;

use crate::cache::CompiledQueryCache;
use crate::error::EvaluationError;

/// Fully materialized, ordered outputs of one evaluation.
pub type EvaluationResult = Vec<Value>;

/// Cooperative cancellation signal shared with a running execution.
#[derive(Debug, Clone, Default)]
struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Runs compiled queries against decoded input under an optional deadline.
#[derive(Debug, Clone)]
pub struct BoundedEvaluator {
    cache: Arc<CompiledQueryCache>,
    deadline: Option<Duration>,
}

impl BoundedEvaluator {
    /// A zero deadline disables the timer race entirely.
    pub fn new(cache: Arc<CompiledQueryCache>, deadline: Option<Duration>) -> Self {
        Self {
            cache,
            deadline: deadline.filter(|d| !d.is_zero()),
        }
    }

    /// Evaluator without a deadline.
    pub fn unbounded(cache: Arc<CompiledQueryCache>) -> Self {
        Self::new(cache, None)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn cache(&self) -> &Arc<CompiledQueryCache> {
        &self.cache
    }

    /// Compile `raw_query` and run it against `input`, draining every output.
    ///
    /// A failure output anywhere in the sequence fails the whole call; no
    /// partial results are returned.
    pub async fn evaluate(
        &self,
        raw_query: &str,
        input: Value,
    ) -> Result<EvaluationResult, EvaluationError> {
        let cancel = CancelFlag::default();
        let execution = {
            let cache = Arc::clone(&self.cache);
            let raw_query = raw_query.to_owned();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || execute(&cache, &raw_query, input, &cancel))
        };

        let Some(deadline) = self.deadline else {
            return settle(execution.await);
        };

        match tokio::time::timeout(deadline, execution).await {
            Ok(joined) => settle(joined),
            Err(_) => {
                cancel.cancel();
                tracing::debug!(
                    query = %raw_query,
                    deadline_ms = deadline.as_millis() as u64,
                    "Query evaluation exceeded deadline, cancelling"
                );
                Err(EvaluationError::Timeout { deadline })
            }
        }
    }
}

fn execute(
    cache: &CompiledQueryCache,
    raw_query: &str,
    input: Value,
    cancel: &CancelFlag,
) -> Result<EvaluationResult, EvaluationError> {
    let program = cache.lookup_or_compile(raw_query)?;

    let mut results = Vec::new();
    let mut failure = None;
    if !cancel.is_cancelled() {
        program.run(input, &mut |output| {
            if cancel.is_cancelled() {
                return ControlFlow::Break(());
            }
            match output {
                Ok(value) => {
                    results.push(value);
                    ControlFlow::Continue(())
                }
                Err(reason) => {
                    failure = Some(reason);
                    ControlFlow::Break(())
                }
            }
        });
    }

    if let Some(reason) = failure {
        return Err(EvaluationError::Failed { reason });
    }
    if cancel.is_cancelled() {
        // Nobody is waiting for this any more.
        return Err(EvaluationError::Aborted {
            reason: "cancelled".to_string(),
        });
    }
    Ok(results)
}

fn settle(
    joined: Result<Result<EvaluationResult, EvaluationError>, JoinError>,
) -> Result<EvaluationResult, EvaluationError> {
    joined.unwrap_or_else(|err| {
        tracing::error!(error = %err, "Query evaluation task failed");
        Err(EvaluationError::Aborted {
            reason: err.to_string(),
        })
    })
}
