//! jqrp Test Utilities
//!
//! Shared test infrastructure for the jqrp workspace:
//! - Stand-in compilers and programs that count calls or misbehave on purpose
//! - Canned JSON fixtures
//! - Throwaway HTTP backends bound to loopback

use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::header;
use axum::Router;
use jqrp_core::{CompileError, CompiledQuery, QueryCompiler, QueryOutput};
use serde_json::Value;

// ============================================================================
// FIXTURES
// ============================================================================

/// Two-element array of people, the document most scenarios run against.
pub const PEOPLE_JSON: &str = r#"[{"id":1,"name":"alpha"},{"id":2,"name":"beta"}]"#;

/// Single person object.
pub const PERSON_JSON: &str = r#"{"id":1,"name":"alpha"}"#;

pub const APPLICATION_JSON: &str = "application/json";

/// [`PEOPLE_JSON`] as a value.
pub fn people() -> Value {
    serde_json::from_str(PEOPLE_JSON).expect("fixture is valid JSON")
}

// ============================================================================
// STAND-IN PROGRAMS
// ============================================================================

/// Emits a fixed list of outputs, honouring `Break`.
#[derive(Debug, Clone, Default)]
pub struct CannedProgram {
    outputs: Vec<QueryOutput>,
}

impl CannedProgram {
    pub fn new(outputs: Vec<QueryOutput>) -> Self {
        Self { outputs }
    }

    /// Program that emits only successful values.
    pub fn values(values: Vec<Value>) -> Self {
        Self::new(values.into_iter().map(Ok).collect())
    }

    /// Program that emits `prefix` and then fails.
    pub fn failing_after(prefix: Vec<Value>, reason: &str) -> Self {
        let mut outputs: Vec<QueryOutput> = prefix.into_iter().map(Ok).collect();
        outputs.push(Err(reason.to_string()));
        Self::new(outputs)
    }
}

impl CompiledQuery for CannedProgram {
    fn run(&self, _input: Value, emit: &mut dyn FnMut(QueryOutput) -> ControlFlow<()>) {
        for output in &self.outputs {
            if emit(output.clone()).is_break() {
                return;
            }
        }
    }
}

/// Blocks for `delay`, then echoes its input once.
#[derive(Debug, Clone)]
pub struct SleepyProgram {
    delay: Duration,
}

impl SleepyProgram {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl CompiledQuery for SleepyProgram {
    fn run(&self, input: Value, emit: &mut dyn FnMut(QueryOutput) -> ControlFlow<()>) {
        std::thread::sleep(self.delay);
        let _ = emit(Ok(input));
    }
}

/// Emits an increasing counter every `interval`, `ticks` times, recording
/// how many outputs were accepted by the sink.
#[derive(Debug, Clone)]
pub struct TickingProgram {
    interval: Duration,
    ticks: usize,
    accepted: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl TickingProgram {
    pub fn new(interval: Duration, ticks: usize) -> Self {
        Self {
            interval,
            ticks,
            accepted: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Outputs the sink accepted so far, across all runs.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Runs that returned, whether stopped early or not.
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl CompiledQuery for TickingProgram {
    fn run(&self, _input: Value, emit: &mut dyn FnMut(QueryOutput) -> ControlFlow<()>) {
        for tick in 0..self.ticks {
            std::thread::sleep(self.interval);
            if emit(Ok(Value::from(tick))).is_break() {
                break;
            }
            self.accepted.fetch_add(1, Ordering::SeqCst);
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// STAND-IN COMPILERS
// ============================================================================

/// Hands out one shared program for every query, except queries starting
/// with `!`, which fail to compile. Counts calls.
pub struct StubCompiler {
    program: Arc<dyn CompiledQuery>,
    calls: AtomicUsize,
}

impl StubCompiler {
    pub fn new(program: impl CompiledQuery + 'static) -> Self {
        Self {
            program: Arc::new(program),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl QueryCompiler for StubCompiler {
    fn compile(&self, raw_query: &str) -> Result<Arc<dyn CompiledQuery>, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if raw_query.starts_with('!') {
            return Err(CompileError::new(format!("unexpected token in {:?}", raw_query)));
        }
        Ok(Arc::clone(&self.program))
    }
}

/// Wraps another compiler and counts how often it is invoked.
pub struct CountingCompiler<C> {
    inner: C,
    calls: AtomicUsize,
}

impl<C: QueryCompiler> CountingCompiler<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<C: QueryCompiler> QueryCompiler for CountingCompiler<C> {
    fn compile(&self, raw_query: &str) -> Result<Arc<dyn CompiledQuery>, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.compile(raw_query)
    }
}

// ============================================================================
// THROWAWAY BACKENDS
// ============================================================================

/// Serve `router` on an ephemeral loopback port for the rest of the test.
pub async fn spawn_backend(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener has an address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("backend server");
    });
    addr
}

/// Like [`spawn_backend`], but handlers can extract `ConnectInfo<SocketAddr>`.
pub async fn spawn_with_connect_info(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener has an address");
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("server with connect info");
    });
    addr
}

/// Router answering every request with `body` and the given content type.
pub fn static_backend(body: &'static str, content_type: &'static str) -> Router {
    Router::new().fallback(move || async move { ([(header::CONTENT_TYPE, content_type)], body) })
}

/// Router answering every request with [`PEOPLE_JSON`] as `application/json`.
pub fn people_backend() -> Router {
    static_backend(PEOPLE_JSON, APPLICATION_JSON)
}
