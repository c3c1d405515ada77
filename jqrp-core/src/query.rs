//! Query capability traits.
//!
//! The query language is consumed as an opaque capability: a compiler that
//! turns text into a program, and programs that turn one input value into a
//! sequence of outputs. Keeping this behind traits lets the cache and the
//! evaluator be exercised with stand-ins that count calls or misbehave on
//! purpose.

use std::ops::ControlFlow;
use std::sync::Arc;

use serde_json::Value;

use crate::error::CompileError;

/// One output of a running program: a value, or the failure it signalled.
pub type QueryOutput = Result<Value, String>;

/// A compiled, immutable program that may be shared across evaluations.
pub trait CompiledQuery: Send + Sync {
    /// Run against `input`, handing every output to `emit` in order.
    ///
    /// Implementations must stop producing outputs as soon as `emit`
    /// returns [`ControlFlow::Break`].
    fn run(&self, input: Value, emit: &mut dyn FnMut(QueryOutput) -> ControlFlow<()>);
}

/// Turns raw query text into a [`CompiledQuery`].
pub trait QueryCompiler: Send + Sync {
    fn compile(&self, raw_query: &str) -> Result<Arc<dyn CompiledQuery>, CompileError>;
}

impl<C: QueryCompiler + ?Sized> QueryCompiler for Arc<C> {
    fn compile(&self, raw_query: &str) -> Result<Arc<dyn CompiledQuery>, CompileError> {
        (**self).compile(raw_query)
    }
}
