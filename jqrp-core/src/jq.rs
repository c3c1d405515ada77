//! jq compiler backed by the `jaq` crates.

use std::ops::ControlFlow;
use std::sync::Arc;

use jaq_core::load::{Arena, File, Loader};
use jaq_core::{Compiler, Ctx, Filter, FilterT, Native, RcIter};
use jaq_json::Val;
use serde_json::Value;

use crate::error::CompileError;
use crate::query::{CompiledQuery, QueryCompiler, QueryOutput};

/// Compiles jq text with the jq standard library in scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct JqCompiler;

impl JqCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl QueryCompiler for JqCompiler {
    fn compile(&self, raw_query: &str) -> Result<Arc<dyn CompiledQuery>, CompileError> {
        let loader = Loader::new(jaq_std::defs().chain(jaq_json::defs()));
        let arena = Arena::default();
        let modules = loader
            .load(&arena, File { code: raw_query, path: () })
            .map_err(|errs| {
                CompileError::new(format!("invalid syntax in {:?}: {:?}", raw_query, errs))
            })?;

        let filter = Compiler::default()
            .with_funs(jaq_std::funs().chain(jaq_json::funs()))
            .compile(modules)
            .map_err(|errs| {
                CompileError::new(format!("undefined symbol in {:?}: {:?}", raw_query, errs))
            })?;

        Ok(Arc::new(JqQuery { filter }))
    }
}

/// A compiled jq filter.
pub struct JqQuery {
    filter: Filter<Native<Val>>,
}

impl CompiledQuery for JqQuery {
    fn run(&self, input: Value, emit: &mut dyn FnMut(QueryOutput) -> ControlFlow<()>) {
        // `input`/`inputs` builtins see an empty stream; one document per request.
        let inputs = RcIter::new(core::iter::empty());
        let outputs = self.filter.run((Ctx::new([], &inputs), Val::from(input)));

        for output in outputs {
            let output = output
                .map(|val| integral_numbers(Value::from(val)))
                .map_err(|err| format!("{:?}", err));
            if emit(output).is_break() {
                break;
            }
        }
    }
}

/// Largest magnitude below which every integer is exact in an `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Re-encode integral floats as integers, so `2 / 2` prints as `1`.
fn integral_numbers(value: Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < MAX_SAFE_INTEGER => Value::from(f as i64),
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(integral_numbers).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, field)| (key, integral_numbers(field)))
                .collect(),
        ),
        other => other,
    }
}
