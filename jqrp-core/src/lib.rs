//! jqrp-core: query transformation pipeline
//!
//! The pieces that turn an upstream JSON body and a client-supplied jq query
//! into a rewritten body:
//!
//! - [`CompiledQueryCache`]: bounded LRU cache in front of a [`QueryCompiler`]
//! - [`BoundedEvaluator`]: runs a compiled query under an optional deadline
//! - [`decode_single_root`]: strict single-root JSON decoding
//! - [`rewrite`]: maps evaluation results to the final body and status
//!
//! Nothing in this crate knows about HTTP servers; the proxy crate wires it
//! into the response path.

pub mod cache;
pub mod decoder;
pub mod error;
pub mod evaluator;
pub mod jq;
pub mod query;
pub mod rewriter;

pub use cache::{CacheStats, CompiledQueryCache};
pub use decoder::{decode_single_root, JsonRoot, RootShape};
pub use error::{CompileError, DecodeError, EvaluationError, RewriteError};
pub use evaluator::{BoundedEvaluator, EvaluationResult};
pub use jq::{JqCompiler, JqQuery};
pub use query::{CompiledQuery, QueryCompiler, QueryOutput};
pub use rewriter::{rewrite, Rewrite, REWRITE_STATUS};
