//! Dead-code debloating for the analyzed java sources: a syntactic layer
//! over the parsed source tree, a line-based rewriter, and the pipeline
//! that chains them with the interpreters' coverage.

pub mod pipeline;
pub mod rewrite;
pub mod syntactic;

pub use pipeline::{Debloater, MethodReport};
pub use rewrite::{RewritePlan, StatementSpan};
pub use syntactic::{SourceTree, Triviality};
