//! The two interpreters over decoded JVM bytecode: a concrete small-step
//! interpreter that runs a method on a supplied input, and an abstract
//! interpreter that explores all runs over a chosen [`domains::Domain`]
//! with a worklist fixpoint.

pub mod concrete;
pub mod coverage;
pub mod fixpoint;
pub mod stack;

pub use concrete::{run, step, Frame, State};
pub use coverage::Coverage;
pub use fixpoint::{AbstractAnalysis, AnalysisResult};
pub use stack::Stack;
