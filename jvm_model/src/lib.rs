//! The data model for JVM methods under analysis: types and values, the
//! identifier grammar, the decoded instruction set, the suite layout on
//! disk and the lazy bytecode store.

pub mod bytecode;
pub mod case;
pub mod class;
pub mod descriptor;
pub mod field;
pub mod method;
pub mod opcode;
pub mod outcome;
pub mod suite;
pub mod value;

pub use bytecode::{Bytecode, Pc};
pub use case::{Case, Input};
pub use class::{Absolute, ClassName};
pub use descriptor::Type;
pub use field::{AbsFieldId, FieldId};
pub use method::{AbsMethodId, MethodId};
pub use opcode::{BinaryOp, Condition, Insn, InvokeKind, Opcode};
pub use outcome::Outcome;
pub use suite::Suite;
pub use value::Value;
