//! The code-generation interface boundary: operand locations, primitive
//! operation selectors, condition codes, the abstract [`CodeSink`] emission
//! trait, the recording [`Block`] sink and the reference interpreter.

pub mod block;
pub mod cond;
pub mod interp;
pub mod op;
pub mod sink;
pub mod types;
pub mod value;

pub use block::{Block, Request};
pub use cond::Cond;
pub use interp::Machine;
pub use op::{BinaryOp, CmpRel, OpSelector, UnaryOp};
pub use sink::{Callee, CodeSink, JumpTarget, TrapKind};
pub use types::Width;
pub use value::{Flag, FlagMask, Label, Loc, Operand, Reg};
