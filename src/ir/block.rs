use std::fmt;

use smallvec::SmallVec;

use crate::ir::op::{BinaryOp, CmpRel, UnaryOp};
use crate::ir::sink::{Callee, CodeSink, JumpTarget};
use crate::ir::types::Width;
use crate::ir::value::{Flag, FlagMask, Label, Loc, Operand};

/// One recorded emission request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Move { dst: Loc, src: Operand },
    Unary { op: UnaryOp, dst: Loc, src: Operand, flags: FlagMask },
    Binary { op: BinaryOp, dst: Loc, lhs: Operand, rhs: Operand, flags: FlagMask },
    Compare { rel: CmpRel, width: Width, lhs: Operand, rhs: Operand },
    CondMove { flag: Flag, sense: bool, dst: Loc, src: Operand },
    Label(Label),
    JumpIf { flag: Flag, sense: bool, target: JumpTarget },
    Jump(JumpTarget),
    Call { callee: Callee, args: SmallVec<[Operand; 4]>, ret: Option<Loc> },
    TerminateUnit,
}

/// A recording sink: the translation unit as a list of emission requests.
///
/// This is what the morphing engine produces for one or more instructions,
/// what tests inspect, and what the reference interpreter executes.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub requests: Vec<Request>,
    next_label: u32,
}

impl Block {
    pub fn new() -> Block {
        Block::default()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Number of recorded requests matching `pred`.
    pub fn count_matching(&self, pred: impl Fn(&Request) -> bool) -> usize {
        self.requests.iter().filter(|r| pred(r)).count()
    }

    /// Does any request write the given flag location (as a move/op
    /// destination, not via a flag-result mask)?
    pub fn writes_flag_loc(&self, flag: Flag) -> bool {
        self.requests.iter().any(|r| match r {
            Request::Move { dst, .. }
            | Request::Unary { dst, .. }
            | Request::Binary { dst, .. }
            | Request::CondMove { dst, .. } => *dst == Loc::Flag(flag),
            _ => false,
        })
    }
}

impl CodeSink for Block {
    fn emit_move(&mut self, dst: Loc, src: Operand) {
        self.requests.push(Request::Move { dst, src });
    }

    fn emit_unary(&mut self, op: UnaryOp, dst: Loc, src: Operand, flags: FlagMask) {
        self.requests.push(Request::Unary { op, dst, src, flags });
    }

    fn emit_binary(&mut self, op: BinaryOp, dst: Loc, lhs: Operand, rhs: Operand, flags: FlagMask) {
        self.requests.push(Request::Binary { op, dst, lhs, rhs, flags });
    }

    fn emit_compare(&mut self, rel: CmpRel, width: Width, lhs: Operand, rhs: Operand) {
        self.requests.push(Request::Compare { rel, width, lhs, rhs });
    }

    fn emit_cond_move(&mut self, flag: Flag, sense: bool, dst: Loc, src: Operand) {
        self.requests.push(Request::CondMove { flag, sense, dst, src });
    }

    fn alloc_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    fn emit_label(&mut self, label: Label) {
        self.requests.push(Request::Label(label));
    }

    fn emit_jump_if(&mut self, flag: Flag, sense: bool, target: JumpTarget) {
        self.requests.push(Request::JumpIf { flag, sense, target });
    }

    fn emit_jump(&mut self, target: JumpTarget) {
        self.requests.push(Request::Jump(target));
    }

    fn emit_call(&mut self, callee: Callee, args: &[Operand], ret: Option<Loc>) {
        self.requests.push(Request::Call {
            callee,
            args: SmallVec::from_slice(args),
            ret,
        });
    }

    fn terminate_unit(&mut self) {
        self.requests.push(Request::TerminateUnit);
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for request in &self.requests {
            match request {
                Request::Move { dst, src } => writeln!(f, "  {} = {}", dst, src)?,
                Request::Unary { op, dst, src, flags } => {
                    writeln!(f, "  {} = {} {} [{:?}]", dst, op, src, flags)?
                }
                Request::Binary { op, dst, lhs, rhs, flags } => {
                    writeln!(f, "  {} = {} {}, {} [{:?}]", dst, op, lhs, rhs, flags)?
                }
                Request::Compare { rel, width, lhs, rhs } => {
                    writeln!(f, "  $tst = {} {} {}, {}", rel, width, lhs, rhs)?
                }
                Request::CondMove { flag, sense, dst, src } => {
                    writeln!(f, "  if ${}=={} {} = {}", flag, *sense as u8, dst, src)?
                }
                Request::Label(label) => writeln!(f, "{}:", label)?,
                Request::JumpIf { flag, sense, target } => {
                    writeln!(f, "  if ${}=={} goto {:?}", flag, *sense as u8, target)?
                }
                Request::Jump(target) => writeln!(f, "  goto {:?}", target)?,
                Request::Call { callee, args, ret } => {
                    write!(f, "  ")?;
                    if let Some(ret) = ret {
                        write!(f, "{} = ", ret)?;
                    }
                    write!(f, "call {:?}(", callee)?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    writeln!(f, ")")?
                }
                Request::TerminateUnit => writeln!(f, "  terminate")?,
            }
        }
        Ok(())
    }
}
