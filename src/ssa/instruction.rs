//! SSA instructions.
//!
//! An [`SsaInstruction`] is an opcode, an ordered operand list, the block that owns it, the
//! instructions that consume its result (its users) and the result value itself. Back-references
//! to the owning block and to users are plain ids into the enclosing
//! [`SsaFunction`](crate::ssa::SsaFunction).
//!
//! Instructions are only ever changed in two ways after creation: PHIs receive operands once
//! their block is sealed, and a trivial PHI is replaced in place by a `MOV`.

use std::fmt;

use strum::{Display, EnumCount, EnumIter};

use crate::{
    cfg::{BlockId, Terminator},
    ssa::SsaValue,
};

/// Identity of an instruction. Equal to the id of the instruction's result value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(u32);

impl InstId {
    /// Creates an instruction id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.0)
    }
}

/// SSA opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumCount, EnumIter)]
#[strum(serialize_all = "UPPERCASE")]
pub enum SsaOp {
    /// Merge of the incoming values of a block, one operand per predecessor.
    Phi,
    /// Branch. One operand (the condition) for a conditional branch, none otherwise.
    Br,
    /// Call of a named function with the operands as arguments.
    Call,
    /// Return, with an optional value operand.
    Ret,
    /// Copy of the single operand.
    Mov,
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Greater-than comparison.
    Gt,
    /// Less-than comparison.
    Lt,
    /// Equality comparison.
    Eq,
    /// Bitwise and logical conjunction.
    And,
    /// Bitwise and logical disjunction.
    Or,
    /// Exclusive or.
    Xor,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
    /// Left shift.
    LShift,
    /// Right shift.
    RShift,
    /// Remainder.
    Mod,
    /// Logical negation.
    Not,
    /// Arithmetic negation.
    Neg,
}

/// An instruction in SSA form.
///
/// Equality is structural: owning block, opcode, result, operands and users all have to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsaInstruction {
    op: SsaOp,
    operands: Vec<SsaValue>,
    block: BlockId,
    users: Vec<InstId>,
    result: SsaValue,
    callee: Option<String>,
    targets: Vec<BlockId>,
}

impl SsaInstruction {
    /// Creates an operandless instruction.
    ///
    /// # Arguments
    ///
    /// * `op` - Opcode
    /// * `id` - Id of the instruction, which is also the id of its result value
    /// * `block` - Owning block
    #[must_use]
    pub fn new(op: SsaOp, id: InstId, block: BlockId) -> Self {
        Self {
            op,
            operands: Vec::new(),
            block,
            users: Vec::new(),
            result: SsaValue::result(id),
            callee: None,
            targets: Vec::new(),
        }
    }

    /// Creates a `CALL` to `callee`.
    #[must_use]
    pub fn call(callee: &str, id: InstId, block: BlockId) -> Self {
        Self {
            callee: Some(callee.to_string()),
            ..Self::new(SsaOp::Call, id, block)
        }
    }

    /// Returns the instruction id.
    #[must_use]
    pub fn id(&self) -> InstId {
        InstId::new(self.result.id())
    }

    /// Returns the opcode.
    #[must_use]
    pub const fn op(&self) -> SsaOp {
        self.op
    }

    /// Returns the operands in order.
    #[must_use]
    pub fn operands(&self) -> &[SsaValue] {
        &self.operands
    }

    pub(crate) fn operands_mut(&mut self) -> &mut Vec<SsaValue> {
        &mut self.operands
    }

    /// Appends an operand.
    pub fn add_operand(&mut self, value: SsaValue) {
        self.operands.push(value);
    }

    /// Returns the owning block.
    #[must_use]
    pub const fn block(&self) -> BlockId {
        self.block
    }

    /// Returns the instructions that consume this instruction's result.
    #[must_use]
    pub fn users(&self) -> &[InstId] {
        &self.users
    }

    /// Records `user` as a consumer of this instruction's result. Duplicates are ignored.
    pub fn add_user(&mut self, user: InstId) {
        if !self.users.contains(&user) {
            self.users.push(user);
        }
    }

    /// Returns the value this instruction produces.
    #[must_use]
    pub const fn result(&self) -> SsaValue {
        self.result
    }

    /// Returns the callee name of a `CALL`.
    #[must_use]
    pub fn callee(&self) -> Option<&str> {
        self.callee.as_deref()
    }

    /// Returns the blocks a `BR` transfers control to, taken edge first.
    #[must_use]
    pub fn targets(&self) -> &[BlockId] {
        &self.targets
    }

    /// Records a branch target.
    pub fn add_target(&mut self, block: BlockId) {
        self.targets.push(block);
    }

    /// Returns `true` for PHI instructions.
    #[must_use]
    pub fn is_phi(&self) -> bool {
        self.op == SsaOp::Phi
    }
}

impl Terminator for SsaInstruction {
    fn is_terminator(&self) -> bool {
        matches!(self.op, SsaOp::Br | SsaOp::Ret)
    }
}

impl fmt::Display for SsaInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.callee.iter().cloned().collect();
        parts.extend(self.operands.iter().map(ToString::to_string));
        parts.extend(self.targets.iter().map(ToString::to_string));
        // BR and RET produce no value.
        if !self.is_terminator() {
            parts.push(self.result.to_string());
        }

        if parts.is_empty() {
            write!(f, "{}", self.op)
        } else {
            write!(f, "{} {}", self.op, parts.join(", "))
        }
    }
}
