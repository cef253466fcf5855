//! SSA values.
//!
//! An [`SsaValue`] is an immutable tagged handle. It is either a function argument, a literal
//! constant, the result of an instruction, or `Unknown` (a read that has no reaching definition).
//! Every value carries an id drawn from the builder's single counter, so ids are unique across
//! all kinds within one build.
//!
//! A result value's defining instruction is recovered with [`SsaValue::def`]: instruction ids and
//! result ids are the same number.

use std::fmt;

use crate::ssa::InstId;

/// Discriminant of an [`SsaValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueKind {
    /// No reaching definition.
    #[default]
    Unknown,
    /// A formal parameter of the enclosing function.
    Argument,
    /// An integer constant.
    Literal,
    /// The value produced by an instruction.
    Result,
}

/// A value in SSA form.
///
/// Equality compares kind, id and literal payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SsaValue {
    kind: ValueKind,
    id: u32,
    literal: i64,
}

impl SsaValue {
    /// The undefined value.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            kind: ValueKind::Unknown,
            id: 0,
            literal: 0,
        }
    }

    /// A function argument with the given id.
    #[must_use]
    pub const fn argument(id: u32) -> Self {
        Self {
            kind: ValueKind::Argument,
            id,
            literal: 0,
        }
    }

    /// A literal constant.
    #[must_use]
    pub const fn literal(id: u32, value: i64) -> Self {
        Self {
            kind: ValueKind::Literal,
            id,
            literal: value,
        }
    }

    /// The result of instruction `inst`.
    #[must_use]
    pub const fn result(inst: InstId) -> Self {
        Self {
            kind: ValueKind::Result,
            id: inst.index(),
            literal: 0,
        }
    }

    /// Returns the value kind.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Returns the value id.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Returns the literal payload, if this is a literal.
    #[must_use]
    pub const fn literal_value(&self) -> Option<i64> {
        match self.kind {
            ValueKind::Literal => Some(self.literal),
            _ => None,
        }
    }

    /// Returns the instruction that defines this value, if it is an instruction result.
    #[must_use]
    pub const fn def(&self) -> Option<InstId> {
        match self.kind {
            ValueKind::Result => Some(InstId::new(self.id)),
            _ => None,
        }
    }

    /// Returns `true` for the undefined value.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self.kind, ValueKind::Unknown)
    }
}

impl fmt::Display for SsaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ValueKind::Unknown => write!(f, "undef"),
            ValueKind::Argument | ValueKind::Result => write!(f, "V{}", self.id),
            ValueKind::Literal => write!(f, "{}", self.literal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_includes_payload() {
        assert_eq!(SsaValue::literal(3, 10), SsaValue::literal(3, 10));
        assert_ne!(SsaValue::literal(3, 10), SsaValue::literal(3, 11));
        assert_ne!(SsaValue::literal(3, 10), SsaValue::literal(4, 10));
        assert_ne!(SsaValue::argument(3), SsaValue::result(InstId::new(3)));
    }

    #[test]
    fn test_def_only_for_results() {
        assert_eq!(SsaValue::result(InstId::new(9)).def(), Some(InstId::new(9)));
        assert_eq!(SsaValue::argument(9).def(), None);
        assert_eq!(SsaValue::literal(9, 1).def(), None);
        assert_eq!(SsaValue::unknown().def(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(SsaValue::argument(2).to_string(), "V2");
        assert_eq!(SsaValue::result(InstId::new(5)).to_string(), "V5");
        assert_eq!(SsaValue::literal(1, -4).to_string(), "-4");
        assert_eq!(SsaValue::unknown().to_string(), "undef");
        assert_eq!(SsaValue::literal(1, -4).literal_value(), Some(-4));
        assert!(SsaValue::default().is_unknown());
    }
}
