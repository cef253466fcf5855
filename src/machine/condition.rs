//! Condition codes of conditional jumps and calls.

use strum::{Display, EnumIter, FromRepr};

use crate::machine::Flags;

/// A 4-bit condition code, as found in `op1` of `Jx` and `Cx`.
///
/// | Code | Name | Holds when |
/// |------|------|------------|
/// | 0x0 | Z  | zero |
/// | 0x1 | NZ | not zero |
/// | 0x2 | N  | negative |
/// | 0x3 | NN | not negative |
/// | 0x4 | P  | positive (not negative and not zero) |
/// | 0x5 | O  | overflow |
/// | 0x6 | NO | no overflow |
/// | 0x7 | A  | above: no carry and not zero |
/// | 0x8 | AE | above or equal: no carry |
/// | 0x9 | B  | below: carry |
/// | 0xA | BE | below or equal: carry or zero |
/// | 0xB | G  | greater: overflow equals negative and not zero |
/// | 0xC | GE | greater or equal: overflow equals negative |
/// | 0xD | L  | less: overflow differs from negative |
/// | 0xE | LE | less or equal: overflow differs from negative, or zero |
///
/// Code `0xF` is reserved and never holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, FromRepr)]
#[strum(serialize_all = "UPPERCASE")]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Condition {
    Z = 0x0,
    Nz = 0x1,
    N = 0x2,
    Nn = 0x3,
    P = 0x4,
    O = 0x5,
    No = 0x6,
    A = 0x7,
    Ae = 0x8,
    B = 0x9,
    Be = 0xA,
    G = 0xB,
    Ge = 0xC,
    L = 0xD,
    Le = 0xE,
}

impl Condition {
    /// Decodes the low nibble of `code`.
    #[must_use]
    pub fn decode(code: u8) -> Option<Self> {
        Self::from_repr(code & 0xF)
    }

    /// Evaluates the condition against a flag register.
    #[must_use]
    pub fn evaluate(self, flags: Flags) -> bool {
        let zero = flags.contains(Flags::ZERO);
        let negative = flags.contains(Flags::NEGATIVE);
        let overflow = flags.contains(Flags::OVERFLOW);
        let carry = flags.contains(Flags::CARRY);

        match self {
            Condition::Z => zero,
            Condition::Nz => !zero,
            Condition::N => negative,
            Condition::Nn => !negative,
            Condition::P => !negative && !zero,
            Condition::O => overflow,
            Condition::No => !overflow,
            Condition::A => !carry && !zero,
            Condition::Ae => !carry,
            Condition::B => carry,
            Condition::Be => carry || zero,
            Condition::G => overflow == negative && !zero,
            Condition::Ge => overflow == negative,
            Condition::L => overflow != negative,
            Condition::Le => overflow != negative || zero,
        }
    }

    /// Decodes and evaluates `code` in one go. The reserved code never holds.
    #[must_use]
    pub fn holds(code: u8, flags: Flags) -> bool {
        Self::decode(code).is_some_and(|condition| condition.evaluate(flags))
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_decode() {
        assert_eq!(Condition::decode(0x0), Some(Condition::Z));
        assert_eq!(Condition::decode(0xE), Some(Condition::Le));
        assert_eq!(Condition::decode(0x1B), Some(Condition::G));
        assert_eq!(Condition::decode(0xF), None);
        assert_eq!(Condition::iter().count(), 15);
    }

    #[test]
    fn test_empty_flags() {
        let flags = Flags::empty();
        let holding: Vec<Condition> = Condition::iter().filter(|c| c.evaluate(flags)).collect();
        assert_eq!(
            holding,
            vec![
                Condition::Nz,
                Condition::Nn,
                Condition::P,
                Condition::No,
                Condition::A,
                Condition::Ae,
                Condition::G,
                Condition::Ge,
            ]
        );
    }

    #[test]
    fn test_unsigned_above_ignores_overflow() {
        // 0x8000 - 1: no borrow, signed overflow.
        let flags = Flags::OVERFLOW;
        assert!(Condition::A.evaluate(flags));
        assert!(!Condition::G.evaluate(flags));
        assert!(!Condition::A.evaluate(Flags::CARRY));
    }

    #[test]
    fn test_signed_comparisons() {
        // 1 - 2: negative, no overflow.
        let less = Flags::NEGATIVE | Flags::CARRY;
        assert!(Condition::L.evaluate(less));
        assert!(Condition::Le.evaluate(less));
        assert!(!Condition::Ge.evaluate(less));
        assert!(Condition::B.evaluate(less));

        let equal = Flags::ZERO;
        assert!(Condition::Ge.evaluate(equal));
        assert!(!Condition::G.evaluate(equal));
        assert!(Condition::Be.evaluate(equal));
        assert!(!Condition::A.evaluate(equal));
        assert!(!Condition::holds(0xF, equal));
    }
}
