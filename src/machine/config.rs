//! Run limits for the interpreter.
//!
//! # Example
//!
//! ```rust
//! use toslang::machine::MachineLimits;
//!
//! let limits = MachineLimits::new()
//!     .with_max_instructions(10_000)
//!     .with_stop_on_fault(false);
//! assert_eq!(limits.max_instructions, 10_000);
//! ```

/// Bounds on [`Interpreter::run`](super::Interpreter::run).
///
/// # Default Values
///
/// | Limit | Default Value |
/// |-------|---------------|
/// | `max_instructions` | 1,000,000 |
/// | `stop_on_fault` | true |
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MachineLimits {
    /// Maximum instructions to execute.
    ///
    /// Set to 0 for unlimited execution. The machine has no halt instruction, so an unlimited
    /// run only ends on a fault.
    pub max_instructions: u64,

    /// Whether a step that raised any fault ends the run.
    pub stop_on_fault: bool,
}

impl Default for MachineLimits {
    fn default() -> Self {
        MachineLimits {
            max_instructions: 1_000_000,
            stop_on_fault: true,
        }
    }
}

impl MachineLimits {
    /// Creates the default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits that never stop a run on their own.
    #[must_use]
    pub fn unlimited() -> Self {
        MachineLimits {
            max_instructions: 0,
            stop_on_fault: true,
        }
    }

    /// Sets the instruction budget (0 = unlimited).
    #[must_use]
    pub fn with_max_instructions(mut self, max: u64) -> Self {
        self.max_instructions = max;
        self
    }

    /// Sets whether a fault ends the run.
    #[must_use]
    pub fn with_stop_on_fault(mut self, stop: bool) -> Self {
        self.stop_on_fault = stop;
        self
    }

    /// Returns `true` once `executed` instructions exhaust the budget.
    #[must_use]
    pub fn is_exhausted(&self, executed: u64) -> bool {
        self.max_instructions != 0 && executed >= self.max_instructions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget() {
        let limits = MachineLimits::new().with_max_instructions(3);
        assert!(!limits.is_exhausted(2));
        assert!(limits.is_exhausted(3));
        assert!(!MachineLimits::unlimited().is_exhausted(u64::MAX));
    }
}
