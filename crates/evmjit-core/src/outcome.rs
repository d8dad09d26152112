//! Termination outcomes.
//!
//! Generated code ends a run in one of two ways:
//! - returning a raw code from the entry symbol, or
//! - calling the `abort` runtime function, which unwinds out of generated code
//!   with an [`AbruptTermination`] carrying the code.
//!
//! Both paths converge on the same raw code, classified by
//! [`TerminationOutcome`].

use std::fmt;

use thiserror::Error;

/// Why generated code stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TerminationOutcome {
    /// Normal stop without output.
    Stop = 0,
    /// Stop with output data.
    Return = 1,
    /// Account self-destructed.
    Suicide = 2,
    /// Jump to an invalid destination.
    BadJumpDestination = 101,
    /// Gas exhausted.
    OutOfGas = 102,
    /// Operand stack underflow.
    StackTooSmall = 103,
    /// Undefined instruction.
    BadInstruction = 104,
}

impl TerminationOutcome {
    /// Classify a raw code. Returns `None` for unknown codes.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::Stop,
            1 => Self::Return,
            2 => Self::Suicide,
            101 => Self::BadJumpDestination,
            102 => Self::OutOfGas,
            103 => Self::StackTooSmall,
            104 => Self::BadInstruction,
            _ => return None,
        })
    }

    /// The raw code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Returns `true` if gas ran out.
    pub fn is_out_of_gas(self) -> bool {
        self == Self::OutOfGas
    }

    /// Returns `true` if the run produced output data.
    pub fn returns_data(self) -> bool {
        self == Self::Return
    }

    /// Returns `true` for reasons that indicate failed execution.
    pub fn is_failure(self) -> bool {
        self.code() >= 100
    }
}

impl fmt::Display for TerminationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stop => "stop",
            Self::Return => "return",
            Self::Suicide => "suicide",
            Self::BadJumpDestination => "bad jump destination",
            Self::OutOfGas => "out of gas",
            Self::StackTooSmall => "stack too small",
            Self::BadInstruction => "bad instruction",
        };
        f.write_str(name)
    }
}

/// Unwind signal raised by the `abort` runtime function.
///
/// Returned as the host function's error so the backend unwinds every
/// generated frame; the invoker is the only place that catches it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("execution terminated with code {code}")]
pub struct AbruptTermination {
    code: i32,
}

impl AbruptTermination {
    /// Create a termination signal carrying a raw code.
    pub fn new(code: i32) -> Self {
        Self { code }
    }

    /// Create a termination signal for a known outcome.
    pub fn with_outcome(outcome: TerminationOutcome) -> Self {
        Self::new(outcome.code())
    }

    /// The raw code carried by the signal.
    pub fn code(&self) -> i32 {
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_mapping() {
        for outcome in [
            TerminationOutcome::Stop,
            TerminationOutcome::Return,
            TerminationOutcome::Suicide,
            TerminationOutcome::BadJumpDestination,
            TerminationOutcome::OutOfGas,
            TerminationOutcome::StackTooSmall,
            TerminationOutcome::BadInstruction,
        ] {
            assert_eq!(TerminationOutcome::from_code(outcome.code()), Some(outcome));
        }
        assert_eq!(TerminationOutcome::OutOfGas.code(), 102);
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(TerminationOutcome::from_code(3), None);
        assert_eq!(TerminationOutcome::from_code(-1), None);
        assert_eq!(TerminationOutcome::from_code(201), None);
    }

    #[test]
    fn test_predicates() {
        assert!(TerminationOutcome::Return.returns_data());
        assert!(!TerminationOutcome::Stop.returns_data());
        assert!(TerminationOutcome::OutOfGas.is_out_of_gas());
        assert!(TerminationOutcome::OutOfGas.is_failure());
        assert!(!TerminationOutcome::Suicide.is_failure());
    }

    #[test]
    fn test_abrupt_termination() {
        let signal = AbruptTermination::with_outcome(TerminationOutcome::StackTooSmall);

        assert_eq!(signal.code(), 103);
        assert_eq!(signal.to_string(), "execution terminated with code 103");
    }
}
