//! Gas consumption runtime function.
//!
//! Generated code may decrement the gas slot itself, or delegate the check to
//! `env::consume_gas`. Either way the slot in the runtime data block stays the
//! single source of truth for the remaining gas.

use evmjit_core::runtime_data::{Slot, read_scalar, write_scalar};
use evmjit_core::{AbruptTermination, TerminationOutcome};
use tracing::trace;

/// Host implementation of gas consumption.
pub struct GasHost;

impl GasHost {
    /// Deduct `amount` from the gas slot of `block`.
    ///
    /// If the slot holds less than `amount` (or `amount` is negative) the slot
    /// is left untouched and an out-of-gas termination is returned.
    pub fn consume(block: &mut [u8], amount: i64) -> Result<u64, AbruptTermination> {
        let out_of_gas = AbruptTermination::with_outcome(TerminationOutcome::OutOfGas);

        let amount = u64::try_from(amount).map_err(|_| out_of_gas)?;
        let available = read_scalar(block, Slot::Gas).ok_or(out_of_gas)?;
        let remaining = available.checked_sub(amount).ok_or(out_of_gas)?;

        write_scalar(block, Slot::Gas, remaining);
        trace!(amount, remaining, "Gas consumed");

        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmjit_core::runtime_data::HEADER_SIZE;

    fn block_with_gas(gas: u64) -> Vec<u8> {
        let mut block = vec![0u8; HEADER_SIZE];
        write_scalar(&mut block, Slot::Gas, gas);
        block
    }

    #[test]
    fn test_consume_deducts() {
        let mut block = block_with_gas(100);

        assert_eq!(GasHost::consume(&mut block, 30), Ok(70));
        assert_eq!(read_scalar(&block, Slot::Gas), Some(70));
    }

    #[test]
    fn test_consume_exact_budget() {
        let mut block = block_with_gas(5);

        assert_eq!(GasHost::consume(&mut block, 5), Ok(0));
    }

    #[test]
    fn test_consume_insufficient_leaves_slot() {
        let mut block = block_with_gas(10);

        let err = GasHost::consume(&mut block, 11).unwrap_err();
        assert_eq!(err.code(), TerminationOutcome::OutOfGas.code());
        assert_eq!(read_scalar(&block, Slot::Gas), Some(10));
    }

    #[test]
    fn test_consume_negative_amount() {
        let mut block = block_with_gas(10);

        assert!(GasHost::consume(&mut block, -1).is_err());
        assert_eq!(read_scalar(&block, Slot::Gas), Some(10));
    }
}
