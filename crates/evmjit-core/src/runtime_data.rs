//! Memory image of the execution context.
//!
//! Generated code receives the address of a runtime data block in its linear
//! memory. The block starts with a header of fixed-size slots followed by the
//! call data bytes and the code bytes:
//!
//! ```text
//! handle ──► ┌──────────────────────────────┐
//!            │ slot 0   Gas                 │  32 bytes each
//!            │ slot 1   Address             │
//!            │ ...                          │
//!            │ slot 17  ReturnDataSize      │
//!            ├──────────────────────────────┤ handle + HEADER_SIZE
//!            │ call data                    │
//!            ├──────────────────────────────┤
//!            │ code                         │
//!            └──────────────────────────────┘
//! ```
//!
//! Scalar slots hold a little-endian `u64` in their first eight bytes so
//! generated code can use plain `i64.load`/`i64.store`. Word slots hold a
//! 256-bit big-endian value.

use evmjit_common::HostEnvironment;

/// Size of one slot in bytes.
pub const SLOT_SIZE: usize = 32;

/// Slots of the runtime data header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Slot {
    Gas = 0,
    Address,
    Caller,
    Origin,
    CallValue,
    GasPrice,
    PrevHash,
    CoinBase,
    TimeStamp,
    Number,
    Difficulty,
    GasLimit,
    CallDataSize,
    CallData,
    CodeSize,
    Code,
    ReturnDataOffset,
    ReturnDataSize,
}

impl Slot {
    /// Number of slots in the header.
    pub const COUNT: usize = Slot::ReturnDataSize as usize + 1;

    /// Byte offset of this slot from the start of the block.
    pub const fn offset(self) -> usize {
        self as usize * SLOT_SIZE
    }
}

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = Slot::COUNT * SLOT_SIZE;

/// Serialized runtime data block, ready to be copied into linear memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeData {
    bytes: Vec<u8>,
}

impl RuntimeData {
    /// Encode the block for placement at address `base`.
    ///
    /// `gas` seeds the gas slot; the return data slots start zeroed.
    pub fn encode(env: &HostEnvironment, gas: u64, base: u64) -> Self {
        let len = Self::encoded_len(env);
        let mut bytes = vec![0u8; len];

        let call_data_at = base + HEADER_SIZE as u64;
        let code_at = call_data_at + env.call_data.len() as u64;

        write_scalar(&mut bytes, Slot::Gas, gas);
        write_word(&mut bytes, Slot::Address, env.address.to_word().as_bytes());
        write_word(&mut bytes, Slot::Caller, env.caller.to_word().as_bytes());
        write_word(&mut bytes, Slot::Origin, env.origin.to_word().as_bytes());
        write_word(&mut bytes, Slot::CallValue, env.call_value.as_bytes());
        write_word(&mut bytes, Slot::GasPrice, env.gas_price.as_bytes());
        write_word(&mut bytes, Slot::PrevHash, env.prev_hash.as_bytes());
        write_word(&mut bytes, Slot::CoinBase, env.coinbase.to_word().as_bytes());
        write_word(&mut bytes, Slot::TimeStamp, env.timestamp.as_bytes());
        write_word(&mut bytes, Slot::Number, env.number.as_bytes());
        write_word(&mut bytes, Slot::Difficulty, env.difficulty.as_bytes());
        write_word(&mut bytes, Slot::GasLimit, env.gas_limit.as_bytes());
        write_scalar(&mut bytes, Slot::CallDataSize, env.call_data.len() as u64);
        write_scalar(&mut bytes, Slot::CallData, call_data_at);
        write_scalar(&mut bytes, Slot::CodeSize, env.code.len() as u64);
        write_scalar(&mut bytes, Slot::Code, code_at);

        let call_data_start = HEADER_SIZE;
        let code_start = call_data_start + env.call_data.len();
        bytes[call_data_start..code_start].copy_from_slice(&env.call_data);
        bytes[code_start..].copy_from_slice(&env.code);

        Self { bytes }
    }

    /// Size of the block encoded for `env`.
    pub fn encoded_len(env: &HostEnvironment) -> usize {
        HEADER_SIZE + env.call_data.len() + env.code.len()
    }

    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

}

/// Read a scalar slot from a block starting at `block[0]`.
///
/// Returns `None` if the block is shorter than the slot.
pub fn read_scalar(block: &[u8], slot: Slot) -> Option<u64> {
    let start = slot.offset();
    let raw: [u8; 8] = block.get(start..start + 8)?.try_into().ok()?;
    Some(u64::from_le_bytes(raw))
}

/// Write a scalar slot into a block starting at `block[0]`.
///
/// # Panics
///
/// Panics if the block is shorter than the slot.
pub fn write_scalar(block: &mut [u8], slot: Slot, value: u64) {
    let start = slot.offset();
    block[start..start + 8].copy_from_slice(&value.to_le_bytes());
}

fn write_word(block: &mut [u8], slot: Slot, word: &[u8; 32]) {
    let start = slot.offset();
    block[start..start + SLOT_SIZE].copy_from_slice(word);
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmjit_common::Word;

    #[test]
    fn test_slot_offsets() {
        assert_eq!(Slot::Gas.offset(), 0);
        assert_eq!(Slot::CallDataSize.offset(), 384);
        assert_eq!(Slot::CallData.offset(), 416);
        assert_eq!(Slot::ReturnDataOffset.offset(), 512);
        assert_eq!(Slot::ReturnDataSize.offset(), 544);
        assert_eq!(HEADER_SIZE, 576);
    }

    #[test]
    fn test_encode_layout() {
        let env = HostEnvironment::fixture();
        let data = RuntimeData::encode(&env, 1234, 65_536);
        let bytes = data.as_bytes();

        assert_eq!(RuntimeData::encoded_len(&env), bytes.len());
        assert_eq!(bytes.len(), HEADER_SIZE + env.call_data.len() + env.code.len());
        assert_eq!(read_scalar(bytes, Slot::Gas), Some(1234));
        assert_eq!(
            read_scalar(bytes, Slot::CallDataSize),
            Some(env.call_data.len() as u64)
        );
        assert_eq!(
            read_scalar(bytes, Slot::CallData),
            Some(65_536 + HEADER_SIZE as u64)
        );
        assert_eq!(
            read_scalar(bytes, Slot::Code),
            Some(65_536 + (HEADER_SIZE + env.call_data.len()) as u64)
        );
        assert_eq!(read_scalar(bytes, Slot::ReturnDataSize), Some(0));

        let value = &bytes[Slot::CallValue.offset()..Slot::CallValue.offset() + SLOT_SIZE];
        assert_eq!(value, Word::from(0xabcd).as_bytes());

        let call_data = &bytes[HEADER_SIZE..HEADER_SIZE + env.call_data.len()];
        assert_eq!(call_data, env.call_data.as_slice());
        assert!(bytes.ends_with(&env.code));
    }

    #[test]
    fn test_scalar_roundtrip_and_short_block() {
        let mut block = vec![0u8; HEADER_SIZE];
        write_scalar(&mut block, Slot::ReturnDataOffset, u64::MAX - 1);

        assert_eq!(read_scalar(&block, Slot::ReturnDataOffset), Some(u64::MAX - 1));
        assert_eq!(read_scalar(&block[..100], Slot::ReturnDataOffset), None);
    }
}
