// Randomness words, oracle request parameters and winner selection
use arrayref::{array_ref, array_refs, mut_array_refs};
use borsh::{BorshDeserialize, BorshSerialize};
use std::fmt;

/// Identifier of a randomness request. Issued from 1 upward, 0 is never valid.
pub type RequestId = u64;

/// A 256-bit unsigned random value, stored big-endian
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct RandomWord(pub [u8; 32]);

impl RandomWord {
    pub const LEN: usize = 32;

    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// `self mod modulus` over the full 256 bits. A zero modulus yields 0.
    pub fn reduce(&self, modulus: u64) -> u64 {
        if modulus == 0 {
            return 0;
        }

        let modulus = modulus as u128;
        let mut remainder = 0u128;
        for byte in self.0.iter() {
            // remainder < 2^64, so the shifted value stays below 2^72
            remainder = ((remainder << 8) | *byte as u128) % modulus;
        }
        remainder as u64
    }
}

impl From<u64> for RandomWord {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl From<u128> for RandomWord {
    fn from(value: u128) -> Self {
        let mut bytes = [0u8; 32];
        bytes[16..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Display for RandomWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in self.0.iter() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for RandomWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RandomWord({})", self)
    }
}

/// Index of the winning entry: `word mod entrant_count`.
///
/// The plain modulo carries a small selection bias for ledgers whose size
/// does not divide 2^256. It is kept as is so every implementation picks
/// the same winner from the same word.
pub fn winner_index(word: &RandomWord, entrant_count: usize) -> Option<usize> {
    if entrant_count == 0 {
        return None;
    }
    Some(word.reduce(entrant_count as u64) as usize)
}

/// Parameters forwarded untouched to the randomness oracle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RandomnessParams {
    /// Oracle key / gas lane selector
    pub key_hash: [u8; 32],
    /// Oracle subscription billed for the request
    pub subscription_id: u64,
    /// Confirmations the oracle waits before answering
    pub request_confirmations: u16,
    /// Compute budget granted to the fulfillment callback
    pub callback_gas_limit: u32,
    /// Number of words requested, at least one
    pub num_words: u32,
}

impl RandomnessParams {
    pub const LEN: usize = 32 + 8 + 2 + 4 + 4;

    pub fn unpack_from_slice(src: &[u8; RandomnessParams::LEN]) -> Self {
        let (key_hash, subscription_id, request_confirmations, callback_gas_limit, num_words) =
            array_refs![src, 32, 8, 2, 4, 4];

        RandomnessParams {
            key_hash: *key_hash,
            subscription_id: u64::from_le_bytes(*subscription_id),
            request_confirmations: u16::from_le_bytes(*request_confirmations),
            callback_gas_limit: u32::from_le_bytes(*callback_gas_limit),
            num_words: u32::from_le_bytes(*num_words),
        }
    }

    pub fn pack_into_slice(&self, dst: &mut [u8; RandomnessParams::LEN]) {
        let (key_hash_dst, subscription_id_dst, request_confirmations_dst, callback_gas_limit_dst, num_words_dst) =
            mut_array_refs![dst, 32, 8, 2, 4, 4];

        key_hash_dst.copy_from_slice(&self.key_hash);
        *subscription_id_dst = self.subscription_id.to_le_bytes();
        *request_confirmations_dst = self.request_confirmations.to_le_bytes();
        *callback_gas_limit_dst = self.callback_gas_limit.to_le_bytes();
        *num_words_dst = self.num_words.to_le_bytes();
    }

    pub fn to_bytes(&self) -> [u8; RandomnessParams::LEN] {
        let mut buf = [0u8; RandomnessParams::LEN];
        self.pack_into_slice(&mut buf);
        buf
    }

    pub fn from_bytes(src: &[u8]) -> Option<Self> {
        if src.len() < RandomnessParams::LEN {
            return None;
        }
        Some(Self::unpack_from_slice(array_ref![src, 0, RandomnessParams::LEN]))
    }
}

/// Copies `words` into `dst` as consecutive 32-byte big-endian values
pub fn pack_words(words: &[RandomWord], dst: &mut Vec<u8>) {
    for word in words {
        dst.extend_from_slice(&word.0);
    }
}
