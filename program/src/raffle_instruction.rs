use arrayref::array_ref;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::raffle_error::RaffleError;
use crate::raffle_state::RaffleConfig;
use crate::vrf::{self, RandomWord, RequestId};

#[derive(Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Initialize a raffle in a pre-allocated account
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The authority/creator of the raffle
    /// 1. `[writable]` The raffle account, owned by this program and rent exempt
    InitializeRaffle {
        /// Fee, interval and oracle parameters
        config: RaffleConfig,
        /// Signer allowed to deliver randomness
        oracle: Pubkey,
    },

    /// Pay the entrance fee and join the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The participant, pays `amount`
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The system program
    Enter {
        /// Lamports paid, at least the entrance fee
        amount: u64,
    },

    /// Report whether upkeep is needed through the return data (1 or 0)
    ///
    /// Accounts expected:
    /// 0. `[]` The raffle account
    CheckUpkeep {},

    /// Close entry and request randomness
    ///
    /// Accounts expected:
    /// 0. `[signer]` Any keeper
    /// 1. `[writable]` The raffle account
    PerformUpkeep {},

    /// Deliver randomness for the pending request, pay the winner and reset
    ///
    /// Accounts expected:
    /// 0. `[signer]` The raffle oracle
    /// 1. `[writable]` The raffle account
    /// 2. `[writable]` The winner, `entrants[words[0] mod entrants.len()]`
    FulfillRandomness {
        request_id: RequestId,
        words: Vec<RandomWord>,
    },
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input.split_first().ok_or(RaffleError::InvalidInstructionData)?;

        Ok(match tag {
            0 => {
                let (config, rest) = Self::unpack_config(rest)?;
                let (oracle, _) = Self::unpack_pubkey(rest)?;
                Self::InitializeRaffle { config, oracle }
            }
            1 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::Enter { amount }
            }
            2 => Self::CheckUpkeep {},
            3 => Self::PerformUpkeep {},
            4 => {
                let (request_id, rest) = Self::unpack_u64(rest)?;
                let (count, rest) = rest.split_first().ok_or(RaffleError::InvalidInstructionData)?;
                let words = Self::unpack_words(rest, *count as usize)?;
                Self::FulfillRandomness { request_id, words }
            }
            _ => return Err(RaffleError::InvalidInstructionData.into()),
        })
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Self::InitializeRaffle { config, oracle } => {
                buf.push(0);
                let mut config_bytes = [0u8; RaffleConfig::LEN];
                config.pack_into_slice(&mut config_bytes);
                buf.extend_from_slice(&config_bytes);
                buf.extend_from_slice(oracle.as_ref());
            }
            Self::Enter { amount } => {
                buf.push(1);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep {} => buf.push(2),
            Self::PerformUpkeep {} => buf.push(3),
            Self::FulfillRandomness { request_id, words } => {
                buf.push(4);
                buf.extend_from_slice(&request_id.to_le_bytes());
                buf.push(words.len().min(u8::MAX as usize) as u8);
                vrf::pack_words(&words[..words.len().min(u8::MAX as usize)], &mut buf);
            }
        }
        buf
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        if input.len() < 8 {
            return Err(RaffleError::InvalidInstructionData.into());
        }
        let (value, rest) = input.split_at(8);
        let value = value
            .try_into()
            .map(u64::from_le_bytes)
            .map_err(|_| RaffleError::InvalidInstructionData)?;
        Ok((value, rest))
    }

    fn unpack_pubkey(input: &[u8]) -> Result<(Pubkey, &[u8]), ProgramError> {
        if input.len() < 32 {
            return Err(RaffleError::InvalidInstructionData.into());
        }
        let (key, rest) = input.split_at(32);
        Ok((Pubkey::new_from_array(*array_ref![key, 0, 32]), rest))
    }

    fn unpack_config(input: &[u8]) -> Result<(RaffleConfig, &[u8]), ProgramError> {
        if input.len() < RaffleConfig::LEN {
            return Err(RaffleError::InvalidInstructionData.into());
        }
        let (config, rest) = input.split_at(RaffleConfig::LEN);
        Ok((RaffleConfig::unpack_from_slice(array_ref![config, 0, RaffleConfig::LEN]), rest))
    }

    fn unpack_words(input: &[u8], count: usize) -> Result<Vec<RandomWord>, ProgramError> {
        if input.len() != count * RandomWord::LEN {
            return Err(RaffleError::InvalidInstructionData.into());
        }
        Ok(input
            .chunks_exact(RandomWord::LEN)
            .map(|chunk| RandomWord::from_be_bytes(*array_ref![chunk, 0, RandomWord::LEN]))
            .collect())
    }
}

/// Create initialize_raffle instruction
pub fn initialize_raffle(
    program_id: &Pubkey,
    authority: &Pubkey,
    raffle_account: &Pubkey,
    config: RaffleConfig,
    oracle: &Pubkey,
) -> Instruction {
    let data = RaffleInstruction::InitializeRaffle {
        config,
        oracle: *oracle,
    }
    .pack();

    let accounts = vec![
        AccountMeta::new(*authority, true),
        AccountMeta::new(*raffle_account, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

/// Create enter instruction
pub fn enter(program_id: &Pubkey, participant: &Pubkey, raffle_account: &Pubkey, amount: u64) -> Instruction {
    let data = RaffleInstruction::Enter { amount }.pack();

    let accounts = vec![
        AccountMeta::new(*participant, true),
        AccountMeta::new(*raffle_account, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey, raffle_account: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(*raffle_account, false)],
        data: RaffleInstruction::CheckUpkeep {}.pack(),
    }
}

/// Create perform_upkeep instruction
pub fn perform_upkeep(program_id: &Pubkey, keeper: &Pubkey, raffle_account: &Pubkey) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(*keeper, true),
        AccountMeta::new(*raffle_account, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: RaffleInstruction::PerformUpkeep {}.pack(),
    }
}

/// Create fulfill_randomness instruction
pub fn fulfill_randomness(
    program_id: &Pubkey,
    oracle: &Pubkey,
    raffle_account: &Pubkey,
    winner: &Pubkey,
    request_id: RequestId,
    words: Vec<RandomWord>,
) -> Instruction {
    let data = RaffleInstruction::FulfillRandomness { request_id, words }.pack();

    let accounts = vec![
        AccountMeta::new_readonly(*oracle, true),
        AccountMeta::new(*raffle_account, false),
        AccountMeta::new(*winner, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}
