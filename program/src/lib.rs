// Upkeep-driven raffle
// Entrants pay a fixed fee while the round is open; once the interval has
// passed an upkeep call closes entry and requests randomness, and the
// fulfillment pays the whole pot to one entrant and opens the next round.

// Shared round logic
pub mod events;
pub mod raffle_error;
pub mod raffle_state;
pub mod utils;
pub mod vrf;

// On-chain program
pub mod raffle_instruction;
pub mod raffle_processor;
#[cfg(not(feature = "no-entrypoint"))]
pub mod raffle_entrypoint;

// Host engine
#[cfg(not(target_os = "solana"))]
pub mod clock;
#[cfg(not(target_os = "solana"))]
pub mod engine;
#[cfg(not(target_os = "solana"))]
pub mod oracle;
#[cfg(not(target_os = "solana"))]
pub mod payout;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    raffle_processor::Processor::process(program_id, accounts, instruction_data)
}
