use crate::raffle_error::RaffleError;
use crate::raffle_instruction::RaffleInstruction;
use crate::raffle_state::{Raffle, RaffleAccount, RaffleConfig, MAX_ENTRANTS};
use crate::utils;
use crate::vrf::{RandomWord, RequestId};

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, set_return_data},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    system_instruction,
    system_program,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::InitializeRaffle { config, oracle } => {
                msg!("Instruction: Initialize Raffle");
                Self::process_initialize_raffle(accounts, config, oracle, program_id)
            }
            RaffleInstruction::Enter { amount } => {
                msg!("Instruction: Enter");
                Self::process_enter(accounts, amount, program_id)
            }
            RaffleInstruction::CheckUpkeep {} => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(accounts, program_id)
            }
            RaffleInstruction::PerformUpkeep {} => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(accounts, program_id)
            }
            RaffleInstruction::FulfillRandomness { request_id, words } => {
                msg!("Instruction: Fulfill Randomness");
                Self::process_fulfill_randomness(accounts, request_id, &words, program_id)
            }
        }
    }

    fn load_raffle(raffle_info: &AccountInfo, program_id: &Pubkey) -> Result<RaffleAccount, ProgramError> {
        utils::require_owner(raffle_info, program_id)?;
        let raffle_account = RaffleAccount::unpack_unchecked(&raffle_info.data.borrow())?;
        if !raffle_account.is_initialized {
            msg!("Raffle account is not initialized");
            return Err(RaffleError::NotInitialized.into());
        }
        Ok(raffle_account)
    }

    fn store_raffle(raffle_account: RaffleAccount, raffle_info: &AccountInfo) -> ProgramResult {
        RaffleAccount::pack(raffle_account, &mut raffle_info.data.borrow_mut())
    }

    /// Process InitializeRaffle: opens the first round at the current time
    fn process_initialize_raffle(
        accounts: &[AccountInfo],
        config: RaffleConfig,
        oracle: Pubkey,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;

        utils::require_signer(authority_info, "Authority")?;
        utils::require_owner(raffle_info, program_id)?;

        if raffle_info.data_len() != RaffleAccount::LEN {
            msg!("Raffle account must hold exactly {} bytes", RaffleAccount::LEN);
            return Err(ProgramError::InvalidAccountData);
        }

        let rent = Rent::get()?;
        if !rent.is_exempt(raffle_info.lamports(), raffle_info.data_len()) {
            msg!("Raffle account must be rent exempt");
            return Err(ProgramError::AccountNotRentExempt);
        }

        if let Ok(existing) = RaffleAccount::unpack_unchecked(&raffle_info.data.borrow()) {
            if existing.is_initialized {
                msg!("Raffle account is already initialized");
                return Err(RaffleError::AlreadyInitialized.into());
            }
        }

        if let Err(err) = config.validate() {
            msg!(
                "Rejected config: entrance_fee={} interval={} num_words={}",
                config.entrance_fee,
                config.interval,
                config.randomness.num_words
            );
            return Err(err.into());
        }

        let now = Clock::get()?.unix_timestamp;
        let raffle_account = RaffleAccount {
            is_initialized: true,
            authority: *authority_info.key,
            oracle,
            request_counter: 0,
            raffle: Raffle::new(config, now),
        };
        Self::store_raffle(raffle_account, raffle_info)?;

        msg!(
            "Raffle initialized: EntranceFee={} Interval={} Oracle={}",
            config.entrance_fee,
            config.interval,
            oracle
        );
        Ok(())
    }

    /// Process Enter: collects the payment into the raffle account
    fn process_enter(accounts: &[AccountInfo], amount: u64, program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let participant_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        utils::require_signer(participant_info, "Participant")?;
        if *system_program_info.key != system_program::id() {
            return Err(ProgramError::IncorrectProgramId);
        }

        let mut raffle_account = Self::load_raffle(raffle_info, program_id)?;
        let raffle = &mut raffle_account.raffle;

        let event = match raffle.enter(*participant_info.key, amount) {
            Ok(event) => event,
            Err(err) => {
                msg!("Entry rejected: {}", err);
                return Err(err.into());
            }
        };
        if raffle.entrants.len() > MAX_ENTRANTS {
            msg!("Raffle already holds {} entries", MAX_ENTRANTS);
            return Err(RaffleError::RaffleFull.into());
        }

        invoke(
            &system_instruction::transfer(participant_info.key, raffle_info.key, amount),
            &[
                participant_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        Self::store_raffle(raffle_account, raffle_info)?;
        event.emit();
        Ok(())
    }

    /// Process CheckUpkeep: read only, answers through the return data
    fn process_check_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;

        let raffle_account = Self::load_raffle(raffle_info, program_id)?;
        let now = Clock::get()?.unix_timestamp;
        let upkeep_needed = raffle_account.raffle.upkeep_needed(now);

        msg!("Upkeep needed: {}", upkeep_needed);
        set_return_data(&[upkeep_needed as u8]);
        Ok(())
    }

    /// Process PerformUpkeep: re-checks the upkeep conditions, then closes
    /// entry around a new request id
    fn process_perform_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let keeper_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;

        utils::require_signer(keeper_info, "Keeper")?;
        let mut raffle_account = Self::load_raffle(raffle_info, program_id)?;

        let now = Clock::get()?.unix_timestamp;
        if let Err(err) = raffle_account.raffle.ensure_upkeep_needed(now) {
            let raffle = &raffle_account.raffle;
            msg!(
                "Upkeep not needed: state={:?} players={} balance={} elapsed={}",
                raffle.state,
                raffle.entrants.len(),
                raffle.pooled_balance,
                now.saturating_sub(raffle.last_timestamp)
            );
            return Err(err.into());
        }

        let request_id = raffle_account.next_request_id()?;
        let event = raffle_account.raffle.begin_calculating(request_id);

        Self::store_raffle(raffle_account, raffle_info)?;
        event.emit();
        Ok(())
    }

    /// Process FulfillRandomness: the only path that pays out and resets
    fn process_fulfill_randomness(
        accounts: &[AccountInfo],
        request_id: RequestId,
        words: &[RandomWord],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let oracle_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        utils::require_signer(oracle_info, "Oracle")?;
        let mut raffle_account = Self::load_raffle(raffle_info, program_id)?;

        if raffle_account.oracle != *oracle_info.key {
            msg!("Fulfillment signed by {}, expected {}", oracle_info.key, raffle_account.oracle);
            return Err(RaffleError::UnauthorizedOracle.into());
        }

        let draw = match raffle_account.raffle.draw(request_id, words) {
            Ok(draw) => draw,
            Err(err) => {
                msg!(
                    "Fulfillment dropped: request_id={} pending={:?}: {}",
                    request_id,
                    raffle_account.raffle.pending_request,
                    err
                );
                return Err(err.into());
            }
        };

        if draw.winner != *winner_info.key {
            msg!("Winner account {} does not match drawn entrant {}", winner_info.key, draw.winner);
            return Err(RaffleError::WinnerMismatch.into());
        }
        msg!("Random winner index: {}", draw.winner_index);

        let rent = Rent::get()?;
        if let Err(err) = utils::pay_from_program_account(raffle_info, winner_info, draw.prize, &rent) {
            msg!("ALERT: prize payout of {} to {} failed, raffle stays calculating", draw.prize, draw.winner);
            return Err(err.into());
        }

        let now = Clock::get()?.unix_timestamp;
        let event = raffle_account.raffle.complete(&draw, now);

        Self::store_raffle(raffle_account, raffle_info)?;
        event.emit();
        Ok(())
    }
}
