// Account checks and lamport movement shared by the raffle instructions
use solana_program::{
    account_info::AccountInfo,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
};

use crate::raffle_error::RaffleError;

pub fn require_signer(account: &AccountInfo, role: &str) -> Result<(), ProgramError> {
    if !account.is_signer {
        msg!("{} must sign the transaction", role);
        return Err(ProgramError::MissingRequiredSignature);
    }
    Ok(())
}

pub fn require_owner(account: &AccountInfo, program_id: &Pubkey) -> Result<(), ProgramError> {
    if account.owner != program_id {
        msg!("Account {} must be owned by the raffle program", account.key);
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

/// Lamports held above the rent-exempt minimum
pub fn spendable_lamports(account: &AccountInfo, rent: &Rent) -> u64 {
    account
        .lamports()
        .saturating_sub(rent.minimum_balance(account.data_len()))
}

/// Moves `amount` out of a program-owned account. Fails without touching
/// either balance when the source cannot cover it above rent.
pub fn pay_from_program_account(
    from: &AccountInfo,
    to: &AccountInfo,
    amount: u64,
    rent: &Rent,
) -> Result<(), RaffleError> {
    if spendable_lamports(from, rent) < amount {
        msg!(
            "Raffle account holds {} spendable lamports, prize is {}",
            spendable_lamports(from, rent),
            amount
        );
        return Err(RaffleError::PayoutFailed);
    }

    let debited = from.lamports().checked_sub(amount).ok_or(RaffleError::PayoutFailed)?;
    let credited = to.lamports().checked_add(amount).ok_or(RaffleError::PayoutFailed)?;

    let mut from_lamports = from.try_borrow_mut_lamports().map_err(|_| RaffleError::PayoutFailed)?;
    let mut to_lamports = to.try_borrow_mut_lamports().map_err(|_| RaffleError::PayoutFailed)?;
    **from_lamports = debited;
    **to_lamports = credited;
    Ok(())
}
