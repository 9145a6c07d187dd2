use solana_program::{program_error::ProgramError, decode_error::DecodeError, msg, program_error::PrintProgramError};
use thiserror::Error;

/// Errors that may be returned by the raffle program and the host engine
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Entry payment below the entrance fee
    #[error("Payment is below the entrance fee")]
    InsufficientPayment,

    /// Entry attempted while a winner is being calculated
    #[error("Raffle is not open")]
    RaffleNotOpen,

    /// Upkeep conditions do not hold at execution time
    #[error("Upkeep not needed")]
    UpkeepNotNeeded,

    /// Fulfillment for a request id that is not the pending one
    #[error("Unknown randomness request")]
    UnknownRequest,

    /// The winner could not be credited, round left calculating
    #[error("Prize payout failed")]
    PayoutFailed,

    /// Fulfillment carried no random words
    #[error("Fulfillment carried no random words")]
    MissingRandomWords,

    /// Configuration rejected at construction
    #[error("Invalid raffle configuration")]
    InvalidConfig,

    /// Pooled balance would exceed u64
    #[error("Pooled balance overflow")]
    BalanceOverflow,

    /// Player lookup past the end of the ledger
    #[error("Player index out of range")]
    PlayerIndexOutOfRange,

    /// On-chain entrant ledger has no free slot
    #[error("Raffle entrant ledger is full")]
    RaffleFull,

    /// Fulfillment not signed by the configured oracle
    #[error("Fulfillment not signed by the raffle oracle")]
    UnauthorizedOracle,

    /// Winner account does not match the drawn entrant
    #[error("Winner account does not match the drawn entrant")]
    WinnerMismatch,

    /// Randomness oracle refused the request
    #[error("Randomness oracle unavailable")]
    OracleUnavailable,

    /// Host engine task has exited
    #[error("Raffle engine stopped")]
    EngineStopped,

    /// Instruction data could not be decoded
    #[error("Invalid instruction data")]
    InvalidInstructionData,

    /// Raffle account already holds a raffle
    #[error("Raffle already initialized")]
    AlreadyInitialized,

    /// Raffle account has not been initialized
    #[error("Raffle not initialized")]
    NotInitialized,
}

impl RaffleError {
    /// Rejections that happen in normal operation and are not anomalies
    pub fn is_steady_state(&self) -> bool {
        matches!(self, RaffleError::InsufficientPayment | RaffleError::RaffleNotOpen)
    }
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}
