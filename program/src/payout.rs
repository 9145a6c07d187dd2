// Prize transfer boundary for the host engine
use solana_program::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayoutError {
    #[error("transfer of {amount} to {to} rejected: {reason}")]
    Rejected {
        to: Pubkey,
        amount: u64,
        reason: String,
    },
}

/// Credits an address with an amount. `Ok` means delivery is confirmed.
pub trait Payout: Send + Sync {
    fn credit(&self, to: &Pubkey, amount: u64) -> Result<(), PayoutError>;
}

/// Balances held in memory, with a switch to make transfers fail
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: Mutex<HashMap<Pubkey, u64>>,
    failing: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &Pubkey) -> u64 {
        self.balances
            .lock()
            .map(|balances| balances.get(account).copied().unwrap_or_default())
            .unwrap_or_default()
    }

    /// While set, every credit is rejected and no balance changes
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Payout for InMemoryLedger {
    fn credit(&self, to: &Pubkey, amount: u64) -> Result<(), PayoutError> {
        let rejected = |reason: &str| PayoutError::Rejected {
            to: *to,
            amount,
            reason: reason.to_string(),
        };

        if self.failing.load(Ordering::SeqCst) {
            return Err(rejected("ledger unavailable"));
        }

        let mut balances = self.balances.lock().map_err(|_| rejected("ledger poisoned"))?;
        let balance = balances.entry(*to).or_default();
        *balance = balance.checked_add(amount).ok_or_else(|| rejected("balance overflow"))?;
        Ok(())
    }
}
