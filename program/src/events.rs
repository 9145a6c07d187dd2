// Domain events published on every raffle transition
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{log::sol_log_data, msg, pubkey::Pubkey};

use crate::vrf::RequestId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum RaffleEvent {
    /// A participant paid in and was appended to the ledger
    Entered { participant: Pubkey, amount: u64 },
    /// Entry closed and randomness was requested
    RandomnessRequested { request_id: RequestId },
    /// The pot was paid out and a new round opened
    WinnerPicked {
        request_id: RequestId,
        winner: Pubkey,
        prize: u64,
    },
}

impl RaffleEvent {
    /// Writes the event to the program log: one readable line plus the
    /// Borsh encoding for indexers.
    pub fn emit(&self) {
        match self {
            RaffleEvent::Entered { participant, amount } => {
                msg!("RaffleEnter: participant={} amount={}", participant, amount)
            }
            RaffleEvent::RandomnessRequested { request_id } => {
                msg!("RequestedRaffleWinner: request_id={}", request_id)
            }
            RaffleEvent::WinnerPicked { request_id, winner, prize } => {
                msg!("WinnerPicked: winner={} prize={} request_id={}", winner, prize, request_id)
            }
        }
        if let Ok(data) = borsh::to_vec(self) {
            sol_log_data(&[&data]);
        }
    }
}

#[cfg(not(target_os = "solana"))]
pub use self::stream::{EventStream, WaitError};

#[cfg(not(target_os = "solana"))]
mod stream {
    use std::time::Duration;

    use thiserror::Error;
    use tokio::sync::broadcast;
    use tokio::time::{timeout_at, Instant};
    use tracing::warn;

    use super::RaffleEvent;

    #[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
    pub enum WaitError {
        #[error("timed out waiting for raffle event")]
        Timeout,
        #[error("raffle engine closed the event stream")]
        Closed,
    }

    /// A subscription to one engine's events, in publication order
    pub struct EventStream {
        rx: broadcast::Receiver<RaffleEvent>,
    }

    impl EventStream {
        pub(crate) fn new(rx: broadcast::Receiver<RaffleEvent>) -> Self {
            Self { rx }
        }

        /// Next event, or `Timeout` if none arrives within `wait`
        pub async fn next(&mut self, wait: Duration) -> Result<RaffleEvent, WaitError> {
            self.wait_for(wait, |_| true).await
        }

        /// Blocks until an event matching `pred` arrives; others are skipped.
        pub async fn wait_for<F>(&mut self, wait: Duration, mut pred: F) -> Result<RaffleEvent, WaitError>
        where
            F: FnMut(&RaffleEvent) -> bool,
        {
            let deadline = Instant::now() + wait;
            loop {
                let received = timeout_at(deadline, self.rx.recv())
                    .await
                    .map_err(|_| WaitError::Timeout)?;

                match received {
                    Ok(event) if pred(&event) => return Ok(event),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Err(WaitError::Closed),
                }
            }
        }

        /// Events already published and not yet consumed, without waiting
        pub fn drain(&mut self) -> Vec<RaffleEvent> {
            let mut events = Vec::new();
            loop {
                match self.rx.try_recv() {
                    Ok(event) => events.push(event),
                    Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
            events
        }
    }
}
