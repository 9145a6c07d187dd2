//! Host-side raffle engine.
//!
//! One Tokio task owns the [`Raffle`] and applies operations in the order
//! they arrive on its channel, so no two operations interleave. Callers hold
//! a cloneable [`RaffleHandle`]. Upkeep checks read a snapshot published by
//! the task after every mutation and never wait on it.

use solana_program::{clock::UnixTimestamp, pubkey::Pubkey};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::events::{EventStream, RaffleEvent};
use crate::oracle::{RandomnessOracle, RandomnessRequest};
use crate::payout::Payout;
use crate::raffle_error::RaffleError;
use crate::raffle_state::{upkeep_conditions_hold, Raffle, RaffleConfig, RaffleState};
use crate::vrf::{RandomWord, RequestId};

/// Distinguishes engines sharing one oracle
pub type RaffleId = u64;

const EVENT_CAPACITY: usize = 256;

/// The gating fields of the current round, read together
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleSnapshot {
    pub state: RaffleState,
    pub number_of_players: usize,
    pub pooled_balance: u64,
    pub last_timestamp: UnixTimestamp,
    pub pending_request: Option<RequestId>,
    pub recent_winner: Option<Pubkey>,
}

impl RaffleSnapshot {
    fn of(raffle: &Raffle) -> Self {
        Self {
            state: raffle.state,
            number_of_players: raffle.entrants.len(),
            pooled_balance: raffle.pooled_balance,
            last_timestamp: raffle.last_timestamp,
            pending_request: raffle.pending_request,
            recent_winner: raffle.recent_winner,
        }
    }

    pub fn upkeep_needed(&self, interval: i64, now: UnixTimestamp) -> bool {
        upkeep_conditions_hold(
            self.state,
            self.number_of_players,
            self.pooled_balance,
            self.last_timestamp,
            interval,
            now,
        )
    }
}

type Reply<T> = oneshot::Sender<Result<T, RaffleError>>;

enum RaffleMsg {
    Enter {
        participant: Pubkey,
        amount: u64,
        tx: Reply<()>,
    },
    PerformUpkeep {
        tx: Reply<RequestId>,
    },
    FulfillRandomness {
        request_id: RequestId,
        words: Vec<RandomWord>,
        tx: Reply<Pubkey>,
    },
    Player {
        index: usize,
        tx: Reply<Pubkey>,
    },
}

/// Cloneable access to a running engine
#[derive(Clone)]
pub struct RaffleHandle {
    raffle_id: RaffleId,
    config: RaffleConfig,
    clock: Arc<dyn Clock>,
    tx: mpsc::UnboundedSender<RaffleMsg>,
    snapshot: watch::Receiver<RaffleSnapshot>,
    events: broadcast::Sender<RaffleEvent>,
}

impl RaffleHandle {
    /// Validates `config` and starts the engine task on the current runtime.
    /// Fails with `EngineStopped` when called outside a Tokio runtime.
    pub fn spawn(
        raffle_id: RaffleId,
        config: RaffleConfig,
        clock: Arc<dyn Clock>,
        oracle: Arc<dyn RandomnessOracle>,
        payout: Arc<dyn Payout>,
    ) -> Result<Self, RaffleError> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RaffleError::EngineStopped)?;

        let raffle = Raffle::new(config, clock.now());
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot) = watch::channel(RaffleSnapshot::of(&raffle));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let core = RaffleCore {
            raffle_id,
            raffle,
            clock: clock.clone(),
            oracle,
            payout,
            rx,
            snapshot_tx,
            events: events.clone(),
        };
        runtime.spawn(core.main());

        info!(raffle_id, entrance_fee = config.entrance_fee, interval = config.interval, "raffle started");
        Ok(Self {
            raffle_id,
            config,
            clock,
            tx,
            snapshot,
            events,
        })
    }

    pub async fn enter(&self, participant: Pubkey, amount: u64) -> Result<(), RaffleError> {
        self.call(|tx| RaffleMsg::Enter { participant, amount, tx }).await
    }

    /// True iff the round is open, the interval has elapsed and there is a
    /// pot to win. Never blocks on the engine task.
    pub fn check_upkeep(&self) -> bool {
        let snapshot = *self.snapshot.borrow();
        snapshot.upkeep_needed(self.config.interval, self.clock.now())
    }

    /// Closes entry and requests randomness; returns the pending request id
    pub async fn perform_upkeep(&self) -> Result<RequestId, RaffleError> {
        self.call(|tx| RaffleMsg::PerformUpkeep { tx }).await
    }

    /// Oracle callback; returns the paid winner
    pub async fn fulfill_randomness(&self, request_id: RequestId, words: Vec<RandomWord>) -> Result<Pubkey, RaffleError> {
        self.call(|tx| RaffleMsg::FulfillRandomness { request_id, words, tx }).await
    }

    pub async fn player(&self, index: usize) -> Result<Pubkey, RaffleError> {
        self.call(|tx| RaffleMsg::Player { index, tx }).await
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn snapshot(&self) -> RaffleSnapshot {
        *self.snapshot.borrow()
    }

    pub fn raffle_id(&self) -> RaffleId {
        self.raffle_id
    }

    pub fn state(&self) -> RaffleState {
        self.snapshot().state
    }

    pub fn number_of_players(&self) -> usize {
        self.snapshot().number_of_players
    }

    pub fn pooled_balance(&self) -> u64 {
        self.snapshot().pooled_balance
    }

    pub fn last_timestamp(&self) -> UnixTimestamp {
        self.snapshot().last_timestamp
    }

    pub fn recent_winner(&self) -> Option<Pubkey> {
        self.snapshot().recent_winner
    }

    pub fn entrance_fee(&self) -> u64 {
        self.config.entrance_fee
    }

    pub fn interval(&self) -> i64 {
        self.config.interval
    }

    pub fn num_words(&self) -> u32 {
        self.config.randomness.num_words
    }

    pub fn request_confirmations(&self) -> u16 {
        self.config.randomness.request_confirmations
    }

    async fn call<T, F>(&self, msg: F) -> Result<T, RaffleError>
    where
        F: FnOnce(Reply<T>) -> RaffleMsg,
    {
        let (tx, rx) = oneshot::channel();
        self.tx.send(msg(tx)).map_err(|_| RaffleError::EngineStopped)?;
        rx.await.map_err(|_| RaffleError::EngineStopped)?
    }
}

struct RaffleCore {
    raffle_id: RaffleId,
    raffle: Raffle,
    clock: Arc<dyn Clock>,
    oracle: Arc<dyn RandomnessOracle>,
    payout: Arc<dyn Payout>,
    rx: mpsc::UnboundedReceiver<RaffleMsg>,
    snapshot_tx: watch::Sender<RaffleSnapshot>,
    events: broadcast::Sender<RaffleEvent>,
}

impl RaffleCore {
    async fn main(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                RaffleMsg::Enter { participant, amount, tx } => {
                    let res = self.handle_enter(participant, amount);
                    let _ = tx.send(res);
                }
                RaffleMsg::PerformUpkeep { tx } => {
                    let res = self.handle_perform_upkeep();
                    let _ = tx.send(res);
                }
                RaffleMsg::FulfillRandomness { request_id, words, tx } => {
                    let res = self.handle_fulfill_randomness(request_id, &words);
                    let _ = tx.send(res);
                }
                RaffleMsg::Player { index, tx } => {
                    let _ = tx.send(self.raffle.player(index));
                }
            }
        }
        debug!(raffle_id = self.raffle_id, "raffle engine stopped");
    }

    fn handle_enter(&mut self, participant: Pubkey, amount: u64) -> Result<(), RaffleError> {
        match self.raffle.enter(participant, amount) {
            Ok(event) => {
                info!(raffle_id = self.raffle_id, %participant, amount, "entered raffle");
                self.publish(&[event]);
                Ok(())
            }
            Err(err) => {
                debug!(raffle_id = self.raffle_id, %participant, amount, %err, "entry rejected");
                Err(err)
            }
        }
    }

    fn handle_perform_upkeep(&mut self) -> Result<RequestId, RaffleError> {
        let now = self.clock.now();
        if let Err(err) = self.raffle.ensure_upkeep_needed(now) {
            warn!(
                raffle_id = self.raffle_id,
                state = ?self.raffle.state,
                players = self.raffle.entrants.len(),
                balance = self.raffle.pooled_balance,
                "upkeep triggered while not needed"
            );
            return Err(err);
        }

        let request = RandomnessRequest {
            requester: self.raffle_id,
            params: self.raffle.config.randomness,
        };
        let request_id = self.oracle.request(request).map_err(|err| {
            error!(raffle_id = self.raffle_id, %err, "randomness request failed, raffle stays open");
            RaffleError::OracleUnavailable
        })?;

        let event = self.raffle.begin_calculating(request_id);
        info!(raffle_id = self.raffle_id, request_id, "requested raffle winner");
        self.publish(&[event]);
        Ok(request_id)
    }

    fn handle_fulfill_randomness(&mut self, request_id: RequestId, words: &[RandomWord]) -> Result<Pubkey, RaffleError> {
        let draw = match self.raffle.draw(request_id, words) {
            Ok(draw) => draw,
            Err(err) => {
                warn!(
                    raffle_id = self.raffle_id,
                    request_id,
                    pending = ?self.raffle.pending_request,
                    %err,
                    "fulfillment dropped"
                );
                return Err(err);
            }
        };

        if let Err(err) = self.payout.credit(&draw.winner, draw.prize) {
            error!(
                raffle_id = self.raffle_id,
                request_id,
                winner = %draw.winner,
                prize = draw.prize,
                %err,
                "ALERT: prize payout failed, raffle held in calculating"
            );
            return Err(RaffleError::PayoutFailed);
        }

        let event = self.raffle.complete(&draw, self.clock.now());
        info!(
            raffle_id = self.raffle_id,
            request_id,
            winner = %draw.winner,
            index = draw.winner_index,
            prize = draw.prize,
            "winner picked"
        );
        self.publish(&[event]);
        Ok(draw.winner)
    }

    /// Snapshot first, then events, so a subscriber woken by an event sees
    /// the state that produced it.
    fn publish(&self, events: &[RaffleEvent]) {
        let _ = self.snapshot_tx.send(RaffleSnapshot::of(&self.raffle));
        for event in events {
            let _ = self.events.send(*event);
        }
    }
}
