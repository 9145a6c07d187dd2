use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    clock::UnixTimestamp,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};

use crate::events::RaffleEvent;
use crate::raffle_error::RaffleError;
use crate::vrf::{self, RandomWord, RandomnessParams, RequestId};

/// Entrant slots available in the on-chain raffle account
pub const MAX_ENTRANTS: usize = 64;

const ENTRANTS_LEN: usize = MAX_ENTRANTS * 32;

/// Lifecycle of a round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Accepting entrants, upkeep may trigger
    Open,
    /// Entry closed, exactly one randomness request outstanding
    Calculating,
}

impl TryFrom<u8> for RaffleState {
    type Error = &'static str;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(RaffleState::Open),
            1 => Ok(RaffleState::Calculating),
            _ => Err("Invalid raffle state"),
        }
    }
}

impl From<RaffleState> for u8 {
    fn from(state: RaffleState) -> Self {
        match state {
            RaffleState::Open => 0,
            RaffleState::Calculating => 1,
        }
    }
}

/// Immutable raffle settings
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RaffleConfig {
    /// Minimum payment for one entry, in lamports
    pub entrance_fee: u64,
    /// Minimum seconds between the start of a round and its draw
    pub interval: i64,
    /// Passed to the oracle with every request
    pub randomness: RandomnessParams,
}

impl RaffleConfig {
    pub const LEN: usize = 8 + 8 + RandomnessParams::LEN;

    pub fn validate(&self) -> Result<(), RaffleError> {
        if self.entrance_fee == 0 || self.interval < 0 || self.randomness.num_words == 0 {
            return Err(RaffleError::InvalidConfig);
        }
        Ok(())
    }

    pub fn unpack_from_slice(src: &[u8; RaffleConfig::LEN]) -> Self {
        let (entrance_fee, interval, randomness) = array_refs![src, 8, 8, RandomnessParams::LEN];
        RaffleConfig {
            entrance_fee: u64::from_le_bytes(*entrance_fee),
            interval: i64::from_le_bytes(*interval),
            randomness: RandomnessParams::unpack_from_slice(randomness),
        }
    }

    pub fn pack_into_slice(&self, dst: &mut [u8; RaffleConfig::LEN]) {
        let (entrance_fee_dst, interval_dst, randomness_dst) =
            mut_array_refs![dst, 8, 8, RandomnessParams::LEN];
        *entrance_fee_dst = self.entrance_fee.to_le_bytes();
        *interval_dst = self.interval.to_le_bytes();
        self.randomness.pack_into_slice(randomness_dst);
    }
}

/// Open, interval elapsed, and something to win. Elapsed time saturates, so
/// a clock that moved backwards never satisfies the interval.
pub fn upkeep_conditions_hold(
    state: RaffleState,
    number_of_players: usize,
    pooled_balance: u64,
    last_timestamp: UnixTimestamp,
    interval: i64,
    now: UnixTimestamp,
) -> bool {
    state == RaffleState::Open
        && now.saturating_sub(last_timestamp) >= interval
        && number_of_players > 0
        && pooled_balance > 0
}

/// Outcome of a fulfillment, computed before anything is paid or reset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Draw {
    pub request_id: RequestId,
    pub winner_index: usize,
    pub winner: Pubkey,
    pub prize: u64,
}

/// The raffle: configuration plus the current round
#[derive(Clone, Debug, PartialEq)]
pub struct Raffle {
    pub config: RaffleConfig,
    pub state: RaffleState,
    /// Entries in payment order; one participant may appear many times
    pub entrants: Vec<Pubkey>,
    /// Sum of all payments since the last reset
    pub pooled_balance: u64,
    /// Time of construction or of the last reset
    pub last_timestamp: UnixTimestamp,
    /// Set exactly while calculating
    pub pending_request: Option<RequestId>,
    pub recent_winner: Option<Pubkey>,
}

impl Raffle {
    pub fn new(config: RaffleConfig, now: UnixTimestamp) -> Self {
        Self {
            config,
            state: RaffleState::Open,
            entrants: Vec::new(),
            pooled_balance: 0,
            last_timestamp: now,
            pending_request: None,
            recent_winner: None,
        }
    }

    /// Records a paid entry
    pub fn enter(&mut self, participant: Pubkey, amount: u64) -> Result<RaffleEvent, RaffleError> {
        if amount < self.config.entrance_fee {
            return Err(RaffleError::InsufficientPayment);
        }
        if self.state != RaffleState::Open {
            return Err(RaffleError::RaffleNotOpen);
        }

        let pooled_balance = self
            .pooled_balance
            .checked_add(amount)
            .ok_or(RaffleError::BalanceOverflow)?;

        self.entrants.push(participant);
        self.pooled_balance = pooled_balance;
        Ok(RaffleEvent::Entered { participant, amount })
    }

    pub fn upkeep_needed(&self, now: UnixTimestamp) -> bool {
        upkeep_conditions_hold(
            self.state,
            self.entrants.len(),
            self.pooled_balance,
            self.last_timestamp,
            self.config.interval,
            now,
        )
    }

    pub fn ensure_upkeep_needed(&self, now: UnixTimestamp) -> Result<(), RaffleError> {
        if self.upkeep_needed(now) {
            Ok(())
        } else {
            Err(RaffleError::UpkeepNotNeeded)
        }
    }

    /// Closes entry around the request the oracle accepted
    pub fn begin_calculating(&mut self, request_id: RequestId) -> RaffleEvent {
        debug_assert_eq!(self.state, RaffleState::Open);
        self.state = RaffleState::Calculating;
        self.pending_request = Some(request_id);
        RaffleEvent::RandomnessRequested { request_id }
    }

    /// Picks the winner for `request_id` without touching the round
    pub fn draw(&self, request_id: RequestId, words: &[RandomWord]) -> Result<Draw, RaffleError> {
        if self.state != RaffleState::Calculating || self.pending_request != Some(request_id) {
            return Err(RaffleError::UnknownRequest);
        }
        let word = words.first().ok_or(RaffleError::MissingRandomWords)?;
        let winner_index =
            vrf::winner_index(word, self.entrants.len()).ok_or(RaffleError::UnknownRequest)?;

        Ok(Draw {
            request_id,
            winner_index,
            winner: self.entrants[winner_index],
            prize: self.pooled_balance,
        })
    }

    /// Applies a paid-out draw and opens the next round
    pub fn complete(&mut self, draw: &Draw, now: UnixTimestamp) -> RaffleEvent {
        self.entrants.clear();
        self.pooled_balance = 0;
        self.last_timestamp = now;
        self.state = RaffleState::Open;
        self.pending_request = None;
        self.recent_winner = Some(draw.winner);

        RaffleEvent::WinnerPicked {
            request_id: draw.request_id,
            winner: draw.winner,
            prize: draw.prize,
        }
    }

    pub fn player(&self, index: usize) -> Result<Pubkey, RaffleError> {
        self.entrants
            .get(index)
            .copied()
            .ok_or(RaffleError::PlayerIndexOutOfRange)
    }

    pub fn number_of_players(&self) -> usize {
        self.entrants.len()
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
}

/// Raffle account data
#[derive(Clone, Debug, PartialEq)]
pub struct RaffleAccount {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Creator of the raffle
    pub authority: Pubkey,
    /// Only signer allowed to deliver randomness
    pub oracle: Pubkey,
    /// Last request id issued by this raffle
    pub request_counter: u64,
    pub raffle: Raffle,
}

impl RaffleAccount {
    /// Next request id, starting from 1
    pub fn next_request_id(&mut self) -> Result<RequestId, ProgramError> {
        self.request_counter = self
            .request_counter
            .checked_add(1)
            .ok_or(ProgramError::ArithmeticOverflow)?;
        Ok(self.request_counter)
    }
}

impl Sealed for RaffleAccount {}

impl IsInitialized for RaffleAccount {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for RaffleAccount {
    const LEN: usize = 1 + 32 + 32 + 8 + RaffleConfig::LEN + 1 + 8 + 8 + 1 + 8 + 1 + 32 + 2 + ENTRANTS_LEN;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, RaffleAccount::LEN];
        let (
            is_initialized,
            authority,
            oracle,
            request_counter,
            config,
            state,
            pooled_balance,
            last_timestamp,
            has_pending,
            pending_request,
            has_winner,
            recent_winner,
            entrant_count,
            entrants,
        ) = array_refs![src, 1, 32, 32, 8, RaffleConfig::LEN, 1, 8, 8, 1, 8, 1, 32, 2, ENTRANTS_LEN];

        let state = RaffleState::try_from(state[0]).map_err(|_| ProgramError::InvalidAccountData)?;

        let entrant_count = u16::from_le_bytes(*entrant_count) as usize;
        if entrant_count > MAX_ENTRANTS {
            return Err(ProgramError::InvalidAccountData);
        }
        let entrants = entrants
            .chunks_exact(32)
            .take(entrant_count)
            .map(|chunk| Pubkey::new_from_array(*array_ref![chunk, 0, 32]))
            .collect();

        Ok(RaffleAccount {
            is_initialized: is_initialized[0] != 0,
            authority: Pubkey::new_from_array(*authority),
            oracle: Pubkey::new_from_array(*oracle),
            request_counter: u64::from_le_bytes(*request_counter),
            raffle: Raffle {
                config: RaffleConfig::unpack_from_slice(config),
                state,
                entrants,
                pooled_balance: u64::from_le_bytes(*pooled_balance),
                last_timestamp: UnixTimestamp::from_le_bytes(*last_timestamp),
                pending_request: match has_pending[0] {
                    0 => None,
                    _ => Some(u64::from_le_bytes(*pending_request)),
                },
                recent_winner: match has_winner[0] {
                    0 => None,
                    _ => Some(Pubkey::new_from_array(*recent_winner)),
                },
            },
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, RaffleAccount::LEN];
        let (
            is_initialized_dst,
            authority_dst,
            oracle_dst,
            request_counter_dst,
            config_dst,
            state_dst,
            pooled_balance_dst,
            last_timestamp_dst,
            has_pending_dst,
            pending_request_dst,
            has_winner_dst,
            recent_winner_dst,
            entrant_count_dst,
            entrants_dst,
        ) = mut_array_refs![dst, 1, 32, 32, 8, RaffleConfig::LEN, 1, 8, 8, 1, 8, 1, 32, 2, ENTRANTS_LEN];

        let raffle = &self.raffle;
        is_initialized_dst[0] = self.is_initialized as u8;
        authority_dst.copy_from_slice(self.authority.as_ref());
        oracle_dst.copy_from_slice(self.oracle.as_ref());
        *request_counter_dst = self.request_counter.to_le_bytes();
        raffle.config.pack_into_slice(config_dst);
        state_dst[0] = raffle.state.into();
        *pooled_balance_dst = raffle.pooled_balance.to_le_bytes();
        *last_timestamp_dst = raffle.last_timestamp.to_le_bytes();
        has_pending_dst[0] = raffle.pending_request.is_some() as u8;
        *pending_request_dst = raffle.pending_request.unwrap_or_default().to_le_bytes();
        has_winner_dst[0] = raffle.recent_winner.is_some() as u8;
        recent_winner_dst.copy_from_slice(raffle.recent_winner.unwrap_or_default().as_ref());

        // Callers enforce MAX_ENTRANTS before packing
        let count = raffle.entrants.len().min(MAX_ENTRANTS);
        *entrant_count_dst = (count as u16).to_le_bytes();
        entrants_dst.fill(0);
        for (slot, entrant) in entrants_dst.chunks_exact_mut(32).zip(raffle.entrants.iter().take(count)) {
            slot.copy_from_slice(entrant.as_ref());
        }
    }
}
