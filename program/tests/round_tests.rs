use solana_program::program_pack::Pack;
use solana_program::pubkey::Pubkey;

use upkeep_raffle::{
    events::RaffleEvent,
    raffle_error::RaffleError,
    raffle_instruction::RaffleInstruction,
    raffle_state::{upkeep_conditions_hold, Raffle, RaffleAccount, RaffleConfig, RaffleState, MAX_ENTRANTS},
    vrf::{winner_index, RandomWord, RandomnessParams},
};

const FEE: u64 = 10_000_000; // 0.01 SOL
const INTERVAL: i64 = 30;
const START: i64 = 1_700_000_000;

fn config() -> RaffleConfig {
    RaffleConfig {
        entrance_fee: FEE,
        interval: INTERVAL,
        randomness: RandomnessParams {
            key_hash: [7u8; 32],
            subscription_id: 42,
            request_confirmations: 3,
            callback_gas_limit: 500_000,
            num_words: 1,
        },
    }
}

fn calculating_raffle(entrants: &[Pubkey], request_id: u64) -> Raffle {
    let mut raffle = Raffle::new(config(), START);
    for entrant in entrants {
        raffle.enter(*entrant, FEE).unwrap();
    }
    raffle.ensure_upkeep_needed(START + INTERVAL).unwrap();
    raffle.begin_calculating(request_id);
    raffle
}

#[test]
fn test_new_raffle_is_open_and_empty() {
    let raffle = Raffle::new(config(), START);

    assert_eq!(raffle.state, RaffleState::Open);
    assert_eq!(raffle.number_of_players(), 0);
    assert_eq!(raffle.pooled_balance, 0);
    assert_eq!(raffle.last_timestamp, START);
    assert_eq!(raffle.pending_request, None);
    assert_eq!(raffle.entrance_fee(), FEE);
    assert_eq!(raffle.interval(), INTERVAL);
    assert_eq!(raffle.num_words(), 1);
    assert_eq!(raffle.request_confirmations(), 3);
}

#[test]
fn test_config_validation() {
    assert!(config().validate().is_ok());

    let mut zero_fee = config();
    zero_fee.entrance_fee = 0;
    assert_eq!(zero_fee.validate(), Err(RaffleError::InvalidConfig));

    let mut negative_interval = config();
    negative_interval.interval = -1;
    assert_eq!(negative_interval.validate(), Err(RaffleError::InvalidConfig));

    let mut no_words = config();
    no_words.randomness.num_words = 0;
    assert_eq!(no_words.validate(), Err(RaffleError::InvalidConfig));
}

#[test]
fn test_enter_appends_and_pools() {
    let mut raffle = Raffle::new(config(), START);
    let a = Pubkey::new_unique();

    let event = raffle.enter(a, FEE).unwrap();
    assert_eq!(event, RaffleEvent::Entered { participant: a, amount: FEE });

    // Overpaying is accepted and pooled in full; duplicates are extra entries
    raffle.enter(a, FEE * 2).unwrap();
    assert_eq!(raffle.number_of_players(), 2);
    assert_eq!(raffle.pooled_balance, FEE * 3);
    assert_eq!(raffle.player(0), Ok(a));
    assert_eq!(raffle.player(1), Ok(a));
    assert_eq!(raffle.player(2), Err(RaffleError::PlayerIndexOutOfRange));
}

#[test]
fn test_enter_rejects_balance_overflow() {
    let mut raffle = Raffle::new(config(), START);
    raffle.enter(Pubkey::new_unique(), FEE).unwrap();
    let before = raffle.clone();

    assert_eq!(
        raffle.enter(Pubkey::new_unique(), u64::MAX),
        Err(RaffleError::BalanceOverflow)
    );
    assert_eq!(raffle, before);
}

#[test]
fn test_enter_rejects_underpayment_in_any_state() {
    let a = Pubkey::new_unique();
    let mut open = Raffle::new(config(), START);
    assert_eq!(open.enter(a, FEE - 1), Err(RaffleError::InsufficientPayment));
    assert_eq!(open.enter(a, 0), Err(RaffleError::InsufficientPayment));

    let mut calculating = calculating_raffle(&[a], 1);
    assert_eq!(calculating.enter(a, FEE - 1), Err(RaffleError::InsufficientPayment));
    assert_eq!(calculating.number_of_players(), 1);
}

#[test]
fn test_enter_rejected_while_calculating() {
    let a = Pubkey::new_unique();
    let mut raffle = calculating_raffle(&[a], 1);

    assert_eq!(raffle.enter(Pubkey::new_unique(), FEE), Err(RaffleError::RaffleNotOpen));
    assert_eq!(raffle.number_of_players(), 1);
    assert_eq!(raffle.pooled_balance, FEE);
}

#[test]
fn test_upkeep_gates() {
    let mut raffle = Raffle::new(config(), START);

    // No entrants, however long we wait
    assert!(!raffle.upkeep_needed(START + INTERVAL * 100));

    raffle.enter(Pubkey::new_unique(), FEE).unwrap();
    assert!(!raffle.upkeep_needed(START + INTERVAL - 1));
    assert!(raffle.upkeep_needed(START + INTERVAL));
    assert!(raffle.upkeep_needed(START + INTERVAL + 1));

    // A clock behind the round start never satisfies the interval
    assert!(!raffle.upkeep_needed(START - 1));
    assert!(!raffle.upkeep_needed(i64::MIN));

    assert_eq!(raffle.ensure_upkeep_needed(START), Err(RaffleError::UpkeepNotNeeded));

    raffle.begin_calculating(1);
    assert!(!raffle.upkeep_needed(START + INTERVAL));
}

#[test]
fn test_upkeep_conditions_each_gate() {
    let ok = |state: RaffleState, players: usize, balance: u64, now: i64| {
        upkeep_conditions_hold(state, players, balance, START, INTERVAL, now)
    };

    assert!(ok(RaffleState::Open, 1, FEE, START + INTERVAL));
    assert!(!ok(RaffleState::Calculating, 1, FEE, START + INTERVAL));
    assert!(!ok(RaffleState::Open, 0, FEE, START + INTERVAL));
    assert!(!ok(RaffleState::Open, 1, 0, START + INTERVAL));
    assert!(!ok(RaffleState::Open, 1, FEE, START + INTERVAL - 1));
    assert!(!ok(RaffleState::Open, 1, FEE, i64::MIN));

    // Zero interval still needs a clock at or past the round start
    assert!(upkeep_conditions_hold(RaffleState::Open, 1, FEE, START, 0, START));
    assert!(!upkeep_conditions_hold(RaffleState::Open, 1, FEE, START, 0, START - 1));
}

#[test]
fn test_single_entrant_scenario() {
    let a = Pubkey::new_unique();
    let mut raffle = Raffle::new(config(), START);
    raffle.enter(a, FEE).unwrap();

    assert!(!raffle.upkeep_needed(START + INTERVAL - 1));
    assert!(raffle.upkeep_needed(START + INTERVAL + 1));

    let event = raffle.begin_calculating(1);
    assert_eq!(event, RaffleEvent::RandomnessRequested { request_id: 1 });
    assert_eq!(raffle.state, RaffleState::Calculating);
    assert_eq!(raffle.pending_request, Some(1));

    let draw = raffle.draw(1, &[RandomWord::from(7u64)]).unwrap();
    assert_eq!(draw.winner_index, 0);
    assert_eq!(draw.winner, a);
    assert_eq!(draw.prize, FEE);

    let event = raffle.complete(&draw, START + INTERVAL + 5);
    assert_eq!(
        event,
        RaffleEvent::WinnerPicked {
            request_id: 1,
            winner: a,
            prize: FEE
        }
    );
    assert_eq!(raffle.state, RaffleState::Open);
    assert_eq!(raffle.number_of_players(), 0);
    assert_eq!(raffle.pooled_balance, 0);
    assert_eq!(raffle.pending_request, None);
    assert_eq!(raffle.last_timestamp, START + INTERVAL + 5);
    assert_eq!(raffle.recent_winner, Some(a));
}

#[test]
fn test_four_entrants_word_two_picks_third() {
    let entrants: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
    let raffle = calculating_raffle(&entrants, 9);

    assert_eq!(raffle.pooled_balance, 4 * FEE);
    let draw = raffle.draw(9, &[RandomWord::from(2u64)]).unwrap();
    assert_eq!(draw.winner, entrants[2]);
    assert_eq!(draw.prize, 4 * FEE);

    // Same input, same winner
    assert_eq!(raffle.draw(9, &[RandomWord::from(2u64)]).unwrap(), draw);
    // Only the first word is consumed
    let extra = raffle
        .draw(9, &[RandomWord::from(6u64), RandomWord::from(1u64)])
        .unwrap();
    assert_eq!(extra.winner, entrants[2]);
}

#[test]
fn test_draw_rejects_unknown_request_without_mutation() {
    let entrants = [Pubkey::new_unique(), Pubkey::new_unique()];
    let raffle = calculating_raffle(&entrants, 5);
    let before = raffle.clone();

    assert_eq!(raffle.draw(4, &[RandomWord::from(1u64)]), Err(RaffleError::UnknownRequest));
    assert_eq!(raffle.draw(0, &[RandomWord::from(1u64)]), Err(RaffleError::UnknownRequest));
    assert_eq!(raffle.draw(5, &[]), Err(RaffleError::MissingRandomWords));
    assert_eq!(raffle, before);

    // Nothing pending while open
    let open = Raffle::new(config(), START);
    assert_eq!(open.draw(5, &[RandomWord::from(1u64)]), Err(RaffleError::UnknownRequest));
}

#[test]
fn test_consumed_request_is_unknown() {
    let a = Pubkey::new_unique();
    let mut raffle = calculating_raffle(&[a], 3);
    let draw = raffle.draw(3, &[RandomWord::from(0u64)]).unwrap();
    raffle.complete(&draw, START + 100);

    assert_eq!(raffle.draw(3, &[RandomWord::from(0u64)]), Err(RaffleError::UnknownRequest));
}

#[test]
fn test_random_word_reduction_uses_all_bits() {
    assert_eq!(RandomWord::from(7u64).reduce(1), 0);
    assert_eq!(RandomWord::from(7u64).reduce(4), 3);
    assert_eq!(RandomWord::from(7u64).reduce(0), 0);

    // 2^64 mod 3 == 1, invisible to a low-64-bit reduction
    let two_pow_64 = RandomWord::from(1u128 << 64);
    assert_eq!(two_pow_64.reduce(3), 1);

    // 2^256 - 1 mod 10 == 5
    let max = RandomWord::from_be_bytes([0xff; 32]);
    assert_eq!(max.reduce(10), 5);

    let big = RandomWord::from(u128::MAX);
    assert_eq!(big.reduce(u64::MAX), (u128::MAX % u64::MAX as u128) as u64);

    assert_eq!(winner_index(&RandomWord::from(11u64), 4), Some(3));
    assert_eq!(winner_index(&RandomWord::from(11u64), 0), None);
}

#[test]
fn test_random_word_display() {
    let word = RandomWord::from(0xabu64);
    let shown = word.to_string();
    assert!(shown.starts_with("0x"));
    assert!(shown.ends_with("ab"));
    assert_eq!(shown.len(), 2 + 64);
}

#[test]
fn test_raffle_account_layout() {
    let entrants: Vec<Pubkey> = (0..3).map(|_| Pubkey::new_unique()).collect();
    let mut raffle = calculating_raffle(&entrants, 12);
    raffle.recent_winner = Some(entrants[1]);

    let account = RaffleAccount {
        is_initialized: true,
        authority: Pubkey::new_unique(),
        oracle: Pubkey::new_unique(),
        request_counter: 12,
        raffle,
    };

    let mut data = vec![0u8; RaffleAccount::LEN];
    RaffleAccount::pack(account.clone(), &mut data).unwrap();
    assert_eq!(RaffleAccount::unpack(&data).unwrap(), account);

    // A zeroed account reads as an uninitialized, open, empty raffle
    let blank = RaffleAccount::unpack_unchecked(&vec![0u8; RaffleAccount::LEN]).unwrap();
    assert!(!blank.is_initialized);
    assert_eq!(blank.raffle.state, RaffleState::Open);
    assert!(blank.raffle.entrants.is_empty());
    assert_eq!(blank.raffle.pending_request, None);
    assert_eq!(blank.raffle.recent_winner, None);
}

#[test]
fn test_raffle_account_rejects_bad_state_byte() {
    let mut data = vec![0u8; RaffleAccount::LEN];
    let account = RaffleAccount {
        is_initialized: true,
        authority: Pubkey::new_unique(),
        oracle: Pubkey::new_unique(),
        request_counter: 0,
        raffle: Raffle::new(config(), START),
    };
    RaffleAccount::pack(account, &mut data).unwrap();

    // state byte follows is_initialized, authority, oracle, counter, config
    let state_offset = 1 + 32 + 32 + 8 + RaffleConfig::LEN;
    data[state_offset] = 9;
    assert!(RaffleAccount::unpack(&data).is_err());
}

#[test]
fn test_account_holds_max_entrants() {
    let mut raffle = Raffle::new(config(), START);
    for _ in 0..MAX_ENTRANTS {
        raffle.enter(Pubkey::new_unique(), FEE).unwrap();
    }
    let account = RaffleAccount {
        is_initialized: true,
        authority: Pubkey::new_unique(),
        oracle: Pubkey::new_unique(),
        request_counter: 0,
        raffle,
    };

    let mut data = vec![0u8; RaffleAccount::LEN];
    RaffleAccount::pack(account.clone(), &mut data).unwrap();
    let unpacked = RaffleAccount::unpack(&data).unwrap();
    assert_eq!(unpacked.raffle.entrants.len(), MAX_ENTRANTS);
    assert_eq!(unpacked, account);
}

#[test]
fn test_instruction_wire_format() {
    let words = vec![RandomWord::from(2u64), RandomWord::from(u128::MAX)];
    let fulfill = RaffleInstruction::FulfillRandomness {
        request_id: 77,
        words: words.clone(),
    };
    let packed = fulfill.pack();
    assert_eq!(packed[0], 4);
    assert_eq!(&packed[1..9], &77u64.to_le_bytes());
    assert_eq!(packed[9], 2);
    assert_eq!(packed.len(), 10 + 2 * RandomWord::LEN);
    assert_eq!(RaffleInstruction::unpack(&packed).unwrap(), fulfill);

    let init = RaffleInstruction::InitializeRaffle {
        config: config(),
        oracle: Pubkey::new_unique(),
    };
    assert_eq!(init.pack().len(), 1 + RaffleConfig::LEN + 32);
    assert_eq!(RaffleInstruction::unpack(&init.pack()).unwrap(), init);

    // Truncated word payload and unknown tags are rejected
    assert!(RaffleInstruction::unpack(&packed[..packed.len() - 1]).is_err());
    assert!(RaffleInstruction::unpack(&[9]).is_err());
    assert!(RaffleInstruction::unpack(&[]).is_err());
}
