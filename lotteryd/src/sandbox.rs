//! Demo ledger contents for running the daemon without a real node.

use core_types::types::NATIVE_DECIMALS;
use core_types::{Amount, Identity};
use ledger_client::{MemoryLedger, RecordSeed};
use log::info;

pub const DEMO_MANAGER: &str = "0x5a0d000000000000000000000000000000000001";
pub const DEMO_PLAYERS: [&str; 3] = [
    "0x5a0d0000000000000000000000000000000000a1",
    "0x5a0d0000000000000000000000000000000000a2",
    "0x5a0d0000000000000000000000000000000000a3",
];

const HOUR: i64 = 3_600;

fn eth(whole: u32, hundredths: u32) -> Amount {
    let unit = 10u128.pow(NATIVE_DECIMALS);
    Amount::from(whole) * unit + Amount::from(hundredths) * unit / 100
}

fn players(n: usize) -> Vec<Identity> {
    DEMO_PLAYERS.iter().take(n).map(Identity::new).collect()
}

/// One record in each lifecycle state, plus a placeholder registry slot.
pub fn seed(ledger: &MemoryLedger, now: i64) {
    let manager = Identity::new(DEMO_MANAGER);
    let base = RecordSeed {
        ticket_price: eth(0, 1),
        prize: eth(1, 0),
        manager,
        ..RecordSeed::default()
    };
    ledger.insert_record(RecordSeed {
        name: "Evening draw".into(),
        deadline: now + 2 * HOUR,
        participants: players(1),
        ..base.clone()
    });
    ledger.insert_record(RecordSeed {
        name: "Lunch raffle".into(),
        deadline: now - HOUR,
        participants: players(3),
        ..base.clone()
    });
    ledger.insert_record(RecordSeed {
        name: "Weekly jackpot".into(),
        deadline: now - 24 * HOUR,
        prize: eth(5, 0),
        participants: players(2),
        winner: Some(Identity::new(DEMO_PLAYERS[1])),
        ..base.clone()
    });
    ledger.insert_record(RecordSeed {
        name: "Launch giveaway".into(),
        deadline: now - 72 * HOUR,
        participants: players(3),
        winner: Some(Identity::new(DEMO_PLAYERS[0])),
        claimed: true,
        ..base
    });
    ledger.push_placeholder();
    info!("sandbox ledger seeded with 4 lotteries");
}
