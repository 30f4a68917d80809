#![allow(dead_code)]

use core_types::retry::RetryPolicy;
use core_types::{Clock, Identity, ManualClock};
use ledger_client::{MemoryLedger, MemoryWallet, RecordSeed};
use lottery_engine::{EngineSettings, LotteryEngine};
use std::sync::Arc;
use std::time::Duration;

pub const NOW: i64 = 1_700_000_000;
pub const ADMIN: &str = "0xad00000000000000000000000000000000000001";
pub const MANAGER: &str = "0xaa00000000000000000000000000000000000002";
pub const ALICE: &str = "0xa11ce00000000000000000000000000000000003";
pub const BOB: &str = "0xb0b0000000000000000000000000000000000004";
pub const TICKET: u128 = 10_000_000_000_000_000;
pub const PRIZE: u128 = 1_000_000_000_000_000_000;

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub ledger: Arc<MemoryLedger>,
    pub wallet: Arc<MemoryWallet>,
    pub engine: Arc<LotteryEngine>,
}

impl Harness {
    pub fn new(caller: &str) -> Self {
        Self::with_settings(caller, settings())
    }

    pub fn with_settings(caller: &str, settings: EngineSettings) -> Self {
        let clock = Arc::new(ManualClock::new(NOW));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let ledger = Arc::new(MemoryLedger::new(Arc::clone(&dyn_clock), 42));
        let wallet = Arc::new(MemoryWallet::new(Identity::new(caller)));
        let engine = Arc::new(LotteryEngine::new(
            ledger.clone(),
            ledger.clone(),
            wallet.clone(),
            dyn_clock,
            settings,
        ));
        Self {
            clock,
            ledger,
            wallet,
            engine,
        }
    }
}

pub fn settings() -> EngineSettings {
    EngineSettings {
        admin: Some(Identity::new(ADMIN)),
        snapshot_max_age: Duration::from_secs(30),
        max_concurrent_records: 4,
        field_timeout: Duration::from_secs(1),
        retry: RetryPolicy::none(),
    }
}

/// Open for another hour, no participants yet.
pub fn open_seed(name: &str) -> RecordSeed {
    RecordSeed {
        name: name.to_string(),
        ticket_price: TICKET,
        deadline: NOW + 3_600,
        prize: PRIZE,
        manager: Identity::new(MANAGER),
        ..RecordSeed::default()
    }
}
