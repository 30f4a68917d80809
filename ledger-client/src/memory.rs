use crate::{
    CreateRecordRequest, LedgerError, LedgerEvent, LedgerReader, LedgerResult, LedgerUint,
    LedgerWriter, TxReceipt,
};
use core_types::{Amount, Clock, FieldName, Identity, RecordId};
use log::debug;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const FIRST_RECORD_SEQ: u64 = 0x1000;

/// Direct seeding of a record, bypassing the creation rules (e.g. deadlines in the past).
#[derive(Debug, Clone, Default)]
pub struct RecordSeed {
    pub name: String,
    pub ticket_price: Amount,
    pub deadline: i64,
    pub prize: Amount,
    pub manager: Identity,
    pub participants: Vec<Identity>,
    pub winner: Option<Identity>,
    pub claimed: bool,
}

#[derive(Debug, Clone)]
struct StoredRecord {
    name: String,
    ticket_price: Amount,
    deadline: i64,
    prize: Amount,
    manager: Identity,
    winner: Identity,
    participants: Vec<Identity>,
    claimed: bool,
}

impl From<RecordSeed> for StoredRecord {
    fn from(seed: RecordSeed) -> Self {
        Self {
            name: seed.name,
            ticket_price: seed.ticket_price,
            deadline: seed.deadline,
            prize: seed.prize,
            manager: seed.manager,
            winner: seed.winner.unwrap_or_default(),
            participants: seed.participants,
            claimed: seed.claimed,
        }
    }
}

#[derive(Default)]
struct Faults {
    failing_fields: HashSet<(RecordId, FieldName)>,
    unreachable: HashSet<RecordId>,
    raw_numbers: HashMap<(RecordId, FieldName), LedgerUint>,
    read_latency: HashMap<RecordId, Duration>,
    listing_delays: VecDeque<Duration>,
    failing_listings: usize,
    registry_down: bool,
    reject_next_write: Option<String>,
}

struct LedgerState {
    registry: Vec<RecordId>,
    records: HashMap<RecordId, StoredRecord>,
    faults: Faults,
    next_seq: u64,
    rng: StdRng,
}

/// In-process ledger with the same acceptance rules as the lottery contract.
pub struct MemoryLedger {
    clock: Arc<dyn Clock>,
    state: Mutex<LedgerState>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryLedger {
    pub fn new(clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self {
            clock,
            state: Mutex::new(LedgerState {
                registry: Vec::new(),
                records: HashMap::new(),
                faults: Faults::default(),
                next_seq: FIRST_RECORD_SEQ,
                rng: StdRng::seed_from_u64(seed),
            }),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    pub fn insert_record(&self, seed: RecordSeed) -> RecordId {
        let mut state = self.state.lock();
        let id = next_record_id(&mut state);
        state.records.insert(id.clone(), seed.into());
        state.registry.push(id.clone());
        id
    }

    /// Appends a zero-address entry to the registry listing.
    pub fn push_placeholder(&self) {
        self.state.lock().registry.push(RecordId::new(""));
    }

    /// Appends an id with no record behind it; every field read fails.
    pub fn push_unknown(&self, id: RecordId) {
        self.state.lock().registry.push(id);
    }

    pub fn fail_field(&self, id: &RecordId, field: FieldName) {
        self.state
            .lock()
            .faults
            .failing_fields
            .insert((id.clone(), field));
    }

    pub fn make_unreachable(&self, id: &RecordId) {
        self.state.lock().faults.unreachable.insert(id.clone());
    }

    pub fn restore(&self, id: &RecordId) {
        let mut state = self.state.lock();
        state.faults.unreachable.remove(id);
        state.faults.failing_fields.retain(|(rid, _)| rid != id);
        state.faults.raw_numbers.retain(|(rid, _), _| rid != id);
    }

    /// Overrides the wire encoding returned for a numeric field.
    pub fn set_raw_number(&self, id: &RecordId, field: FieldName, raw: LedgerUint) {
        self.state
            .lock()
            .faults
            .raw_numbers
            .insert((id.clone(), field), raw);
    }

    pub fn set_read_latency(&self, id: &RecordId, latency: Duration) {
        self.state
            .lock()
            .faults
            .read_latency
            .insert(id.clone(), latency);
    }

    /// The next `list_records` call sleeps for `delay` before answering.
    pub fn delay_next_listing(&self, delay: Duration) {
        self.state.lock().faults.listing_delays.push_back(delay);
    }

    /// The next `count` listings fail with a transient error. The failure is
    /// decided when the call starts, before any queued delay.
    pub fn fail_next_listings(&self, count: usize) {
        self.state.lock().faults.failing_listings = count;
    }

    pub fn set_registry_down(&self, down: bool) {
        self.state.lock().faults.registry_down = down;
    }

    /// The next write is refused as if the signer declined it.
    pub fn reject_next_write(&self, reason: impl Into<String>) {
        self.state.lock().faults.reject_next_write = Some(reason.into());
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    async fn read<T>(
        &self,
        id: &RecordId,
        field: FieldName,
        get: impl FnOnce(&StoredRecord) -> T,
    ) -> LedgerResult<T> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let latency = self.state.lock().faults.read_latency.get(id).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let state = self.state.lock();
        if state.faults.unreachable.contains(id) {
            return Err(LedgerError::Unavailable(format!("record {id} unreachable")));
        }
        if state.faults.failing_fields.contains(&(id.clone(), field)) {
            return Err(LedgerError::Decode(format!("{field} call failed")));
        }
        let record = state
            .records
            .get(id)
            .ok_or_else(|| LedgerError::UnknownRecord(id.clone()))?;
        Ok(get(record))
    }

    async fn read_number(
        &self,
        id: &RecordId,
        field: FieldName,
        get: impl FnOnce(&StoredRecord) -> LedgerUint,
    ) -> LedgerResult<LedgerUint> {
        let value = self.read(id, field, get).await?;
        let raw = self
            .state
            .lock()
            .faults
            .raw_numbers
            .get(&(id.clone(), field))
            .cloned();
        Ok(raw.unwrap_or(value))
    }

    fn begin_write(&self, state: &mut LedgerState) -> LedgerResult<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        match state.faults.reject_next_write.take() {
            Some(reason) => Err(LedgerError::Rejected(reason)),
            None => Ok(()),
        }
    }

    fn receipt(&self, events: Vec<LedgerEvent>) -> TxReceipt {
        let n = self.writes.load(Ordering::Relaxed);
        TxReceipt {
            tx_hash: format!("0x{:064x}", n),
            events,
        }
    }
}

fn next_record_id(state: &mut LedgerState) -> RecordId {
    let seq = state.next_seq;
    state.next_seq += 1;
    RecordId::new(format!("0x{:040x}", seq))
}

#[async_trait::async_trait]
impl LedgerReader for MemoryLedger {
    async fn list_records(&self) -> LedgerResult<Vec<RecordId>> {
        let (delay, fail) = {
            let mut state = self.state.lock();
            let faults = &mut state.faults;
            let fail = faults.failing_listings > 0;
            faults.failing_listings = faults.failing_listings.saturating_sub(1);
            (faults.listing_delays.pop_front(), fail)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock();
        if fail || state.faults.registry_down {
            return Err(LedgerError::Unavailable("registry unreachable".to_string()));
        }
        Ok(state.registry.clone())
    }

    async fn name(&self, id: &RecordId) -> LedgerResult<String> {
        self.read(id, FieldName::DisplayName, |r| r.name.clone())
            .await
    }

    async fn ticket_price(&self, id: &RecordId) -> LedgerResult<LedgerUint> {
        self.read_number(id, FieldName::TicketPrice, |r| r.ticket_price.into())
            .await
    }

    async fn deadline(&self, id: &RecordId) -> LedgerResult<LedgerUint> {
        self.read_number(id, FieldName::Deadline, |r| r.deadline.into())
            .await
    }

    async fn prize(&self, id: &RecordId) -> LedgerResult<LedgerUint> {
        self.read_number(id, FieldName::PrizeAmount, |r| r.prize.into())
            .await
    }

    async fn manager(&self, id: &RecordId) -> LedgerResult<Identity> {
        self.read(id, FieldName::Manager, |r| r.manager.clone())
            .await
    }

    async fn winner(&self, id: &RecordId) -> LedgerResult<Identity> {
        self.read(id, FieldName::Winner, |r| r.winner.clone()).await
    }

    async fn participants(&self, id: &RecordId) -> LedgerResult<Vec<Identity>> {
        self.read(id, FieldName::Participants, |r| r.participants.clone())
            .await
    }

    async fn claimed(&self, id: &RecordId) -> LedgerResult<bool> {
        self.read(id, FieldName::Claimed, |r| r.claimed).await
    }
}

#[async_trait::async_trait]
impl LedgerWriter for MemoryLedger {
    async fn create_record(
        &self,
        from: &Identity,
        request: &CreateRecordRequest,
        value: Amount,
    ) -> LedgerResult<TxReceipt> {
        let now = self.clock.now_unix();
        let mut state = self.state.lock();
        self.begin_write(&mut state)?;
        if request.name.trim().is_empty() {
            return Err(LedgerError::reverted("name required"));
        }
        if request.ticket_price == 0 {
            return Err(LedgerError::reverted("ticket price must be positive"));
        }
        if request.deadline <= now {
            return Err(LedgerError::reverted("deadline must be in the future"));
        }
        if value != request.prize {
            return Err(LedgerError::reverted("sent value must equal prize"));
        }
        let id = next_record_id(&mut state);
        state.records.insert(
            id.clone(),
            StoredRecord {
                name: request.name.clone(),
                ticket_price: request.ticket_price,
                deadline: request.deadline,
                prize: request.prize,
                manager: from.clone(),
                winner: Identity::sentinel(),
                participants: Vec::new(),
                claimed: false,
            },
        );
        state.registry.push(id.clone());
        debug!("created record {} for {}", id, from.short());
        Ok(self.receipt(vec![LedgerEvent::RecordCreated {
            record: id,
            name: request.name.clone(),
        }]))
    }

    async fn buy_ticket(
        &self,
        from: &Identity,
        id: &RecordId,
        value: Amount,
    ) -> LedgerResult<TxReceipt> {
        let now = self.clock.now_unix();
        let mut state = self.state.lock();
        self.begin_write(&mut state)?;
        let record = state
            .records
            .get_mut(id)
            .ok_or_else(|| LedgerError::UnknownRecord(id.clone()))?;
        if record.winner.is_set() || now >= record.deadline {
            return Err(LedgerError::reverted("lottery closed"));
        }
        if value != record.ticket_price {
            return Err(LedgerError::reverted("incorrect ticket price"));
        }
        if record.participants.contains(from) {
            return Err(LedgerError::reverted("already entered"));
        }
        record.participants.push(from.clone());
        Ok(self.receipt(vec![LedgerEvent::TicketBought {
            record: id.clone(),
            buyer: from.clone(),
        }]))
    }

    async fn select_winner(&self, from: &Identity, id: &RecordId) -> LedgerResult<TxReceipt> {
        let now = self.clock.now_unix();
        let mut guard = self.state.lock();
        self.begin_write(&mut guard)?;
        let state = &mut *guard;
        let record = state
            .records
            .get_mut(id)
            .ok_or_else(|| LedgerError::UnknownRecord(id.clone()))?;
        if record.manager != *from {
            return Err(LedgerError::reverted("only manager"));
        }
        if record.winner.is_set() {
            return Err(LedgerError::reverted("winner already selected"));
        }
        if now < record.deadline {
            return Err(LedgerError::reverted("deadline not reached"));
        }
        if record.participants.is_empty() {
            return Err(LedgerError::reverted("no players"));
        }
        let pick = state.rng.gen_range(0..record.participants.len());
        record.winner = record.participants[pick].clone();
        Ok(self.receipt(vec![LedgerEvent::WinnerSelected {
            record: id.clone(),
            winner: record.winner.clone(),
        }]))
    }

    async fn claim_prize(&self, from: &Identity, id: &RecordId) -> LedgerResult<TxReceipt> {
        let mut state = self.state.lock();
        self.begin_write(&mut state)?;
        let record = state
            .records
            .get_mut(id)
            .ok_or_else(|| LedgerError::UnknownRecord(id.clone()))?;
        if !record.winner.is_set() || record.winner != *from {
            return Err(LedgerError::reverted("only winner"));
        }
        if record.claimed {
            return Err(LedgerError::reverted("prize already claimed"));
        }
        record.claimed = true;
        Ok(self.receipt(vec![LedgerEvent::PrizeClaimed {
            record: id.clone(),
            winner: from.clone(),
            amount: record.prize,
        }]))
    }
}
