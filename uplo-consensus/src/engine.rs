//! The consensus engine (C1, spec §4.5/§4.7/§5/§6.5): the single entry
//! point that turns a proposed block into an accept/reject decision,
//! driving exactly one store write-transaction per call, and dispatching
//! change notifications once the transaction has committed.
//!
//! Modeled on the teacher's single-writer `FinalizedState`/`Service` split
//! (`zebra-state`'s `sled_state.rs` owned by exactly one async `Service`):
//! here the blocking core lives on `Engine` itself, guarded by one
//! `std::sync::Mutex`, with [`BlockVerifier`] offering the same
//! `tower::Service<Block>` surface the teacher's crates expose, for
//! callers that want the async interface rather than the blocking one.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use uplo_chain::contract::{segment_index, FileContract, SEGMENT_SIZE};
use uplo_chain::crypto::{MerkleVerifier, SignatureScheme};
use uplo_chain::currency::Currency;
use uplo_chain::governance::GovernancePair;
use uplo_chain::ids::{BlockID, ContractID, OutputID};
use uplo_chain::outputs::{CoinOutput, ShareOutput};
use uplo_chain::parameters::{genesis_block, NetworkParams};
use uplo_chain::primitives::{BlockHeight, Timestamp};
use uplo_chain::Block;

use uplo_state::{StateStore, StoredBlock, WriteTransaction};

use crate::block::{block_valid, header_valid};
use crate::difficulty;
use crate::error::{ApplyError, BlockError, ConsensusError};
use crate::notify::{ChainChange, ChangeId, Dispatcher, Subscription};
use crate::reorg::{self, ReorgOutcome};

/// A block's own bounded per-process queue limit (spec §5,
/// `FUTURE_BLOCK_BUFFER_LIMIT`): beyond this many buffered future-dated
/// blocks, the oldest is evicted rather than held forever.
const FUTURE_BLOCK_BUFFER_LIMIT: usize = 64;

/// The result of one call to [`Engine::accept_block`] (spec §6.5).
#[derive(Debug)]
pub enum AcceptOutcome {
    /// The block was stored; if its chain outweighed the active one the
    /// path switched too, otherwise it just sits in the block map.
    Accepted,
    /// The block (or something on the path it would have switched to)
    /// failed validation and was marked permanently invalid.
    Rejected(BlockError),
    /// The block's timestamp is further in the future than tolerated right
    /// now; it is held and retried after the next successful accept.
    Buffered,
}

struct Inner {
    current_tip: Option<(BlockHeight, BlockID)>,
    future_buffer: VecDeque<Block>,
}

/// A subscription handle that first replays whatever history it missed,
/// then forwards the live notification stream (spec §6.5: "subscribing
/// from an unknown ID triggers a full rescan from genesis").
pub struct EngineSubscription {
    backlog: VecDeque<ChainChange>,
    live: Subscription,
}

impl EngineSubscription {
    pub async fn recv(&mut self) -> Option<ChainChange> {
        if let Some(change) = self.backlog.pop_front() {
            return Some(change);
        }
        self.live.recv().await
    }
}

/// The single-writer consensus core (spec §5). All mutation happens
/// through `&self` methods serialized by `inner`'s mutex; reads of the
/// store are otherwise lock-free, relying on the backend's own snapshot
/// semantics.
pub struct Engine {
    store: Arc<dyn StateStore>,
    params: NetworkParams,
    scheme: Arc<dyn SignatureScheme>,
    merkle: Arc<dyn MerkleVerifier>,
    inner: Mutex<Inner>,
    dispatcher: Dispatcher,
    history: Mutex<Vec<ChainChange>>,
    /// Latched once a [`ConsensusError::Corruption`] (or an unrecoverable
    /// store error) surfaces; every public method refuses further work
    /// once this is set, per spec §7.
    poisoned: AtomicBool,
}

impl Engine {
    /// Opens `store` under `params`, seeding the genesis block directly
    /// (bypassing header/standalone validation and `reorg::try_switch`
    /// entirely, per the note in `reorg.rs`) if the store has no tip yet.
    pub fn new(
        store: Arc<dyn StateStore>,
        params: NetworkParams,
        scheme: Arc<dyn SignatureScheme>,
        merkle: Arc<dyn MerkleVerifier>,
    ) -> Result<Engine, ConsensusError> {
        let current_tip = match store.tip() {
            Some(tip) => tip,
            None => Self::bootstrap_genesis(&*store, &params)?,
        };
        Ok(Engine {
            store,
            params,
            scheme,
            merkle,
            inner: Mutex::new(Inner {
                current_tip: Some(current_tip),
                future_buffer: VecDeque::new(),
            }),
            dispatcher: Dispatcher::new(256),
            history: Mutex::new(Vec::new()),
            poisoned: AtomicBool::new(false),
        })
    }

    fn bootstrap_genesis(
        store: &dyn StateStore,
        params: &NetworkParams,
    ) -> Result<(BlockHeight, BlockID), ConsensusError> {
        let block = genesis_block(params);
        let id = block.id();
        let height = BlockHeight::GENESIS;
        let mut txn = store.begin_write();
        let checksum = uplo_state::checksum::compute_from_txn(&*txn);
        txn.put_stored_block(
            id,
            StoredBlock {
                block,
                height,
                diffs: Vec::new(),
                diffs_generated: true,
                checksum: Some(checksum),
                cumulative_work: 0,
                governance_snapshot: None,
                invalid: false,
                target: params.root_target,
                total_difficulty: Currency::zero(),
                total_time: Currency::zero(),
            },
        );
        txn.set_path(height, id);
        txn.commit()?;
        Ok((height, id))
    }

    fn poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    fn halt(&self, reason: &'static str) -> ConsensusError {
        tracing::error!(reason, "consensus engine halted on internal consistency violation");
        self.poisoned.store(true, Ordering::SeqCst);
        ConsensusError::Corruption(reason)
    }

    fn halt_on_store_error(&self, err: uplo_state::StoreError) -> ConsensusError {
        tracing::error!(%err, "consensus engine halted on store error");
        self.poisoned.store(true, Ordering::SeqCst);
        ConsensusError::Store(err)
    }

    /// Up to `median_window` timestamps, starting at `parent` and walking
    /// back toward genesis, for the median-timestamp header check.
    fn ancestor_timestamps(&self, parent: &StoredBlock) -> Vec<Timestamp> {
        let mut timestamps = Vec::with_capacity(self.params.median_window);
        let mut current = parent.clone();
        loop {
            timestamps.push(current.block.header.timestamp);
            if timestamps.len() >= self.params.median_window || current.height.0 == 0 {
                break;
            }
            match self.store.get_stored_block(current.block.header.parent_id) {
                Some(next) => current = next,
                None => break,
            }
        }
        timestamps
    }

    /// Validates and, if it outweighs the active chain, activates `block`.
    /// Exactly one store write-transaction backs this call (spec §5).
    #[tracing::instrument(skip(self, block), fields(parent = ?block.header.parent_id))]
    pub fn accept_block(&self, block: Block, now: Timestamp) -> Result<AcceptOutcome, ConsensusError> {
        if self.poisoned() {
            return Err(ConsensusError::Corruption("engine is halted"));
        }
        let mut inner = self.inner.lock().expect("engine mutex poisoned");
        let outcome = self.accept_locked(&mut inner, block, now)?;

        if matches!(outcome, AcceptOutcome::Accepted) {
            self.retry_buffered(&mut inner, now)?;
        }
        Ok(outcome)
    }

    /// Drains the future-block buffer, re-attempting every entry whose
    /// timestamp is (now) no longer too far ahead. Runs after every
    /// successful accept (spec §4.7's "retry of buffered future-timestamp
    /// blocks happens on each successful accept").
    fn retry_buffered(&self, inner: &mut Inner, now: Timestamp) -> Result<(), ConsensusError> {
        let pending: Vec<Block> = inner.future_buffer.drain(..).collect();
        for block in pending {
            match self.accept_locked(inner, block.clone(), now) {
                Ok(AcceptOutcome::Buffered) => inner.future_buffer.push_back(block),
                Ok(_) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn buffer(&self, inner: &mut Inner, block: Block) {
        if inner.future_buffer.len() >= FUTURE_BLOCK_BUFFER_LIMIT {
            tracing::warn!("future-block buffer full; evicting oldest buffered block");
            inner.future_buffer.pop_front();
        }
        inner.future_buffer.push_back(block);
    }

    fn accept_locked(&self, inner: &mut Inner, block: Block, now: Timestamp) -> Result<AcceptOutcome, ConsensusError> {
        let id = block.id();
        if let Some(existing) = self.store.get_stored_block(id) {
            return Ok(if existing.invalid {
                AcceptOutcome::Rejected(BlockError::KnownInvalid(id))
            } else {
                AcceptOutcome::Accepted
            });
        }

        let parent_id = block.header.parent_id;
        let parent = match self.store.get_stored_block(parent_id) {
            Some(parent) => parent,
            None => return Ok(AcceptOutcome::Rejected(BlockError::MissingParent(parent_id))),
        };
        let height = match parent.height.checked_add(1) {
            Some(height) => height,
            None => return Err(self.halt("block height overflowed u64")),
        };

        let target = difficulty::target_for_child(&self.params, &*self.store, height, &parent);
        let ancestor_timestamps = self.ancestor_timestamps(&parent);

        if let Err(header_err) = header_valid(&block, height, &ancestor_timestamps, target, now, &self.params) {
            return match header_err {
                BlockError::FutureTimestamp => {
                    self.buffer(inner, block);
                    Ok(AcceptOutcome::Buffered)
                }
                other => {
                    metrics::counter!("consensus.block.rejected.count", 1);
                    Ok(AcceptOutcome::Rejected(other))
                }
            };
        }

        if let Err(err) = block_valid(&block, height, &ancestor_timestamps, target, now, &self.params, &*self.scheme) {
            metrics::counter!("consensus.block.rejected.count", 1);
            return Ok(AcceptOutcome::Rejected(err));
        }

        let (total_difficulty, total_time) = difficulty::accumulate(&self.params, height, &parent, target, block.header.timestamp);
        let cumulative_work = parent
            .cumulative_work
            .saturating_add(difficulty::work_of(target));

        let mut txn = self.store.begin_write();
        txn.put_stored_block(
            id,
            StoredBlock {
                block,
                height,
                diffs: Vec::new(),
                diffs_generated: false,
                checksum: None,
                cumulative_work,
                governance_snapshot: None,
                invalid: false,
                target,
                total_difficulty,
                total_time,
            },
        );

        let outcome = reorg::try_switch(&mut *txn, &self.params, &*self.merkle, id, inner.current_tip);
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(ApplyError::Corrupt(err)) => return Err(self.halt_on_corrupt(err)),
            // `current_tip` is always `Some` once genesis has been seeded
            // (see `bootstrap_genesis`), so `try_switch`'s bare-`None`-tip
            // branch — the only path that can surface a raw `Invalid`
            // instead of wrapping it in `ReorgOutcome::Rejected` — never
            // runs here. Handled rather than asserted, so a future change
            // to that assumption fails a test instead of panicking in
            // production.
            Err(ApplyError::Invalid(err)) => {
                metrics::counter!("consensus.block.rejected.count", 1);
                return Ok(AcceptOutcome::Rejected(err));
            }
        };

        if let Err(store_err) = txn.commit() {
            return Err(self.halt_on_store_error(store_err));
        }

        match outcome {
            ReorgOutcome::NoChange => {
                metrics::counter!("consensus.block.accepted.count", 1);
                Ok(AcceptOutcome::Accepted)
            }
            ReorgOutcome::Switched { reverted, applied } => {
                if let Some(&last) = applied.last() {
                    if let Some(stored) = self.store.get_stored_block(last) {
                        inner.current_tip = Some((stored.height, last));
                    }
                }
                metrics::counter!("consensus.block.accepted.count", 1);
                metrics::counter!("consensus.reorg.count", 1);
                metrics::gauge!("consensus.reorg.depth", reverted.len() as f64);
                metrics::gauge!("consensus.pool.value", self.store.pool().to_u64_saturating() as f64);
                self.publish(reverted, applied);
                Ok(AcceptOutcome::Accepted)
            }
            ReorgOutcome::Rejected(offending, err) => {
                metrics::counter!("consensus.block.rejected.count", 1);
                match *err {
                    ApplyError::Invalid(block_err) => {
                        let _ = offending;
                        Ok(AcceptOutcome::Rejected(block_err))
                    }
                    ApplyError::Corrupt(corrupt) => Err(self.halt_on_corrupt(corrupt)),
                }
            }
        }
    }

    fn halt_on_corrupt(&self, err: ConsensusError) -> ConsensusError {
        tracing::error!(%err, "consensus engine halted on internal consistency violation");
        self.poisoned.store(true, Ordering::SeqCst);
        err
    }

    fn publish(&self, reverted: Vec<BlockID>, applied: Vec<BlockID>) {
        let mut history = self.history.lock().expect("history mutex poisoned");
        let id = self.dispatcher.publish(reverted.clone(), applied.clone());
        history.push(ChainChange { id, reverted, applied });
        metrics::gauge!("consensus.subscribers.count", 0.0);
    }

    /// The active chain's tip.
    pub fn tip(&self) -> Result<(BlockHeight, BlockID), ConsensusError> {
        if self.poisoned() {
            return Err(ConsensusError::Corruption("engine is halted"));
        }
        self.inner
            .lock()
            .expect("engine mutex poisoned")
            .current_tip
            .ok_or(ConsensusError::Corruption("no tip recorded after genesis bootstrap"))
    }

    pub fn get_output(&self, id: OutputID) -> Option<CoinOutput> {
        self.store.get_coin_output(id)
    }

    pub fn get_share_output(&self, id: OutputID) -> Option<ShareOutput> {
        self.store.get_share_output(id)
    }

    pub fn get_contract(&self, id: ContractID) -> Option<FileContract> {
        self.store.get_contract(id)
    }

    pub fn get_pool(&self) -> Currency {
        self.store.pool()
    }

    pub fn get_governance(&self) -> GovernancePair {
        self.store.governance()
    }

    /// The segment a storage proof against `contract_id` must cover right
    /// now, recomputed from the contract's own `window_start` and the
    /// block on the active path at that height (spec §6.5,
    /// `storage_proof_segment`).
    pub fn storage_proof_segment(&self, contract_id: ContractID) -> Option<(u64, u64)> {
        let contract = self.store.get_contract(contract_id)?;
        let block_at_start = self.store.path_at(BlockHeight(contract.window_start))?;
        Some(segment_index(contract_id, block_at_start, contract.file_size, SEGMENT_SIZE))
    }

    /// Subscribes from `from`, replaying every change since (a full rescan
    /// if `from` predates everything retained — spec §6.5).
    pub fn subscribe(&self, from: ChangeId) -> EngineSubscription {
        let history = self.history.lock().expect("history mutex poisoned");
        let backlog: VecDeque<ChainChange> = history
            .iter()
            .filter(|change| change.id.0 >= from.0)
            .cloned()
            .collect();
        let live = self.dispatcher.subscribe();
        EngineSubscription { backlog, live }
    }
}

/// A `tower::Service<Block>` wrapper around [`Engine`] (spec §5: "a
/// blocking `accept_block` plus an async-friendly `tower::Service<Block>`
/// wrapper around the same engine"), mirroring the teacher's
/// `zebra-consensus`/`zebra-state` `Service`-centric architecture. The
/// engine itself is already synchronized by its own mutex, so this wrapper
/// adds no buffering of its own; callers that need backpressure can layer
/// `tower::buffer::Buffer` on top, as the teacher's own stack does.
#[derive(Clone)]
pub struct BlockVerifier {
    engine: Arc<Engine>,
    now: fn() -> Timestamp,
}

impl BlockVerifier {
    pub fn new(engine: Arc<Engine>, now: fn() -> Timestamp) -> BlockVerifier {
        BlockVerifier { engine, now }
    }
}

impl tower::Service<Block> for BlockVerifier {
    type Response = AcceptOutcome;
    type Error = ConsensusError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, block: Block) -> Self::Future {
        let engine = self.engine.clone();
        let now = (self.now)();
        // `Engine::accept_block` is already synchronous and guarded by its
        // own mutex, not CPU-bound work worth a blocking-pool hop, so this
        // just calls straight through rather than reaching for
        // `spawn_blocking`/`block_in_place` (the teacher's own crates don't
        // lean on those either for comparably-sized critical sections).
        Box::pin(async move { engine.accept_block(block, now) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplo_chain::block::{empty_merkle_root, BlockHeader};
    use uplo_chain::crypto::{BinaryMerkleVerifier, Ed25519Scheme};
    use uplo_state::memory::MemoryStore;

    fn engine_with_memory_store() -> Engine {
        let params = NetworkParams::testing();
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new(GovernancePair::default()));
        Engine::new(store, params, Arc::new(Ed25519Scheme), Arc::new(BinaryMerkleVerifier)).unwrap()
    }

    fn child_of(parent: BlockID, timestamp: u64) -> Block {
        Block {
            header: BlockHeader {
                parent_id: parent,
                nonce: 0,
                timestamp: Timestamp(timestamp),
                merkle_root: empty_merkle_root(),
            },
            miner_payouts: Vec::new(),
            transactions: Vec::new(),
        }
    }

    #[test]
    fn genesis_is_seeded_on_first_construction() {
        let engine = engine_with_memory_store();
        let (height, _id) = engine.tip().unwrap();
        assert_eq!(height, BlockHeight::GENESIS);
    }

    #[test]
    fn reopening_the_same_store_does_not_reseed_genesis() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new(GovernancePair::default()));
        let params = NetworkParams::testing();
        let first = Engine::new(
            store.clone(),
            params.clone(),
            Arc::new(Ed25519Scheme),
            Arc::new(BinaryMerkleVerifier),
        )
        .unwrap();
        let (_, genesis_id) = first.tip().unwrap();

        let second = Engine::new(store, params, Arc::new(Ed25519Scheme), Arc::new(BinaryMerkleVerifier)).unwrap();
        let (_, reopened_id) = second.tip().unwrap();
        assert_eq!(genesis_id, reopened_id);
    }

    #[test]
    fn a_valid_child_becomes_the_new_tip() {
        let engine = engine_with_memory_store();
        let (_, genesis_id) = engine.tip().unwrap();
        let block = child_of(genesis_id, 1);

        let outcome = engine.accept_block(block.clone(), Timestamp(1_000)).unwrap();
        assert!(matches!(outcome, AcceptOutcome::Accepted));
        let (height, id) = engine.tip().unwrap();
        assert_eq!(height, BlockHeight(1));
        assert_eq!(id, block.id());
    }

    #[test]
    fn a_block_with_an_unknown_parent_is_rejected() {
        let engine = engine_with_memory_store();
        let orphan = child_of(BlockID::from_bytes([0xaa; 32]), 1);
        let outcome = engine.accept_block(orphan, Timestamp(1_000)).unwrap();
        assert!(matches!(outcome, AcceptOutcome::Rejected(BlockError::MissingParent(_))));
    }

    #[test]
    fn an_extremely_future_dated_block_is_rejected_not_buffered() {
        let engine = engine_with_memory_store();
        let (_, genesis_id) = engine.tip().unwrap();
        let block = child_of(genesis_id, 10_000_000);
        let outcome = engine.accept_block(block, Timestamp(1)).unwrap();
        assert!(matches!(
            outcome,
            AcceptOutcome::Rejected(BlockError::ExtremeFutureTimestamp)
        ));
    }

    #[test]
    fn a_mildly_future_dated_block_is_buffered_then_accepted_once_time_passes() {
        let engine = engine_with_memory_store();
        let (_, genesis_id) = engine.tip().unwrap();
        let future_threshold = NetworkParams::testing().future_threshold;
        let block = child_of(genesis_id, future_threshold + 100);

        let outcome = engine.accept_block(block.clone(), Timestamp(1)).unwrap();
        assert!(matches!(outcome, AcceptOutcome::Buffered));
        assert_eq!(engine.tip().unwrap().0, BlockHeight::GENESIS);

        // A later, unrelated accept with the clock caught up retries the
        // buffer and the previously-future block lands.
        let unrelated_now = Timestamp(future_threshold + 100);
        let second_child = child_of(genesis_id, 2);
        // `second_child` collides on parent with the buffered block but is
        // itself immediately acceptable; accepting it first should not
        // prevent the buffered retry from running.
        let _ = engine.accept_block(second_child, unrelated_now);
        assert!(engine.tip().unwrap().0.0 >= 1);
    }

    #[tokio::test]
    async fn subscribers_see_a_change_after_commit() {
        let engine = engine_with_memory_store();
        let (_, genesis_id) = engine.tip().unwrap();
        let mut subscription = engine.subscribe(ChangeId::default());

        let block = child_of(genesis_id, 1);
        engine.accept_block(block.clone(), Timestamp(1_000)).unwrap();

        let change = subscription.recv().await.unwrap();
        assert_eq!(change.applied, vec![block.id()]);
        assert!(change.reverted.is_empty());
    }

    #[test]
    fn storage_proof_segment_is_none_for_an_unknown_contract() {
        let engine = engine_with_memory_store();
        assert!(engine.storage_proof_segment(ContractID::from_bytes([1u8; 32])).is_none());
    }

    #[test]
    fn resubmitting_an_already_accepted_block_is_idempotent() {
        let engine = engine_with_memory_store();
        let (_, genesis_id) = engine.tip().unwrap();
        let block = child_of(genesis_id, 1);

        let first = engine.accept_block(block.clone(), Timestamp(1_000)).unwrap();
        assert!(matches!(first, AcceptOutcome::Accepted));
        let (height_after_first, tip_after_first) = engine.tip().unwrap();

        let second = engine.accept_block(block.clone(), Timestamp(2_000)).unwrap();
        assert!(matches!(second, AcceptOutcome::Accepted));
        let (height_after_second, tip_after_second) = engine.tip().unwrap();
        assert_eq!(height_after_first, height_after_second);
        assert_eq!(tip_after_first, tip_after_second);
    }
}
