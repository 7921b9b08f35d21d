//! The production [`StateStore`]: one `sled::Tree` per bucket, keyed by
//! the entity's own encoded ID and storing its encoded value. Mirrors
//! the tree-per-entity-class layout of the teacher's finalized sled
//! state, adapted from Bitcoin/Zcash-shaped buckets (UTXO set, block by
//! height) to this system's buckets (two UTXO classes, open contracts,
//! the pool, the governance pair, per-height delayed/expiry buckets).

use std::sync::Mutex;

use tracing::trace;

use uplo_chain::contract::FileContract;
use uplo_chain::currency::Currency;
use uplo_chain::governance::GovernancePair;
use uplo_chain::ids::{BlockID, ContractID, OutputID};
use uplo_chain::outputs::{CoinOutput, ShareOutput};
use uplo_chain::parameters::Network;
use uplo_chain::primitives::BlockHeight;
use uplo_chain::serialization::{Decode, Encode};

use crate::config::Config;
use crate::store::{StateStore, StoreError, StoredBlock, WriteTransaction};
use crate::BoxError;

/// Encodes a value with this crate's deterministic codec for use as a
/// sled key or value.
fn encode<T: Encode>(value: &T) -> Vec<u8> {
    value.encode_to_vec()
}

fn decode<T: Decode>(bytes: &sled::IVec) -> Result<T, BoxError> {
    T::decode(bytes.as_ref()).map_err(|e| Box::new(e) as BoxError)
}

fn get<T: Decode>(tree: &sled::Tree, key: &[u8]) -> Option<T> {
    tree.get(key)
        .expect("sled get failed")
        .map(|bytes| decode(&bytes).expect("corrupt entry in sled tree"))
}

pub struct SledStore {
    db: sled::Db,
    coin_outputs: sled::Tree,
    share_outputs: sled::Tree,
    contracts: sled::Tree,
    blocks: sled::Tree,
    path: sled::Tree,
    pool: sled::Tree,
    governance: sled::Tree,
    delayed: sled::Tree,
    expiry: sled::Tree,
    /// Every commit takes this lock for its whole duration. sled trees
    /// are individually transactional, but this store touches several
    /// trees per block; a single writer-wide lock is the honest way to
    /// get whole-commit atomicity without sled's multi-tree transaction
    /// API, which does not compose well with a dynamic tree set.
    write_lock: Mutex<()>,
}

const POOL_KEY: &[u8] = b"pool";
const GOVERNANCE_KEY: &[u8] = b"governance";

impl SledStore {
    pub fn new(config: &Config, network: Network, initial_governance: GovernancePair) -> SledStore {
        let db = config.sled_config(network).open().expect("failed to open state database");

        let store = SledStore {
            coin_outputs: db.open_tree(b"coin_outputs").unwrap(),
            share_outputs: db.open_tree(b"share_outputs").unwrap(),
            contracts: db.open_tree(b"contracts").unwrap(),
            blocks: db.open_tree(b"blocks").unwrap(),
            path: db.open_tree(b"path").unwrap(),
            pool: db.open_tree(b"pool").unwrap(),
            governance: db.open_tree(b"governance").unwrap(),
            delayed: db.open_tree(b"delayed").unwrap(),
            expiry: db.open_tree(b"expiry").unwrap(),
            db,
            write_lock: Mutex::new(()),
        };

        if store.governance.get(GOVERNANCE_KEY).unwrap().is_none() {
            store
                .governance
                .insert(GOVERNANCE_KEY, encode(&initial_governance))
                .expect("failed to seed governance pair");
            store
                .pool
                .insert(POOL_KEY, encode(&Currency::default()))
                .expect("failed to seed pool");
        }

        trace!(path = ?store.db.path(), "opened sled state store");
        store
    }
}

impl StateStore for SledStore {
    fn begin_write(&self) -> Box<dyn WriteTransaction + '_> {
        let guard = self.write_lock.lock().expect("state write lock poisoned");
        Box::new(SledWriteTransaction {
            store: self,
            _guard: guard,
            batches: Batches::default(),
        })
    }

    fn get_coin_output(&self, id: OutputID) -> Option<CoinOutput> {
        get(&self.coin_outputs, &encode(&id))
    }

    fn get_share_output(&self, id: OutputID) -> Option<ShareOutput> {
        get(&self.share_outputs, &encode(&id))
    }

    fn get_contract(&self, id: ContractID) -> Option<FileContract> {
        get(&self.contracts, &encode(&id))
    }

    fn get_stored_block(&self, id: BlockID) -> Option<StoredBlock> {
        get(&self.blocks, &encode(&id))
    }

    fn path_at(&self, height: BlockHeight) -> Option<BlockID> {
        get(&self.path, &encode(&height))
    }

    fn tip(&self) -> Option<(BlockHeight, BlockID)> {
        let (key, value) = self.path.iter().next_back()?.expect("sled iteration failed");
        let height = decode(&key).expect("corrupt path key");
        let id = decode(&value).expect("corrupt path value");
        Some((height, id))
    }

    fn pool(&self) -> Currency {
        get(&self.pool, POOL_KEY).unwrap_or_default()
    }

    fn governance(&self) -> GovernancePair {
        get(&self.governance, GOVERNANCE_KEY).expect("governance pair must always be present")
    }

    fn all_coin_output_ids(&self) -> Vec<OutputID> {
        ids_of(&self.coin_outputs)
    }

    fn all_share_output_ids(&self) -> Vec<OutputID> {
        ids_of(&self.share_outputs)
    }

    fn all_contract_ids(&self) -> Vec<ContractID> {
        ids_of(&self.contracts)
    }
}

fn ids_of<T: Decode>(tree: &sled::Tree) -> Vec<T> {
    tree.iter()
        .keys()
        .map(|key| decode(&key.expect("sled iteration failed")).expect("corrupt key in sled tree"))
        .collect()
}

/// A tree's staged writes: `None` means a pending delete, `Some` a pending
/// insert/overwrite. Plain `sled::Batch` cannot be queried before it is
/// applied, and this store's single write transaction can cover several
/// transactions' worth of creates and spends against the same bucket (a
/// later transaction in the same block must see an earlier one's output),
/// so every staged mutation has to be read back through this map before
/// falling through to the underlying tree.
type Staged = std::collections::BTreeMap<Vec<u8>, Option<Vec<u8>>>;

fn staged_get<T: Decode>(staged: &Staged, tree: &sled::Tree, key: &[u8]) -> Option<T> {
    match staged.get(key) {
        Some(Some(bytes)) => Some(T::decode(bytes.as_slice()).expect("corrupt staged entry")),
        Some(None) => None,
        None => get(tree, key),
    }
}

/// Merges a tree's committed keys with a transaction's staged overrides:
/// `None` entries drop a key, `Some` entries add or keep one. Used to
/// answer `all_*_ids` mid-transaction, which plain `tree.iter()` can't do
/// since it never sees this transaction's own pending writes.
fn staged_ids<T: Decode + Ord>(staged: &Staged, tree: &sled::Tree) -> Vec<T> {
    let mut keys: std::collections::BTreeSet<Vec<u8>> = tree
        .iter()
        .keys()
        .map(|key| key.expect("sled iteration failed").to_vec())
        .collect();
    for (key, value) in staged {
        match value {
            Some(_) => {
                keys.insert(key.clone());
            }
            None => {
                keys.remove(key);
            }
        }
    }
    keys.into_iter()
        .map(|key| T::decode(key.as_slice()).expect("corrupt key in sled tree"))
        .collect()
}

fn staged_to_batch(staged: Staged) -> sled::Batch {
    let mut batch = sled::Batch::default();
    for (key, value) in staged {
        match value {
            Some(bytes) => batch.insert(key, bytes),
            None => batch.remove(key),
        }
    }
    batch
}

/// Per-tree staged writes, flushed together in [`SledWriteTransaction::commit`].
#[derive(Default)]
struct Batches {
    coin_outputs: Staged,
    share_outputs: Staged,
    contracts: Staged,
    blocks: Staged,
    path: Staged,
    pool: Option<Currency>,
    governance: Option<GovernancePair>,
    delayed: std::collections::BTreeMap<BlockHeight, Vec<(OutputID, CoinOutput)>>,
    expiry: std::collections::BTreeMap<BlockHeight, Vec<ContractID>>,
}

struct SledWriteTransaction<'a> {
    store: &'a SledStore,
    _guard: std::sync::MutexGuard<'a, ()>,
    batches: Batches,
}

impl<'a> SledWriteTransaction<'a> {
    fn delayed_bucket_read(&self, height: BlockHeight) -> Vec<(OutputID, CoinOutput)> {
        if let Some(staged) = self.batches.delayed.get(&height) {
            return staged.clone();
        }
        get(&self.store.delayed, &encode(&height)).unwrap_or_default()
    }

    fn expiry_bucket_read(&self, height: BlockHeight) -> Vec<ContractID> {
        if let Some(staged) = self.batches.expiry.get(&height) {
            return staged.clone();
        }
        get(&self.store.expiry, &encode(&height)).unwrap_or_default()
    }
}

impl<'a> WriteTransaction for SledWriteTransaction<'a> {
    fn get_coin_output(&self, id: OutputID) -> Option<CoinOutput> {
        staged_get(&self.batches.coin_outputs, &self.store.coin_outputs, &encode(&id))
    }

    fn put_coin_output(&mut self, id: OutputID, output: CoinOutput) {
        self.batches.coin_outputs.insert(encode(&id), Some(encode(&output)));
    }

    fn delete_coin_output(&mut self, id: OutputID) -> Option<CoinOutput> {
        let existing = self.get_coin_output(id);
        self.batches.coin_outputs.insert(encode(&id), None);
        existing
    }

    fn get_share_output(&self, id: OutputID) -> Option<ShareOutput> {
        staged_get(&self.batches.share_outputs, &self.store.share_outputs, &encode(&id))
    }

    fn put_share_output(&mut self, id: OutputID, output: ShareOutput) {
        self.batches.share_outputs.insert(encode(&id), Some(encode(&output)));
    }

    fn delete_share_output(&mut self, id: OutputID) -> Option<ShareOutput> {
        let existing = self.get_share_output(id);
        self.batches.share_outputs.insert(encode(&id), None);
        existing
    }

    fn get_contract(&self, id: ContractID) -> Option<FileContract> {
        staged_get(&self.batches.contracts, &self.store.contracts, &encode(&id))
    }

    fn put_contract(&mut self, id: ContractID, contract: FileContract) {
        self.batches.contracts.insert(encode(&id), Some(encode(&contract)));
    }

    fn delete_contract(&mut self, id: ContractID) -> Option<FileContract> {
        let existing = self.get_contract(id);
        self.batches.contracts.insert(encode(&id), None);
        existing
    }

    fn path_at(&self, height: BlockHeight) -> Option<BlockID> {
        staged_get(&self.batches.path, &self.store.path, &encode(&height))
    }

    fn set_path(&mut self, height: BlockHeight, id: BlockID) {
        self.batches.path.insert(encode(&height), Some(encode(&id)));
    }

    fn truncate_path_from(&mut self, height: BlockHeight) {
        let cutoff = encode(&height);
        self.batches.path.retain(|key, _| key.as_slice() < cutoff.as_slice());
        for key in self.store.path.range(cutoff..) {
            let (key, _) = key.expect("sled iteration failed");
            self.batches.path.insert(key.to_vec(), None);
        }
    }

    fn get_stored_block(&self, id: BlockID) -> Option<StoredBlock> {
        staged_get(&self.batches.blocks, &self.store.blocks, &encode(&id))
    }

    fn put_stored_block(&mut self, id: BlockID, stored: StoredBlock) {
        self.batches.blocks.insert(encode(&id), Some(encode(&stored)));
    }

    fn pool(&self) -> Currency {
        self.batches.pool.clone().unwrap_or_else(|| self.store.pool())
    }

    fn set_pool(&mut self, value: Currency) {
        self.batches.pool = Some(value);
    }

    fn governance(&self) -> GovernancePair {
        self.batches.governance.unwrap_or_else(|| self.store.governance())
    }

    fn set_governance(&mut self, pair: GovernancePair) {
        self.batches.governance = Some(pair);
    }

    fn delayed_bucket(&self, height: BlockHeight) -> Vec<(OutputID, CoinOutput)> {
        self.delayed_bucket_read(height)
    }

    fn push_delayed(&mut self, height: BlockHeight, id: OutputID, output: CoinOutput) {
        let mut current = self.delayed_bucket_read(height);
        current.push((id, output));
        self.batches.delayed.insert(height, current);
    }

    fn clear_delayed_bucket(&mut self, height: BlockHeight) {
        self.batches.delayed.insert(height, Vec::new());
    }

    fn expiry_bucket(&self, height: BlockHeight) -> Vec<ContractID> {
        self.expiry_bucket_read(height)
    }

    fn push_expiry(&mut self, height: BlockHeight, id: ContractID) {
        let mut current = self.expiry_bucket_read(height);
        current.push(id);
        self.batches.expiry.insert(height, current);
    }

    fn clear_expiry_bucket(&mut self, height: BlockHeight) {
        self.batches.expiry.insert(height, Vec::new());
    }

    fn all_coin_output_ids(&self) -> Vec<OutputID> {
        staged_ids(&self.batches.coin_outputs, &self.store.coin_outputs)
    }

    fn all_share_output_ids(&self) -> Vec<OutputID> {
        staged_ids(&self.batches.share_outputs, &self.store.share_outputs)
    }

    fn all_contract_ids(&self) -> Vec<ContractID> {
        staged_ids(&self.batches.contracts, &self.store.contracts)
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let SledWriteTransaction { store, batches, .. } = *self;

        store
            .coin_outputs
            .apply_batch(staged_to_batch(batches.coin_outputs))
            .map_err(|e| StoreError::Backend(Box::new(e)))?;
        store
            .share_outputs
            .apply_batch(staged_to_batch(batches.share_outputs))
            .map_err(|e| StoreError::Backend(Box::new(e)))?;
        store
            .contracts
            .apply_batch(staged_to_batch(batches.contracts))
            .map_err(|e| StoreError::Backend(Box::new(e)))?;
        store
            .blocks
            .apply_batch(staged_to_batch(batches.blocks))
            .map_err(|e| StoreError::Backend(Box::new(e)))?;
        store
            .path
            .apply_batch(staged_to_batch(batches.path))
            .map_err(|e| StoreError::Backend(Box::new(e)))?;

        if let Some(pool) = batches.pool {
            store
                .pool
                .insert(POOL_KEY, encode(&pool))
                .map_err(|e| StoreError::Backend(Box::new(e)))?;
        }
        if let Some(governance) = batches.governance {
            store
                .governance
                .insert(GOVERNANCE_KEY, encode(&governance))
                .map_err(|e| StoreError::Backend(Box::new(e)))?;
        }
        for (height, bucket) in batches.delayed {
            if bucket.is_empty() {
                store.delayed.remove(encode(&height)).map_err(|e| StoreError::Backend(Box::new(e)))?;
            } else {
                store
                    .delayed
                    .insert(encode(&height), encode(&bucket))
                    .map_err(|e| StoreError::Backend(Box::new(e)))?;
            }
        }
        for (height, bucket) in batches.expiry {
            if bucket.is_empty() {
                store.expiry.remove(encode(&height)).map_err(|e| StoreError::Backend(Box::new(e)))?;
            } else {
                store
                    .expiry
                    .insert(encode(&height), encode(&bucket))
                    .map_err(|e| StoreError::Backend(Box::new(e)))?;
            }
        }

        store.db.flush().map_err(|e| StoreError::Backend(Box::new(e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplo_chain::ids::UnlockHash;

    #[test]
    fn persists_a_coin_output_across_a_commit() {
        let config = Config::ephemeral();
        let store = SledStore::new(&config, Network::Testing, GovernancePair::default());

        let id = OutputID::default();
        let output = CoinOutput {
            value: Currency::default(),
            owner: UnlockHash::default(),
        };

        let mut txn = store.begin_write();
        txn.put_coin_output(id, output.clone());
        txn.commit().unwrap();

        assert_eq!(store.get_coin_output(id), Some(output));
    }
}
