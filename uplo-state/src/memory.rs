//! A `BTreeMap`-backed [`StateStore`] with no durability at all. Used by
//! the consensus engine's test suite and by proptest strategies that
//! need a cheap store to drive through many blocks quickly.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use uplo_chain::contract::FileContract;
use uplo_chain::currency::Currency;
use uplo_chain::governance::GovernancePair;
use uplo_chain::ids::{BlockID, ContractID, OutputID};
use uplo_chain::outputs::{CoinOutput, ShareOutput};
use uplo_chain::primitives::BlockHeight;

use crate::store::{StateStore, StoreError, StoredBlock, WriteTransaction};

#[derive(Default)]
struct Tables {
    coin_outputs: BTreeMap<OutputID, CoinOutput>,
    share_outputs: BTreeMap<OutputID, ShareOutput>,
    contracts: BTreeMap<ContractID, FileContract>,
    blocks: BTreeMap<BlockID, StoredBlock>,
    path: BTreeMap<BlockHeight, BlockID>,
    pool: Currency,
    governance: GovernancePair,
    delayed: BTreeMap<BlockHeight, Vec<(OutputID, CoinOutput)>>,
    expiry: BTreeMap<BlockHeight, Vec<ContractID>>,
}

/// An in-memory store. Cloning the handle (it's an `Arc`) shares the
/// same underlying tables — the same pattern the teacher's backend uses
/// for its in-process test double.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new(initial_governance: GovernancePair) -> MemoryStore {
        let mut tables = Tables::default();
        tables.governance = initial_governance;
        MemoryStore {
            tables: Arc::new(Mutex::new(tables)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("state mutex poisoned")
    }
}

impl StateStore for MemoryStore {
    fn begin_write(&self) -> Box<dyn WriteTransaction + '_> {
        Box::new(MemoryWriteTransaction {
            tables: self.lock(),
        })
    }

    fn get_coin_output(&self, id: OutputID) -> Option<CoinOutput> {
        self.lock().coin_outputs.get(&id).cloned()
    }

    fn get_share_output(&self, id: OutputID) -> Option<ShareOutput> {
        self.lock().share_outputs.get(&id).cloned()
    }

    fn get_contract(&self, id: ContractID) -> Option<FileContract> {
        self.lock().contracts.get(&id).cloned()
    }

    fn get_stored_block(&self, id: BlockID) -> Option<StoredBlock> {
        self.lock().blocks.get(&id).cloned()
    }

    fn path_at(&self, height: BlockHeight) -> Option<BlockID> {
        self.lock().path.get(&height).copied()
    }

    fn tip(&self) -> Option<(BlockHeight, BlockID)> {
        self.lock().path.iter().next_back().map(|(h, id)| (*h, *id))
    }

    fn pool(&self) -> Currency {
        self.lock().pool.clone()
    }

    fn governance(&self) -> GovernancePair {
        self.lock().governance
    }

    fn all_coin_output_ids(&self) -> Vec<OutputID> {
        self.lock().coin_outputs.keys().copied().collect()
    }

    fn all_share_output_ids(&self) -> Vec<OutputID> {
        self.lock().share_outputs.keys().copied().collect()
    }

    fn all_contract_ids(&self) -> Vec<ContractID> {
        self.lock().contracts.keys().copied().collect()
    }
}

/// Holds the mutex guard for the lifetime of the transaction: since
/// this backend has no separate staging area, mutations are visible to
/// other `MemoryStore` handles as soon as they are made, and `commit`
/// only needs to drop the guard.
struct MemoryWriteTransaction<'a> {
    tables: MutexGuard<'a, Tables>,
}

impl<'a> WriteTransaction for MemoryWriteTransaction<'a> {
    fn get_coin_output(&self, id: OutputID) -> Option<CoinOutput> {
        self.tables.coin_outputs.get(&id).cloned()
    }

    fn put_coin_output(&mut self, id: OutputID, output: CoinOutput) {
        self.tables.coin_outputs.insert(id, output);
    }

    fn delete_coin_output(&mut self, id: OutputID) -> Option<CoinOutput> {
        self.tables.coin_outputs.remove(&id)
    }

    fn get_share_output(&self, id: OutputID) -> Option<ShareOutput> {
        self.tables.share_outputs.get(&id).cloned()
    }

    fn put_share_output(&mut self, id: OutputID, output: ShareOutput) {
        self.tables.share_outputs.insert(id, output);
    }

    fn delete_share_output(&mut self, id: OutputID) -> Option<ShareOutput> {
        self.tables.share_outputs.remove(&id)
    }

    fn get_contract(&self, id: ContractID) -> Option<FileContract> {
        self.tables.contracts.get(&id).cloned()
    }

    fn put_contract(&mut self, id: ContractID, contract: FileContract) {
        self.tables.contracts.insert(id, contract);
    }

    fn delete_contract(&mut self, id: ContractID) -> Option<FileContract> {
        self.tables.contracts.remove(&id)
    }

    fn path_at(&self, height: BlockHeight) -> Option<BlockID> {
        self.tables.path.get(&height).copied()
    }

    fn set_path(&mut self, height: BlockHeight, id: BlockID) {
        self.tables.path.insert(height, id);
    }

    fn truncate_path_from(&mut self, height: BlockHeight) {
        self.tables.path.split_off(&height);
    }

    fn get_stored_block(&self, id: BlockID) -> Option<StoredBlock> {
        self.tables.blocks.get(&id).cloned()
    }

    fn put_stored_block(&mut self, id: BlockID, stored: StoredBlock) {
        self.tables.blocks.insert(id, stored);
    }

    fn pool(&self) -> Currency {
        self.tables.pool.clone()
    }

    fn set_pool(&mut self, value: Currency) {
        self.tables.pool = value;
    }

    fn governance(&self) -> GovernancePair {
        self.tables.governance
    }

    fn set_governance(&mut self, pair: GovernancePair) {
        self.tables.governance = pair;
    }

    fn delayed_bucket(&self, height: BlockHeight) -> Vec<(OutputID, CoinOutput)> {
        self.tables
            .delayed
            .get(&height)
            .cloned()
            .unwrap_or_default()
    }

    fn push_delayed(&mut self, height: BlockHeight, id: OutputID, output: CoinOutput) {
        self.tables
            .delayed
            .entry(height)
            .or_insert_with(Vec::new)
            .push((id, output));
    }

    fn clear_delayed_bucket(&mut self, height: BlockHeight) {
        self.tables.delayed.remove(&height);
    }

    fn expiry_bucket(&self, height: BlockHeight) -> Vec<ContractID> {
        self.tables.expiry.get(&height).cloned().unwrap_or_default()
    }

    fn push_expiry(&mut self, height: BlockHeight, id: ContractID) {
        self.tables.expiry.entry(height).or_insert_with(Vec::new).push(id);
    }

    fn clear_expiry_bucket(&mut self, height: BlockHeight) {
        self.tables.expiry.remove(&height);
    }

    fn all_coin_output_ids(&self) -> Vec<OutputID> {
        self.tables.coin_outputs.keys().copied().collect()
    }

    fn all_share_output_ids(&self) -> Vec<OutputID> {
        self.tables.share_outputs.keys().copied().collect()
    }

    fn all_contract_ids(&self) -> Vec<ContractID> {
        self.tables.contracts.keys().copied().collect()
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplo_chain::ids::UnlockHash;

    #[test]
    fn roundtrips_a_coin_output_through_a_commit() {
        let store = MemoryStore::new(GovernancePair::default());
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
