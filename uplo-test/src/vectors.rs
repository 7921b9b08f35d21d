//! Fixed golden vectors for the scenarios this chain's invariants are
//! checked against (S1-S6), as plain Rust constructors rather than
//! checked-in binary fixtures — the codec itself is under test, so a
//! byte-for-byte fixture would just be begging the question. Each
//! constructor drives a fresh [`Engine`] over an in-memory store and
//! returns it alongside whatever IDs the calling integration test needs
//! to assert against.

use std::sync::Arc;

use uplo_chain::contract::FileContract;
use uplo_chain::crypto::{BinaryMerkleVerifier, Ed25519Scheme};
use uplo_chain::currency::Currency;
use uplo_chain::ids::{BlockID, ContractID, OutputID, UnlockHash};
use uplo_chain::outputs::{CoinInput, CoinOutput, MinerPayout};
use uplo_chain::parameters::NetworkParams;
use uplo_chain::primitives::{BlockHeight, Timestamp};
use uplo_chain::transaction::Transaction;
use uplo_chain::{Block, BlockHeader};

use uplo_consensus::engine::AcceptOutcome;
use uplo_consensus::Engine;
use uplo_state::memory::MemoryStore;
use uplo_state::StateStore;

use crate::merkle::{build_tree, segments_of};
use crate::signer::Signer;

fn fresh_engine(params: NetworkParams) -> Engine {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new(Default::default()));
    Engine::new(store, params, Arc::new(Ed25519Scheme), Arc::new(BinaryMerkleVerifier))
        .expect("a freshly opened in-memory store always bootstraps genesis cleanly")
}

/// A timestamp strictly increasing in `height`, so every chain built out
/// of these vectors passes the median-timestamp header check without
/// having to hand-thread a running clock through each call site.
fn ts(height: u64) -> u64 {
    1_000 + height * 100
}

/// Builds, submits, and asserts acceptance of one block on top of
/// `parent`, with miner payouts balanced to `subsidy(height) +
/// fee_sum(transactions)` and its Merkle root recomputed.
fn mine(
    engine: &Engine,
    params: &NetworkParams,
    parent: BlockID,
    height: BlockHeight,
    timestamp: u64,
    transactions: Vec<Transaction>,
    payout_owner: UnlockHash,
) -> Block {
    let fees: Currency = transactions.iter().map(|tx| tx.fee_sum()).sum();
    let subsidy = params.subsidy(height) + fees;
    let miner_payouts = if subsidy.is_zero() {
        Vec::new()
    } else {
        vec![MinerPayout {
            value: subsidy,
            owner: payout_owner,
        }]
    };
    let mut block = Block {
        header: BlockHeader {
            parent_id: parent,
            nonce: 0,
            timestamp: Timestamp(timestamp),
            merkle_root: uplo_chain::block::empty_merkle_root(),
        },
        miner_payouts,
        transactions,
    };
    block.header.merkle_root = block.compute_merkle_root();

    let outcome = engine
        .accept_block(block.clone(), Timestamp(timestamp + 1))
        .expect("engine must not be poisoned while building a golden vector");
    assert!(
        matches!(outcome, AcceptOutcome::Accepted),
        "golden-vector block at height {} was rejected: {:?}",
        height.0,
        outcome
    );
    block
}

/// Mines `count` empty blocks on top of `parent`, starting at `from_height`,
/// paying each subsidy to `payout_owner`. Used to walk the chain past a
/// maturity or hardfork boundary without caring about the blocks
/// themselves. Returns the final tip.
fn mine_empty_chain(
    engine: &Engine,
    params: &NetworkParams,
    mut parent: BlockID,
    from_height: BlockHeight,
    count: u64,
    payout_owner: UnlockHash,
) -> BlockID {
    for i in 0..count {
        let height = BlockHeight(from_height.0 + i);
        let block = mine(engine, params, parent, height, ts(height.0), Vec::new(), payout_owner);
        parent = block.id();
    }
    parent
}

/// S1 - Simple coin transfer: genesis, one mined block whose subsidy
/// matures after `maturity_delay`, then a transaction spending the
/// matured output into two fresh outputs plus a miner fee.
pub struct SimpleTransfer {
    pub engine: Engine,
    pub output_a: OutputID,
    pub output_b: OutputID,
    pub spent_output: OutputID,
}

pub fn s1_simple_coin_transfer() -> SimpleTransfer {
    let params = NetworkParams::testing();
    let engine = fresh_engine(params.clone());
    let (_, genesis_id) = engine.tip().expect("genesis is always seeded");

    let miner = Signer::generate();
    let block1 = mine(&engine, &params, genesis_id, BlockHeight(1), ts(1), Vec::new(), miner.unlock_hash());
    let payout_id = uplo_chain::derive::miner_payout_id(block1.id(), 0);

    // Walk past maturity (maturity_height = 1 + maturity_delay) so the
    // payout is promoted into the live UTXO set.
    let tip = mine_empty_chain(
        &engine,
        &params,
        block1.id(),
        BlockHeight(2),
        params.maturity_delay,
        miner.unlock_hash(),
    );
    let height = BlockHeight(2 + params.maturity_delay);
    assert!(engine.get_output(payout_id).is_some(), "miner payout failed to mature");

    let subsidy = params.subsidy(BlockHeight(1));
    let recipient_a = Signer::generate().unlock_hash();
    let recipient_b = Signer::generate().unlock_hash();
    let fee = Currency::from_u64(1);
    let remainder = subsidy.saturating_sub(&fee);
    let split = Currency::from_u64(100);
    let value_a = remainder.saturating_sub(&split);

    let input = CoinInput {
        parent_id: payout_id,
        unlock_conditions: miner.conditions(),
    };
    let unsigned = Transaction::new(
        vec![input],
        vec![
            CoinOutput {
                value: value_a,
                owner: recipient_a,
            },
            CoinOutput {
                value: split,
                owner: recipient_b,
            },
        ],
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        vec![fee],
        Vec::new(),
        Vec::new(),
    );
    let signature = miner.sign_whole_transaction(&unsigned, payout_id);
    let tx = Transaction::new(
        unsigned.coin_inputs.clone(),
        unsigned.coin_outputs.clone(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        unsigned.miner_fees.clone(),
        Vec::new(),
        vec![signature],
    );

    let output_a = tx.coin_output_id(0);
    let output_b = tx.coin_output_id(1);

    mine(&engine, &params, tip, height, ts(height.0), vec![tx], Signer::generate().unlock_hash());

    SimpleTransfer {
        engine,
        output_a,
        output_b,
        spent_output: payout_id,
    }
}

/// Shared rig for the contract lifecycle scenarios (S2-S4): a funded
/// contract created in a mined block, its owner's signer, the file's
/// reference segments, and the height it was created at.
pub struct ContractRig {
    pub engine: Engine,
    pub params: NetworkParams,
    pub contract_id: ContractID,
    pub owner: Signer,
    pub tip: BlockID,
    pub created_height: BlockHeight,
    pub segments: Vec<Vec<u8>>,
    pub payout: Currency,
}

fn fund_contract(start_offset: u64, window_len: u64) -> ContractRig {
    let params = NetworkParams::testing();
    let engine = fresh_engine(params.clone());
    let (_, genesis_id) = engine.tip().expect("genesis is always seeded");

    // The contract's collateral comes from a real matured miner payout
    // rather than being conjured, so `fund_contract`'s own
    // creation transaction satisfies the same conservation rule every
    // other transaction does.
    let miner = Signer::generate();
    let block1 = mine(&engine, &params, genesis_id, BlockHeight(1), ts(1), Vec::new(), miner.unlock_hash());
    let payout_id = uplo_chain::derive::miner_payout_id(block1.id(), 0);

    let tip = mine_empty_chain(
        &engine,
        &params,
        block1.id(),
        BlockHeight(2),
        params.maturity_delay,
        miner.unlock_hash(),
    );
    let created_height = BlockHeight(2 + params.maturity_delay);
    assert!(engine.get_output(payout_id).is_some(), "funding payout failed to mature");

    let owner = Signer::generate();
    let file: Vec<u8> = (0u8..200).collect();
    let segments = segments_of(&file);
    let (merkle_root, _) = build_tree(&segments);

    let fee = Currency::from_u64(1);
    let subsidy = params.subsidy(BlockHeight(1));
    // The whole matured payout goes to the fee and the contract's payout,
    // with nothing left over for a change output.
    let payout = subsidy.saturating_sub(&fee);
    // `payout` is the contract's declared face value; `check_contracts`
    // requires `valid_outputs`/`missed_outputs` to sum to its *post-tax*
    // amount, not `payout` itself (apply.rs mints the difference into the
    // dividend pool separately at creation).
    let post_tax = params.post_tax(&payout, created_height);
    let contract = FileContract {
        file_size: file.len() as u64,
        merkle_root,
        window_start: created_height.0 + start_offset,
        window_end: created_height.0 + start_offset + window_len,
        payout: payout.clone(),
        valid_outputs: vec![CoinOutput {
            value: post_tax.clone(),
            owner: owner.unlock_hash(),
        }],
        missed_outputs: vec![CoinOutput {
            value: post_tax,
            owner: owner.unlock_hash(),
        }],
        owner: owner.unlock_hash(),
        revision_number: 0,
    };

    let input = CoinInput {
        parent_id: payout_id,
        unlock_conditions: miner.conditions(),
    };
    let unsigned = Transaction::new(
        vec![input],
        Vec::new(),
        Vec::new(),
        Vec::new(),
        vec![contract],
        Vec::new(),
        Vec::new(),
        vec![fee],
        Vec::new(),
        Vec::new(),
    );
    let signature = miner.sign_whole_transaction(&unsigned, payout_id);
    let tx = Transaction::new(
        unsigned.coin_inputs.clone(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        unsigned.file_contracts.clone(),
        Vec::new(),
        Vec::new(),
        unsigned.miner_fees.clone(),
        Vec::new(),
        vec![signature],
    );
    let contract_id = tx.contract_id(0);

    let block = mine(&engine, &params, tip, created_height, ts(created_height.0), vec![tx], miner.unlock_hash());

    ContractRig {
        engine,
        params,
        contract_id,
        owner,
        tip: block.id(),
        created_height,
        segments,
        payout,
    }
}

/// S2 - Contract lifecycle (success): fund a contract, then submit a
/// valid storage proof inside its window.
pub struct ContractSettled {
    pub engine: Engine,
    pub valid_proof_output: OutputID,
    pub maturity_height: BlockHeight,
    pub tax_collected: Currency,
}

pub fn s2_contract_lifecycle_success() -> ContractSettled {
    let rig = fund_contract(1, 1);
    let window_start = BlockHeight(rig.created_height.0 + 1);

    let tip = mine_empty_chain(
        &rig.engine,
        &rig.params,
        rig.tip,
        BlockHeight(rig.created_height.0 + 1),
        1,
        rig.owner.unlock_hash(),
    );

    let (index, size) = rig
        .engine
        .storage_proof_segment(rig.contract_id)
        .expect("the funded contract is still open");
    let segment = rig.segments[index as usize][..size as usize].to_vec();
    let (_, proofs) = build_tree(&rig.segments);

    let proof_tx = Transaction::new(
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        vec![uplo_chain::contract::StorageProof {
            parent_id: rig.contract_id,
            segment,
            proof: proofs[index as usize].clone(),
        }],
        Vec::new(),
        Vec::new(),
        Vec::new(),
    );

    let proof_height = BlockHeight(window_start.0);
    let block = mine(
        &rig.engine,
        &rig.params,
        tip,
        proof_height,
        ts(proof_height.0),
        vec![proof_tx],
        rig.owner.unlock_hash(),
    );

    let valid_proof_output = uplo_chain::derive::contract_valid_output_id(rig.contract_id, 0);
    let maturity_height = BlockHeight(proof_height.0 + rig.params.maturity_delay);
    let tax_collected = rig.params.tax(&rig.payout, rig.created_height);

    let _ = block;
    assert!(rig.engine.get_contract(rig.contract_id).is_none(), "settled contract must be removed");

    ContractSettled {
        engine: rig.engine,
        valid_proof_output,
        maturity_height,
        tax_collected,
    }
}

/// S3 - Contract lifecycle (missed): fund a contract, then let its
/// window elapse with no storage proof.
pub struct ContractMissed {
    pub engine: Engine,
    pub missed_output: OutputID,
    pub pool_before: Currency,
    pub pool_after: Currency,
}

pub fn s3_contract_lifecycle_missed() -> ContractMissed {
    let rig = fund_contract(1, 1);
    let pool_before = rig.engine.get_pool();
    let window_end = BlockHeight(rig.created_height.0 + 2);

    mine_empty_chain(
        &rig.engine,
        &rig.params,
        rig.tip,
        BlockHeight(rig.created_height.0 + 1),
        2,
        rig.owner.unlock_hash(),
    );

    let missed_output = uplo_chain::derive::contract_missed_output_id(rig.contract_id, 0);
    let pool_after = rig.engine.get_pool();
    let _ = window_end;
    assert!(rig.engine.get_contract(rig.contract_id).is_none(), "expired contract must be removed by maintenance");

    ContractMissed {
        engine: rig.engine,
        missed_output,
        pool_before,
        pool_after,
    }
}

/// S4 - Revision: fund a contract, then revise it to double its declared
/// file size before either deadline arrives.
pub struct ContractRevised {
    pub engine: Engine,
    pub contract_id: ContractID,
    pub new_file_size: u64,
}

pub fn s4_revision() -> ContractRevised {
    // A wide `start_offset` so the revision below (at `created_height +
    // 1`) still lands strictly before `window_start`, per
    // `check_revisions`'s `new_window_start > height` rule.
    let rig = fund_contract(3, 5);
    let contract = rig
        .engine
        .get_contract(rig.contract_id)
        .expect("the freshly funded contract is open");

    let new_file_size = contract.file_size * 2;
    let revision = uplo_chain::contract::FileContractRevision {
        parent_id: rig.contract_id,
        unlock_conditions: rig.owner.conditions(),
        new_revision_number: contract.revision_number + 1,
        new_file_size,
        new_merkle_root: contract.merkle_root,
        new_window_start: contract.window_start,
        new_window_end: contract.window_end,
        new_valid_outputs: contract.valid_outputs.clone(),
        new_missed_outputs: contract.missed_outputs.clone(),
        new_owner: rig.owner.unlock_hash(),
    };

    // `check_signatures` only covers `coin_inputs`/`share_inputs` (see
    // `all_inputs`); a revision's authorization instead comes from
    // `check_revisions`'s stateful check that its `unlock_conditions`
    // hash to the contract's current owner, so this transaction needs no
    // `TransactionSignature` at all.
    let tx = Transaction::new(
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        vec![revision],
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
    );

    let height = BlockHeight(rig.created_height.0 + 1);
    mine(&rig.engine, &rig.params, rig.tip, height, ts(height.0), vec![tx], rig.owner.unlock_hash());

    ContractRevised {
        engine: rig.engine,
        contract_id: rig.contract_id,
        new_file_size,
    }
}

/// S5 - Reorg: two competing chains from the same fork point, the second
/// strictly heavier. Returns the engine after submitting both paths in
/// order, plus every block ID on each so the caller can assert the
/// resulting tip and notification contents.
pub struct ReorgFixture {
    pub engine: Engine,
    pub path_one: Vec<BlockID>,
    pub path_two: Vec<BlockID>,
}

pub fn s5_reorg() -> ReorgFixture {
    let params = NetworkParams::testing();
    let engine = fresh_engine(params.clone());
    let (_, genesis_id) = engine.tip().expect("genesis is always seeded");
    let miner = Signer::generate().unlock_hash();

    let a = mine(&engine, &params, genesis_id, BlockHeight(1), ts(1), Vec::new(), miner);
    let b = mine(&engine, &params, a.id(), BlockHeight(2), ts(2), Vec::new(), miner);
    let c = mine(&engine, &params, b.id(), BlockHeight(3), ts(3), Vec::new(), miner);
    let path_one = vec![a.id(), b.id(), c.id()];

    // The second path shares `a` as its fork point and out-lengths path
    // one by one block, so its cumulative work strictly exceeds it under
    // the `testing()` envelope's constant root target. Each branch's own
    // timestamps only need to increase along that branch, so reusing
    // `ts(height)` on both forks is fine even though the two branches
    // then share timestamps at the same height.
    let b2 = mine(&engine, &params, a.id(), BlockHeight(2), ts(2), Vec::new(), miner);
    let c2 = mine(&engine, &params, b2.id(), BlockHeight(3), ts(3), Vec::new(), miner);
    let d2 = mine(&engine, &params, c2.id(), BlockHeight(4), ts(4), Vec::new(), miner);
    let path_two = vec![a.id(), b2.id(), c2.id(), d2.id()];

    let (_, tip) = engine.tip().expect("engine always has a tip after genesis");
    assert_eq!(tip, d2.id(), "heavier path two must win the tip");

    ReorgFixture {
        engine,
        path_one,
        path_two,
    }
}

/// S6 - Governance rotation with revert: a governance update lands
/// exactly at the hardfork height, then a heavier competing chain
/// reorgs past it.
pub struct GovernanceRotation {
    pub engine: Engine,
    pub pre_image: uplo_chain::governance::GovernancePair,
    pub rotated: uplo_chain::governance::GovernancePair,
    pub rotation_block: BlockID,
}

pub fn s6_governance_rotation_with_revert() -> GovernanceRotation {
    let params = NetworkParams::testing();
    let engine = fresh_engine(params.clone());
    let (_, genesis_id) = engine.tip().expect("genesis is always seeded");
    let miner = Signer::generate().unlock_hash();

    let hardfork = params.governance_hardfork_height;
    let tip = mine_empty_chain(&engine, &params, genesis_id, BlockHeight(1), hardfork.0 - 1, miner);

    let pre_image = engine.get_governance();
    let rotated = uplo_chain::governance::GovernancePair {
        primary: Signer::generate().unlock_hash(),
        failsafe: Signer::generate().unlock_hash(),
    };
    let update_tx = Transaction::new(
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        vec![uplo_chain::governance::encode_governance_update(&rotated)],
        Vec::new(),
    );
    let rotation_block = mine(&engine, &params, tip, hardfork, ts(hardfork.0), vec![update_tx], miner);
    assert_eq!(engine.get_governance(), rotated, "governance must reflect the new pair immediately");

    // A heavier path forking at the same point as the rotation block
    // (one block longer, so it strictly out-weighs it) reorgs past it.
    let mut heavier = tip;
    for i in 0..2 {
        let height = BlockHeight(hardfork.0 + i);
        let block = mine(&engine, &params, heavier, height, ts(height.0) + 50, Vec::new(), miner);
        heavier = block.id();
    }

    assert_eq!(engine.get_governance(), pre_image, "reverting the rotation block must restore the pre-image pair");

    GovernanceRotation {
        engine,
        pre_image,
        rotated,
        rotation_block: rotation_block.id(),
    }
}
