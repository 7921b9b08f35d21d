//! `NetworkParams`: the tri-valued `standard`/`dev`/`testing` envelope
//! from spec §6.3, expressed as a value injected at construction rather
//! than a module-level `cfg` switch, so tests can parameterize it freely.

use crate::currency::Currency;
use crate::ids::UnlockHash;
use crate::primitives::{BlockHeight, Target};

/// Which of the three deployments a [`NetworkParams`] value describes.
/// Carried alongside the envelope purely for `Display`/diagnostics; every
/// consensus decision is made from the envelope's fields, never by
/// matching on this enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Network {
    Standard,
    Dev,
    Testing,
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Network::Standard => "standard",
            Network::Dev => "dev",
            Network::Testing => "testing",
        };
        write!(f, "{}", s)
    }
}

/// Every semantic constant §6.3 enumerates. Exact values are
/// deployment-configured; `standard()` carries mainnet-scale values,
/// `dev()` and `testing()` shrink timing/size constants so integration
/// tests don't need to mine thousands of blocks to reach a hardfork.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkParams {
    pub network: Network,

    // --- timestamp / header rules ---
    pub median_window: usize,
    pub future_threshold: u64,
    pub extreme_future_threshold: u64,

    // --- sizes ---
    pub block_size_limit: u64,
    pub tx_size_limit_post_hardfork: u64,

    // --- maturity / windows ---
    pub maturity_delay: u64,

    // --- legacy (pre-Oak) difficulty ---
    pub target_window: u64,
    pub max_adjustment_up: (u64, u64),
    pub max_adjustment_down: (u64, u64),

    // --- Oak difficulty ---
    pub block_frequency: u64,
    pub decay_num: u64,
    pub decay_denom: u64,
    pub max_rise: (u64, u64),
    pub max_drop: (u64, u64),
    pub max_shift: u64,
    pub oak_hardfork_height: BlockHeight,
    pub oak_fix_hardfork_height: BlockHeight,
    pub oak_initial_total_difficulty: u128,
    pub oak_initial_total_time: u64,

    // --- proof of work ---
    pub root_target: Target,
    pub root_depth: Target,
    pub asic_hardfork_height: BlockHeight,
    pub asic_factor: u64,

    // --- emission ---
    pub initial_coinbase: u64,
    pub min_coinbase: u64,
    pub coinbase_precision: u64,

    // --- shares / dividend pool ---
    pub total_shares: u64,

    // --- file contracts ---
    pub tax_hardfork_height: BlockHeight,
    pub tax_rate_num: u64,
    pub tax_rate_denom: u64,

    // --- governance ---
    pub governance_hardfork_height: BlockHeight,
    pub subsidy_frequency: u64,
    pub subsidy_per_block: Currency,
    pub subsidy_initial_lump: Currency,
    pub initial_governance_primary: UnlockHash,
    pub initial_governance_failsafe: UnlockHash,

    /// Below this height, zero-valued outputs and zero miner fees are
    /// accepted rather than rejected. `None` on `standard()` (the rule is
    /// never relaxed); a `dev`/`testing` envelope replaying pre-rule
    /// history may set a height.
    pub zero_output_relaxation_height: Option<BlockHeight>,
}

impl NetworkParams {
    /// Mainnet-scale parameters.
    pub fn standard() -> NetworkParams {
        let mut bytes = [0xffu8; 32];
        bytes[0] = 0x00;
        bytes[1] = 0x00;

        NetworkParams {
            network: Network::Standard,

            median_window: 11,
            future_threshold: 3 * 60 * 60,
            extreme_future_threshold: 10 * 60 * 60,

            block_size_limit: 2_000_000,
            tx_size_limit_post_hardfork: 2_000_000,

            maturity_delay: 144,

            target_window: 1_000,
            max_adjustment_up: (1, 4),
            max_adjustment_down: (1, 4),

            block_frequency: 600,
            decay_num: 995,
            decay_denom: 1_000,
            max_rise: (1_004, 1_000),
            max_drop: (1_000, 1_004),
            max_shift: 3 * 60 * 60,
            oak_hardfork_height: BlockHeight(135_000),
            oak_fix_hardfork_height: BlockHeight(139_000),
            oak_initial_total_difficulty: 67_872_162_860,
            oak_initial_total_time: 120_000,

            root_target: Target::from_bytes(bytes),
            root_depth: Target::ROOT_DEPTH,
            asic_hardfork_height: BlockHeight(179_000),
            asic_factor: 1_009,

            initial_coinbase: 300_000,
            min_coinbase: 30_000,
            coinbase_precision: 1_000_000_000_000_000_000_000_000,

            total_shares: 10_000,

            tax_hardfork_height: BlockHeight(21_000),
            tax_rate_num: 1,
            tax_rate_denom: 10,

            governance_hardfork_height: BlockHeight(293_000),
            subsidy_frequency: 4_320,
            subsidy_per_block: Currency::from_u64(30_000),
            subsidy_initial_lump: Currency::from_u64(100_000_000),
            initial_governance_primary: UnlockHash::from_bytes([0x01; 32]),
            initial_governance_failsafe: UnlockHash::from_bytes([0x02; 32]),

            zero_output_relaxation_height: None,
        }
    }

    /// A shrunk envelope for local development: every hardfork and
    /// maturity window is reachable in a handful of blocks.
    pub fn dev() -> NetworkParams {
        NetworkParams {
            network: Network::Dev,
            median_window: 11,
            future_threshold: 3 * 60 * 60,
            extreme_future_threshold: 10 * 60 * 60,
            block_size_limit: 2_000_000,
            tx_size_limit_post_hardfork: 2_000_000,
            maturity_delay: 10,
            target_window: 20,
            max_adjustment_up: (1, 4),
            max_adjustment_down: (1, 4),
            block_frequency: 12,
            decay_num: 995,
            decay_denom: 1_000,
            max_rise: (1_004, 1_000),
            max_drop: (1_000, 1_004),
            max_shift: 60,
            oak_hardfork_height: BlockHeight(20),
            oak_fix_hardfork_height: BlockHeight(40),
            oak_initial_total_difficulty: 10_000,
            oak_initial_total_time: 120,
            root_target: Target::ROOT_DEPTH,
            root_depth: Target::ROOT_DEPTH,
            asic_hardfork_height: BlockHeight(60),
            asic_factor: 3,
            initial_coinbase: 300_000,
            min_coinbase: 30_000,
            coinbase_precision: 1,
            total_shares: 100,
            tax_hardfork_height: BlockHeight(5),
            tax_rate_num: 1,
            tax_rate_denom: 10,
            governance_hardfork_height: BlockHeight(15),
            subsidy_frequency: 5,
            subsidy_per_block: Currency::from_u64(10),
            subsidy_initial_lump: Currency::from_u64(1_000),
            initial_governance_primary: UnlockHash::from_bytes([0x01; 32]),
            initial_governance_failsafe: UnlockHash::from_bytes([0x02; 32]),

            zero_output_relaxation_height: None,
        }
    }

    /// The smallest, fastest envelope; what unit tests use by default so
    /// every hardfork and maturity boundary is reachable in a handful of
    /// blocks without any timing dependence.
    pub fn testing() -> NetworkParams {
        let mut params = NetworkParams::dev();
        params.network = Network::Testing;
        params.maturity_delay = 3;
        params.governance_hardfork_height = BlockHeight(4);
        params.tax_hardfork_height = BlockHeight(2);
        params.oak_hardfork_height = BlockHeight(6);
        params.oak_fix_hardfork_height = BlockHeight(10);
        params.asic_hardfork_height = BlockHeight(8);
        params.subsidy_frequency = 2;
        params
    }

    pub fn tax(&self, payout: &Currency, height: BlockHeight) -> Currency {
        if height.0 < self.tax_hardfork_height.0 {
            Currency::zero()
        } else {
            payout
                .checked_mul_u64(self.tax_rate_num)
                .checked_div_u64(self.tax_rate_denom)
                .unwrap_or_else(Currency::zero)
        }
    }

    pub fn post_tax(&self, payout: &Currency, height: BlockHeight) -> Currency {
        payout.saturating_sub(&self.tax(payout, height))
    }

    /// Whether a zero-valued output or miner fee is tolerated at `height`.
    pub fn zero_outputs_allowed(&self, height: BlockHeight) -> bool {
        matches!(self.zero_output_relaxation_height, Some(relaxed) if height.0 < relaxed.0)
    }

    pub fn subsidy(&self, height: BlockHeight) -> Currency {
        let reduced = self.initial_coinbase.saturating_sub(height.0);
        let amount = reduced.max(self.min_coinbase);
        Currency::from_u64(amount).checked_mul_u64(self.coinbase_precision)
    }
}
