//! The governance address pair and its arbitrary-data rotation protocol.

use uplo_serde_derive::{Decode, Encode};

use crate::ids::UnlockHash;

/// The current `(primary, failsafe)` governance address pair. After the
/// governance hardfork, a transaction may atomically replace both by
/// embedding one of these, tag-prefixed, in its arbitrary-data list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct GovernancePair {
    pub primary: UnlockHash,
    pub failsafe: UnlockHash,
}

/// The 16-byte ASCII tag that must prefix an arbitrary-data entry for it
/// to be considered a governance update candidate.
pub const GOVERNANCE_UPDATE_TAG: [u8; 16] = *b"UploGovernance\0\0";

/// Parses a single arbitrary-data entry as a governance update, if its tag
/// matches. Entries with a non-matching tag (or a matching tag but a
/// malformed payload) are not governance updates at all, distinct from a
/// well-formed update that simply loses the at-most-one-per-block race;
/// the caller treats the two differently (the latter is silently dropped,
/// the former is a `TransactionError::InvalidGovernanceUpdate` if anyone
/// tries to validate it as one without checking the tag first).
pub fn parse_governance_update(entry: &[u8]) -> Option<GovernancePair> {
    if entry.len() < 16 || entry[..16] != GOVERNANCE_UPDATE_TAG {
        return None;
    }
    crate::serialization::Decode::decode(&entry[16..]).ok()
}

pub fn encode_governance_update(pair: &GovernancePair) -> Vec<u8> {
    use crate::serialization::Encode;
    let mut out = GOVERNANCE_UPDATE_TAG.to_vec();
    out.extend(pair.encode_to_vec());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_arbitrary_data_encoding() {
        let pair = GovernancePair {
            primary: UnlockHash::from_bytes([1u8; 32]),
            failsafe: UnlockHash::from_bytes([2u8; 32]),
        };
        let entry = encode_governance_update(&pair);
        assert_eq!(parse_governance_update(&entry), Some(pair));
    }

    #[test]
    fn rejects_mismatched_tag() {
        let entry = vec![0u8; 40];
        assert_eq!(parse_governance_update(&entry), None);
    }
}
