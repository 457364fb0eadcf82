//! # Settlement Block
//!
//! The unit of consensus: one multilateral netting round over one or more
//! due pairs, committed at a height on the append-only settlement chain.
//!
//! ## Security Invariant
//!
//! The block hash is computed from `CanonicalBytes` of the block with its
//! signature set stripped. Validators sign and vote on that hash, so a
//! block's identity is fixed before any signature exists and cannot be
//! altered by adding or removing signatures.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use rsn_core::{
    sha256_digest, CanonicalBytes, CanonicalizationError, ContentDigest, CurrencyCode, OperatorId,
    OperatorPair, RecordId, Timestamp, ValidatorId,
};
use rsn_netting::SettlementTransfer;
use rsn_zkp::AggregateProof;

/// Domain tag hashed to produce the parent digest of the block at height 0.
const GENESIS_TAG: &str = "rsn.chain.genesis.v1";

/// Parent digest expected of the first block on every chain.
pub fn genesis_parent_digest() -> ContentDigest {
    // Canonicalizing a string literal cannot fail.
    let bytes = CanonicalBytes::new(&GENESIS_TAG).expect("static tag canonicalizes");
    sha256_digest(&bytes)
}

/// One committed multilateral settlement round.
///
/// Blocks disclose net positions, transfers, and record identifiers, never
/// record contents. Per-record charges stay on the operators' own nodes;
/// the aggregate proof attests that the disclosed positions follow from
/// well-formed bilateral debts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementBlock {
    /// Position on the chain, starting at 0.
    pub height: u64,
    /// Hash of the previous block, or the genesis tag digest at height 0.
    pub parent_digest: ContentDigest,
    /// Proposal time, supplied by the proposer's clock.
    pub created_at: Timestamp,
    /// The validator that built and proposed this block.
    pub proposer: ValidatorId,
    /// Settlement currency for every amount in this block.
    pub currency: CurrencyCode,
    /// Net position per operator in minor units; sums to zero.
    pub net_positions: BTreeMap<OperatorId, i64>,
    /// Minimal transfer set realizing the net positions.
    pub transfers: Vec<SettlementTransfer>,
    /// The bilateral pairs this block settles.
    pub settled_pairs: Vec<OperatorPair>,
    /// Identifiers of every record discharged by this block.
    pub included_record_ids: BTreeSet<RecordId>,
    /// Digest binding the block to its exact record set.
    pub record_set_digest: ContentDigest,
    /// Sum of the bilateral debt magnitudes entering netting.
    pub gross_cents: i64,
    /// Sum of the transfer amounts leaving netting.
    pub net_cents: i64,
    /// Aggregate correctness proof over the net positions.
    pub proof: AggregateProof,
    /// Ed25519 signatures over the unsigned block hash, hex encoded.
    pub signatures: BTreeMap<ValidatorId, String>,
}

impl SettlementBlock {
    /// Canonical bytes of the block with signatures stripped.
    ///
    /// This is both the signing payload and the hash preimage.
    pub fn signing_bytes(&self) -> Result<CanonicalBytes, CanonicalizationError> {
        let mut unsigned = self.clone();
        unsigned.signatures.clear();
        CanonicalBytes::new(&unsigned)
    }

    /// The block's content hash.
    pub fn block_hash(&self) -> Result<ContentDigest, CanonicalizationError> {
        Ok(sha256_digest(&self.signing_bytes()?))
    }

    /// Digest over a sorted list of record identifiers.
    pub fn digest_record_set(ids: &BTreeSet<RecordId>) -> ContentDigest {
        let sorted: Vec<&str> = ids.iter().map(RecordId::as_str).collect();
        // A vector of strings always canonicalizes.
        let bytes = CanonicalBytes::new(&sorted).expect("string list canonicalizes");
        sha256_digest(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsn_zkp::AggregateProof;

    fn block() -> SettlementBlock {
        let mut positions = BTreeMap::new();
        positions.insert(OperatorId::new("op-x").unwrap(), -500);
        positions.insert(OperatorId::new("op-y").unwrap(), 500);
        let ids: BTreeSet<RecordId> = [RecordId::new("r1").unwrap()].into_iter().collect();
        SettlementBlock {
            height: 0,
            parent_digest: genesis_parent_digest(),
            created_at: Timestamp::parse("2026-02-01T00:00:00Z").unwrap(),
            proposer: ValidatorId::new("op-x").unwrap(),
            currency: CurrencyCode::new("EUR").unwrap(),
            net_positions: positions,
            transfers: vec![SettlementTransfer {
                from: OperatorId::new("op-x").unwrap(),
                to: OperatorId::new("op-y").unwrap(),
                amount_cents: 500,
            }],
            settled_pairs: vec![OperatorPair::new(
                OperatorId::new("op-x").unwrap(),
                OperatorId::new("op-y").unwrap(),
            )
            .unwrap()],
            record_set_digest: SettlementBlock::digest_record_set(&ids),
            included_record_ids: ids,
            gross_cents: 500,
            net_cents: 500,
            proof: AggregateProof {
                system: "mock-sha256-v1".to_string(),
                proof_hex: "00".repeat(32),
            },
            signatures: BTreeMap::new(),
        }
    }

    #[test]
    fn hash_ignores_signatures() {
        let unsigned = block();
        let mut signed = unsigned.clone();
        signed.signatures.insert(
            ValidatorId::new("op-y").unwrap(),
            "ab".repeat(64),
        );
        assert_eq!(
            unsigned.block_hash().unwrap(),
            signed.block_hash().unwrap()
        );
    }

    #[test]
    fn hash_changes_with_content() {
        let a = block();
        let mut b = block();
        b.net_cents = 501;
        assert_ne!(a.block_hash().unwrap(), b.block_hash().unwrap());
    }

    #[test]
    fn genesis_digest_is_stable() {
        assert_eq!(genesis_parent_digest(), genesis_parent_digest());
    }

    #[test]
    fn record_set_digest_is_order_free() {
        let mut a = BTreeSet::new();
        a.insert(RecordId::new("r2").unwrap());
        a.insert(RecordId::new("r1").unwrap());
        let mut b = BTreeSet::new();
        b.insert(RecordId::new("r1").unwrap());
        b.insert(RecordId::new("r2").unwrap());
        assert_eq!(
            SettlementBlock::digest_record_set(&a),
            SettlementBlock::digest_record_set(&b)
        );
    }

    #[test]
    fn block_serde_roundtrip() {
        let b = block();
        let json = serde_json::to_string(&b).unwrap();
        let back: SettlementBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(b, back);
    }
}
