//! Cross-crate settlement flows: ingestion through netting, consensus,
//! and commit, exercised the way a running zone would drive them.

use std::collections::BTreeMap;
use std::sync::Arc;

use rsn_consensus::{
    ConsensusConfig, ConsensusCoordinator, SettlementChain, TickOutcome,
};
use rsn_core::{
    BceRecord, CurrencyCode, Imsi, OperatorId, RateCard, RecordId, SettlementStatus, Timestamp,
    UsageMetrics, ValidatorId,
};
use rsn_crypto::{SigningKey, VerifyingKey};
use rsn_ledger::{JsonFileStore, LedgerConfig, LedgerStore, LocalLedger, MemoryStore};
use rsn_zkp::{AttestationGateway, LocalProofGateway};

const THRESHOLD: u64 = 10_000;

fn eur() -> CurrencyCode {
    CurrencyCode::new("EUR").unwrap()
}

fn at(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

fn record(id: &str, home: &str, visited: &str, minutes: u64) -> BceRecord {
    BceRecord {
        record_id: RecordId::new(id).unwrap(),
        imsi: Imsi::new("262011234567890").unwrap(),
        home_operator: OperatorId::new(home).unwrap(),
        visited_operator: OperatorId::new(visited).unwrap(),
        usage: UsageMetrics {
            call_minutes: minutes,
            data_mb: 0,
            sms_count: 0,
        },
        rates: RateCard {
            call_rate_cents: 100,
            data_rate_cents: 0,
            sms_rate_cents: 0,
        },
        wholesale_charge_cents: minutes * 100,
        currency: eur(),
        occurred_at: at("2026-01-15T12:00:00Z"),
        status: SettlementStatus::Pending,
        settled_in_height: None,
        proof_ref: None,
    }
}

struct Node {
    coordinator: ConsensusCoordinator,
    ledger: Arc<LocalLedger>,
    chain: Arc<SettlementChain>,
}

fn node_over(
    store: Arc<dyn LedgerStore>,
    name: &str,
    key: SigningKey,
    verifying: BTreeMap<ValidatorId, VerifyingKey>,
    quorum: usize,
) -> Node {
    let ledger = Arc::new(LocalLedger::new(
        store.clone(),
        LedgerConfig {
            currency: eur(),
            threshold_cents: THRESHOLD,
        },
    ));
    let gateway: Arc<dyn AttestationGateway> = Arc::new(LocalProofGateway::new());
    let chain = Arc::new(SettlementChain::new(
        store,
        verifying,
        quorum,
        eur(),
        gateway.clone(),
    ));
    let coordinator = ConsensusCoordinator::new(
        ConsensusConfig {
            node_id: ValidatorId::new(name).unwrap(),
            currency: eur(),
            voting_window_secs: 30,
            proof_timeout_secs: 10,
        },
        key,
        ledger.clone(),
        chain.clone(),
        gateway,
    );
    Node {
        coordinator,
        ledger,
        chain,
    }
}

fn zone(names: &[&str], quorum: usize) -> Vec<Node> {
    let keys: Vec<SigningKey> = (0..names.len())
        .map(|i| SigningKey::from_seed(&[i as u8 + 1; 32]))
        .collect();
    let verifying: BTreeMap<ValidatorId, VerifyingKey> = names
        .iter()
        .zip(&keys)
        .map(|(n, k)| (ValidatorId::new(*n).unwrap(), k.verifying_key()))
        .collect();
    names
        .iter()
        .zip(keys)
        .map(|(name, key)| {
            node_over(
                Arc::new(MemoryStore::new()),
                name,
                key,
                verifying.clone(),
                quorum,
            )
        })
        .collect()
}

/// Run one consensus round to commit on every node. The proposer is
/// `nodes[proposer]`; everyone else hears the proposal and the commit.
async fn run_round(nodes: &[Node], proposer: usize, now: Timestamp) -> u64 {
    let outcome = nodes[proposer].coordinator.tick(now).await.unwrap();
    let commit = match outcome {
        TickOutcome::Committed(commit) => commit,
        TickOutcome::Proposed(proposal) => {
            let mut commit = None;
            for (i, node) in nodes.iter().enumerate() {
                if i == proposer {
                    continue;
                }
                if let Some(vote) = node
                    .coordinator
                    .handle_proposal(proposal.clone())
                    .await
                    .unwrap()
                {
                    if let Some(c) = nodes[proposer].coordinator.handle_vote(vote).await.unwrap() {
                        commit = Some(c);
                        break;
                    }
                }
            }
            commit.expect("quorum never reached")
        }
        other => panic!("expected a round, got {other:?}"),
    };
    let height = commit.block.height;
    for (i, node) in nodes.iter().enumerate() {
        if i != proposer {
            node.coordinator.handle_commit(commit.clone()).await.unwrap();
        }
    }
    height
}

fn record_cents(id: &str, home: &str, visited: &str, cents: u64) -> BceRecord {
    let mut r = record(id, home, visited, cents);
    r.rates.call_rate_cents = 1;
    r.wholesale_charge_cents = cents;
    r
}

#[tokio::test]
async fn two_records_cross_the_threshold_and_settle_in_full() {
    // op-x owes op-y 144.62 EUR across two records of 77.20 and 67.42,
    // over a 100 EUR threshold.
    let nodes = zone(&["op-x", "op-y"], 1);
    for node in &nodes {
        node.ledger
            .ingest(record_cents("a1", "op-y", "op-x", 7_720))
            .unwrap();
        node.ledger
            .ingest(record_cents("a2", "op-y", "op-x", 6_742))
            .unwrap();
    }

    let height = run_round(&nodes, 0, at("2026-02-01T00:00:00Z")).await;
    assert_eq!(height, 0);

    let block = nodes[1].chain.block(0).unwrap().unwrap();
    assert_eq!(
        block.net_positions[&OperatorId::new("op-x").unwrap()],
        -14_462
    );
    assert_eq!(
        block.net_positions[&OperatorId::new("op-y").unwrap()],
        14_462
    );
    assert!(block.included_record_ids.contains(&RecordId::new("a1").unwrap()));
    assert!(block.included_record_ids.contains(&RecordId::new("a2").unwrap()));
    assert_eq!(block.gross_cents, 14_462);
    assert_eq!(block.net_cents, 14_462);
    assert_eq!(block.transfers.len(), 1);
    assert_eq!(block.transfers[0].from, OperatorId::new("op-x").unwrap());
    assert_eq!(block.transfers[0].to, OperatorId::new("op-y").unwrap());
    assert_eq!(block.transfers[0].amount_cents, 14_462);

    for node in &nodes {
        let r = node.ledger.record(&RecordId::new("a1").unwrap()).unwrap().unwrap();
        assert_eq!(r.status, SettlementStatus::Settled);
        assert_eq!(r.settled_in_height, Some(0));
    }
}

#[tokio::test]
async fn cycle_of_debts_nets_below_gross() {
    // op-x owes op-y, op-y owes op-z, op-z owes op-x. Gross 36,000,
    // transfers only need to move the imbalances.
    let nodes = zone(&["op-x", "op-y", "op-z"], 2);
    for node in &nodes {
        node.ledger.ingest(record("c1", "op-y", "op-x", 140)).unwrap();
        node.ledger.ingest(record("c2", "op-z", "op-y", 120)).unwrap();
        node.ledger.ingest(record("c3", "op-x", "op-z", 100)).unwrap();
    }

    let height = run_round(&nodes, 0, at("2026-02-01T00:00:00Z")).await;
    assert_eq!(height, 0);

    let block = nodes[1].chain.block(0).unwrap().unwrap();
    assert_eq!(block.gross_cents, 36_000);
    assert!(block.net_cents < block.gross_cents);

    // Positions conserve value.
    assert_eq!(block.net_positions.values().sum::<i64>(), 0);

    // Transfers move exactly the net imbalance of each operator.
    for (op, net) in &block.net_positions {
        let paid: i64 = block
            .transfers
            .iter()
            .filter(|t| &t.from == op)
            .map(|t| t.amount_cents)
            .sum();
        let received: i64 = block
            .transfers
            .iter()
            .filter(|t| &t.to == op)
            .map(|t| t.amount_cents)
            .sum();
        assert_eq!(paid - received, -net);
    }

    for node in &nodes {
        assert!(!node.ledger.has_due_pairs().unwrap());
    }
}

#[tokio::test]
async fn proposer_rotates_between_blocks() {
    let nodes = zone(&["op-x", "op-y", "op-z"], 2);

    for node in &nodes {
        node.ledger.ingest(record("b1", "op-y", "op-x", 145)).unwrap();
    }
    run_round(&nodes, 0, at("2026-02-01T00:00:00Z")).await;

    for node in &nodes {
        node.ledger.ingest(record("b2", "op-z", "op-y", 155)).unwrap();
    }

    // Height 1 belongs to op-y; op-x ticking stays idle.
    assert!(matches!(
        nodes[0].coordinator.tick(at("2026-02-01T01:00:00Z")).await.unwrap(),
        TickOutcome::Idle
    ));
    let height = run_round(&nodes, 1, at("2026-02-01T01:00:05Z")).await;
    assert_eq!(height, 1);

    let b0 = nodes[2].chain.block(0).unwrap().unwrap();
    let b1 = nodes[2].chain.block(1).unwrap().unwrap();
    assert_eq!(b0.proposer, ValidatorId::new("op-x").unwrap());
    assert_eq!(b1.proposer, ValidatorId::new("op-y").unwrap());
    assert_eq!(b1.parent_digest, b0.block_hash().unwrap());
}

#[tokio::test]
async fn settled_records_never_appear_in_a_second_block() {
    let nodes = zone(&["op-x", "op-y", "op-z"], 2);
    for node in &nodes {
        node.ledger.ingest(record("d1", "op-y", "op-x", 145)).unwrap();
    }
    run_round(&nodes, 0, at("2026-02-01T00:00:00Z")).await;

    for node in &nodes {
        node.ledger.ingest(record("d2", "op-y", "op-x", 150)).unwrap();
    }
    run_round(&nodes, 1, at("2026-02-01T01:00:00Z")).await;

    let b0 = nodes[0].chain.block(0).unwrap().unwrap();
    let b1 = nodes[0].chain.block(1).unwrap().unwrap();
    assert!(b0.included_record_ids.contains(&RecordId::new("d1").unwrap()));
    assert!(b1.included_record_ids.contains(&RecordId::new("d2").unwrap()));
    assert!(b0
        .included_record_ids
        .intersection(&b1.included_record_ids)
        .next()
        .is_none());
}

#[tokio::test]
async fn debt_accumulates_again_after_settlement() {
    let nodes = zone(&["op-x"], 1);
    nodes[0].ledger.ingest(record("e1", "op-y", "op-x", 145)).unwrap();
    run_round(&nodes, 0, at("2026-02-01T00:00:00Z")).await;

    // The pair starts over from zero, and the threshold applies afresh.
    nodes[0].ledger.ingest(record("e2", "op-y", "op-x", 60)).unwrap();
    assert!(!nodes[0].ledger.has_due_pairs().unwrap());
    nodes[0].ledger.ingest(record("e3", "op-y", "op-x", 50)).unwrap();
    assert!(nodes[0].ledger.has_due_pairs().unwrap());

    run_round(&nodes, 0, at("2026-02-01T02:00:00Z")).await;
    assert_eq!(nodes[0].chain.next_height().unwrap(), 2);

    let entry = nodes[0]
        .ledger
        .entry(
            &rsn_core::OperatorPair::new(
                OperatorId::new("op-x").unwrap(),
                OperatorId::new("op-y").unwrap(),
            )
            .unwrap(),
        )
        .unwrap()
        .unwrap();
    assert_eq!(entry.net_cents, 0);
    assert_eq!(entry.last_settlement_height, Some(1));
}

#[tokio::test]
async fn ledger_and_chain_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let key_seed = [5u8; 32];
    let verifying: BTreeMap<ValidatorId, VerifyingKey> = [(
        ValidatorId::new("op-x").unwrap(),
        SigningKey::from_seed(&key_seed).verifying_key(),
    )]
    .into_iter()
    .collect();

    {
        let store: Arc<dyn LedgerStore> = Arc::new(JsonFileStore::open(&path).unwrap());
        let node = node_over(
            store,
            "op-x",
            SigningKey::from_seed(&key_seed),
            verifying.clone(),
            1,
        );
        node.ledger.ingest(record("p1", "op-y", "op-x", 145)).unwrap();
        run_round(&[node], 0, at("2026-02-01T00:00:00Z")).await;
    }

    // Reopen over the same file; records, entries, and the chain are back.
    let store: Arc<dyn LedgerStore> = Arc::new(JsonFileStore::open(&path).unwrap());
    let node = node_over(store, "op-x", SigningKey::from_seed(&key_seed), verifying, 1);
    assert_eq!(node.chain.next_height().unwrap(), 1);
    let restored = node
        .ledger
        .record(&RecordId::new("p1").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(restored.status, SettlementStatus::Settled);
    assert_eq!(restored.settled_in_height, Some(0));

    // The restarted node keeps building on the restored chain.
    node.ledger.ingest(record("p2", "op-y", "op-x", 200)).unwrap();
    run_round(&[node], 0, at("2026-02-01T01:00:00Z")).await;
}

#[tokio::test]
async fn resubmitting_a_settled_record_is_still_a_duplicate() {
    let nodes = zone(&["op-x"], 1);
    nodes[0].ledger.ingest(record("q1", "op-y", "op-x", 145)).unwrap();
    run_round(&nodes, 0, at("2026-02-01T00:00:00Z")).await;

    let outcome = nodes[0].ledger.ingest(record("q1", "op-y", "op-x", 145)).unwrap();
    assert_eq!(outcome, rsn_ledger::IngestOutcome::Duplicate);
    assert_eq!(nodes[0].ledger.records().unwrap().len(), 1);
}
