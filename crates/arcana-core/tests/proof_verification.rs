//! Public verification: a third party holding only a serialized record can
//! recompute the draw.

use std::sync::Arc;
use std::time::Duration;

use arcana_core::entropy::{verify_reveal, BlockchainClient};
use arcana_core::fakes::{FixtureChain, ScriptedProvider};
use arcana_core::{
    audit_against_chain, draw, resolve, verify_draw, EntropyConfig, EntropySource,
    InterpretationOrchestrator, OrchestratorConfig, ReadingRequest, ReadingService, RequesterId,
    Tier,
};
use arcana_state::fakes::MemoryHistoryStore;
use arcana_state::{HistoryRecord, HistoryStore};

// -------------------------------------------------------------------------
// Sampling determinism
// -------------------------------------------------------------------------

#[test]
fn same_seed_gives_the_same_three_card_spread() {
    let first = resolve("three_card", &draw(b"abc123", 3).unwrap()).unwrap();
    let again = resolve("three_card", &draw(b"abc123", 3).unwrap()).unwrap();

    assert_eq!(first, again);
    let labels: Vec<_> = first.iter().map(|c| c.position.as_str()).collect();
    assert_eq!(labels, ["Past", "Present", "Future"]);
    assert!(first.iter().all(|c| c.card_id < 78));
}

#[test]
fn different_seeds_give_different_draws() {
    let a = draw(b"abc123", 10).unwrap();
    let b = draw(b"abc124", 10).unwrap();
    assert_ne!(a, b);
}

// -------------------------------------------------------------------------
// Commit / reveal
// -------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn reveal_waits_for_the_anchor_slot() {
    let chain = Arc::new(FixtureChain::new(200));
    let source = EntropySource::new(
        chain.clone(),
        EntropyConfig {
            finality_poll_ms: 50,
            ..EntropyConfig::default()
        },
    );

    let pending = source.request_seed().await.unwrap();
    let commitment = pending.commitment().clone();
    assert_eq!(commitment.blockchain_reference.slot, 202);

    let driver = {
        let chain = chain.clone();
        tokio::spawn(async move {
            for _ in 0..2 {
                tokio::time::sleep(Duration::from_millis(120)).await;
                chain.advance(1);
            }
        })
    };

    let proof = source.resolve_seed(pending).await.unwrap();
    driver.await.unwrap();

    assert_eq!(proof.commitment_hash, commitment.commitment_hash);
    assert!(proof.revealed_at >= proof.committed_at);
    assert_eq!(proof.block_value, chain.value_at(202));
    assert!(EntropySource::verify(
        &proof.commitment_hash,
        proof.preimage.as_bytes()
    ));
    assert!(verify_reveal(&proof));
}

// -------------------------------------------------------------------------
// Serialized records
// -------------------------------------------------------------------------

async fn recorded_reading() -> (Arc<FixtureChain>, HistoryRecord) {
    let chain = Arc::new(FixtureChain::producing(50));
    let store = Arc::new(MemoryHistoryStore::new());
    let service = ReadingService::new(
        EntropySource::new(
            chain.clone(),
            EntropyConfig {
                finality_poll_ms: 5,
                ..EntropyConfig::default()
            },
        ),
        Arc::new(InterpretationOrchestrator::new(
            Arc::new(ScriptedProvider::new()),
            OrchestratorConfig::default(),
        )),
        store.clone(),
    );
    let owner = RequesterId::new("auditor-test");
    let response = service
        .perform(
            &owner,
            ReadingRequest::new("Where is my creative work heading?", Tier::Free)
                .with_spread("five_card"),
        )
        .await
        .unwrap();
    let record = store.get_by_id(&response.draw_id, &owner).await.unwrap();
    (chain, record)
}

#[tokio::test(start_paused = true)]
async fn record_verifies_after_a_json_round_trip() {
    let (_, record) = recorded_reading().await;

    let json = serde_json::to_string_pretty(&record).unwrap();
    let restored: HistoryRecord = serde_json::from_str(&json).unwrap();

    let verification = verify_draw(&restored.draw, &restored.draw.proof);
    assert!(verification.valid, "{:?}", verification.mismatch);
}

#[tokio::test(start_paused = true)]
async fn forged_preimage_is_caught() {
    let (_, mut record) = recorded_reading().await;
    record.draw.proof.preimage = arcana_core::Bytes32::new([0; 32]);

    let verification = verify_draw(&record.draw, &record.draw.proof);
    assert!(!verification.valid);
    assert!(verification.mismatch.unwrap().contains("commitment"));
}

#[tokio::test(start_paused = true)]
async fn swapped_card_is_caught() {
    let (_, mut record) = recorded_reading().await;
    record.draw.cards.swap(0, 1);

    let verification = verify_draw(&record.draw, &record.draw.proof);
    assert!(!verification.valid);
    assert!(verification.mismatch.unwrap().starts_with("card 1"));
}

#[tokio::test(start_paused = true)]
async fn renamed_card_is_caught() {
    let (_, mut record) = recorded_reading().await;
    let last = record.draw.cards.len() - 1;
    record.draw.cards[last].card_name = "Ace of Nothing".to_string();

    // the edit survives serialization and is still caught
    let json = serde_json::to_string(&record).unwrap();
    let restored: HistoryRecord = serde_json::from_str(&json).unwrap();

    let verification = verify_draw(&restored.draw, &restored.draw.proof);
    assert!(!verification.valid);
    assert!(verification.mismatch.unwrap().starts_with("card 5"));
}

#[tokio::test(start_paused = true)]
async fn audit_checks_the_block_value_against_the_chain() {
    let (chain, mut record) = recorded_reading().await;
    let client: &dyn BlockchainClient = chain.as_ref();

    let honest = audit_against_chain(client, &record.draw, &record.draw.proof)
        .await
        .unwrap();
    assert!(honest.valid);

    // a self-consistent record built on a block value the chain never produced
    record.draw.proof.block_value = vec![0x11; 32];
    let audited = audit_against_chain(client, &record.draw, &record.draw.proof)
        .await
        .unwrap();
    assert!(!audited.valid);
    assert!(audited.mismatch.unwrap().contains("differs from the chain"));
}
