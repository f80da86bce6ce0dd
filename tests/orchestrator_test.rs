//! Transaction orchestrator integration tests
//!
//! Plain announcements against wiremock, cosigning guards, and the full
//! two-phase aggregate-bonded commit with a scripted WebSocket node for the
//! hash-lock confirmation.
//!
//! Run with: cargo test --test orchestrator_test -- --nocapture

mod common;

use std::sync::Arc;

use common::*;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wallet_core::account::Mosaic;
use wallet_core::error::WalletError;
use wallet_core::network::{NetworkProperties, NodeClient};
use wallet_core::signing::{MockSigner, SigningService};
use wallet_core::transaction::{
    transaction_type, AnnounceOptions, HashLockParams, TransactionCommon, TransactionDescriptor,
    TransactionInfo, TransactionOrchestrator,
};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRIVATE_KEY: &str = "5555555555555555555555555555555555555555555555555555555555555555";

fn orchestrator_with(signer: &Arc<MockSigner>) -> TransactionOrchestrator {
    let signing: Arc<dyn SigningService> = Arc::clone(signer) as Arc<dyn SigningService>;
    TransactionOrchestrator::new(signing, HashLockParams::default())
}

fn transfer_descriptor(signer_public_key: &str) -> TransactionDescriptor {
    TransactionDescriptor::Transfer {
        common: TransactionCommon {
            signer_public_key: signer_public_key.to_string(),
            max_fee: 100_000,
            deadline: 600_000,
        },
        recipient_address: "TBOB000000000000000000000000000000000000".to_string(),
        mosaics: vec![Mosaic {
            id: CURRENCY_MOSAIC_ID.to_string(),
            amount: 1_000_000,
        }],
        message: Some("hello".to_string()),
    }
}

fn bonded_descriptor(
    signer_public_key: &str,
    deadline: u64,
    info: Option<TransactionInfo>,
) -> TransactionDescriptor {
    let inner = TransactionDescriptor::Transfer {
        common: TransactionCommon {
            signer_public_key: signer_public_key.to_string(),
            max_fee: 0,
            deadline,
        },
        recipient_address: "TBOB000000000000000000000000000000000000".to_string(),
        mosaics: Vec::new(),
        message: None,
    };
    TransactionDescriptor::AggregateBonded {
        common: TransactionCommon {
            signer_public_key: signer_public_key.to_string(),
            max_fee: 100_000,
            deadline,
        },
        inner: vec![inner],
        transaction_info: info,
    }
}

/// The hash lock the orchestrator derives for a signed bonded aggregate.
fn expected_lock(bonded: &TransactionDescriptor, bonded_hash: &str) -> TransactionDescriptor {
    let common = bonded.common();
    TransactionDescriptor::HashLock {
        common: TransactionCommon {
            signer_public_key: common.signer_public_key.clone(),
            max_fee: common.max_fee,
            deadline: common.deadline,
        },
        mosaic: Mosaic {
            id: CURRENCY_MOSAIC_ID.to_string(),
            amount: 10_000_000,
        },
        duration: 480,
        target_hash: bonded_hash.to_string(),
    }
}

// ===== Test 1: Plain transfers are signed and announced =====

#[tokio::test]
async fn test_transfer_is_signed_and_announced() {
    init_logging();
    let rest = MockServer::start().await;
    let signer = Arc::new(MockSigner::new());
    let orchestrator = orchestrator_with(&signer);
    let properties = test_properties(&rest.uri());
    let descriptor = transfer_descriptor(&MockSigner::public_key_of(PRIVATE_KEY));

    Mock::given(method("PUT"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "message": "packet 9 was pushed to the network"
        })))
        .expect(1)
        .mount(&rest)
        .await;

    let signed = orchestrator
        .sign_and_announce_transaction(
            &NodeClient::new(&rest.uri()),
            &properties,
            &descriptor,
            false,
            PRIVATE_KEY,
            AnnounceOptions::default(),
        )
        .await
        .expect("announce failed");

    assert_eq!(
        signed.hash,
        signer.transaction_hash(&signed.payload, GENERATION_HASH)
    );
    assert_eq!(signer.sign_count(), 1);
}

// ===== Test 2: Node rejections surface the node's message =====

#[tokio::test]
async fn test_rejection_surfaces_node_message() {
    init_logging();
    let rest = MockServer::start().await;
    let signer = Arc::new(MockSigner::new());
    let orchestrator = orchestrator_with(&signer);
    let properties = test_properties(&rest.uri());
    let descriptor = transfer_descriptor(&MockSigner::public_key_of(PRIVATE_KEY));

    Mock::given(method("PUT"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "InvalidArgument",
            "message": "deadline lies too far in the future"
        })))
        .mount(&rest)
        .await;

    let result = orchestrator
        .sign_and_announce_transaction(
            &NodeClient::new(&rest.uri()),
            &properties,
            &descriptor,
            false,
            PRIVATE_KEY,
            AnnounceOptions::default(),
        )
        .await;

    match result {
        Err(WalletError::Rejected(message)) => {
            assert!(message.contains("deadline lies too far in the future"));
        }
        other => panic!("expected a rejection, got {:?}", other.map(|_| ())),
    }
}

// ===== Test 3: Cosigning guards against non-bonded descriptors =====

#[tokio::test]
async fn test_cosign_rejects_non_bonded_before_signing() {
    init_logging();
    let rest = MockServer::start().await;
    let signer = Arc::new(MockSigner::new());
    let orchestrator = orchestrator_with(&signer);
    let properties = test_properties(&rest.uri());
    let descriptor = transfer_descriptor(&MockSigner::public_key_of(PRIVATE_KEY));

    let result = orchestrator
        .cosign_transaction(&NodeClient::new(&rest.uri()), &properties, &descriptor, PRIVATE_KEY)
        .await;

    match result {
        Err(WalletError::InvalidTransactionType(message)) => {
            assert!(message.contains("transfer"));
        }
        other => panic!("expected a type guard error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(signer.cosign_count(), 0, "the signer must never be reached");
    let hits = rest.received_requests().await.expect("recording enabled");
    assert!(hits.is_empty(), "nothing may be announced");
}

// ===== Test 4: Cosigning requires the partial's hash =====

#[tokio::test]
async fn test_cosign_requires_partial_hash() {
    init_logging();
    let rest = MockServer::start().await;
    let signer = Arc::new(MockSigner::new());
    let orchestrator = orchestrator_with(&signer);
    let properties = test_properties(&rest.uri());
    let descriptor = bonded_descriptor(&MockSigner::public_key_of(PRIVATE_KEY), 600_000, None);

    let result = orchestrator
        .cosign_transaction(&NodeClient::new(&rest.uri()), &properties, &descriptor, PRIVATE_KEY)
        .await;

    match result {
        Err(WalletError::InvalidState(_)) => {}
        other => panic!("expected an invalid state error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(signer.cosign_count(), 0);
}

// ===== Test 5: Cosignatures go to the cosignature endpoint =====

#[tokio::test]
async fn test_cosign_announces_cosignature() {
    init_logging();
    let rest = MockServer::start().await;
    let signer = Arc::new(MockSigner::new());
    let orchestrator = orchestrator_with(&signer);
    let properties = test_properties(&rest.uri());
    let descriptor = bonded_descriptor(
        &MockSigner::public_key_of(PRIVATE_KEY),
        600_000,
        Some(TransactionInfo {
            hash: "HASH-PARENT".to_string(),
            height: 10,
        }),
    );

    // Only the dto travels to the node; the top-level hash is wallet-side.
    let expected = MockSigner::new()
        .cosign(&properties, &descriptor, PRIVATE_KEY)
        .expect("cosign failed");
    Mock::given(method("PUT"))
        .and(path("/transactions/cosignature"))
        .and(body_json(&expected.dto))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "message": "packet 501 was pushed to the network"
        })))
        .expect(1)
        .mount(&rest)
        .await;

    let cosignature = orchestrator
        .cosign_transaction(&NodeClient::new(&rest.uri()), &properties, &descriptor, PRIVATE_KEY)
        .await
        .expect("cosign failed");

    assert_eq!(cosignature.hash, "HASH-PARENT");
    assert_eq!(cosignature.dto.parent_hash, "HASH-PARENT");
    assert_eq!(signer.cosign_count(), 1);
}

// ===== Test 6: Bonded without a lock goes straight to the partial pool =====

#[tokio::test]
async fn test_bonded_without_lock_goes_to_partial_pool() {
    init_logging();
    let rest = MockServer::start().await;
    let signer = Arc::new(MockSigner::new());
    let orchestrator = orchestrator_with(&signer);
    let properties = test_properties(&rest.uri());
    let descriptor = bonded_descriptor(&MockSigner::public_key_of(PRIVATE_KEY), 600_000, None);

    Mock::given(method("PUT"))
        .and(path("/transactions/partial"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "message": "packet 502 was pushed to the network"
        })))
        .expect(1)
        .mount(&rest)
        .await;

    orchestrator
        .sign_and_announce_transaction(
            &NodeClient::new(&rest.uri()),
            &properties,
            &descriptor,
            false,
            PRIVATE_KEY,
            AnnounceOptions::default(),
        )
        .await
        .expect("announce failed");

    let hits = rest.received_requests().await.expect("recording enabled");
    assert_eq!(hits.len(), 1, "only the partial endpoint may be hit");
}

// ===== Test 7: The two-phase commit waits for the lock =====

#[tokio::test]
async fn test_two_phase_commit_waits_for_the_lock() {
    init_logging();
    let mut ws = WsNode::start("uid-two-phase").await;
    let rest = MockServer::start().await;
    let signer = Arc::new(MockSigner::new());
    let public_key = MockSigner::public_key_of(PRIVATE_KEY);

    // Bonded deadline 600s past an epoch 100s ago: plenty of wait budget.
    let mut properties = test_properties(&ws.url);
    properties.epoch_adjustment = (chrono::Utc::now().timestamp() - 100) as u64;
    let bonded = bonded_descriptor(&public_key, 600_000, None);

    // Replicate the signing the orchestrator will do.
    let helper = MockSigner::new();
    let signed_bonded = helper
        .sign(&properties, &bonded, PRIVATE_KEY)
        .expect("sign failed");
    let signed_lock = helper
        .sign(&properties, &expected_lock(&bonded, &signed_bonded.hash), PRIVATE_KEY)
        .expect("sign failed");

    Mock::given(method("PUT"))
        .and(path("/transactions"))
        .and(body_json(json!({ "payload": signed_lock.payload })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "message": "lock accepted"
        })))
        .expect(1)
        .mount(&rest)
        .await;
    Mock::given(method("PUT"))
        .and(path("/transactions/partial"))
        .and(body_json(json!({ "payload": signed_bonded.payload })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "message": "bonded accepted"
        })))
        .expect(1)
        .mount(&rest)
        .await;
    Mock::given(method("GET"))
        .and(path("/transactions/confirmed"))
        .and(query_param("height", "77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                transaction_body(
                    &signed_lock.hash,
                    transaction_type::HASH_LOCK,
                    &public_key,
                    None,
                    77,
                )
            ]
        })))
        .mount(&rest)
        .await;

    let task = {
        let signer = Arc::clone(&signer);
        let client = NodeClient::new(&rest.uri());
        let properties = properties.clone();
        let bonded = bonded.clone();
        tokio::spawn(async move {
            orchestrator_with(&signer)
                .sign_and_announce_transaction(
                    &client,
                    &properties,
                    &bonded,
                    true,
                    PRIVATE_KEY,
                    AnnounceOptions::default(),
                )
                .await
        })
    };

    // The listener subscribes to blocks before the lock is announced.
    assert_eq!(ws.expect_subscription().await, "block");
    ws.send_frame(block_frame(77));

    let signed = task
        .await
        .expect("task panicked")
        .expect("two-phase announce failed");
    assert_eq!(signed.hash, signed_bonded.hash);
}

// ===== Test 8: The lock wait times out at the deadline =====

#[tokio::test]
async fn test_lock_wait_times_out_at_the_deadline() {
    init_logging();
    let mut ws = WsNode::start("uid-timeout").await;
    let rest = MockServer::start().await;
    let signer = Arc::new(MockSigner::new());
    let public_key = MockSigner::public_key_of(PRIVATE_KEY);

    // Deadline 101s past an epoch 100s ago: about one second of wait.
    let mut properties = test_properties(&ws.url);
    properties.epoch_adjustment = (chrono::Utc::now().timestamp() - 100) as u64;
    let bonded = bonded_descriptor(&public_key, 101_000, None);

    Mock::given(method("PUT"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "message": "lock accepted"
        })))
        .expect(1)
        .mount(&rest)
        .await;
    Mock::given(method("PUT"))
        .and(path("/transactions/partial"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&rest)
        .await;
    Mock::given(method("GET"))
        .and(path("/transactions/confirmed"))
        .and(query_param("height", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                transaction_body("HASH-OTHER", transaction_type::TRANSFER, &public_key, None, 50)
            ]
        })))
        .mount(&rest)
        .await;

    let task = {
        let signer = Arc::clone(&signer);
        let client = NodeClient::new(&rest.uri());
        let properties = properties.clone();
        let bonded = bonded.clone();
        tokio::spawn(async move {
            orchestrator_with(&signer)
                .sign_and_announce_transaction(
                    &client,
                    &properties,
                    &bonded,
                    true,
                    PRIVATE_KEY,
                    AnnounceOptions::default(),
                )
                .await
        })
    };

    assert_eq!(ws.expect_subscription().await, "block");
    // A confirmation for some other transaction must not end the wait.
    ws.send_frame(block_frame(50));

    let result = task.await.expect("task panicked");
    match result {
        Err(WalletError::ConfirmationTimeout(_)) => {}
        other => panic!("expected a timeout, got {:?}", other.map(|_| ())),
    }
}

// ===== Test 9: The lock wait honors cancellation =====

#[tokio::test]
async fn test_lock_wait_honors_cancellation() {
    init_logging();
    let mut ws = WsNode::start("uid-cancel").await;
    let rest = MockServer::start().await;
    let signer = Arc::new(MockSigner::new());
    let public_key = MockSigner::public_key_of(PRIVATE_KEY);

    let mut properties = test_properties(&ws.url);
    properties.epoch_adjustment = (chrono::Utc::now().timestamp() - 100) as u64;
    let bonded = bonded_descriptor(&public_key, 600_000, None);

    Mock::given(method("PUT"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "message": "lock accepted"
        })))
        .expect(1)
        .mount(&rest)
        .await;
    Mock::given(method("PUT"))
        .and(path("/transactions/partial"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&rest)
        .await;

    let cancel = CancellationToken::new();
    let task = {
        let signer = Arc::clone(&signer);
        let client = NodeClient::new(&rest.uri());
        let properties = properties.clone();
        let bonded = bonded.clone();
        let options = AnnounceOptions {
            cancel: Some(cancel.clone()),
        };
        tokio::spawn(async move {
            orchestrator_with(&signer)
                .sign_and_announce_transaction(&client, &properties, &bonded, true, PRIVATE_KEY, options)
                .await
        })
    };

    assert_eq!(ws.expect_subscription().await, "block");
    cancel.cancel();

    let result = task.await.expect("task panicked");
    match result {
        Err(WalletError::Cancelled(_)) => {}
        other => panic!("expected a cancellation, got {:?}", other.map(|_| ())),
    }
}

// ===== Test 10: Losing the listener fails the wait =====

#[tokio::test]
async fn test_lost_listener_fails_the_wait() {
    init_logging();
    let mut ws = WsNode::start("uid-lost").await;
    let rest = MockServer::start().await;
    let signer = Arc::new(MockSigner::new());
    let public_key = MockSigner::public_key_of(PRIVATE_KEY);

    let mut properties = test_properties(&ws.url);
    properties.epoch_adjustment = (chrono::Utc::now().timestamp() - 100) as u64;
    let bonded = bonded_descriptor(&public_key, 600_000, None);

    Mock::given(method("PUT"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "message": "lock accepted"
        })))
        .expect(1)
        .mount(&rest)
        .await;
    Mock::given(method("PUT"))
        .and(path("/transactions/partial"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&rest)
        .await;

    let task = {
        let signer = Arc::clone(&signer);
        let client = NodeClient::new(&rest.uri());
        let properties = properties.clone();
        let bonded = bonded.clone();
        tokio::spawn(async move {
            orchestrator_with(&signer)
                .sign_and_announce_transaction(
                    &client,
                    &properties,
                    &bonded,
                    true,
                    PRIVATE_KEY,
                    AnnounceOptions::default(),
                )
                .await
        })
    };

    assert_eq!(ws.expect_subscription().await, "block");
    ws.close(1011, "server restarting");

    let result = task.await.expect("task panicked");
    match result {
        Err(WalletError::ListenerClosed(_)) => {}
        other => panic!("expected a listener loss, got {:?}", other.map(|_| ())),
    }
}
