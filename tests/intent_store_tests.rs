mod common;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use std::time::Duration;

use swap_desk::entities::deposit_intents;
use swap_desk::models::deposit_intent::{
    DepositStatus, IntentPatch, NewDepositIntent, NewDepositTransaction, TransactionType,
    PLACEHOLDER_ADDRESS,
};
use swap_desk::services::intent_store::{DbIntentStore, DepositRecording, IntentStore, StoreError};

use crate::common::{setup_store, setup_test_db};

fn new_intent(user: &str, status: DepositStatus) -> NewDepositIntent {
    NewDepositIntent {
        user_id: user.to_string(),
        currency: "BTC".to_string(),
        network: "BTC".to_string(),
        target_currency: None,
        target_network: None,
        status,
    }
}

fn deposit(intent_id: &str, hash: &str) -> NewDepositTransaction {
    NewDepositTransaction {
        deposit_intent_id: intent_id.to_string(),
        tx_hash: hash.to_string(),
        amount: "0.5".to_string(),
        currency: "BTC".to_string(),
        tx_type: TransactionType::Deposit,
        status: "CONFIRMED".to_string(),
    }
}

#[tokio::test]
async fn test_create_starts_with_placeholder_address() {
    let store = setup_store().await;

    let intent = store.create(new_intent("user-1", DepositStatus::Pending)).await.unwrap();
    assert_eq!(intent.status, DepositStatus::Pending);
    assert_eq!(intent.address, PLACEHOLDER_ADDRESS);
    assert!(!intent.has_address());

    let found = store.find_by_id(&intent.id).await.unwrap().unwrap();
    assert_eq!(found.user_id, "user-1");
    assert_eq!(found.currency, "BTC");

    assert!(store.find_by_id("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_set_address_keeps_status() {
    let store = setup_store().await;
    let intent = store.create(new_intent("user-1", DepositStatus::Approved)).await.unwrap();

    let updated = store
        .set_address(&intent.id, "bc1qexample", Some("memo-1"))
        .await
        .unwrap();
    assert_eq!(updated.address, "bc1qexample");
    assert_eq!(updated.memo.as_deref(), Some("memo-1"));
    assert_eq!(updated.status, DepositStatus::Approved);

    let by_address = store
        .find_by_address("bc1qexample", DepositStatus::Approved)
        .await
        .unwrap();
    assert_eq!(by_address.map(|i| i.id), Some(intent.id.clone()));
    assert!(store
        .find_by_address("bc1qexample", DepositStatus::Pending)
        .await
        .unwrap()
        .is_none());

    assert!(matches!(
        store.set_address("missing", "x", None).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_update_status_is_conditional() {
    let store = setup_store().await;
    let intent = store.create(new_intent("user-1", DepositStatus::Pending)).await.unwrap();

    let approved = store
        .update_status(
            &intent.id,
            &[DepositStatus::Pending],
            DepositStatus::Approved,
            IntentPatch::default(),
        )
        .await
        .unwrap();
    assert_eq!(approved.status, DepositStatus::Approved);

    // Second caller still expects PENDING and loses
    let err = store
        .update_status(
            &intent.id,
            &[DepositStatus::Pending],
            DepositStatus::Approved,
            IntentPatch::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("Deposit intent {} is APPROVED", intent.id)
    );
    match err {
        StoreError::StatusConflict { current, .. } => assert_eq!(current, DepositStatus::Approved),
        other => panic!("expected conflict, got {:?}", other),
    }

    let err = store
        .update_status(
            "missing",
            &[DepositStatus::Pending],
            DepositStatus::Approved,
            IntentPatch::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_update_status_rejects_edges_outside_graph() {
    let store = setup_store().await;
    let intent = store.create(new_intent("user-1", DepositStatus::Pending)).await.unwrap();

    let err = store
        .update_status(
            &intent.id,
            &[DepositStatus::Pending],
            DepositStatus::Completed,
            IntentPatch::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::IllegalTransition {
            from: DepositStatus::Pending,
            to: DepositStatus::Completed
        }
    ));

    let unchanged = store.find_by_id(&intent.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, DepositStatus::Pending);
}

#[tokio::test]
async fn test_patch_fields_written_with_status() {
    let store = setup_store().await;
    let intent = store.create(new_intent("user-1", DepositStatus::Pending)).await.unwrap();

    let rejected = store
        .update_status(
            &intent.id,
            &[DepositStatus::Pending],
            DepositStatus::Rejected,
            IntentPatch::rejection("KYC incomplete"),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, DepositStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("KYC incomplete"));
    assert!(rejected.updated_at >= rejected.created_at);
}

#[tokio::test]
async fn test_concurrent_approvals_only_one_wins() {
    let store = setup_store().await;
    let intent = store.create(new_intent("user-1", DepositStatus::Pending)).await.unwrap();

    let approve = |store: std::sync::Arc<DbIntentStore>, id: String| async move {
        store
            .update_status(&id, &[DepositStatus::Pending], DepositStatus::Approved, IntentPatch::default())
            .await
    };
    let reject = |store: std::sync::Arc<DbIntentStore>, id: String| async move {
        store
            .update_status(
                &id,
                &[DepositStatus::Pending],
                DepositStatus::Rejected,
                IntentPatch::rejection("duplicate"),
            )
            .await
    };

    let (a, b) = tokio::join!(
        approve(store.clone(), intent.id.clone()),
        reject(store.clone(), intent.id.clone())
    );
    assert_eq!(
        [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(),
        1,
        "exactly one transition out of PENDING may succeed"
    );
}

#[tokio::test]
async fn test_record_transaction_dedupes_hash() {
    let store = setup_store().await;
    let intent = store.create(new_intent("user-1", DepositStatus::Approved)).await.unwrap();

    let first = store.record_transaction(deposit(&intent.id, "hash-1")).await.unwrap();
    assert!(first.is_some());
    assert!(store.transaction_exists("hash-1").await.unwrap());

    let again = store.record_transaction(deposit(&intent.id, "hash-1")).await.unwrap();
    assert!(again.is_none());

    assert_eq!(store.transactions_for(&intent.id).await.unwrap().len(), 1);
    assert!(!store.transaction_exists("hash-2").await.unwrap());
}

#[tokio::test]
async fn test_confirm_deposit_records_and_transitions() {
    let store = setup_store().await;
    let intent = store.create(new_intent("user-1", DepositStatus::Approved)).await.unwrap();

    let outcome = store.confirm_deposit(deposit(&intent.id, "hash-1")).await.unwrap();
    match outcome {
        DepositRecording::Recorded(intent) => assert_eq!(intent.status, DepositStatus::Confirmed),
        other => panic!("expected recorded, got {:?}", other),
    }

    let again = store.confirm_deposit(deposit(&intent.id, "hash-1")).await.unwrap();
    assert_eq!(again, DepositRecording::AlreadyRecorded);

    let txs = store.transactions_for(&intent.id).await.unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].tx_type, TransactionType::Deposit);
    assert_eq!(txs[0].status, "CONFIRMED");
}

#[tokio::test]
async fn test_confirm_deposit_rolls_back_when_not_approved() {
    let store = setup_store().await;
    let intent = store.create(new_intent("user-1", DepositStatus::Pending)).await.unwrap();

    let err = store.confirm_deposit(deposit(&intent.id, "hash-1")).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::StatusConflict {
            current: DepositStatus::Pending,
            ..
        }
    ));

    // The DEPOSIT row must not survive the failed transition
    assert!(!store.transaction_exists("hash-1").await.unwrap());
    assert_eq!(
        store.find_by_id(&intent.id).await.unwrap().unwrap().status,
        DepositStatus::Pending
    );
}

#[tokio::test]
async fn test_list_newest_first_with_filter_and_limit() {
    let store = setup_store().await;
    let mut ids = Vec::new();
    for (i, status) in [DepositStatus::Pending, DepositStatus::Approved, DepositStatus::Pending]
        .into_iter()
        .enumerate()
    {
        let intent = store.create(new_intent(&format!("user-{}", i), status)).await.unwrap();
        ids.push(intent.id);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let all = store.list(None, None).await.unwrap();
    assert_eq!(all.iter().map(|i| i.id.clone()).collect::<Vec<_>>(), vec![
        ids[2].clone(),
        ids[1].clone(),
        ids[0].clone()
    ]);

    let pending = store.list(Some(DepositStatus::Pending), None).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|i| i.status == DepositStatus::Pending));

    let limited = store.list(None, Some(1)).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, ids[2]);
}

#[tokio::test]
async fn test_count_by_status() {
    let store = setup_store().await;
    for status in [
        DepositStatus::Pending,
        DepositStatus::Pending,
        DepositStatus::Approved,
    ] {
        store.create(new_intent("user", status)).await.unwrap();
    }

    let counts = store.count_by_status().await.unwrap();
    assert_eq!(counts.pending, 2);
    assert_eq!(counts.approved, 1);
    assert_eq!(counts.completed, 0);
    assert_eq!(counts.total, 3);
}

#[tokio::test]
async fn test_unknown_stored_status_is_corrupt() {
    let db = setup_test_db().await;
    let now = Utc::now().fixed_offset();
    deposit_intents::ActiveModel {
        id: Set("bad-row".to_string()),
        user_id: Set("user".to_string()),
        currency: Set("BTC".to_string()),
        network: Set("BTC".to_string()),
        target_currency: Set(None),
        target_network: Set(None),
        address: Set(PLACEHOLDER_ADDRESS.to_string()),
        memo: Set(None),
        status: Set("SETTLING".to_string()),
        rejection_reason: Set(None),
        error_message: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&db)
    .await
    .unwrap();

    let store = DbIntentStore::new(db);
    assert!(matches!(
        store.find_by_id("bad-row").await,
        Err(StoreError::Corrupt(_))
    ));
}
