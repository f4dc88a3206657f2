#![allow(missing_docs, unused_results)]

mod common;

use assert_matches::assert_matches;
use keeper_core::{ItemCreationInput, ItemUpdateInput};
use keeper_store::{ErrorKind, StoreError};

use common::harness;

const REJECT_AUDIT: &str = "CREATE TRIGGER reject_audit BEFORE INSERT ON audit_log \
     BEGIN SELECT RAISE(ABORT, 'audit log unavailable'); END;";

#[tokio::test]
async fn failed_audit_write_rolls_back_the_creation() {
    let h = harness().await;
    let (user, account) = h.tenant().await;
    let audit_before = h.count("audit_log");
    h.exec(REJECT_AUDIT);

    let input = ItemCreationInput {
        name: "lamp".into(),
        details: String::new(),
        belongs_to_account: account.id,
    };
    let err = h.querier.create_item(&h.cancel, &input, user.id).await.unwrap_err();

    assert_matches!(&err, StoreError::Step { step: "writing audit log entry", statement, .. } if statement.contains("audit_log"));
    assert_eq!(err.kind(), ErrorKind::Infrastructure);
    assert_eq!(h.count("items"), 0);
    assert_eq!(h.count("audit_log"), audit_before);
}

#[tokio::test]
async fn failed_audit_write_rolls_back_the_update() {
    let h = harness().await;
    let (user, account) = h.tenant().await;
    let mut item = h.item(&account, user.id, "lamp").await;
    h.exec(REJECT_AUDIT);

    let changes = item.update(&ItemUpdateInput {
        name: "desk lamp".into(),
        details: String::new(),
    });
    let err = h.querier.update_item(&h.cancel, &item, user.id, &changes).await.unwrap_err();
    assert_matches!(err, StoreError::Step { step: "writing audit log entry", .. });

    let stored = h.querier.get_item(&h.cancel, item.id, account.id).await.unwrap();
    assert_eq!(stored.name, "lamp");
    assert_eq!(stored.last_updated_on, None);
}

#[tokio::test]
async fn failed_mutation_is_named_after_the_operation() {
    let h = harness().await;
    let (user, account) = h.tenant().await;
    let audit_before = h.count("audit_log");

    let err = h.querier.archive_item(&h.cancel, 42, account.id, user.id).await.unwrap_err();
    assert_matches!(&err, StoreError::Step { step: "archiving item", .. });
    assert!(err.is_not_found());
    assert_eq!(h.count("audit_log"), audit_before);
}

#[tokio::test]
async fn each_successful_write_adds_one_audit_entry() {
    let h = harness().await;
    let (user, account) = h.tenant().await;
    let before = h.count("audit_log");

    let item = h.item(&account, user.id, "lamp").await;
    assert_eq!(h.count("audit_log"), before + 1);
    h.querier.archive_item(&h.cancel, item.id, account.id, user.id).await.unwrap();
    assert_eq!(h.count("audit_log"), before + 2);
}
