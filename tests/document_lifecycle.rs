mod common;

use docserial::database::types::{DocumentState, DocumentType};
use docserial::errors::AppError;
use docserial::services::documents::CreateDocument;
use docserial::services::lifecycle::{self, DeleteMode, RestoreOutcome};

const TENANT: i64 = 1;

fn invoice() -> CreateDocument {
    CreateDocument::new(DocumentType::Invoice, TENANT)
}

#[tokio::test]
async fn soft_delete_releases_number_with_marker() {
    let service = common::setup().await;
    let created = service.create(&invoice()).await.unwrap();

    let deleted = service
        .delete(TENANT, DocumentType::Invoice, created.id, DeleteMode::Soft)
        .await
        .unwrap()
        .expect("soft delete keeps the row");

    assert_eq!(deleted.state(), DocumentState::Deleted);
    assert_eq!(deleted.sequence_number, created.sequence_number);
    let marker = lifecycle::parse_release_marker(&deleted.document_number).unwrap();
    assert_eq!(marker.original, "INV-000001");
    assert_eq!(marker.document_id, created.id);
    assert!(deleted
        .document_number
        .starts_with(&format!("INV-000001_DEL_{}_", created.id)));
}

#[tokio::test]
async fn second_delete_does_not_stack_markers() {
    let service = common::setup().await;
    let created = service.create(&invoice()).await.unwrap();

    let once = service
        .delete(TENANT, DocumentType::Invoice, created.id, DeleteMode::Soft)
        .await
        .unwrap()
        .unwrap();
    let twice = service
        .delete(TENANT, DocumentType::Invoice, created.id, DeleteMode::Soft)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(once.document_number, twice.document_number);
    assert_eq!(
        once.deleted_at.map(|t| t.timestamp()),
        twice.deleted_at.map(|t| t.timestamp())
    );
    assert_eq!(twice.document_number.matches("_DEL_").count(), 1);
}

#[tokio::test]
async fn restore_without_conflict_returns_exact_original() {
    let service = common::setup().await;
    let created = service.create(&invoice().for_customer(4)).await.unwrap();
    service
        .delete(TENANT, DocumentType::Invoice, created.id, DeleteMode::Soft)
        .await
        .unwrap();

    let report = service
        .restore(TENANT, DocumentType::Invoice, created.id)
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        RestoreOutcome::Restored {
            number: "INV-000001".to_string()
        }
    );
    assert_eq!(report.document.document_number, created.document_number);
    assert_eq!(report.document.deleted_at, None);
    assert_eq!(report.document.sequence_number, created.sequence_number);
    assert_eq!(
        report.document.customer_sequence_number,
        created.customer_sequence_number
    );
}

#[tokio::test]
async fn restore_surrenders_number_claimed_in_the_meantime() {
    let service = common::setup().await;
    let original = service.create(&invoice()).await.unwrap();
    let deleted = service
        .delete(TENANT, DocumentType::Invoice, original.id, DeleteMode::Soft)
        .await
        .unwrap()
        .unwrap();

    let claimant = service
        .create(&invoice().with_number("INV-000001"))
        .await
        .unwrap();
    let report = service
        .restore(TENANT, DocumentType::Invoice, original.id)
        .await
        .unwrap();

    assert_eq!(claimant.document_number, "INV-000001");
    assert_eq!(
        report.outcome,
        RestoreOutcome::KeptReleased {
            number: deleted.document_number.clone(),
            original: "INV-000001".to_string(),
        }
    );
    assert_eq!(report.document.document_number, deleted.document_number);
    assert_eq!(report.document.state(), DocumentState::Active);

    let holder = service
        .find(TENANT, DocumentType::Invoice, claimant.id)
        .await
        .unwrap();
    assert_eq!(holder.document_number, "INV-000001");
}

#[tokio::test]
async fn restore_of_active_document_changes_nothing() {
    let service = common::setup().await;
    let created = service.create(&invoice()).await.unwrap();

    let report = service
        .restore(TENANT, DocumentType::Invoice, created.id)
        .await
        .unwrap();

    assert!(matches!(report.outcome, RestoreOutcome::AlreadyActive { .. }));
    assert_eq!(report.document.id, created.id);
    assert_eq!(report.document.document_number, created.document_number);
    assert!(report.document.deleted_at.is_none());
}

#[tokio::test]
async fn restore_without_marker_only_clears_deletion() {
    let service = common::setup().await;
    let legacy =
        common::insert_raw(&service, TENANT, DocumentType::Invoice, None, "INV-000007", 7, true).await;

    let report = service
        .restore(TENANT, DocumentType::Invoice, legacy.id)
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        RestoreOutcome::NoMarker {
            number: "INV-000007".to_string()
        }
    );
    assert_eq!(report.document.document_number, "INV-000007");
    assert!(report.document.deleted_at.is_none());
}

#[tokio::test]
async fn force_delete_removes_row_and_frees_its_slot() {
    let service = common::setup().await;
    service.create(&invoice()).await.unwrap();
    let second = service.create(&invoice()).await.unwrap();

    let purged = service
        .delete(TENANT, DocumentType::Invoice, second.id, DeleteMode::Force)
        .await
        .unwrap();
    let lookup = service
        .find(TENANT, DocumentType::Invoice, second.id)
        .await
        .unwrap_err();
    let all = service
        .list(TENANT, DocumentType::Invoice, true)
        .await
        .unwrap();

    assert!(purged.is_none());
    assert!(matches!(lookup, AppError::NotFound(_)));
    assert_eq!(all.len(), 1);
    // Строка исчезла, поэтому её номер снова достаётся следующему документу
    let next = service.create(&invoice()).await.unwrap();
    assert_eq!(next.document_number, "INV-000002");
}

#[tokio::test]
async fn force_delete_of_soft_deleted_document() {
    let service = common::setup().await;
    let created = service.create(&invoice()).await.unwrap();
    service
        .delete(TENANT, DocumentType::Invoice, created.id, DeleteMode::Soft)
        .await
        .unwrap();

    let purged = service
        .delete(TENANT, DocumentType::Invoice, created.id, DeleteMode::Force)
        .await
        .unwrap();

    assert!(purged.is_none());
    assert!(service
        .list(TENANT, DocumentType::Invoice, true)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn lifecycle_is_scoped_to_tenant_and_type() {
    let service = common::setup().await;
    let created = service.create(&invoice()).await.unwrap();

    let other_tenant = service
        .delete(2, DocumentType::Invoice, created.id, DeleteMode::Soft)
        .await
        .unwrap_err();
    let other_type = service
        .restore(TENANT, DocumentType::Payment, created.id)
        .await
        .unwrap_err();

    assert!(matches!(other_tenant, AppError::NotFound(_)));
    assert!(matches!(other_type, AppError::NotFound(_)));
}

#[tokio::test]
async fn list_hides_deleted_unless_asked() {
    let service = common::setup().await;
    let first = service.create(&invoice()).await.unwrap();
    service.create(&invoice()).await.unwrap();
    service
        .delete(TENANT, DocumentType::Invoice, first.id, DeleteMode::Soft)
        .await
        .unwrap();

    let active = service
        .list(TENANT, DocumentType::Invoice, false)
        .await
        .unwrap();
    let all = service
        .list(TENANT, DocumentType::Invoice, true)
        .await
        .unwrap();

    assert_eq!(active.len(), 1);
    assert_eq!(active[0].document_number, "INV-000002");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, first.id);
}

#[tokio::test]
async fn template_with_release_tag_is_rejected() {
    let service = common::setup().await;

    let err = service
        .create(&invoice().with_format("INV_DEL_{{SEQUENCE}}_1"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidFormatTemplate(_)));
}

#[tokio::test]
async fn number_resembling_a_marker_survives_delete_and_restore() {
    let service = common::setup().await;
    common::insert_raw(&service, TENANT, DocumentType::Invoice, None, "INV-000001", 1, false).await;
    // Старые данные: суффикс похож на маркер, но id в нём чужой
    let legacy =
        common::insert_raw(&service, TENANT, DocumentType::Invoice, None, "OLD_DEL_1_5", 2, false).await;

    let deleted = service
        .delete(TENANT, DocumentType::Invoice, legacy.id, DeleteMode::Soft)
        .await
        .unwrap()
        .unwrap();
    let report = service
        .restore(TENANT, DocumentType::Invoice, legacy.id)
        .await
        .unwrap();

    assert!(deleted
        .document_number
        .starts_with(&format!("OLD_DEL_1_5_DEL_{}_", legacy.id)));
    assert_eq!(
        report.outcome,
        RestoreOutcome::Restored {
            number: "OLD_DEL_1_5".to_string()
        }
    );
    assert_eq!(report.document.document_number, "OLD_DEL_1_5");
}

#[tokio::test]
async fn restore_keeps_marker_when_unmarked_deleted_row_holds_original() {
    let service = common::setup().await;
    let original = service.create(&invoice()).await.unwrap();
    service
        .delete(TENANT, DocumentType::Invoice, original.id, DeleteMode::Soft)
        .await
        .unwrap();
    common::insert_raw(&service, TENANT, DocumentType::Invoice, None, "INV-000001", 1, true).await;

    let report = service
        .restore(TENANT, DocumentType::Invoice, original.id)
        .await
        .unwrap();

    assert!(matches!(report.outcome, RestoreOutcome::KeptReleased { .. }));
    assert_eq!(report.document.state(), DocumentState::Active);
}
