use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, DbErr, Schema};

use crate::database::models::documents;

pub const DOCUMENT_NUMBER_INDEX: &str = "idx_documents_tenant_type_number";
const DOCUMENT_SEQUENCE_INDEX: &str = "idx_documents_tenant_type_sequence";

/// Creates the `documents` table and its indexes on the connected backend.
///
/// The unique `(tenant_id, document_type, document_number)` index is the final
/// arbiter for concurrent allocations; the allocator only pre-checks committed rows.
pub async fn create_schema<C>(db: &C) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut table = schema.create_table_from_entity(documents::Entity);
    table.if_not_exists();
    db.execute(backend.build(&table)).await?;

    let unique_number = Index::create()
        .name(DOCUMENT_NUMBER_INDEX)
        .table(documents::Entity)
        .col(documents::Column::TenantId)
        .col(documents::Column::DocumentType)
        .col(documents::Column::DocumentNumber)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&unique_number)).await?;

    // max(sequence_number) scan
    let sequence_lookup = Index::create()
        .name(DOCUMENT_SEQUENCE_INDEX)
        .table(documents::Entity)
        .col(documents::Column::TenantId)
        .col(documents::Column::DocumentType)
        .col(documents::Column::SequenceNumber)
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&sequence_lookup)).await?;

    log::info!("Schema for `documents` is in place ({:?})", backend);
    Ok(())
}
