#![allow(dead_code)]

use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};

use docserial::config::{Config, DatabaseSettings};
use docserial::database::{self, models::documents, types::DocumentType};
use docserial::services::documents::DocumentService;

pub fn test_config() -> Config {
    Config::local("127.0.0.1", 18080)
}

pub async fn setup() -> DocumentService {
    setup_with(test_config()).await
}

/// Сервис поверх чистой SQLite в памяти со схемой `documents`.
pub async fn setup_with(config: Config) -> DocumentService {
    let db = database::connect_with_settings(&DatabaseSettings::in_memory_sqlite())
        .await
        .expect("sqlite connect");
    database::create_schema(&db).await.expect("create schema");
    DocumentService::new(db, config).expect("document service")
}

/// Строка в обход аллокатора, как после импорта старых данных.
pub async fn insert_raw(
    service: &DocumentService,
    tenant_id: i64,
    document_type: DocumentType,
    customer_id: Option<i64>,
    number: &str,
    sequence_number: i64,
    deleted: bool,
) -> documents::Model {
    documents::ActiveModel {
        tenant_id: Set(tenant_id),
        document_type: Set(document_type.as_str().to_string()),
        customer_id: Set(customer_id),
        document_number: Set(number.to_string()),
        sequence_number: Set(sequence_number),
        customer_sequence_number: Set(customer_id.map(|_| 1)),
        unique_hash: Set(format!("raw-{}-{}", tenant_id, number)),
        created_at: Set(Utc::now()),
        deleted_at: Set(deleted.then(Utc::now)),
        ..Default::default()
    }
    .insert(service.db())
    .await
    .expect("raw insert")
}
