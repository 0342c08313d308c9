//! Переходы жизненного цикла документа относительно его номера.
//!
//! ```text
//! ACTIVE --soft delete--> DELETED --restore--> ACTIVE
//!                            \--force delete--> PURGED
//! ```
//!
//! Функции здесь чистые: принимают документ и возвращают поля, которые
//! нужно записать. Транзакции и запросы живут в `services::documents`.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::database::models::documents;
use crate::services::sequence_allocator::Allocation;

pub const RELEASE_TAG: &str = "_DEL_";

lazy_static::lazy_static! {
    static ref RELEASE_MARKER_RE: Regex =
        Regex::new(r"^(?P<original>.*)_DEL_(?P<id>[0-9]+)_(?P<ts>[0-9]+)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    Soft,
    Force,
}

/// Поля нумерации, которые записываются при создании документа.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberingFields {
    pub document_number: String,
    pub sequence_number: i64,
    pub customer_sequence_number: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseMarker {
    pub original: String,
    pub document_id: i64,
    pub released_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RestoreOutcome {
    /// Исходный номер вернулся документу.
    Restored { number: String },
    /// Исходный номер занят другой строкой; остаётся номер с маркером.
    KeptReleased { number: String, original: String },
    /// Номер не освобождался при удалении.
    NoMarker { number: String },
    AlreadyActive { number: String },
}

impl RestoreOutcome {
    /// Новый номер для записи, если он отличается от сохранённого.
    pub fn number_to_persist(&self) -> Option<&str> {
        match self {
            RestoreOutcome::Restored { number } => Some(number.as_str()),
            _ => None,
        }
    }
}

pub fn on_create(allocation: &Allocation) -> NumberingFields {
    NumberingFields {
        document_number: allocation.rendered_number.clone(),
        sequence_number: allocation.sequence_number,
        customer_sequence_number: allocation.customer_sequence_number,
    }
}

/// Номер с маркером освобождения: `INV-000042_DEL_42_1700000000`.
pub fn release_number(number: &str, document_id: i64, deleted_at: DateTime<Utc>) -> String {
    format!(
        "{}{}{}_{}",
        number,
        RELEASE_TAG,
        document_id,
        deleted_at.timestamp()
    )
}

pub fn parse_release_marker(number: &str) -> Option<ReleaseMarker> {
    let caps = RELEASE_MARKER_RE.captures(number)?;
    Some(ReleaseMarker {
        original: caps.name("original")?.as_str().to_string(),
        document_id: caps.name("id")?.as_str().parse().ok()?,
        released_at: caps.name("ts")?.as_str().parse().ok()?,
    })
}

/// Маркер, который поставлен именно этому документу. Совпадение по id
/// отсекает номера, которые лишь похожи на освобождённые.
pub fn release_marker_of(doc: &documents::Model) -> Option<ReleaseMarker> {
    parse_release_marker(&doc.document_number).filter(|marker| marker.document_id == doc.id)
}

/// ACTIVE -> DELETED. `None` — номер не трогаем (force delete или маркер уже стоит).
pub fn on_soft_delete(
    doc: &documents::Model,
    mode: DeleteMode,
    now: DateTime<Utc>,
) -> Option<String> {
    if mode == DeleteMode::Force || release_marker_of(doc).is_some() {
        return None;
    }
    Some(release_number(&doc.document_number, doc.id, now))
}

/// DELETED -> ACTIVE. `original_held_elsewhere` — занят ли исходный номер
/// другим активным документом (проверяется вызывающим в той же транзакции).
pub fn on_restore(doc: &documents::Model, original_held_elsewhere: bool) -> RestoreOutcome {
    if !doc.is_deleted() {
        return RestoreOutcome::AlreadyActive {
            number: doc.document_number.clone(),
        };
    }

    match release_marker_of(doc) {
        None => RestoreOutcome::NoMarker {
            number: doc.document_number.clone(),
        },
        Some(marker) if original_held_elsewhere => RestoreOutcome::KeptReleased {
            number: doc.document_number.clone(),
            original: marker.original,
        },
        Some(marker) => RestoreOutcome::Restored {
            number: marker.original,
        },
    }
}
