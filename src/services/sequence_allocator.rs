//! Выдача порядковых номеров документов.
//!
//! Счётчик нигде не хранится: следующий номер каждый раз выводится из
//! `max(sequence_number)` по всем строкам арендатора и типа документа,
//! включая мягко удалённые. Финальный арбитр при гонке двух транзакций —
//! уникальный индекс `(tenant_id, document_type, document_number)`.

use chrono::Utc;
use chrono_tz::Tz;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
    Select,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::Config;
use crate::database::models::documents;
use crate::database::types::DocumentType;
use crate::errors::AppError;
use crate::services::lifecycle::{self, RELEASE_TAG};
use crate::services::number_format::{NumberFormat, RenderContext};

/// Что и для кого выделяем.
#[derive(Debug, Clone)]
pub struct AllocationRequest<'a> {
    pub document_type: DocumentType,
    pub tenant_id: i64,
    pub customer_id: Option<i64>,
    /// Префикс клиента для `CUSTOMER_SERIES`
    pub customer_series: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Allocation {
    pub sequence_number: i64,
    pub customer_sequence_number: Option<i64>,
    pub rendered_number: String,
}

#[derive(Debug, Clone)]
pub struct SequenceAllocator {
    retry_limit: u32,
    timezone: Tz,
}

impl SequenceAllocator {
    pub fn new(retry_limit: u32, timezone: Tz) -> Self {
        Self {
            retry_limit: retry_limit.max(1),
            timezone,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let timezone = config
            .get_timezone()
            .map_err(|e| AppError::InvalidInput(format!("Invalid timezone: {}", e)))?;
        Ok(Self::new(config.effective_allocation_retry_limit(), timezone))
    }

    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    /// Вычисляет следующий номер и проверяет, что его не держит ни одна строка
    /// (уникальный индекс покрывает и мягко удалённые).
    ///
    /// Должно вызываться внутри той же транзакции, что и последующая вставка.
    /// Проверка видит только закоммиченные строки; одновременная вставка
    /// другой транзакцией ловится уникальным индексом при `INSERT`.
    pub async fn allocate<C>(
        &self,
        db: &C,
        request: &AllocationRequest<'_>,
        format: &NumberFormat,
    ) -> Result<Allocation, AppError>
    where
        C: ConnectionTrait,
    {
        if format.requires_customer() && request.customer_id.is_none() {
            return Err(AppError::InvalidInput(format!(
                "Number format `{}` needs a customer",
                format.template()
            )));
        }

        let mut candidate =
            Self::next_tenant_sequence(db, request.document_type, request.tenant_id).await?;
        let customer_sequence = match request.customer_id {
            Some(customer_id) => Some(
                Self::next_customer_sequence(
                    db,
                    request.document_type,
                    request.tenant_id,
                    customer_id,
                )
                .await?,
            ),
            None => None,
        };
        let issued_at = Utc::now().with_timezone(&self.timezone);

        for attempt in 1..=self.retry_limit {
            let rendered = format.render(&RenderContext {
                document_type: request.document_type,
                sequence: candidate,
                customer_sequence,
                customer_series: request.customer_series,
                issued_at,
            });

            if rendered.contains(RELEASE_TAG) {
                return Err(AppError::InvalidInput(format!(
                    "Rendered number `{}` contains the reserved `{}` tag",
                    rendered, RELEASE_TAG
                )));
            }

            if format.decode_sequence(&rendered, request.document_type) != Some(candidate) {
                return Err(AppError::InvalidFormatTemplate(format!(
                    "`{}` rendered `{}` which does not decode back to sequence {}",
                    format.template(),
                    rendered,
                    candidate
                )));
            }

            if !Self::number_taken(
                db,
                request.document_type,
                request.tenant_id,
                &rendered,
                None,
            )
            .await?
            {
                log::debug!(
                    "Allocated {} #{} ({}) for tenant {} on attempt {}",
                    request.document_type,
                    candidate,
                    rendered,
                    request.tenant_id,
                    attempt
                );
                return Ok(Allocation {
                    sequence_number: candidate,
                    customer_sequence_number: customer_sequence,
                    rendered_number: rendered,
                });
            }

            log::warn!(
                "Number {} already held by a {} of tenant {}, trying next sequence",
                rendered,
                request.document_type,
                request.tenant_id
            );
            candidate += 1;
        }

        Err(AppError::SequenceExhausted {
            document_type: request.document_type,
            tenant_id: request.tenant_id,
            attempts: self.retry_limit,
        })
    }

    /// `max(sequence_number) + 1` по всем строкам, включая мягко удалённые.
    pub async fn next_tenant_sequence<C>(
        db: &C,
        document_type: DocumentType,
        tenant_id: i64,
    ) -> Result<i64, DbErr>
    where
        C: ConnectionTrait,
    {
        let max: Option<Option<i64>> = scoped(document_type, tenant_id)
            .select_only()
            .column_as(documents::Column::SequenceNumber.max(), "max_sequence")
            .into_tuple()
            .one(db)
            .await?;

        Ok(max.flatten().unwrap_or(0) + 1)
    }

    /// Количество строк клиента + 1. Считается, а не берётся максимум, поэтому
    /// после физического удаления строк может разойтись с уже выданными номерами.
    pub async fn next_customer_sequence<C>(
        db: &C,
        document_type: DocumentType,
        tenant_id: i64,
        customer_id: i64,
    ) -> Result<i64, DbErr>
    where
        C: ConnectionTrait,
    {
        let existing = scoped(document_type, tenant_id)
            .filter(documents::Column::CustomerId.eq(customer_id))
            .count(db)
            .await?;

        Ok(existing as i64 + 1)
    }

    /// Держит ли номер любая строка того же арендатора и типа, в том числе
    /// мягко удалённая без маркера (старые или импортированные данные).
    pub async fn number_taken<C>(
        db: &C,
        document_type: DocumentType,
        tenant_id: i64,
        number: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut query =
            scoped(document_type, tenant_id).filter(documents::Column::DocumentNumber.eq(number));
        if let Some(id) = exclude_id {
            query = query.filter(documents::Column::Id.ne(id));
        }

        Ok(query.count(db).await? > 0)
    }

    /// Есть ли активный документ с этим порядковым номером.
    pub async fn sequence_in_use<C>(
        db: &C,
        document_type: DocumentType,
        tenant_id: i64,
        sequence_number: i64,
    ) -> Result<bool, DbErr>
    where
        C: ConnectionTrait,
    {
        let held = scoped(document_type, tenant_id)
            .filter(documents::Column::SequenceNumber.eq(sequence_number))
            .filter(documents::Column::DeletedAt.is_null())
            .count(db)
            .await?;

        Ok(held > 0)
    }

    /// Был ли `number` освобождён мягким удалением: есть удалённая строка,
    /// чей маркер указывает на этот номер.
    pub async fn released_number_exists<C>(
        db: &C,
        document_type: DocumentType,
        tenant_id: i64,
        number: &str,
    ) -> Result<bool, DbErr>
    where
        C: ConnectionTrait,
    {
        let candidates = scoped(document_type, tenant_id)
            .filter(documents::Column::DeletedAt.is_not_null())
            .filter(documents::Column::DocumentNumber.starts_with(format!("{}{}", number, RELEASE_TAG)))
            .all(db)
            .await?;

        // LIKE трактует `_` как любой символ, поэтому маркер проверяем точно
        Ok(candidates.iter().any(|row| {
            lifecycle::release_marker_of(row).is_some_and(|marker| marker.original == number)
        }))
    }
}

/// Все строки одного арендатора и типа документа, в любом состоянии.
pub(crate) fn scoped(document_type: DocumentType, tenant_id: i64) -> Select<documents::Entity> {
    documents::Entity::find()
        .filter(documents::Column::TenantId.eq(tenant_id))
        .filter(documents::Column::DocumentType.eq(document_type.as_str()))
}
