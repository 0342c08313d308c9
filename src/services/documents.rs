use std::future::Future;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::database::models::documents;
use crate::database::types::DocumentType;
use crate::errors::AppError;
use crate::services::lifecycle::{self, DeleteMode, RestoreOutcome, RELEASE_TAG};
use crate::services::number_format::NumberFormat;
use crate::services::sequence_allocator::{
    scoped, Allocation, AllocationRequest, SequenceAllocator,
};

/// Параметры создания документа.
#[derive(Debug, Clone)]
pub struct CreateDocument {
    pub document_type: DocumentType,
    pub tenant_id: i64,
    pub customer_id: Option<i64>,
    pub customer_series: Option<String>,
    /// Шаблон вместо настроенного по умолчанию для типа документа
    pub number_format: Option<String>,
    /// Номер, введённый пользователем вручную
    pub document_number: Option<String>,
}

impl CreateDocument {
    pub fn new(document_type: DocumentType, tenant_id: i64) -> Self {
        Self {
            document_type,
            tenant_id,
            customer_id: None,
            customer_series: None,
            number_format: None,
            document_number: None,
        }
    }

    pub fn for_customer(mut self, customer_id: i64) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_format(mut self, template: impl Into<String>) -> Self {
        self.number_format = Some(template.into());
        self
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.document_number = Some(number.into());
        self
    }

    fn allocation_request(&self) -> AllocationRequest<'_> {
        AllocationRequest {
            document_type: self.document_type,
            tenant_id: self.tenant_id,
            customer_id: self.customer_id,
            customer_series: self.customer_series.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RestoreReport {
    pub document: documents::Model,
    pub outcome: RestoreOutcome,
}

/// Оркестрация создания/удаления/восстановления: каждый переход — одна транзакция.
#[derive(Clone)]
pub struct DocumentService {
    db: DatabaseConnection,
    allocator: SequenceAllocator,
    config: Config,
}

impl DocumentService {
    pub fn new(db: DatabaseConnection, config: Config) -> Result<Self, AppError> {
        let allocator = SequenceAllocator::from_config(&config)?;
        Ok(Self {
            db,
            allocator,
            config,
        })
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    fn resolve_format(
        &self,
        document_type: DocumentType,
        template: Option<&str>,
    ) -> Result<NumberFormat, AppError> {
        let template = template.unwrap_or_else(|| self.config.number_format_for(document_type));
        Ok(NumberFormat::parse(template)?)
    }

    /// Номер, который получит следующий документ. Ничего не записывает.
    pub async fn preview_next(&self, request: &CreateDocument) -> Result<Allocation, AppError> {
        let format = self.resolve_format(request.document_type, request.number_format.as_deref())?;
        self.allocator
            .allocate(&self.db, &request.allocation_request(), &format)
            .await
    }

    pub async fn create(&self, request: &CreateDocument) -> Result<documents::Model, AppError> {
        let format = self.resolve_format(request.document_type, request.number_format.as_deref())?;
        let txn = self.db.begin().await?;

        let allocation = match request.document_number.as_deref() {
            Some(number) => Self::claim_explicit_number(&txn, request, &format, number).await?,
            None => {
                self.allocator
                    .allocate(&txn, &request.allocation_request(), &format)
                    .await?
            }
        };
        let created = Self::insert_allocated(&txn, request, &allocation).await?;
        txn.commit().await?;

        log::info!(
            "Created {} {} (id={}, seq={}) for tenant {}",
            request.document_type,
            created.document_number,
            created.id,
            created.sequence_number,
            request.tenant_id
        );
        Ok(created)
    }

    /// Вставка строки с уже выделенным номером. Проигранная гонка за
    /// уникальный индекс превращается в `NumberTaken`.
    async fn insert_allocated<C>(
        db: &C,
        request: &CreateDocument,
        allocation: &Allocation,
    ) -> Result<documents::Model, AppError>
    where
        C: ConnectionTrait,
    {
        let fields = lifecycle::on_create(allocation);

        let document = documents::ActiveModel {
            tenant_id: Set(request.tenant_id),
            document_type: Set(request.document_type.as_str().to_string()),
            customer_id: Set(request.customer_id),
            document_number: Set(fields.document_number.clone()),
            sequence_number: Set(fields.sequence_number),
            customer_sequence_number: Set(fields.customer_sequence_number),
            unique_hash: Set(Uuid::new_v4().simple().to_string()),
            created_at: Set(Utc::now()),
            deleted_at: Set(None),
            ..Default::default()
        };

        document
            .insert(db)
            .await
            .map_err(|e| unique_violation_as_taken(e, &fields.document_number))
    }

    /// Повторяет `create` в новой транзакции, пока ошибка транзиентная.
    pub async fn create_with_retry(
        &self,
        request: &CreateDocument,
    ) -> Result<documents::Model, AppError> {
        self.retrying(request, || self.create(request)).await
    }

    async fn retrying<F, Fut>(
        &self,
        request: &CreateDocument,
        mut attempt_create: F,
    ) -> Result<documents::Model, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<documents::Model, AppError>>,
    {
        let attempts = self.config.effective_create_retry_attempts();
        let mut attempt = 1;
        loop {
            match attempt_create().await {
                Err(e) if e.is_retryable() && attempt < attempts => {
                    log::warn!(
                        "Create {} for tenant {} failed on attempt {}/{}: {}",
                        request.document_type,
                        request.tenant_id,
                        attempt,
                        attempts,
                        e
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn claim_explicit_number<C>(
        db: &C,
        request: &CreateDocument,
        format: &NumberFormat,
        number: &str,
    ) -> Result<Allocation, AppError>
    where
        C: ConnectionTrait,
    {
        let number = number.trim();
        if number.contains(RELEASE_TAG) {
            return Err(AppError::InvalidInput(format!(
                "Number `{}` contains the reserved `{}` tag",
                number, RELEASE_TAG
            )));
        }
        let sequence = format.decode_sequence(number, request.document_type).ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Number `{}` does not match format `{}`",
                number,
                format.template()
            ))
        })?;

        let (document_type, tenant_id) = (request.document_type, request.tenant_id);
        if SequenceAllocator::number_taken(db, document_type, tenant_id, number, None).await? {
            return Err(AppError::InvalidInput(format!(
                "Number `{}` is already used by a {}",
                number, document_type
            )));
        }
        if SequenceAllocator::sequence_in_use(db, document_type, tenant_id, sequence).await? {
            return Err(AppError::InvalidInput(format!(
                "Sequence {} of `{}` is already held by an active {}",
                sequence, number, document_type
            )));
        }
        // Ниже текущего максимума можно вернуть только номер, освобождённый удалением
        let next = SequenceAllocator::next_tenant_sequence(db, document_type, tenant_id).await?;
        if sequence < next
            && !SequenceAllocator::released_number_exists(db, document_type, tenant_id, number)
                .await?
        {
            return Err(AppError::InvalidInput(format!(
                "Number `{}` is behind the current sequence {} and was never released",
                number, next
            )));
        }

        let customer_sequence = match request.customer_id {
            Some(customer_id) => Some(
                SequenceAllocator::next_customer_sequence(
                    db,
                    request.document_type,
                    request.tenant_id,
                    customer_id,
                )
                .await?,
            ),
            None => None,
        };

        Ok(Allocation {
            sequence_number: sequence,
            customer_sequence_number: customer_sequence,
            rendered_number: number.to_string(),
        })
    }

    pub async fn find(
        &self,
        tenant_id: i64,
        document_type: DocumentType,
        id: i64,
    ) -> Result<documents::Model, AppError> {
        find_scoped(&self.db, tenant_id, document_type, id).await
    }

    pub async fn list(
        &self,
        tenant_id: i64,
        document_type: DocumentType,
        include_deleted: bool,
    ) -> Result<Vec<documents::Model>, AppError> {
        let mut query = scoped(document_type, tenant_id);
        if !include_deleted {
            query = query.filter(documents::Column::DeletedAt.is_null());
        }
        let rows = query
            .order_by_asc(documents::Column::SequenceNumber)
            .order_by_asc(documents::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Мягкое удаление освобождает номер; `Force` удаляет строку целиком.
    /// Возвращает строку после мягкого удаления или `None` после purge.
    pub async fn delete(
        &self,
        tenant_id: i64,
        document_type: DocumentType,
        id: i64,
        mode: DeleteMode,
    ) -> Result<Option<documents::Model>, AppError> {
        let txn = self.db.begin().await?;
        let document = find_scoped(&txn, tenant_id, document_type, id).await?;

        if mode == DeleteMode::Force {
            documents::Entity::delete_by_id(document.id).exec(&txn).await?;
            txn.commit().await?;
            log::info!(
                "Purged {} {} (id={}) of tenant {}",
                document_type,
                document.document_number,
                id,
                tenant_id
            );
            return Ok(None);
        }

        if document.is_deleted() {
            log::debug!("{} id={} is already deleted", document_type, id);
            return Ok(Some(document));
        }

        let now = Utc::now();
        let released = lifecycle::on_soft_delete(&document, mode, now);
        let original = document.document_number.clone();

        let mut active = document.into_active_model();
        active.deleted_at = Set(Some(now));
        if let Some(number) = released {
            active.document_number = Set(number);
        }
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        log::info!(
            "Soft-deleted {} id={} of tenant {}: {} -> {}",
            document_type,
            id,
            tenant_id,
            original,
            updated.document_number
        );
        Ok(Some(updated))
    }

    pub async fn restore(
        &self,
        tenant_id: i64,
        document_type: DocumentType,
        id: i64,
    ) -> Result<RestoreReport, AppError> {
        let txn = self.db.begin().await?;
        let document = find_scoped(&txn, tenant_id, document_type, id).await?;

        if !document.is_deleted() {
            let outcome = lifecycle::on_restore(&document, false);
            return Ok(RestoreReport { document, outcome });
        }

        let original_held_elsewhere = match lifecycle::release_marker_of(&document) {
            Some(marker) => {
                SequenceAllocator::number_taken(
                    &txn,
                    document_type,
                    tenant_id,
                    &marker.original,
                    Some(document.id),
                )
                .await?
            }
            None => false,
        };
        let outcome = lifecycle::on_restore(&document, original_held_elsewhere);

        if let RestoreOutcome::KeptReleased { number, original } = &outcome {
            log::warn!(
                "Restored {} id={} of tenant {} keeps {}: original {} is held by another row",
                document_type,
                id,
                tenant_id,
                number,
                original
            );
        }

        let mut active = document.into_active_model();
        active.deleted_at = Set(None);
        if let Some(number) = outcome.number_to_persist() {
            active.document_number = Set(number.to_string());
        }
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        log::info!(
            "Restored {} id={} of tenant {} as {}",
            document_type,
            id,
            tenant_id,
            updated.document_number
        );
        Ok(RestoreReport {
            document: updated,
            outcome,
        })
    }
}

async fn find_scoped<C>(
    db: &C,
    tenant_id: i64,
    document_type: DocumentType,
    id: i64,
) -> Result<documents::Model, AppError>
where
    C: ConnectionTrait,
{
    scoped(document_type, tenant_id)
        .filter(documents::Column::Id.eq(id))
        .one(db)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "{} with id {} not found for tenant {}",
                document_type, id, tenant_id
            ))
        })
}

fn unique_violation_as_taken(err: DbErr, number: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            log::warn!("Insert of {} lost a race on the unique index", number);
            AppError::NumberTaken(number.to_string())
        }
        _ => AppError::DbError(err),
    }
}
