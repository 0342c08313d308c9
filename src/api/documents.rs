use actix_web::{delete, get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::validation::{
        ensure_max_len, ensure_positive_id, sanitize_document_number, validate_customer_series,
        MAX_FORMAT_LEN,
    },
    app_state::AppState,
    database::{models::documents, types::DocumentType},
    errors::AppError,
    services::{documents::CreateDocument, lifecycle::DeleteMode},
};

// --- DTOs (Data Transfer Objects) ---

#[derive(Deserialize, ToSchema, Clone, Default)]
pub struct CreateDocumentDto {
    pub customer_id: Option<i64>,
    /// Префикс клиента для `{{CUSTOMER_SERIES}}`
    pub customer_series: Option<String>,
    /// Шаблон номера; по умолчанию берётся из конфигурации
    pub number_format: Option<String>,
    /// Номер, введённый вручную
    pub document_number: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    pub include_deleted: Option<bool>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteQuery {
    /// Удалить строку физически, номер не освобождается
    pub force: Option<bool>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NextNumberQuery {
    pub customer_id: Option<i64>,
    pub customer_series: Option<String>,
    pub number_format: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentListResponse {
    pub data: Vec<documents::Model>,
}

fn build_request(
    tenant_id: i64,
    document_type: DocumentType,
    customer_id: Option<i64>,
    customer_series: Option<String>,
    number_format: Option<String>,
    document_number: Option<String>,
) -> Result<CreateDocument, AppError> {
    ensure_positive_id("tenant_id", tenant_id)?;
    if let Some(customer_id) = customer_id {
        ensure_positive_id("customer_id", customer_id)?;
    }
    if let Some(series) = customer_series.as_deref() {
        if !validate_customer_series(series) {
            return Err(AppError::InvalidInput(
                "customer_series must be 1-10 letters, digits, '-' or '_'".to_string(),
            ));
        }
    }
    if let Some(template) = number_format.as_deref() {
        if !ensure_max_len(template, MAX_FORMAT_LEN) {
            return Err(AppError::InvalidInput(format!(
                "number_format must be at most {} bytes",
                MAX_FORMAT_LEN
            )));
        }
    }
    let document_number = match document_number {
        Some(raw) => Some(sanitize_document_number(&raw).ok_or_else(|| {
            AppError::InvalidInput("document_number is empty, too long or malformed".to_string())
        })?),
        None => None,
    };

    Ok(CreateDocument {
        document_type,
        tenant_id,
        customer_id,
        customer_series,
        number_format,
        document_number,
    })
}

// --- Route Handlers ---

#[utoipa::path(
    get,
    path = "/api/tenants/{tenant_id}/documents/{document_type}",
    tag = "Documents",
    params(
        ("tenant_id" = i64, Path, description = "Tenant (company) ID"),
        ("document_type" = DocumentType, Path, description = "invoice | estimate | payment"),
        ListQuery
    ),
    responses(
        (status = 200, description = "Documents ordered by sequence", body = DocumentListResponse)
    )
)]
#[get("")]
pub async fn list_documents(
    data: web::Data<AppState>,
    path: web::Path<(i64, DocumentType)>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let (tenant_id, document_type) = path.into_inner();
    let include_deleted = query.include_deleted.unwrap_or(false);
    let data = data
        .documents
        .list(tenant_id, document_type, include_deleted)
        .await?;
    Ok(HttpResponse::Ok().json(DocumentListResponse { data }))
}

#[utoipa::path(
    get,
    path = "/api/tenants/{tenant_id}/documents/{document_type}/next-number",
    tag = "Documents",
    params(
        ("tenant_id" = i64, Path, description = "Tenant (company) ID"),
        ("document_type" = DocumentType, Path, description = "invoice | estimate | payment"),
        NextNumberQuery
    ),
    responses(
        (status = 200, description = "Number the next document would receive", body = crate::services::sequence_allocator::Allocation),
        (status = 422, description = "Invalid number format template")
    )
)]
#[get("/next-number")]
pub async fn next_number(
    data: web::Data<AppState>,
    path: web::Path<(i64, DocumentType)>,
    query: web::Query<NextNumberQuery>,
) -> Result<HttpResponse, AppError> {
    let (tenant_id, document_type) = path.into_inner();
    let query = query.into_inner();
    let request = build_request(
        tenant_id,
        document_type,
        query.customer_id,
        query.customer_series,
        query.number_format,
        None,
    )?;
    let allocation = data.documents.preview_next(&request).await?;
    Ok(HttpResponse::Ok().json(allocation))
}

#[utoipa::path(
    post,
    path = "/api/tenants/{tenant_id}/documents/{document_type}",
    tag = "Documents",
    params(
        ("tenant_id" = i64, Path, description = "Tenant (company) ID"),
        ("document_type" = DocumentType, Path, description = "invoice | estimate | payment")
    ),
    request_body = CreateDocumentDto,
    responses(
        (status = 201, description = "Document created with an allocated number", body = documents::Model),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Number claimed concurrently, retry"),
        (status = 422, description = "Invalid number format template")
    )
)]
#[post("")]
pub async fn create_document(
    data: web::Data<AppState>,
    path: web::Path<(i64, DocumentType)>,
    dto: web::Json<CreateDocumentDto>,
) -> Result<HttpResponse, AppError> {
    let (tenant_id, document_type) = path.into_inner();
    let dto = dto.into_inner();
    let request = build_request(
        tenant_id,
        document_type,
        dto.customer_id,
        dto.customer_series,
        dto.number_format,
        dto.document_number,
    )?;
    let created = data.documents.create_with_retry(&request).await?;
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/api/tenants/{tenant_id}/documents/{document_type}/{id}",
    tag = "Documents",
    params(
        ("tenant_id" = i64, Path, description = "Tenant (company) ID"),
        ("document_type" = DocumentType, Path, description = "invoice | estimate | payment"),
        ("id" = i64, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Document found", body = documents::Model),
        (status = 404, description = "Document not found")
    )
)]
#[get("/{id}")]
pub async fn get_document(
    data: web::Data<AppState>,
    path: web::Path<(i64, DocumentType, i64)>,
) -> Result<HttpResponse, AppError> {
    let (tenant_id, document_type, id) = path.into_inner();
    let document = data.documents.find(tenant_id, document_type, id).await?;
    Ok(HttpResponse::Ok().json(document))
}

#[utoipa::path(
    delete,
    path = "/api/tenants/{tenant_id}/documents/{document_type}/{id}",
    tag = "Documents",
    params(
        ("tenant_id" = i64, Path, description = "Tenant (company) ID"),
        ("document_type" = DocumentType, Path, description = "invoice | estimate | payment"),
        ("id" = i64, Path, description = "Document ID"),
        DeleteQuery
    ),
    responses(
        (status = 200, description = "Soft-deleted, number released", body = documents::Model),
        (status = 204, description = "Purged"),
        (status = 404, description = "Document not found")
    )
)]
#[delete("/{id}")]
pub async fn delete_document(
    data: web::Data<AppState>,
    path: web::Path<(i64, DocumentType, i64)>,
    query: web::Query<DeleteQuery>,
) -> Result<HttpResponse, AppError> {
    let (tenant_id, document_type, id) = path.into_inner();
    let mode = if query.force.unwrap_or(false) {
        DeleteMode::Force
    } else {
        DeleteMode::Soft
    };

    match data
        .documents
        .delete(tenant_id, document_type, id, mode)
        .await?
    {
        Some(document) => Ok(HttpResponse::Ok().json(document)),
        None => Ok(HttpResponse::NoContent().finish()),
    }
}

#[utoipa::path(
    post,
    path = "/api/tenants/{tenant_id}/documents/{document_type}/{id}/restore",
    tag = "Documents",
    params(
        ("tenant_id" = i64, Path, description = "Tenant (company) ID"),
        ("document_type" = DocumentType, Path, description = "invoice | estimate | payment"),
        ("id" = i64, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Restored; outcome tells whether the original number came back", body = crate::services::documents::RestoreReport),
        (status = 404, description = "Document not found")
    )
)]
#[post("/{id}/restore")]
pub async fn restore_document(
    data: web::Data<AppState>,
    path: web::Path<(i64, DocumentType, i64)>,
) -> Result<HttpResponse, AppError> {
    let (tenant_id, document_type, id) = path.into_inner();
    let report = data.documents.restore(tenant_id, document_type, id).await?;
    Ok(HttpResponse::Ok().json(report))
}

// Функция для регистрации всех маршрутов этого модуля
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tenants/{tenant_id}/documents/{document_type}")
            .service(list_documents)
            .service(next_number)
            .service(create_document)
            .service(get_document)
            .service(delete_document)
            .service(restore_document),
    );
}
