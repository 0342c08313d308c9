use actix_cors::Cors;
use actix_web::{web, App, HttpServer, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use dotenvy::dotenv;

use docserial::api::{self, documents, middleware::RequestId};
use docserial::app_state::AppState;
use docserial::config::Config;
use docserial::database::{self, models::documents as document_models, types::DocumentType};
use docserial::services::{
    documents::{DocumentService, RestoreReport},
    lifecycle::RestoreOutcome,
    sequence_allocator::Allocation,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("Failed to load configuration: {}", e))
    })?;
    let db = database::connect().await?;
    let documents_service = DocumentService::new(db.clone(), config.clone())
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    #[derive(OpenApi)]
    #[openapi(
        paths(
            documents::list_documents,
            documents::next_number,
            documents::create_document,
            documents::get_document,
            documents::delete_document,
            documents::restore_document,
        ),
        components(
            schemas(
                // --- Models ---
                document_models::Model,
                DocumentType,

                // --- DTOs & API Structs ---
                documents::CreateDocumentDto,
                documents::DocumentListResponse,
                Allocation,
                RestoreReport,
                RestoreOutcome,
            )
        ),
        tags(
            (name = "Documents", description = "Document numbering: allocate, release on delete, reclaim on restore")
        )
    )]
    struct ApiDoc;

    let host = config.host.clone();
    let port = config.port;
    let body_limit = config.effective_max_body_bytes();

    log::info!("Starting server at http://{}:{}", host, port);
    log::info!("Swagger UI available at http://{}:{}/swagger-ui/", host, port);

    let state = AppState {
        db,
        config,
        documents: documents_service,
    };

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::NormalizePath::new(middleware::TrailingSlash::MergeOnly))
            .wrap(RequestId)
            .app_data(web::Data::new(state.clone()))
            .app_data(api::json_config(body_limit))
            .configure(api::configure)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .workers(num_cpus::get().max(2))
    .bind((host, port))?
    .run()
    .await
}
