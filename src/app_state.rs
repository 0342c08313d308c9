use crate::config::Config;
use crate::services::documents::DocumentService;
use sea_orm::DatabaseConnection;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
    pub documents: DocumentService,
}
