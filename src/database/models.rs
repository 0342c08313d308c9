use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// --- Documents (invoices, estimates, payments) ---
pub mod documents {
    use super::*;
    use crate::database::types::DocumentState;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DeriveEntityModel, ToSchema)]
    #[sea_orm(table_name = "documents")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub tenant_id: i64,
        #[sea_orm(column_type = "String(StringLen::N(16))")]
        pub document_type: String,
        pub customer_id: Option<i64>,
        #[sea_orm(column_type = "String(StringLen::N(255))")]
        pub document_number: String,
        pub sequence_number: i64,
        pub customer_sequence_number: Option<i64>,
        #[sea_orm(column_type = "String(StringLen::N(64))")]
        pub unique_hash: String,
        #[schema(value_type = String, format = DateTime)]
        pub created_at: DateTimeUtc,
        #[schema(value_type = Option<String>, format = DateTime)]
        pub deleted_at: Option<DateTimeUtc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl Model {
        pub fn is_deleted(&self) -> bool {
            self.deleted_at.is_some()
        }

        pub fn state(&self) -> DocumentState {
            if self.is_deleted() {
                DocumentState::Deleted
            } else {
                DocumentState::Active
            }
        }
    }
}
