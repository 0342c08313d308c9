use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

// --- Document Types ---
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Invoice,
    Estimate,
    Payment,
}

impl DocumentType {
    pub const ALL: [DocumentType; 3] = [
        DocumentType::Invoice,
        DocumentType::Estimate,
        DocumentType::Payment,
    ];

    /// Значение колонки `document_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::Estimate => "estimate",
            DocumentType::Payment => "payment",
        }
    }

    /// Серия по умолчанию для плейсхолдера `SERIES`
    pub fn default_series(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "INV",
            DocumentType::Estimate => "EST",
            DocumentType::Payment => "PAY",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invoice" => Ok(DocumentType::Invoice),
            "estimate" => Ok(DocumentType::Estimate),
            "payment" => Ok(DocumentType::Payment),
            other => Err(format!("Unknown document type: {}", other)),
        }
    }
}

// --- Lifecycle States ---
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    Active,
    Deleted,
}

impl std::fmt::Display for DocumentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentState::Active => write!(f, "active"),
            DocumentState::Deleted => write!(f, "deleted"),
        }
    }
}
