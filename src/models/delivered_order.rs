use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Denormalized customer fields captured in the delivered-order archive.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomerSnapshot {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Denormalized delivery-partner fields captured in the archive.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PartnerSnapshot {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}
