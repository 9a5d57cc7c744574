use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
pub struct CollectionDto {
    pub id: i32,
    pub title: String,
    pub products_count: i64,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CollectionRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct PatchCollectionRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct CollectionList {
    #[schema(value_type = Vec<CollectionDto>)]
    pub items: Vec<CollectionDto>,
}
