use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entity::customers::Membership;

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct CustomerDto {
    pub id: i32,
    pub user_id: i32,
    pub membership: Membership,
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
}

/// Body for admin creation; `user_id` must reference a user without a customer.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateCustomerRequest {
    pub user_id: i32,
    #[serde(default)]
    pub membership: Membership,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateCustomerRequest {
    #[serde(default)]
    pub membership: Membership,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
}

/// Partial update; absent fields keep their value. `birth_date: null` clears the date.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct PatchCustomerRequest {
    pub membership: Option<Membership>,
    #[validate(length(max = 255))]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<NaiveDate>)]
    pub birth_date: Option<Option<NaiveDate>>,
}

// Wraps whatever was sent, `null` included, so it can be told apart from a missing field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct CustomerList {
    #[schema(value_type = Vec<CustomerDto>)]
    pub items: Vec<CustomerDto>,
}
