//! User lookup tools.

use serde::Deserialize;

use crate::error::GatewayError;
use crate::models::{GetUserProfileRequest, ListUsersRequest, ListUsersResponse, UserProfile};
use crate::rest_client::{RestClient, path_segment};

use super::from_backend;

pub async fn get_user_profile(
    rest: &RestClient,
    request: GetUserProfileRequest,
) -> Result<UserProfile, GatewayError> {
    let path = format!("/users/{}", path_segment("user_id", &request.user_id)?);
    let mut profile: UserProfile = from_backend(rest.get(&path, &[]).await?)?;
    if !request.include_details {
        profile.details = None;
    }

    tracing::info!(user_id = %profile.id, "retrieved user profile");
    Ok(profile)
}

pub async fn list_users(
    rest: &RestClient,
    request: ListUsersRequest,
) -> Result<ListUsersResponse, GatewayError> {
    #[derive(Deserialize)]
    struct Page {
        total: u64,
        items: Vec<UserProfile>,
    }

    let query = [
        ("skip", request.skip.to_string()),
        ("limit", request.limit.to_string()),
    ];
    let page: Page = from_backend(rest.get("/users", &query).await?)?;

    // Listings never carry the extended profile.
    let items: Vec<UserProfile> = page
        .items
        .into_iter()
        .map(|user| UserProfile { details: None, ..user })
        .collect();

    tracing::info!(count = items.len(), total = page.total, "retrieved users");
    Ok(ListUsersResponse { total: page.total, items })
}
