//! Dataset query tool.

use serde_json::{Map, Value};

use crate::error::GatewayError;
use crate::models::{QueryDataRequest, QueryDataResponse};
use crate::rest_client::{RestClient, path_segment};

use super::from_backend;

pub async fn query_data(
    rest: &RestClient,
    request: QueryDataRequest,
) -> Result<QueryDataResponse, GatewayError> {
    let path = format!("/query/{}", path_segment("dataset", &request.dataset)?);

    let mut query = vec![("limit", request.limit.to_string())];
    if let Some(filters) = request.filters.as_ref().filter(|f| !f.is_empty()) {
        query.push(("filters", Value::Object(filters.clone()).to_string()));
    }

    let body = rest.get(&path, &query).await?;
    let data: Vec<Map<String, Value>> = match body.get("data") {
        None | Some(Value::Null) => Vec::new(),
        Some(rows) => from_backend(rows.clone())?,
    };

    let response = QueryDataResponse {
        dataset: request.dataset,
        rows: data.len(),
        data,
    };

    tracing::info!(dataset = %response.dataset, rows = response.rows, "queried dataset");
    Ok(response)
}
