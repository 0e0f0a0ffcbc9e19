//! Support ticket tools.

use serde_json::{Value, json};

use crate::error::GatewayError;
use crate::models::{CreateTicketRequest, ListTicketsRequest, ListTicketsResponse, TicketResponse};
use crate::rest_client::RestClient;

use super::from_backend;

pub async fn create_ticket(
    rest: &RestClient,
    request: CreateTicketRequest,
) -> Result<TicketResponse, GatewayError> {
    let payload = ticket_payload(&request);
    let ticket: TicketResponse = from_backend(rest.post("/tickets", &payload).await?)?;

    tracing::info!(ticket_id = %ticket.id, priority = %ticket.priority, "created ticket");
    Ok(ticket)
}

pub async fn list_tickets(
    rest: &RestClient,
    request: ListTicketsRequest,
) -> Result<ListTicketsResponse, GatewayError> {
    let mut query = vec![
        ("skip", request.skip.to_string()),
        ("limit", request.limit.to_string()),
    ];
    if let Some(status) = request.status.filter(|s| !s.is_empty()) {
        query.push(("status", status));
    }

    let page: ListTicketsResponse = from_backend(rest.get("/tickets", &query).await?)?;

    tracing::info!(count = page.items.len(), total = page.total, "retrieved tickets");
    Ok(page)
}

fn ticket_payload(request: &CreateTicketRequest) -> Value {
    let mut payload = json!({
        "title": request.title,
        "description": request.description,
        "priority": request.priority,
    });
    if let Some(assignee) = request.assignee_id.as_deref().filter(|a| !a.is_empty()) {
        payload["assignee_id"] = json!(assignee);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TicketPriority;

    #[test]
    fn test_payload_omits_empty_assignee() {
        let mut request = CreateTicketRequest {
            title: "VPN".to_string(),
            description: "Cannot connect to VPN".to_string(),
            priority: TicketPriority::High,
            assignee_id: None,
        };
        assert_eq!(
            ticket_payload(&request),
            json!({ "title": "VPN", "description": "Cannot connect to VPN", "priority": "high" })
        );

        request.assignee_id = Some(String::new());
        assert!(ticket_payload(&request).get("assignee_id").is_none());

        request.assignee_id = Some("user-7".to_string());
        assert_eq!(ticket_payload(&request)["assignee_id"], "user-7");
    }
}
