use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct ClientSummary {
    pub identity: String,
    pub idle_secs: f64,
    /// As of the client's last request.
    pub available_tokens: f64,
}

#[derive(Debug, Serialize)]
pub struct ClientList {
    pub count: usize,
    pub capacity: u64,
    pub refill_rate: f64,
    pub clients: Vec<ClientSummary>,
}

/// GET /api/clients
///
/// Lists every tracked client, most recently active first.
pub async fn list_clients(State(state): State<SharedState>) -> Json<ClientList> {
    let registry = state.limiter.registry();
    let now = registry.now();

    let mut clients: Vec<ClientSummary> = registry
        .entries()
        .iter()
        .map(|entry| ClientSummary {
            identity: entry.identity().to_string(),
            idle_secs: now.saturating_duration_since(entry.last_seen()).as_secs_f64(),
            available_tokens: entry.available_tokens(),
        })
        .collect();
    clients.sort_by(|a, b| a.idle_secs.total_cmp(&b.idle_secs));

    let settings = state.limiter.settings();
    Json(ClientList {
        count: clients.len(),
        capacity: settings.capacity,
        refill_rate: settings.refill_rate,
        clients,
    })
}
