use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json,
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{Extensions, HeaderMap, StatusCode, header::CACHE_CONTROL},
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;

use crate::{
    error::AppError,
    models::VotePayload,
    resolver::RequestMeta,
    state::State as AppState,
};

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Mood from a JSON body, if there is a string one. Anything unreadable is
/// treated as a missing mood.
fn mood_from_body(body: &Bytes) -> Option<String> {
    let payload: VotePayload = serde_json::from_slice(body).ok()?;

    payload.mood?.as_str().map(str::to_string)
}

pub async fn vote_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    extensions: Extensions,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let mood_raw = mood_from_body(&body);

    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| address.ip());
    let meta = RequestMeta::new(&headers, peer);
    let country = state.resolver.resolve(&meta);

    info!("Detected country: {country}, client IP: {:?}", meta.client_ip());

    let (mood, tally) = state
        .aggregator
        .submit_vote(mood_raw.as_deref(), &country)
        .await?;

    state.live.publish(&country, mood);

    Ok(Json(json!({
        "success": true,
        "country": tally,
    })))
}

pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let stats = state.aggregator.all_tallies().await?;

    let cache_control = format!(
        "public, max-age={}, stale-while-revalidate=59",
        state.config.stats_max_age
    );

    Ok((
        [(CACHE_CONTROL, cache_control)],
        Json(json!({
            "success": true,
            "stats": stats,
        })),
    ))
}
