//! Replication stream and per-collection mutation endpoints.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::{Map, Value};

use uncorded_common::constants::wire::{NAME_SEPARATOR, NDJSON_CONTENT_TYPE, RECORD_DELIMITER};
use uncorded_common::{AddRecord, Document, SetState};

use super::error_status;
use crate::replication::ReplicationChannel;
use crate::state::AppState;

/// `GET /sets/{a,b,...}`: keyed snapshot lines for every known requested
/// collection. Unknown names are logged and ignored.
pub async fn stream_sets(
    State(state): State<AppState>,
    Path(names): Path<String>,
) -> Response {
    open_stream(&state, &names)
}

/// `GET /sets/`: an empty subscription, `{}` then an idle stream
pub async fn stream_nothing(State(state): State<AppState>) -> Response {
    open_stream(&state, "")
}

fn open_stream(state: &AppState, names: &str) -> Response {
    let requested = names.split(NAME_SEPARATOR).filter(|n| !n.is_empty());
    let (channels, missing) = state.registry.resolve(requested);

    for name in &missing {
        tracing::warn!(collection = %name, "Subscription requested unknown collection");
    }
    tracing::info!(
        collections = ?channels.iter().map(|c| c.name()).collect::<Vec<_>>(),
        "Replication subscriber attached"
    );

    let body = snapshot_lines(channels).map(Ok::<_, Infallible>);
    (
        [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
        Body::from_stream(body),
    )
        .into_response()
}

/// Serialize subscriptions as delimited lines.
///
/// The first line carries the current state of every channel; each later
/// line carries one channel's newest snapshot keyed by its name. The stream
/// never ends on its own.
pub fn snapshot_lines(
    channels: Vec<Arc<ReplicationChannel>>,
) -> impl Stream<Item = String> + Send + 'static {
    let mut initial = Vec::with_capacity(channels.len());
    let mut updates: Vec<BoxStream<'static, String>> = Vec::with_capacity(channels.len());

    for channel in channels {
        let name = channel.name().to_string();
        let mut subscription = channel.subscribe();
        if let Some(snapshot) = subscription.take_initial() {
            initial.push((name.clone(), snapshot));
        }
        let lines = subscription
            .into_stream()
            .filter_map(move |snapshot| {
                futures::future::ready(keyed_line([(name.clone(), snapshot)]))
            })
            .boxed();
        updates.push(lines);
    }

    stream::iter(keyed_line(initial))
        .chain(stream::select_all(updates))
        .chain(stream::pending())
}

fn keyed_line(entries: impl IntoIterator<Item = (String, Arc<SetState>)>) -> Option<String> {
    let mut record = Map::new();
    for (name, snapshot) in entries {
        match serde_json::to_value(snapshot.as_ref()) {
            Ok(value) => {
                record.insert(name, value);
            }
            Err(e) => {
                tracing::error!(collection = %name, error = %e, "Failed to encode snapshot");
                return None;
            }
        }
    }
    Some(format!("{}{}", Value::Object(record), RECORD_DELIMITER))
}

fn channel(state: &AppState, name: &str) -> Result<Arc<ReplicationChannel>, StatusCode> {
    state.registry.require(name).map_err(|e| error_status(&e))
}

/// `POST /sets/{name}/items`
pub async fn add_item(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(doc): Json<Document>,
) -> Result<(StatusCode, Json<AddRecord>), StatusCode> {
    let record = channel(&state, &name)?.add(&doc);
    tracing::debug!(collection = %name, id = %record.id, "Record added");
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /sets/{name}/items/{id}`
pub async fn get_item(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<AddRecord>, StatusCode> {
    channel(&state, &name)?
        .get(&id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// `DELETE /sets/{name}/items/{id}`
pub async fn remove_item(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<AddRecord>, StatusCode> {
    let removed = channel(&state, &name)?.remove(&id);
    match removed {
        Some(record) => {
            tracing::debug!(collection = %name, id = %id, "Record removed");
            Ok(Json(record))
        }
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// `GET /sets/{name}/state`
pub async fn get_state(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SetState>, StatusCode> {
    Ok(Json(channel(&state, &name)?.state()))
}
