use std::convert::Infallible;
use std::sync::Arc;

use log::{debug, error, warn};
use uuid::Uuid;
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use super::types::{ApiError, HealthResponse};
use crate::data_capture::types::TransactionRecord;
use crate::error_handling::types::IngestError;
use crate::session_management::rotation::RotationEngine;

/// Largest accepted ingest body.
pub const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

fn with_engine(
    engine: Arc<RotationEngine>,
) -> impl Filter<Extract = (Arc<RotationEngine>,), Error = Infallible> + Clone {
    warp::any().map(move || engine.clone())
}

fn error_reply(message: String, status: StatusCode) -> reply::Response {
    reply::with_status(reply::json(&ApiError { message }), status).into_response()
}

/// GET /health
pub fn health_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| reply::json(&HealthResponse { status: "ok" }))
}

/// POST /api/agents/:agent_id/sessions/:session_id/records
pub fn ingest_route(
    engine: Arc<RotationEngine>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "agents" / String / "sessions" / String / "records")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_engine(engine))
        .and_then(ingest_records)
}

/// Runs one engine write for the posted batch.
///
/// Backends block, so the write runs on the blocking pool.
pub async fn ingest_records(
    agent_id: String,
    session_id: String,
    records: Vec<TransactionRecord>,
    engine: Arc<RotationEngine>,
) -> Result<reply::Response, Rejection> {
    let request_id = Uuid::new_v4();
    debug!(
        "[{}] ingest {} record(s) agent={} session={}",
        request_id,
        records.len(),
        agent_id,
        session_id
    );

    let result =
        tokio::task::spawn_blocking(move || engine.write(&agent_id, &session_id, &records)).await;

    let response = match result {
        Ok(Ok(report)) => reply::with_status(reply::json(&report), StatusCode::OK).into_response(),
        Ok(Err(IngestError::InvalidArgument(msg))) => {
            debug!("[{}] rejected: {}", request_id, msg);
            error_reply(msg, StatusCode::BAD_REQUEST)
        }
        Ok(Err(e @ IngestError::PartialRotation { .. })) => {
            warn!("[{}] partial write: {}", request_id, e);
            error_reply(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
        }
        Ok(Err(e)) => {
            error!("[{}] write failed: {}", request_id, e);
            error_reply(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(e) => {
            error!("[{}] write task failed: {}", request_id, e);
            error_reply(
                "Internal error while writing records".to_string(),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    };
    Ok(response)
}
