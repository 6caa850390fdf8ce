use crate::modules::models::{
    request::{ProgressionQuery, ScheduleRequest},
    response::{
        ErrorResponse, ForceSyncResponse, MessageResponse, ProgressionResponse, ReminderCountResponse,
        StatusResponse,
    },
};
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cf_tracker_libs::{service::ScheduleUpdate, ServiceError, SyncService};
use std::sync::Arc;
use validator::Validate;

fn error_response(status: StatusCode, message: impl ToString) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

pub async fn sync_status(Extension(service): Extension<Arc<SyncService>>) -> Response {
    let jobs = service.status().await;
    (StatusCode::OK, Json(StatusResponse { jobs })).into_response()
}

pub async fn update_schedule(
    Extension(service): Extension<Arc<SyncService>>,
    Json(request): Json<ScheduleRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        tracing::warn!("rejected schedule update: {}", e);
        return error_response(StatusCode::BAD_REQUEST, e);
    }

    let update = ScheduleUpdate::from(request);
    match service.update_schedule(&update).await {
        Ok(()) => {
            let jobs = service.status().await;
            (StatusCode::OK, Json(StatusResponse { jobs })).into_response()
        }
        Err(ServiceError::ScheduleError(e)) => error_response(StatusCode::BAD_REQUEST, e),
        Err(e) => {
            tracing::error!("schedule update failed cause: {:?}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "unexpected error")
        }
    }
}

pub async fn trigger_sync(Extension(service): Extension<Arc<SyncService>>) -> Response {
    match service.trigger_sync() {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(MessageResponse {
                message: "synchronization started".to_string(),
            }),
        )
            .into_response(),
        Err(ServiceError::WorkerError(e)) => {
            tracing::warn!("couldn't queue synchronization: {}", e);
            error_response(StatusCode::SERVICE_UNAVAILABLE, e)
        }
        Err(e) => {
            tracing::error!("trigger failed cause: {:?}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "unexpected error")
        }
    }
}

pub async fn force_sync(Extension(service): Extension<Arc<SyncService>>) -> Response {
    let response = ForceSyncResponse::from(service.force_sync().await);
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response)).into_response()
}

pub async fn rating_progression(
    Extension(service): Extension<Arc<SyncService>>,
    Path(handle): Path<String>,
    Query(query): Query<ProgressionQuery>,
) -> Response {
    if let Err(e) = query.validate() {
        return error_response(StatusCode::BAD_REQUEST, e);
    }

    match service.rating_progression(&handle, query.days).await {
        Ok(progression) => (
            StatusCode::OK,
            Json(ProgressionResponse {
                handle,
                days: query.days,
                anchored_to_current: progression.anchored_to_current,
                points: progression.points,
            }),
        )
            .into_response(),
        Err(e @ ServiceError::ProfileNotFound(_)) => error_response(StatusCode::NOT_FOUND, e),
        Err(e) => {
            tracing::error!("rating progression of {} failed cause: {:?}", handle, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "unexpected error")
        }
    }
}

pub async fn reminder_count(
    Extension(service): Extension<Arc<SyncService>>,
    Path(handle): Path<String>,
) -> Response {
    match service.count_reminders(&handle).await {
        Ok(count) => (StatusCode::OK, Json(ReminderCountResponse { handle, count })).into_response(),
        Err(e @ ServiceError::ProfileNotFound(_)) => error_response(StatusCode::NOT_FOUND, e),
        Err(e) => {
            tracing::error!("reminder count of {} failed cause: {:?}", handle, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "unexpected error")
        }
    }
}

pub async fn liveness(Extension(service): Extension<Arc<SyncService>>) -> StatusCode {
    match service.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::error!("store is unreachable: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
