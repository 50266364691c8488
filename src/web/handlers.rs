use std::{convert::Infallible, sync::Arc};

use serde::Serialize;
use warp::{
    http::StatusCode,
    reply::{Json, WithStatus},
};

use crate::{
    core::{
        db::ParticipantDb,
        frequency::FrequencyQuery,
        participant::{self, NewParticipant, ParticipantUpdate},
        scan::{self, ScanRequest},
    },
    error::StoreError,
};

/// A Json body carrying a status message
#[derive(Serialize, Debug)]
pub struct Message {
    pub message: String,
}

/// A Json body carrying an error description
#[derive(Serialize, Debug)]
pub struct ErrorMessage {
    pub error: String,
}

pub fn status_of(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        StoreError::ConstraintViolation(_) => StatusCode::CONFLICT,
        StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_reply(message: String, code: StatusCode) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(&ErrorMessage { error: message }), code)
}

fn store_error_reply(err: StoreError) -> WithStatus<Json> {
    let code = status_of(&err);
    if code == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("{}", err);
    } else {
        log::warn!("{}", err);
    }

    error_reply(err.to_string(), code)
}

pub fn to_http_output<T: Serialize>(
    result: Result<T, StoreError>,
) -> Result<WithStatus<Json>, Infallible> {
    match result {
        Ok(data) => Ok(warp::reply::with_status(
            warp::reply::json(&data),
            StatusCode::OK,
        )),
        Err(e) => Ok(store_error_reply(e)),
    }
}

pub fn to_http_message(
    result: Result<(), StoreError>,
    message: &str,
) -> Result<WithStatus<Json>, Infallible> {
    to_http_output(result.map(|_| Message {
        message: message.to_string(),
    }))
}

pub async fn list_hackers(db: Arc<ParticipantDb>) -> Result<WithStatus<Json>, Infallible> {
    to_http_output(participant::list_participants(&db).await)
}

pub async fn create_hacker(
    new_participant: NewParticipant,
    db: Arc<ParticipantDb>,
) -> Result<WithStatus<Json>, Infallible> {
    to_http_output(participant::create_participant(&db, &new_participant).await)
}

pub async fn get_hacker(
    badge_code: String,
    db: Arc<ParticipantDb>,
) -> Result<WithStatus<Json>, Infallible> {
    to_http_output(participant::get_participant(&db, &badge_code).await)
}

pub async fn update_hacker(
    badge_code: String,
    update: ParticipantUpdate,
    db: Arc<ParticipantDb>,
) -> Result<WithStatus<Json>, Infallible> {
    to_http_output(participant::update_participant(&db, &badge_code, &update).await)
}

pub async fn delete_hacker(
    badge_code: String,
    db: Arc<ParticipantDb>,
) -> Result<WithStatus<Json>, Infallible> {
    to_http_message(
        participant::delete_participant(&db, &badge_code).await,
        "Hacker removed successfully",
    )
}

pub async fn list_hacker_scans(
    badge_code: String,
    db: Arc<ParticipantDb>,
) -> Result<WithStatus<Json>, Infallible> {
    to_http_output(db.list_scans(&badge_code).await)
}

pub async fn add_scan(
    badge_code: String,
    request: ScanRequest,
    db: Arc<ParticipantDb>,
) -> Result<WithStatus<Json>, Infallible> {
    to_http_output(
        scan::record_scan(
            &db,
            &badge_code,
            &request.activity_name,
            &request.activity_category,
        )
        .await,
    )
}

pub async fn scan_frequencies(
    query: FrequencyQuery,
    db: Arc<ParticipantDb>,
) -> Result<WithStatus<Json>, Infallible> {
    to_http_output(db.scan_frequencies(&query).await)
}
