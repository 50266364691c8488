use std::{convert::Infallible, sync::Arc};

use warp::{reject::Rejection, Filter};

use crate::core::{db::ParticipantDb, frequency::FrequencyQuery};

use super::handlers;

pub fn with_db(
    db: Arc<ParticipantDb>,
) -> impl Filter<Extract = (Arc<ParticipantDb>,), Error = Infallible> + Clone {
    warp::any().map(move || db.clone())
}

fn hacker_filters(
    db: Arc<ParticipantDb>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let list_hackers = warp::path!("hackers")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(handlers::list_hackers);

    let create_hacker = warp::path!("hackers")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(handlers::create_hacker);

    let get_hacker = warp::path!("hackers" / String)
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(handlers::get_hacker);

    let update_hacker = warp::path!("hackers" / String)
        .and(warp::put())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(handlers::update_hacker);

    let delete_hacker = warp::path!("hackers" / String)
        .and(warp::delete())
        .and(with_db(db.clone()))
        .and_then(handlers::delete_hacker);

    let list_hacker_scans = warp::path!("hackers" / String / "scans")
        .and(warp::get())
        .and(with_db(db))
        .and_then(handlers::list_hacker_scans);

    list_hackers
        .or(create_hacker)
        .or(get_hacker)
        .or(update_hacker)
        .or(delete_hacker)
        .or(list_hacker_scans)
}

fn scan_filters(
    db: Arc<ParticipantDb>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let add_scan = warp::path!("scan" / String)
        .and(warp::put())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(handlers::add_scan);

    let scan_frequencies = warp::path!("scans")
        .and(warp::get())
        .and(warp::query::<FrequencyQuery>())
        .and(with_db(db))
        .and_then(handlers::scan_frequencies);

    add_scan.or(scan_frequencies)
}

pub fn api_filters(
    db: Arc<ParticipantDb>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    hacker_filters(db.clone()).or(scan_filters(db))
}
