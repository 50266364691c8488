use std::{convert::Infallible, sync::Arc};

use filters::api_filters;
use warp::{http::Method, http::StatusCode, reject::Rejection, Filter};

use crate::core::db::ParticipantDb;

use handlers::error_reply;

pub mod filters;
pub mod handlers;

async fn handle_rejection(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, msg) = if let Some(err) = err.find::<warp::filters::body::BodyDeserializeError>() {
        log::error!("{}", err);
        (StatusCode::BAD_REQUEST, err.to_string())
    } else if let Some(err) = err.find::<warp::reject::InvalidQuery>() {
        log::error!("Invalid Query: {}", err);
        (StatusCode::BAD_REQUEST, err.to_string())
    } else if let Some(err) = err.find::<warp::reject::MethodNotAllowed>() {
        log::error!("Method Not Allowed: {}", err);
        (StatusCode::METHOD_NOT_ALLOWED, err.to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else {
        log::error!("Unhandled Rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
    };

    Ok(error_reply(msg, code))
}

/// All API routes, with rejections turned into Json errors.
pub fn routes(
    db: Arc<ParticipantDb>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
    api_filters(db).recover(handle_rejection)
}

pub async fn run_http_server(db: Arc<ParticipantDb>, port: u16) -> anyhow::Result<()> {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec![
            "User-Agent",
            "Sec-Fetch-Mode",
            "Referer",
            "Origin",
            "Content-Type",
            "Access-Control-Allow-Origin",
            "Access-Control-Request-Method",
            "Access-Control-Request-Headers",
            "Access-Control-Allow-Headers",
        ])
        .allow_methods(&[
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    log::info!("Serving hacker API on port {}", port);
    warp::serve(routes(db).with(cors))
        .run(([0, 0, 0, 0], port))
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};
    use warp::http::StatusCode;

    use crate::core::db::ParticipantDb;

    use super::routes;

    async fn db() -> Arc<ParticipantDb> {
        Arc::new(ParticipantDb::memory().await.unwrap())
    }

    fn body(res: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    async fn create(db: &Arc<ParticipantDb>, badge: &str, email: &str) -> StatusCode {
        warp::test::request()
            .method("POST")
            .path("/hackers")
            .json(&json!({"name": "Ada", "email": email, "badge_code": badge}))
            .reply(&routes(db.clone()))
            .await
            .status()
    }

    #[tokio::test]
    async fn test_create_get_list() {
        let db = db().await;
        assert_eq!(create(&db, "B1", " Ada@Example.com").await, StatusCode::OK);
        assert_eq!(create(&db, "B2", "ada@example.com").await, StatusCode::CONFLICT);

        let res = warp::test::request()
            .path("/hackers/B1")
            .reply(&routes(db.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let hacker = body(&res);
        assert_eq!(hacker["email"], "ada@example.com");
        assert_eq!(hacker["phone"], Value::Null);
        assert!(hacker["updated_at"].is_i64());
        assert_eq!(hacker["scans"], json!([]));

        let res = warp::test::request()
            .path("/hackers")
            .reply(&routes(db.clone()))
            .await;
        assert_eq!(body(&res).as_array().unwrap().len(), 1);

        let res = warp::test::request()
            .path("/hackers/nobody")
            .reply(&routes(db))
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(body(&res)["error"].is_string());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = db().await;
        create(&db, "B1", "a@x.com").await;
        create(&db, "B2", "b@x.com").await;

        let res = warp::test::request()
            .method("PUT")
            .path("/hackers/B2")
            .json(&json!({"name": "Bea", "email": "A@X.com"}))
            .reply(&routes(db.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res)["name"], "Bea");
        assert_eq!(body(&res)["email"], "b@x.com");

        let res = warp::test::request()
            .method("PUT")
            .path("/hackers/B9")
            .json(&json!({}))
            .reply(&routes(db.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = warp::test::request()
            .method("DELETE")
            .path("/hackers/B1")
            .reply(&routes(db.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res)["message"], "Hacker removed successfully");
        assert!(db.get_participant("B1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scans_and_frequencies() {
        let db = db().await;
        create(&db, "B1", "a@x.com").await;
        create(&db, "B2", "b@x.com").await;

        for badge in ["B1", "B2"] {
            let res = warp::test::request()
                .method("PUT")
                .path(&format!("/scan/{}", badge))
                .json(&json!({"activity_name": "Workshop", "activity_category": "Tech"}))
                .reply(&routes(db.clone()))
                .await;
            assert_eq!(res.status(), StatusCode::OK);
            assert_eq!(body(&res)["scans"][0]["activity_name"], "Workshop");
        }

        let duplicate = warp::test::request()
            .method("PUT")
            .path("/scan/B1")
            .json(&json!({"activity_name": "Workshop", "activity_category": "Tech"}))
            .reply(&routes(db.clone()))
            .await;
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let missing = warp::test::request()
            .method("PUT")
            .path("/scan/B1")
            .json(&json!({"activity_name": "Lunch"}))
            .reply(&routes(db.clone()))
            .await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let unknown = warp::test::request()
            .method("PUT")
            .path("/scan/nobody")
            .json(&json!({"activity_name": "A", "activity_category": "B"}))
            .reply(&routes(db.clone()))
            .await;
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let res = warp::test::request()
            .path("/scans?min_frequency=2&activity_category=Tech")
            .reply(&routes(db.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            body(&res),
            json!([{"activity_name": "Workshop", "activity_category": "Tech", "frequency": 2}])
        );

        let res = warp::test::request()
            .path("/scans?max_frequency=1")
            .reply(&routes(db.clone()))
            .await;
        assert_eq!(body(&res), json!([]));

        let all = json!([{"activity_name": "Workshop", "activity_category": "Tech", "frequency": 2}]);
        for path in [
            "/scans?min_frequency=many",
            "/scans?min_frequency=&max_frequency=",
            "/scans?activity_category=",
        ] {
            let res = warp::test::request()
                .path(path)
                .reply(&routes(db.clone()))
                .await;
            assert_eq!(res.status(), StatusCode::OK, "{}", path);
            assert_eq!(body(&res), all, "{}", path);
        }

        let res = warp::test::request()
            .path("/hackers/B1/scans")
            .reply(&routes(db.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let scans = body(&res);
        assert_eq!(scans.as_array().unwrap().len(), 1);
        assert_eq!(scans[0]["activity_category"], "Tech");
        assert!(scans[0]["scanned_at"].is_i64());

        let res = warp::test::request()
            .path("/hackers/nobody/scans")
            .reply(&routes(db))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res), json!([]));
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let db = db().await;

        let res = warp::test::request()
            .method("POST")
            .path("/hackers")
            .header("content-type", "application/json")
            .body("{not json")
            .reply(&routes(db.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = warp::test::request()
            .path("/nowhere")
            .reply(&routes(db))
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
