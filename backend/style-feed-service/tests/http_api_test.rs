mod common;

use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};
use style_feed_service::config::IndexKind;
use style_feed_service::handlers::{configure, AppState};

macro_rules! app {
    () => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(AppState {
                    engine: common::build_engine(IndexKind::Exact),
                }))
                .configure(configure),
        )
        .await
    };
}

#[actix_rt::test]
async fn test_health() {
    let app = app!();
    let req = test::TestRequest::get().uri("/health").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, web::Bytes::from_static(b"OK"));
}

#[actix_rt::test]
async fn test_feedback_validation() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/feedback")
        .set_json(json!({"user": "demo", "like": 1}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Unknown items are accepted and ignored
    let req = test::TestRequest::post()
        .uri("/feedback")
        .set_json(json!({"user": "demo", "pid": "ghost", "like": 1}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"ok": true}));
}

#[actix_rt::test]
async fn test_next_clamps_n_and_serves_outfits() {
    let app = app!();

    let req = test::TestRequest::get().uri("/next?user=alice&n=0").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let req = test::TestRequest::get().uri("/next?user=bob&n=500").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.as_array().map(Vec::len), Some(61));

    let req = test::TestRequest::post()
        .uri("/feedback")
        .set_json(json!({"user": "carol", "pid": "t1", "like": 1, "dwell_ms": 1200}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::get().uri("/next?user=carol&n=3").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body[0]["is_outfit_suggestion"], true);
    assert_eq!(body[0]["original_item"]["id"], "t1");
    assert_eq!(body[0]["suggested_item"]["type"], "pants");
}

#[actix_rt::test]
async fn test_calibrate() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/calibrate")
        .set_json(json!({"user": "demo", "category": "pants"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"ok": true, "found_items": 10}));

    let req = test::TestRequest::post()
        .uri("/calibrate")
        .set_json(json!({"user": "demo", "category": "tuxedo"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["found_items"], 0);

    let req = test::TestRequest::post()
        .uri("/calibrate")
        .set_json(json!({"user": "demo", "category": ""}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_outfit_not_found_cases() {
    let app = app!();

    let req = test::TestRequest::get().uri("/outfit?pid=j4&user=demo").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["original_item"]["id"], "j4");
    assert!(body["suggested_item"]["id"].is_string());

    let req = test::TestRequest::get().uri("/outfit?pid=nope").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let unknown: Value = test::read_body_json(resp).await;

    let req = test::TestRequest::get().uri("/outfit?pid=hat0").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let unmatched: Value = test::read_body_json(resp).await;

    assert_eq!(unknown["code"], 404);
    assert_ne!(unknown["error"], unmatched["error"]);
}

#[actix_rt::test]
async fn test_debug_item() {
    let app = app!();

    let req = test::TestRequest::get().uri("/debug/item?user=demo").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/feedback")
        .set_json(json!({"user": "demo", "pid": "d0", "saved": true}))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get()
        .uri("/debug/item?url=https://shop.example/d1&user=demo")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["product_details"]["pid"], "d1");
    assert_eq!(body["product_details"]["type"], "dress");
    assert!(body["attr_prefs"]["type"]["dress"].as_f64().unwrap() > 0.0);

    let breakdown = &body["scoring_breakdown"];
    let attribute = breakdown["attribute_score"].as_f64().unwrap();
    let similarity = breakdown["embedding_similarity"].as_f64().unwrap();
    let fused = breakdown["final_combined_score"].as_f64().unwrap();
    assert!(attribute > 0.0);
    assert!((fused - (0.4 * similarity + 0.6 * attribute)).abs() < 1e-4);

    let req = test::TestRequest::get().uri("/debug/item?pid=zzz").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
