//! Generation and local image import against a real Postgres. Run with
//! `DATABASE_URL` set and `--ignored`.

mod common;

use axum::http::StatusCode;
use chrono::{TimeZone as _, Utc};
use common::{body_json, json_request, session_cookie, test_app_with_pool, BUCKET};
use imagic::{
    credits::{consume_credit, Requester},
    generation::{
        service::{generate, GenerateError, Generated},
        GenerateImageInput,
    },
    identity::UserInfo,
    images::Image,
    migration::{migrate_local, LocalImage, MigrationStatus},
    pagination::Pagination,
    storage::storage_key,
    user::{Session, User},
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

fn identity(sub: &str) -> UserInfo {
    UserInfo {
        sub: sub.to_string(),
        email: Some(format!("{sub}@example.com")),
        preferred_username: Some(sub.to_string()),
        name: None,
        picture: None,
    }
}

fn input() -> GenerateImageInput {
    GenerateImageInput {
        prompt: "a paper boat on a pond".to_string(),
        orientation: "square 1024x1024".to_string(),
        seed: Some(7),
        ..Default::default()
    }
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_signed_in_generation_spends_a_credit(pool: PgPool) {
    let app = test_app_with_pool(pool.clone()).await;
    let user = User::upsert_from_identity(&pool, &identity("grace"), 1)
        .await
        .unwrap();
    let session = Session::create(&pool, user.id, None, 30).await.unwrap();
    let cookie = session_cookie(&app.state, session.id);

    let body = json!({ "prompt": "a paper boat on a pond", "orientation": "square 1024x1024" });

    let first = app
        .send(json_request("POST", "/api/images/generate", &body, Some(&cookie)))
        .await;
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_json(first).await;
    assert_eq!(first["isAuthenticated"], true);
    assert_eq!(first["limitStatus"]["remaining"], 0);

    let image_id = Uuid::parse_str(first["image"]["id"].as_str().unwrap()).unwrap();
    let mut conn = pool.acquire().await.unwrap();
    let key = format!("images/{}_", user.id);
    let (history, total) = Image::history(&pool, user.id, Pagination::new(1, 10))
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(history[0].image.id, image_id);
    assert!(history[0].image.storage_key.starts_with(&key));
    assert!(Image::get_by_storage_key(&mut conn, &history[0].image.storage_key)
        .await
        .unwrap()
        .is_some());
    assert!(app.storage.contains(BUCKET, &history[0].image.storage_key));

    let refreshed = User::get_by_id(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(refreshed.credits, 0);

    let second = app
        .send(json_request("POST", "/api/images/generate", &body, Some(&cookie)))
        .await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(app.image_model.requests().len(), 1);
    assert_eq!(app.storage.len(), 1);
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_spent_credits_roll_back_the_upload(pool: PgPool) {
    let app = test_app_with_pool(pool.clone()).await;
    let user = User::upsert_from_identity(&pool, &identity("hopper"), 1)
        .await
        .unwrap();

    // Another request spends the last credit after this one loaded the user
    let mut conn = pool.acquire().await.unwrap();
    assert_eq!(consume_credit(&mut conn, user.id).await.unwrap(), 0);
    drop(conn);

    let result = generate(&app.state, Requester::User(user.clone()), input()).await;
    assert!(matches!(result, Err(GenerateError::InsufficientCredits)));
    assert_eq!(
        result.err().map(|err| err.to_json_error().status),
        Some(StatusCode::PAYMENT_REQUIRED)
    );

    assert_eq!(app.image_model.requests().len(), 1);
    assert!(app.storage.is_empty());

    let (history, total) = Image::history(&pool, user.id, Pagination::new(1, 10))
        .await
        .unwrap();
    assert!(history.is_empty());
    assert_eq!(total, 0);

    let refreshed = User::get_by_id(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(refreshed.credits, 0);
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_generation_with_credits_saves_to_history(pool: PgPool) {
    let app = test_app_with_pool(pool.clone()).await;
    let user = User::upsert_from_identity(&pool, &identity("lovelace"), 3)
        .await
        .unwrap();

    let generated = generate(&app.state, Requester::User(user.clone()), input())
        .await
        .unwrap();
    let Generated::Saved { image, limit } = generated else {
        panic!("signed in generations are saved");
    };

    assert_eq!(image.user_id, user.id);
    assert_eq!(image.seed, Some(7));
    assert_eq!(limit.remaining, 2);
    assert_eq!(
        app.storage.get(BUCKET, &image.storage_key).unwrap().content_type,
        "image/png"
    );
}

fn local_image(id: &str, key: &str, claim: String) -> LocalImage {
    LocalImage {
        id: id.to_string(),
        prompt: "a fox in the snow".to_string(),
        negative_prompt: Some(String::new()),
        color_scheme: Some("Cool".to_string()),
        orientation: "landscape 1792x1024".to_string(),
        guidance_scale: 6.5,
        seed: Some(11),
        image_url: "https://elsewhere.test/fox.png".to_string(),
        storage_key: key.to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 5, 20, 8, 15, 0).unwrap(),
        claim,
    }
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_local_images_import_once_with_their_ids(pool: PgPool) {
    let app = test_app_with_pool(pool.clone()).await;
    let user = User::upsert_from_identity(&pool, &identity("turing"), 5)
        .await
        .unwrap();

    let key = storage_key(None, Uuid::new_v4(), "png");
    let made_at = Utc.with_ymd_and_hms(2025, 5, 20, 8, 15, 0).unwrap();
    let claimed = local_image("local-fox", &key, app.state.claims.issue(&key, made_at));
    let item = serde_json::to_value(&claimed).unwrap();

    let forged_key = storage_key(None, Uuid::new_v4(), "png");
    let forged = serde_json::to_value(local_image("local-forged", &forged_key, "00".repeat(32)))
        .unwrap();

    let first = migrate_local(
        &pool,
        &app.state.storage,
        &app.state.claims,
        user.id,
        vec![item.clone(), forged, json!({ "id": "local-junk" })],
    )
    .await;
    assert_eq!(first.len(), 3);
    assert_eq!(first[0].id, "local-fox");
    assert_eq!(first[0].status, MigrationStatus::Migrated);
    assert_eq!(first[1].id, "local-forged");
    assert_eq!(first[1].status, MigrationStatus::Error);
    assert_eq!(first[2].id, "local-junk");
    assert_eq!(first[2].status, MigrationStatus::Error);
    let image_id = first[0].image_id.unwrap();

    let second = migrate_local(
        &pool,
        &app.state.storage,
        &app.state.claims,
        user.id,
        vec![item],
    )
    .await;
    assert_eq!(second[0].id, "local-fox");
    assert_eq!(second[0].status, MigrationStatus::Skipped);
    assert_eq!(second[0].image_id, Some(image_id));

    let mut conn = pool.acquire().await.unwrap();
    let stored = Image::get_by_storage_key(&mut conn, &key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, image_id);
    assert_eq!(stored.user_id, user.id);
    assert_eq!(stored.created_at_utc, made_at);
    assert_eq!(stored.negative_prompt, None);
    assert_eq!(stored.image_url, app.state.storage.public_url(&key));
    assert!(Image::get_by_storage_key(&mut conn, &forged_key)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_import_route_reports_local_ids(pool: PgPool) {
    let app = test_app_with_pool(pool.clone()).await;
    let user = User::upsert_from_identity(&pool, &identity("hamilton"), 5)
        .await
        .unwrap();
    let session = Session::create(&pool, user.id, None, 30).await.unwrap();
    let cookie = session_cookie(&app.state, session.id);

    let key = storage_key(None, Uuid::new_v4(), "png");
    let made_at = Utc.with_ymd_and_hms(2025, 5, 20, 8, 15, 0).unwrap();
    let claimed = local_image("local-route", &key, app.state.claims.issue(&key, made_at));

    let response = app
        .send(json_request(
            "POST",
            "/api/images/migrate-local",
            &json!({ "localImages": [claimed] }),
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let result = &body["results"][0];
    assert_eq!(result["id"], "local-route");
    assert_eq!(result["status"], "migrated");
    assert!(result["imageId"].is_string());
}
