//! Queries against a real Postgres. Run with `DATABASE_URL` set and `--ignored`.

use imagic::{
    billing::db::{NewPurchase, Purchase},
    bookmarks::{Bookmark, BookmarkError},
    collections::{Collection, CollectionError, CollectionFields},
    credits::{consume_credit, CreditError},
    identity::UserInfo,
    images::{Image, NewImage},
    pagination::Pagination,
    user::{Session, User},
};
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

fn new_image(user_id: Uuid, prompt: &str) -> NewImage {
    NewImage {
        user_id,
        prompt: prompt.to_string(),
        negative_prompt: None,
        color_scheme: None,
        orientation: "square 1024x1024".to_string(),
        guidance_scale: 7.5,
        seed: Some(1),
        image_url: format!("https://store.test/{}.png", Uuid::new_v4()),
        storage_key: format!("images/{user_id}_{}.png", Uuid::new_v4()),
        created_at: None,
    }
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_signup_credits_only_apply_once(pool: PgPool) {
    let user = User::upsert_from_identity(&pool, &identity("ada"), 5)
        .await
        .unwrap();
    assert_eq!(user.credits, 5);

    let mut conn = pool.acquire().await.unwrap();
    assert_eq!(consume_credit(&mut conn, user.id).await.unwrap(), 4);

    let again = User::upsert_from_identity(&pool, &identity("ada"), 5)
        .await
        .unwrap();
    assert_eq!(again.id, user.id);
    assert_eq!(again.credits, 4);
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_credits_never_go_negative(pool: PgPool) {
    let user = User::upsert_from_identity(&pool, &identity("bob"), 1)
        .await
        .unwrap();
    let mut conn = pool.acquire().await.unwrap();

    assert_eq!(consume_credit(&mut conn, user.id).await.unwrap(), 0);
    assert!(matches!(
        consume_credit(&mut conn, user.id).await,
        Err(CreditError::InsufficientCredits)
    ));
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_purchases_are_recorded_once(pool: PgPool) {
    let user = User::upsert_from_identity(&pool, &identity("cy"), 0)
        .await
        .unwrap();
    let mut conn = pool.acquire().await.unwrap();

    let purchase = NewPurchase {
        user_id: user.id,
        checkout_session_id: "cs_test_1",
        payment_intent_id: Some("pi_test_1"),
        amount: 499,
        credits: 10,
    };

    assert!(Purchase::record(&mut conn, &purchase).await.unwrap().is_some());
    assert!(Purchase::record(&mut conn, &purchase).await.unwrap().is_none());
    assert_eq!(Purchase::history(&pool, user.id).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_feed_shows_only_published_images(pool: PgPool) {
    let owner = User::upsert_from_identity(&pool, &identity("dee"), 0)
        .await
        .unwrap();
    let viewer = User::upsert_from_identity(&pool, &identity("eve"), 0)
        .await
        .unwrap();
    let mut conn = pool.acquire().await.unwrap();

    let public = Image::insert(&mut conn, &new_image(owner.id, "a red fox"))
        .await
        .unwrap();
    Image::insert(&mut conn, &new_image(owner.id, "a private owl"))
        .await
        .unwrap();

    // Only the owner can publish
    assert!(Image::publish(&pool, public.id, viewer.id, None)
        .await
        .unwrap()
        .is_none());
    let published = Image::publish(&pool, public.id, owner.id, Some("Fox"))
        .await
        .unwrap()
        .unwrap();
    assert!(published.published);

    Bookmark::create(&pool, viewer.id, public.id).await.unwrap();

    let (feed, total) = Image::feed(&pool, Some(viewer.id), None, Pagination::default())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(feed[0].image.title.as_deref(), Some("Fox"));
    assert_eq!(feed[0].bookmark_count, 1);
    assert!(feed[0].is_bookmarked);

    let (found, _) = Image::feed(&pool, None, Some("FOX"), Pagination::default())
        .await
        .unwrap();
    assert_eq!(found.len(), 1);

    let (none, _) = Image::feed(&pool, None, Some("owl"), Pagination::default())
        .await
        .unwrap();
    assert!(none.is_empty());

    let (history, total) = Image::history(&pool, owner.id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(history.len(), 2);
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_bookmarks_are_unique(pool: PgPool) {
    let user = User::upsert_from_identity(&pool, &identity("fay"), 0)
        .await
        .unwrap();
    let mut conn = pool.acquire().await.unwrap();
    let image = Image::insert(&mut conn, &new_image(user.id, "a quiet lake"))
        .await
        .unwrap();

    Bookmark::create(&pool, user.id, image.id).await.unwrap();
    assert!(matches!(
        Bookmark::create(&pool, user.id, image.id).await,
        Err(BookmarkError::AlreadyBookmarked)
    ));
    assert!(matches!(
        Bookmark::create(&pool, user.id, Uuid::new_v4()).await,
        Err(BookmarkError::ImageNotFound)
    ));

    Bookmark::remove(&pool, user.id, image.id).await.unwrap();
    assert!(matches!(
        Bookmark::remove(&pool, user.id, image.id).await,
        Err(BookmarkError::NotBookmarked)
    ));
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_collections_belong_to_their_owner(pool: PgPool) {
    let owner = User::upsert_from_identity(&pool, &identity("gus"), 0)
        .await
        .unwrap();
    let stranger = User::upsert_from_identity(&pool, &identity("hal"), 0)
        .await
        .unwrap();
    let mut conn = pool.acquire().await.unwrap();
    let image = Image::insert(&mut conn, &new_image(owner.id, "mountains"))
        .await
        .unwrap();

    let fields = CollectionFields {
        name: "Landscapes".to_string(),
        description: None,
    };
    let collection = Collection::create(&pool, owner.id, &fields).await.unwrap();

    Collection::add_image(&pool, collection.id, owner.id, image.id)
        .await
        .unwrap();
    assert!(matches!(
        Collection::add_image(&pool, collection.id, owner.id, image.id).await,
        Err(CollectionError::AlreadyInCollection)
    ));
    assert!(matches!(
        Collection::add_image(&pool, collection.id, stranger.id, image.id).await,
        Err(CollectionError::NotFound)
    ));

    let (images, total) =
        Collection::images(&pool, collection.id, owner.id, Pagination::default())
            .await
            .unwrap();
    assert_eq!(total, 1);
    assert_eq!(images.len(), 1);

    Collection::delete(&pool, collection.id, owner.id).await.unwrap();
    assert!(matches!(
        Collection::get_owned(&pool, collection.id, owner.id).await,
        Err(CollectionError::NotFound)
    ));
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_invalidated_sessions_are_not_valid(pool: PgPool) {
    let user = User::upsert_from_identity(&pool, &identity("ivy"), 0)
        .await
        .unwrap();

    let mut session = Session::create(&pool, user.id, Some("test".into()), 30)
        .await
        .unwrap();
    assert!(session.is_valid());

    session.invalidate(&pool).await.unwrap();
    let reloaded = Session::get_by_id(&pool, session.id).await.unwrap().unwrap();
    assert!(!reloaded.is_valid());
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_purge_removes_only_long_expired_sessions(pool: PgPool) {
    let user = User::upsert_from_identity(&pool, &identity("jo"), 0)
        .await
        .unwrap();

    let live = Session::create(&pool, user.id, None, 30).await.unwrap();
    let recently_expired = Session::create(&pool, user.id, None, -1).await.unwrap();
    let long_expired = Session::create(&pool, user.id, None, -40).await.unwrap();

    assert_eq!(Session::purge_stale(&pool, 30).await.unwrap(), 1);
    assert!(Session::get_by_id(&pool, live.id).await.unwrap().is_some());
    assert!(Session::get_by_id(&pool, recently_expired.id)
        .await
        .unwrap()
        .is_some());
    assert!(Session::get_by_id(&pool, long_expired.id)
        .await
        .unwrap()
        .is_none());
}
