use blogicum::{
    AppConfig, AppState, FixedClock, InMemoryRepository, create_router,
    models::{Category, Post, PostDetail, PostPage, User},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::{StatusCode, header};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub repo: Arc<InMemoryRepository>,
    pub author: User,
    pub visitor: User,
    pub admin: User,
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn user(username: &str, role: &str) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        role: role.to_string(),
        ..User::default()
    }
}

async fn spawn_app() -> TestApp {
    let clock = Arc::new(FixedClock(now()));
    let repo = Arc::new(InMemoryRepository::with_clock(clock.clone()));

    let author = repo.insert_user(user("author", "user")).await;
    let visitor = repo.insert_user(user("visitor", "user")).await;
    let admin = repo.insert_user(user("admin", "admin")).await;

    // Local env enables the x-user-id header used below.
    let state = AppState {
        repo: repo.clone(),
        clock,
        config: AppConfig::default(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        author,
        visitor,
        admin,
    }
}

/// A client that reports redirects instead of following them.
fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

impl TestApp {
    async fn seed_post(&self, is_published: bool, pub_date: DateTime<Utc>) -> Post {
        self.repo
            .insert_post(Post {
                title: "Seeded".to_string(),
                text: "Body".to_string(),
                pub_date,
                created_at: pub_date,
                author_id: self.author.id,
                is_published,
                ..Post::default()
            })
            .await
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = client()
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_home_feed_is_public_and_filtered() {
    let app = spawn_app().await;
    let visible = app.seed_post(true, now() - Duration::hours(1)).await;
    app.seed_post(false, now() - Duration::hours(1)).await;
    app.seed_post(true, now() + Duration::hours(1)).await;

    let response = client()
        .get(format!("{}/?page=abc", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let page: PostPage = response.json().await.unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.total, 1);
    assert_eq!(page.posts[0].id, visible.id);
}

#[tokio::test]
async fn test_post_lifecycle() {
    let app = spawn_app().await;
    let http = client();

    // Anonymous clients cannot write.
    let anonymous = http
        .post(format!("{}/posts", app.address))
        .json(&serde_json::json!({ "title": "T", "text": "B", "pub_date": now() }))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    // Scheduled for tomorrow: the author sees it, visitors do not.
    let created = http
        .post(format!("{}/posts", app.address))
        .header("x-user-id", app.author.id.to_string())
        .json(&serde_json::json!({
            "title": "Tomorrow",
            "text": "Scheduled",
            "pub_date": now() + Duration::days(1),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let post: Post = created.json().await.unwrap();

    let as_visitor = http
        .get(format!("{}/posts/{}", app.address, post.id))
        .header("x-user-id", app.visitor.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(as_visitor.status(), StatusCode::NOT_FOUND);

    let as_author = http
        .get(format!("{}/posts/{}", app.address, post.id))
        .header("x-user-id", app.author.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(as_author.status(), StatusCode::OK);
    let detail: PostDetail = as_author.json().await.unwrap();
    assert_eq!(detail.post.title, "Tomorrow");

    // The author deletes it; afterwards nobody finds it.
    let deleted = http
        .delete(format!("{}/posts/{}", app.address, post.id))
        .header("x-user-id", app.author.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let gone = http
        .get(format!("{}/posts/{}", app.address, post.id))
        .header("x-user-id", app.author.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_owner_edit_answers_see_other() {
    let app = spawn_app().await;
    let post = app.seed_post(true, now() - Duration::hours(1)).await;

    let response = client()
        .put(format!("{}/posts/{}", app.address, post.id))
        .header("x-user-id", app.visitor.id.to_string())
        .json(&serde_json::json!({ "title": "Hijacked" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        format!("/posts/{}", post.id)
    );
}

#[tokio::test]
async fn test_non_owner_delete_answers_not_found() {
    let app = spawn_app().await;
    let post = app.seed_post(true, now() - Duration::hours(1)).await;

    let response = client()
        .delete(format!("{}/posts/{}", app.address, post.id))
        .header("x-user-id", app.visitor.id.to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Resource not found");
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = spawn_app().await;
    let category = app
        .repo
        .insert_category(Category {
            title: "News".to_string(),
            slug: "news".to_string(),
            is_published: true,
            created_at: now(),
            ..Category::default()
        })
        .await;
    let http = client();
    let status_url = format!("{}/admin/categories/{}/status", app.address, category.id);

    let anonymous = http.put(&status_url).json(&false).send().await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let regular = http
        .put(&status_url)
        .header("x-user-id", app.author.id.to_string())
        .json(&false)
        .send()
        .await
        .unwrap();
    assert_eq!(regular.status(), StatusCode::FORBIDDEN);

    let admin = http
        .put(&status_url)
        .header("x-user-id", app.admin.id.to_string())
        .json(&false)
        .send()
        .await
        .unwrap();
    assert_eq!(admin.status(), StatusCode::OK);

    let feed = http
        .get(format!("{}/category/news", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(feed.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_page_by_username() {
    let app = spawn_app().await;
    app.seed_post(true, now() - Duration::hours(1)).await;
    app.seed_post(false, now() - Duration::hours(1)).await;

    let response = client()
        .get(format!("{}/profile/author", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["profile"]["username"], "author");
    assert_eq!(body["page"]["total"], 1);

    let missing = client()
        .get(format!("{}/profile/nobody", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
