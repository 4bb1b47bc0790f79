// 通过路由驱动整站的端到端测试

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use rust_cms::auth;
use rust_cms::mail::MemoryMailer;
use rust_cms::models::{CommentStatus, NewUser, PageInput, PostInput, Publication, PublishStatus};
use rust_cms::{web, Config, Engine, Store};

struct Site {
    engine: Arc<Engine>,
    mailer: Arc<MemoryMailer>,
    _dir: tempfile::TempDir,
}

impl Site {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            url: "http://cms.test".to_string(),
            media_dir: dir.path().join("media"),
            static_dir: dir.path().join("static"),
            ..Config::default()
        };
        let mailer = Arc::new(MemoryMailer::new());
        let engine = Engine::with_parts(config, Store::open_in_memory().unwrap(), mailer.clone()).unwrap();
        engine.ensure_dirs().unwrap();
        Self {
            engine: Arc::new(engine),
            mailer,
            _dir: dir,
        }
    }

    fn app(&self) -> Router {
        web::router(self.engine.clone())
    }

    fn user(&self, username: &str, staff: bool) -> (i64, String) {
        let user = auth::create_user(
            &self.engine.store,
            &NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password: "password123".to_string(),
                is_staff: staff,
                ..NewUser::default()
            },
        )
        .unwrap();
        let token = auth::login(&self.engine.store, &user, 1).unwrap();
        (user.id, token)
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, body: &str, session: Option<&str>) -> Response<Body> {
        let mut request = Request::post(uri).header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(token) = session {
            request = request.header(COOKIE, format!("cms_session={token}"));
        }
        self.send(request.body(Body::from(body.to_string())).unwrap()).await
    }

    async fn api(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response<Body> {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                request = request.header(CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.send(request.body(body).unwrap()).await
    }
}

async fn text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn json_body(response: Response<Body>) -> Value {
    serde_json::from_str(&text(response).await).unwrap()
}

fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

fn location(response: &Response<Body>) -> &str {
    response.headers().get(LOCATION).unwrap().to_str().unwrap()
}

fn published() -> Publication {
    Publication {
        status: PublishStatus::Published,
        published_at: None,
    }
}

#[tokio::test]
async fn homepage_needs_a_published_page() {
    let site = Site::new();
    let response = site.get("/").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(text(response).await.contains("Page not found"));

    site.engine
        .store
        .create_page(&PageInput {
            title: "Welcome".to_string(),
            content: "Hello **world**".to_string(),
            is_homepage: true,
            publication: published(),
            ..PageInput::default()
        })
        .unwrap();
    let response = site.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = text(response).await;
    assert!(html.contains("Welcome"));
    assert!(html.contains("<strong>world</strong>"));
}

#[tokio::test]
async fn drafts_stay_hidden() {
    let site = Site::new();
    let (author, _) = site.user("alice", false);
    site.engine
        .store
        .create_post(
            &PostInput {
                title: "Secret plans".to_string(),
                content: "draft".to_string(),
                ..PostInput::default()
            },
            author,
        )
        .unwrap();
    site.engine
        .store
        .create_post(
            &PostInput {
                title: "Launch day".to_string(),
                content: "We are live".to_string(),
                publication: published(),
                ..PostInput::default()
            },
            author,
        )
        .unwrap();

    let html = text(site.get("/blog/").await).await;
    assert!(html.contains("Launch day"));
    assert!(!html.contains("Secret plans"));

    assert_eq!(site.get("/blog/post/secret-plans/").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(site.get("/blog/post/launch-day/").await.status(), StatusCode::OK);

    let response = site.get("/blog/feed.rss").await;
    assert_eq!(response.status(), StatusCode::OK);
    let feed = text(response).await;
    assert!(feed.contains("Launch day"));
    assert!(!feed.contains("Secret plans"));

    let sitemap = text(site.get("/sitemap.xml").await).await;
    assert!(sitemap.contains("http://cms.test/blog/post/launch-day/"));
    assert!(!sitemap.contains("secret-plans"));
}

#[tokio::test]
async fn login_sets_session_cookie() {
    let site = Site::new();
    site.user("alice", false);

    let response = site
        .post_form("/login/", "username=alice&password=wrong&next=", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("Please enter a correct username and password."));

    let response = site
        .post_form("/login/", "username=alice&password=password123&next=%2Fprofile%2F", None)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/");
    let cookie = set_cookies(&response)
        .into_iter()
        .find(|c| c.starts_with("cms_session="))
        .unwrap();
    let token = cookie
        .trim_start_matches("cms_session=")
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let response = site
        .send(
            Request::get("/profile/")
                .header(COOKIE, format!("cms_session={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("alice"));
}

#[tokio::test]
async fn anonymous_profile_redirects_to_login() {
    let site = Site::new();
    let response = site.get("/profile/").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login/?next=%2Fprofile%2F");
}

#[tokio::test]
async fn anonymous_comment_waits_for_moderation() {
    let site = Site::new();
    let (author, _) = site.user("alice", false);
    let post = site
        .engine
        .store
        .create_post(
            &PostInput {
                title: "Hello".to_string(),
                publication: published(),
                ..PostInput::default()
            },
            author,
        )
        .unwrap();

    let response = site
        .post_form(
            &format!("/comments/post/post/{}/", post.id),
            "author_name=Bob&author_email=bob%40example.com&content=Nice+post",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/blog/post/hello/");
    assert!(set_cookies(&response).iter().any(|c| c.starts_with("cms_flash=")));

    let comments = site.engine.store.list_comments(None).unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].status, CommentStatus::Pending);

    let response = site
        .post_form("/comments/post/post/999/", "content=Hi", None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_api_requires_staff() {
    let site = Site::new();
    let (_, member) = site.user("member", false);
    let (_, admin) = site.user("admin", true);

    let response = site.api("GET", "/admin/api/pages", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = site.api("GET", "/admin/api/pages", Some(&member), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = site
        .api(
            "POST",
            "/admin/api/pages",
            Some(&admin),
            Some(json!({ "title": "About us", "content": "Who we are", "status": "published" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let page = json_body(response).await;
    assert_eq!(page["slug"], "about-us");
    let id = page["id"].as_i64().unwrap();

    let response = site
        .api(
            "POST",
            "/admin/api/pages",
            Some(&admin),
            Some(json!({ "title": "Another", "slug": "about-us" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    assert_eq!(site.get("/page/about-us/").await.status(), StatusCode::OK);

    let response = site
        .api(
            "POST",
            "/admin/api/pages/actions",
            Some(&admin),
            Some(json!({ "action": "draft", "ids": [id] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["affected"], 1);
    assert_eq!(site.get("/page/about-us/").await.status(), StatusCode::NOT_FOUND);

    let response = site
        .api("DELETE", &format!("/admin/api/pages/{id}"), Some(&admin), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = site
        .api("GET", &format!("/admin/api/pages/{id}"), Some(&admin), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn subscribe_sends_confirmation() {
    let site = Site::new();
    let response = site
        .post_form("/newsletter/subscribe/", "email=reader%40example.com&name=Reader", None)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/newsletter/subscribe/success/");

    let sent = site.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["reader@example.com".to_string()]);
    assert!(sent[0].body.contains("http://cms.test/newsletter/confirm/"));

    let response = site
        .post_form("/newsletter/subscribe/", "email=reader%40example.com&name=Again", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("This email address is already subscribed."));

    let subscriber = &site.engine.store.list_subscribers().unwrap()[0];
    assert!(!subscriber.is_active);
    let response = site
        .get(&format!("/newsletter/confirm/{}/", subscriber.confirmation_token))
        .await;
    assert_eq!(location(&response), "/newsletter/confirm/success/");
    assert!(site.engine.store.list_subscribers().unwrap()[0].is_active);
}

#[tokio::test]
async fn upload_without_file_is_rejected() {
    let site = Site::new();
    let (_, token) = site.user("alice", false);
    let boundary = "XBOUNDARY";
    let body = format!("--{boundary}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nNothing\r\n--{boundary}--\r\n");
    let response = site
        .send(
            Request::post("/media-library/upload/")
                .header(CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
                .header(COOKIE, format!("cms_session={token}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "No file provided");
}

#[tokio::test]
async fn upload_stores_file() {
    let site = Site::new();
    let (_, token) = site.user("alice", false);
    let boundary = "XBOUNDARY";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"Team Photo.PNG\"\r\nContent-Type: image/png\r\n\r\nPNGDATA\r\n--{boundary}--\r\n"
    );
    let response = site
        .send(
            Request::post("/media-library/upload/")
                .header(CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
                .header(COOKIE, format!("cms_session={token}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let item = json_body(response).await;
    assert_eq!(item["title"], "Team Photo");
    assert_eq!(item["file_type"], "image");
    let url = item["url"].as_str().unwrap();
    assert!(url.starts_with("/media/library/"));
    assert!(url.ends_with("team-photo.png"));

    let stored = site.engine.media_dir().join(url.trim_start_matches("/media/"));
    assert_eq!(std::fs::read(stored).unwrap(), b"PNGDATA");
}

#[tokio::test]
async fn unknown_routes_render_not_found_page() {
    let site = Site::new();
    let response = site.get("/no/such/place").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response
        .headers()
        .get(CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
}

#[tokio::test]
async fn huge_page_numbers_fall_back_to_first_page() {
    let site = Site::new();
    let (author, _) = site.user("alice", false);
    site.engine
        .store
        .create_post(
            &PostInput {
                title: "Launch day".to_string(),
                publication: published(),
                ..PostInput::default()
            },
            author,
        )
        .unwrap();
    site.engine
        .store
        .create_page(&PageInput {
            title: "About us".to_string(),
            publication: published(),
            ..PageInput::default()
        })
        .unwrap();

    let response = site.get("/blog/?page=1000000000000000000").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("Launch day"));

    let response = site.get("/pages/?page=18446744073709551615").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("About us"));

    let response = site.get("/search/?q=launch&page=18446744073709551615").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn newsletter_tokens_only_work_for_their_own_link() {
    let site = Site::new();
    site.post_form("/newsletter/subscribe/", "email=reader%40example.com&name=Reader", None)
        .await;
    let subscriber = site.engine.store.list_subscribers().unwrap().remove(0);

    let response = site
        .get(&format!("/newsletter/confirm/{}/", subscriber.unsubscribe_token))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(!site.engine.store.list_subscribers().unwrap()[0].is_active);

    let response = site
        .get(&format!("/newsletter/unsubscribe/{}/", subscriber.confirmation_token))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = site
        .get(&format!("/newsletter/unsubscribe/{}/", subscriber.unsubscribe_token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn forwarded_for_header_is_not_recorded_by_default() {
    let site = Site::new();
    let (author, _) = site.user("alice", false);
    let post = site
        .engine
        .store
        .create_post(
            &PostInput {
                title: "Hello".to_string(),
                publication: published(),
                ..PostInput::default()
            },
            author,
        )
        .unwrap();

    let request = Request::post(format!("/comments/post/post/{}/", post.id))
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-forwarded-for", "203.0.113.9")
        .body(Body::from("author_name=Bob&author_email=bob%40example.com&content=Nice+post"))
        .unwrap();
    assert_eq!(site.send(request).await.status(), StatusCode::SEE_OTHER);

    let comments = site.engine.store.list_comments(None).unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].ip_address, None);
}
