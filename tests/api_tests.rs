//! End-to-end tests for registration, login, and the post lifecycle.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use papyr::config::Config;
use tower::ServiceExt;

async fn spawn_app() -> Router {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.server.secure_cookies = false;
    config.media.avatar_path = std::env::temp_dir()
        .join(format!("papyr-api-test-{}", uuid::Uuid::new_v4()))
        .display()
        .to_string();

    let state = papyr::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    papyr::api::router(state).await
}

fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn json_request_with_cookie(
    method: &str,
    uri: &str,
    cookie: &str,
    body: &serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_request_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn session_cookie(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("expected a session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn register(app: &Router, username: &str, email: &str, password: &str) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/register/",
            &serde_json::json!({
                "username": username,
                "email": email,
                "password": password,
                "password_confirm": password,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/login/",
            &serde_json::json!({ "email": email, "password": password }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response)
}

async fn create_post(app: &Router, cookie: &str, title: &str, content: &str) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(json_request_with_cookie(
            "POST",
            "/post/new_post",
            cookie,
            &serde_json::json!({ "title": title, "content": content }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    read_json(response).await
}

#[tokio::test]
async fn test_register_login_roundtrip() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/register/",
            &serde_json::json!({
                "username": "alice_writer",
                "email": "alice@example.com",
                "password": "hunter22",
                "password_confirm": "hunter22",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["redirect"], "/login/");
    assert_eq!(body["flash"][0]["category"], "success");
    assert_eq!(
        body["flash"][0]["message"],
        "Account alice_writer registered successfully"
    );

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/login/",
            &serde_json::json!({ "email": "alice@example.com", "password": "hunter22" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);
    let body = read_json(response).await;
    assert_eq!(body["redirect"], "/");
    assert_eq!(body["flash"][0]["message"], "Logged in as alice@example.com");

    // The session opens the members-only area.
    let response = app
        .clone()
        .oneshot(get_request_with_cookie("/post/new_post", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_rejects_duplicates() {
    let app = spawn_app().await;
    register(&app, "alice_writer", "alice@example.com", "hunter22").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/register/",
            &serde_json::json!({
                "username": "alice_writer",
                "email": "other@example.com",
                "password": "hunter22",
                "password_confirm": "hunter22",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["errors"]["username"][0], "Username is already taken");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/register/",
            &serde_json::json!({
                "username": "second_writer",
                "email": "alice@example.com",
                "password": "hunter22",
                "password_confirm": "hunter22",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["errors"]["email"][0], "Email is already registered");
}

#[tokio::test]
async fn test_register_validates_fields() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/register/", &serde_json::json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["errors"]["username"][0], "Username is required");
    assert_eq!(body["errors"]["email"][0], "Email is required");
    assert_eq!(body["errors"]["password"][0], "Password is required");
    assert_eq!(
        body["errors"]["password_confirm"][0],
        "Please repeat the password"
    );

    // Too-short username, bad email, mismatched passwords, all at once.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/register/",
            &serde_json::json!({
                "username": "ab",
                "email": "not-an-email",
                "password": "hunter22",
                "password_confirm": "different",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(
        body["errors"]["username"][0],
        "Must be between 6 and 20 characters"
    );
    assert_eq!(body["errors"]["email"][0], "Invalid email address");
    assert_eq!(
        body["errors"]["password_confirm"][0],
        "Passwords do not match"
    );
    assert!(body["errors"]["password"].is_null());
}

#[tokio::test]
async fn test_login_failures_are_distinguished() {
    let app = spawn_app().await;
    register(&app, "alice_writer", "alice@example.com", "hunter22").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/login/",
            &serde_json::json!({ "email": "alice@example.com", "password": "wrong" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["flash"][0]["category"], "danger");
    assert_eq!(body["flash"][0]["message"], "Incorrect password");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/login/",
            &serde_json::json!({ "email": "nobody@example.com", "password": "hunter22" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(
        body["flash"][0]["message"],
        "No account found for this email, please check the address"
    );
}

#[tokio::test]
async fn test_login_honors_next_parameter() {
    let app = spawn_app().await;
    register(&app, "alice_writer", "alice@example.com", "hunter22").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/login/?next=/users/",
            &serde_json::json!({ "email": "alice@example.com", "password": "hunter22" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["redirect"], "/users/");
}

#[tokio::test]
async fn test_remember_me_login_opens_a_session() {
    let app = spawn_app().await;
    register(&app, "alice_writer", "alice@example.com", "hunter22").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/login/",
            &serde_json::json!({
                "email": "alice@example.com",
                "password": "hunter22",
                "remember": true,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);

    let response = app
        .clone()
        .oneshot(get_request_with_cookie("/users/", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_members_only_routes_redirect_to_login() {
    let app = spawn_app().await;

    for uri in ["/post/new_post", "/users/", "/account/"] {
        let response = app.clone().oneshot(get_request(uri)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = read_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["flash"][0]["category"], "info");
        assert_eq!(
            body["flash"][0]["message"],
            "This page is for members only, please log in"
        );
        assert_eq!(body["redirect"], format!("/login/?next={uri}"));
    }
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = spawn_app().await;
    register(&app, "alice_writer", "alice@example.com", "hunter22").await;
    let cookie = login(&app, "alice@example.com", "hunter22").await;

    let response = app
        .clone()
        .oneshot(get_request_with_cookie("/logout/", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["redirect"], "/");

    // The old cookie no longer opens members-only routes.
    let response = app
        .clone()
        .oneshot(get_request_with_cookie("/post/new_post", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_account_logs_out_to_login_screen() {
    let app = spawn_app().await;
    register(&app, "alice_writer", "alice@example.com", "hunter22").await;
    let cookie = login(&app, "alice@example.com", "hunter22").await;

    let response = app
        .clone()
        .oneshot(get_request_with_cookie("/change_account/", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["redirect"], "/login/");

    let response = app
        .clone()
        .oneshot(get_request_with_cookie("/users/", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_post_lifecycle() {
    let app = spawn_app().await;
    register(&app, "alice_writer", "alice@example.com", "hunter22").await;
    let cookie = login(&app, "alice@example.com", "hunter22").await;

    let body = create_post(&app, &cookie, "First post", "Hello from the tests").await;
    assert_eq!(body["flash"][0]["message"], "Post published successfully");
    assert_eq!(body["redirect"], "/");
    let post_id = body["data"]["id"].as_i64().unwrap();
    let created_at = body["data"]["post_time"].as_str().unwrap().to_string();

    // Publicly visible on the front page.
    let response = app.clone().oneshot(get_request("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["total_items"], 1);
    assert_eq!(body["data"]["posts"][0]["title"], "First post");
    assert_eq!(body["data"]["posts"][0]["author"]["username"], "alice_writer");

    // The detail page needs a session even though the listing does not.
    let response = app
        .clone()
        .oneshot(get_request(&format!("/post/post_detail/{post_id}/")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(get_request_with_cookie(
            &format!("/post/post_detail/{post_id}/"),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Editing replaces the text and refreshes the timestamp.
    let response = app
        .clone()
        .oneshot(json_request_with_cookie(
            "POST",
            &format!("/post/post_update/{post_id}/"),
            &cookie,
            &serde_json::json!({ "title": "First post, edited", "content": "Revised" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["flash"][0]["message"], "Post updated successfully");
    assert_eq!(body["redirect"], format!("/post/post_detail/{post_id}/"));
    assert_eq!(body["data"]["title"], "First post, edited");
    assert_ne!(body["data"]["post_time"].as_str().unwrap(), created_at);

    // Deletion works over a plain GET link.
    let response = app
        .clone()
        .oneshot(get_request_with_cookie(
            &format!("/post/delete_post/{post_id}"),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["flash"][0]["category"], "info");
    assert_eq!(
        body["flash"][0]["message"],
        "Post \"First post, edited\" has been deleted"
    );

    let response = app.clone().oneshot(get_request("/")).await.unwrap();
    let body = read_json(response).await;
    assert_eq!(body["data"]["total_items"], 0);
}

#[tokio::test]
async fn test_post_ownership_enforced() {
    let app = spawn_app().await;
    register(&app, "alice_writer", "alice@example.com", "hunter22").await;
    register(&app, "bob_reader", "bob@example.com", "hunter22").await;

    let alice = login(&app, "alice@example.com", "hunter22").await;
    let body = create_post(&app, &alice, "Alice's post", "Keep out").await;
    let post_id = body["data"]["id"].as_i64().unwrap();

    let bob = login(&app, "bob@example.com", "hunter22").await;

    let response = app
        .clone()
        .oneshot(json_request_with_cookie(
            "POST",
            &format!("/post/post_update/{post_id}/"),
            &bob,
            &serde_json::json!({ "title": "Hijacked", "content": "Mine now" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json(response).await;
    assert_eq!(body["error"], "You are not the author of this post");

    let response = app
        .clone()
        .oneshot(get_request_with_cookie(
            &format!("/post/post_update/{post_id}/"),
            &bob,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(get_request_with_cookie(
            &format!("/post/delete_post/{post_id}"),
            &bob,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Reading somebody else's post is fine.
    let response = app
        .clone()
        .oneshot(get_request_with_cookie(
            &format!("/post/post_detail/{post_id}/"),
            &bob,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_front_page_pagination() {
    let app = spawn_app().await;
    register(&app, "alice_writer", "alice@example.com", "hunter22").await;
    let cookie = login(&app, "alice@example.com", "hunter22").await;

    for i in 1..=25 {
        create_post(&app, &cookie, &format!("Post {i:02}"), "Body").await;
    }

    let response = app.clone().oneshot(get_request("/")).await.unwrap();
    let body = read_json(response).await;
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["total_pages"], 3);
    assert_eq!(body["data"]["total_items"], 25);
    assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 10);
    // Newest first.
    assert_eq!(body["data"]["posts"][0]["title"], "Post 25");
    assert_eq!(body["data"]["posts"][9]["title"], "Post 16");

    let response = app.clone().oneshot(get_request("/?page=3")).await.unwrap();
    let body = read_json(response).await;
    assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 5);
    assert_eq!(body["data"]["posts"][4]["title"], "Post 01");

    // Pages past the end, zero, and negatives do not exist.
    for uri in ["/?page=4", "/?page=0", "/?page=-1"] {
        let response = app.clone().oneshot(get_request(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // Garbage falls back to page one.
    let response = app
        .clone()
        .oneshot(get_request("/?page=banana"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["page"], 1);
}

#[tokio::test]
async fn test_empty_front_page_renders() {
    let app = spawn_app().await;

    let response = app.clone().oneshot(get_request("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["total_items"], 0);
    assert_eq!(body["data"]["page"], 1);
}

#[tokio::test]
async fn test_user_posts_listing() {
    let app = spawn_app().await;
    register(&app, "alice_writer", "alice@example.com", "hunter22").await;
    register(&app, "bob_reader", "bob@example.com", "hunter22").await;

    let alice = login(&app, "alice@example.com", "hunter22").await;
    for i in 1..=3 {
        create_post(&app, &alice, &format!("Alice {i}"), "Body").await;
    }
    let bob = login(&app, "bob@example.com", "hunter22").await;
    create_post(&app, &bob, "Bob 1", "Body").await;

    let response = app
        .clone()
        .oneshot(get_request("/user/alice_writer/posts/"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["user"]["username"], "alice_writer");
    assert_eq!(body["data"]["posts"]["total_items"], 3);
    assert_eq!(body["data"]["posts"]["posts"][0]["title"], "Alice 3");

    let response = app
        .clone()
        .oneshot(get_request("/user/ghost_writer/posts/"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json(response).await;
    assert_eq!(body["error"], "User 'ghost_writer' not found");
}

#[tokio::test]
async fn test_users_directory_is_members_only() {
    let app = spawn_app().await;
    register(&app, "alice_writer", "alice@example.com", "hunter22").await;
    register(&app, "bob_reader", "bob@example.com", "hunter22").await;

    let response = app.clone().oneshot(get_request("/users/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let cookie = login(&app, "alice@example.com", "hunter22").await;
    let response = app
        .clone()
        .oneshot(get_request_with_cookie("/users/", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let users = body["data"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["username"], "alice_writer");
    assert_eq!(users[0]["image_url"], "/static/icon/default.jpg");
}

#[tokio::test]
async fn test_about_page() {
    let app = spawn_app().await;

    let response = app.clone().oneshot(get_request("/about/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["name"], "papyr");
    assert!(body["data"]["version"].is_string());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(get_request("/no/such/page"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
}
