mod common;

use std::{path::Path, sync::Arc};

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{PASSWORD, multipart_body, multipart_request, png, setup_test_app, setup_test_app_with, test_config};
use serde_json::json;
use tourbook::{email::MemoryMailer, models::user::Role};

fn signup_body(email: &str) -> serde_json::Value {
    json!({
        "name": "Jonas",
        "email": email,
        "password": "secret-pass",
        "passwordConfirm": "secret-pass"
    })
}

fn reset_token(text: &str) -> String {
    let start = text.find("resetpassword/").unwrap() + "resetpassword/".len();
    let rest = &text[start..];
    rest[..rest.find(".\n").unwrap()].to_string()
}

#[tokio::test]
async fn test_signup_issues_token_and_cookie() {
    let app = setup_test_app().await;

    let response = app
        .post("/api/v1/users/signup", None, signup_body("Jonas@Example.com"))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["status"], "success");
    assert!(response.body["token"].as_str().is_some_and(|token| !token.is_empty()));

    let user = &response.body["data"]["user"];
    assert_eq!(user["email"], "jonas@example.com");
    assert_eq!(user["role"], "user");
    assert_eq!(user["photo"], "default.jpg");
    assert!(user.get("password").is_none());

    let cookie = response.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("jwt="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_signup_validation() {
    let app = setup_test_app().await;

    let mut body = signup_body("jonas@example.com");
    body["passwordConfirm"] = json!("different-pass");
    let response = app.post("/api/v1/users/signup", None, body).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["errors"].is_array());

    let response = app
        .post("/api/v1/users/signup", None, signup_body("jonas@example.com"))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let response = app
        .post("/api/v1/users/signup", None, signup_body("jonas@example.com"))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_signup_ignores_role_in_body() {
    let app = setup_test_app().await;
    let mut body = signup_body("sneaky@example.com");
    body["role"] = json!("admin");

    let response = app.post("/api/v1/users/signup", None, body).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["data"]["user"]["role"], "user");
}

#[tokio::test]
async fn test_login() {
    let app = setup_test_app().await;
    app.create_user("Laura", "laura@example.com", Role::User).await;

    let response = app
        .post("/api/v1/users/login", None, json!({"email": "laura@example.com"}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Please provide email and password");

    let response = app
        .post(
            "/api/v1/users/login",
            None,
            json!({"email": "laura@example.com", "password": "wrong-password"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["message"], "Incorrect email or password");

    let response = app
        .post(
            "/api/v1/users/login",
            None,
            json!({"email": "nobody@example.com", "password": PASSWORD}),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["message"], "Incorrect email or password");

    let response = app
        .post(
            "/api/v1/users/login",
            None,
            json!({"email": "laura@example.com", "password": PASSWORD}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let token = response.body["token"].as_str().unwrap().to_string();

    let response = app.get("/api/v1/users/me", Some(&token)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["doc"]["email"], "laura@example.com");
}

#[tokio::test]
async fn test_protected_routes_require_a_valid_token() {
    let app = setup_test_app().await;

    let response = app.get("/api/v1/users/me", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.body["message"],
        "You are not logged in! Please log in to get access"
    );

    let response = app.get("/api/v1/users/me", Some("not-a-token")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_is_read_from_cookie() {
    let app = setup_test_app().await;
    let (_, token) = app.create_user("Cookie", "cookie@example.com", Role::User).await;

    let request = Request::builder()
        .uri("/api/v1/users/me")
        .header(header::COOKIE, format!("jwt={token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_deactivated_user_token_is_rejected() {
    let app = setup_test_app().await;
    let (_, token) = app.create_user("Gone", "gone@example.com", Role::User).await;

    let response = app.delete("/api/v1/users/deleteme", Some(&token)).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = app.get("/api/v1/users/me", Some(&token)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.body["message"],
        "The user belonging to this token no longer exists"
    );

    let response = app
        .post(
            "/api/v1/users/login",
            None,
            json!({"email": "gone@example.com", "password": PASSWORD}),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_replaces_cookie() {
    let app = setup_test_app().await;

    let response = app.get("/api/v1/users/logout", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"status": "success"}));
    let cookie = response.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("jwt=loggedout"));
}

#[tokio::test]
async fn test_forgot_and_reset_password() {
    let app = setup_test_app().await;
    app.create_user("Forgetful", "forgetful@example.com", Role::User).await;

    let response = app
        .post(
            "/api/v1/users/forgetpassword",
            None,
            json!({"email": "unknown@example.com"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        response.body["message"],
        "There is no user with that email address"
    );

    let response = app
        .post(
            "/api/v1/users/forgetpassword",
            None,
            json!({"email": "forgetful@example.com"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Token sent to email!");

    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "forgetful@example.com");
    let token = reset_token(&sent[0].text);

    let new_password = json!({"password": "brand-new-pass", "passwordConfirm": "brand-new-pass"});
    let response = app
        .patch("/api/v1/users/resetpassword/bogus", None, new_password.clone())
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Token is invalid or has expired");

    let response = app
        .patch(
            &format!("/api/v1/users/resetpassword/{token}"),
            None,
            new_password.clone(),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["token"].is_string());

    // Tokens are single use.
    let response = app
        .patch(
            &format!("/api/v1/users/resetpassword/{token}"),
            None,
            new_password,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .post(
            "/api/v1/users/login",
            None,
            json!({"email": "forgetful@example.com", "password": "brand-new-pass"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_forgot_password_mail_failure() {
    let app = setup_test_app_with(test_config(), Arc::new(MemoryMailer::failing())).await;
    app.create_user("Unlucky", "unlucky@example.com", Role::User).await;

    let response = app
        .post(
            "/api/v1/users/forgetpassword",
            None,
            json!({"email": "unlucky@example.com"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["status"], "error");
    assert_eq!(
        response.body["message"],
        "There was an error sending the email. Try again later!"
    );
}

#[tokio::test]
async fn test_update_my_password() {
    let app = setup_test_app().await;
    let (_, token) = app.create_user("Careful", "careful@example.com", Role::User).await;

    let response = app
        .patch(
            "/api/v1/users/updatemypassword",
            Some(&token),
            json!({
                "passwordCurrent": "not-my-password",
                "password": "another-pass",
                "passwordConfirm": "another-pass"
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["message"], "Your current password is wrong");

    let response = app
        .patch(
            "/api/v1/users/updatemypassword",
            Some(&token),
            json!({
                "passwordCurrent": PASSWORD,
                "password": "another-pass",
                "passwordConfirm": "another-pass"
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["token"].is_string());

    let response = app
        .post(
            "/api/v1/users/login",
            None,
            json!({"email": "careful@example.com", "password": "another-pass"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_me() {
    let app = setup_test_app().await;
    let (_, token) = app.create_user("Before", "before@example.com", Role::User).await;

    let response = app
        .patch(
            "/api/v1/users/updateme",
            Some(&token),
            json!({"name": "After", "password": "sneaky-pass"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body["errors"][0],
        "This route is not for password updates. Please use /updatemypassword"
    );

    let response = app
        .patch(
            "/api/v1/users/updateme",
            Some(&token),
            json!({"name": "After", "email": "After@Example.com", "role": "admin"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let user = &response.body["data"]["user"];
    assert_eq!(user["name"], "After");
    assert_eq!(user["email"], "after@example.com");
    assert_eq!(user["role"], "user");
    assert_eq!(user["__v"], 1);
}

#[tokio::test]
async fn test_update_me_with_photo() {
    let app = setup_test_app().await;
    let (user, token) = app.create_user("Photo", "photo@example.com", Role::User).await;

    let body = multipart_body(&[
        ("name", None, "text/plain", b"Pictured".to_vec()),
        ("photo", Some("me.png"), "image/png", png(64, 48)),
    ]);
    let response = app
        .send(multipart_request("PATCH", "/api/v1/users/updateme", &token, body))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let photo = response.body["data"]["user"]["photo"].as_str().unwrap().to_string();
    assert!(photo.starts_with(&format!("user-{}-", user.id)));
    assert!(Path::new(&photo).extension().is_some_and(|ext| ext == "jpeg"));
    assert_eq!(response.body["data"]["user"]["name"], "Pictured");

    let stored = app.state.config.public_dir.join("img/users").join(&photo);
    let (width, height) = image::image_dimensions(&stored).unwrap();
    assert_eq!((width, height), (500, 500));

    let response = app.get(&format!("/img/users/{photo}"), None).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_me_rejects_non_images() {
    let app = setup_test_app().await;
    let (_, token) = app.create_user("Text", "text@example.com", Role::User).await;

    let body = multipart_body(&[("photo", Some("notes.txt"), "text/plain", b"hello".to_vec())]);
    let response = app
        .send(multipart_request("PATCH", "/api/v1/users/updateme", &token, body))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body["message"],
        "Not an image! Please upload only images."
    );
}

#[tokio::test]
async fn test_update_me_rejects_multipart_without_boundary() {
    let app = setup_test_app().await;
    let (_, token) = app.create_user("Plain", "plain@example.com", Role::User).await;

    let request = Request::builder()
        .method("PATCH")
        .uri("/api/v1/users/updateme")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "multipart/form-data")
        .body(Body::from("name=Nobody"))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["status"], "fail");
    assert!(response.body["message"].as_str().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn test_user_administration_is_admin_only() {
    let app = setup_test_app().await;
    let (user, user_token) = app.create_user("Plain", "plain@example.com", Role::User).await;
    let (_, admin_token) = app.create_user("Boss", "boss@example.com", Role::Admin).await;

    let response = app.get("/api/v1/users", Some(&user_token)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.get("/api/v1/users?sort=email", Some(&admin_token)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["results"], 2);
    assert!(response.body["data"]["docs"][0].get("password").is_none());

    let response = app
        .post("/api/v1/users", Some(&admin_token), json!({"name": "New"}))
        .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.body["message"],
        "This route is not defined! Please use /signup instead"
    );

    let response = app
        .patch(
            &format!("/api/v1/users/{}", user.id),
            Some(&admin_token),
            json!({"role": "guide"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["doc"]["role"], "guide");

    let response = app
        .delete(&format!("/api/v1/users/{}", user.id), Some(&admin_token))
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = app
        .get(&format!("/api/v1/users/{}", user.id), Some(&admin_token))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["message"], "No user found with that ID");
}
