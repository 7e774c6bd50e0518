use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::ApiResult,
    state::AppState,
    users::{
        dto::{ListQuery, UserPage, UserResponse},
        services::{self, parse_id},
        upload::UserForm,
    },
};

pub fn user_routes(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .layer(DefaultBodyLimit::max(body_limit))
}

#[instrument(skip(state, form))]
pub async fn create_user(
    State(state): State<AppState>,
    form: UserForm,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let user = services::create_user(&state, form).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<UserPage>> {
    Ok(Json(services::list_users(&state, &query).await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let id = parse_id(&id)?;
    Ok(Json(services::get_user(&state, id).await?))
}

#[instrument(skip(state, form))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    form: UserForm,
) -> ApiResult<Json<UserResponse>> {
    let id = parse_id(&id)?;
    Ok(Json(services::update_user(&state, id, form).await?))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    services::delete_user(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{app::build_app, state::AppState, users::password::verify_password};

    const BOUNDARY: &str = "X-USER-API-BOUNDARY";

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_req(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn multipart_req(
        method: &str,
        uri: &str,
        texts: &[(&str, &str)],
        files: &[(&str, &str, &str)],
    ) -> Request<Body> {
        let mut body = Vec::new();
        for (name, value) in texts {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        for (name, file_name, data) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn create(app: &Router, email: &str) -> Value {
        let (status, body) = send(
            app,
            json_req(
                "POST",
                "/users",
                json!({ "email": email, "password": "secret1", "name": "Ann" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    #[tokio::test]
    async fn create_returns_201_without_password() {
        let (state, _dir) = AppState::for_tests().await;
        let app = build_app(state.clone());

        let body = create(&app, "ann@example.com").await;
        assert!(body["id"].is_i64());
        assert_eq!(body["email"], "ann@example.com");
        assert!(body["photo"].is_null());
        assert!(body.get("password").is_none());

        let id = body["id"].as_i64().unwrap() as i32;
        let stored = state.users.find_by_id(id).await.unwrap().unwrap();
        assert_ne!(stored.password, "secret1");
        assert!(verify_password("secret1", &stored.password));
    }

    #[tokio::test]
    async fn create_with_invalid_email_is_400_and_persists_nothing() {
        let (state, _dir) = AppState::for_tests().await;
        let app = build_app(state.clone());

        let (status, body) = send(
            &app,
            json_req(
                "POST",
                "/users",
                json!({ "email": "not-an-email", "password": "secret1", "name": "Ann" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["path"], "email");
        assert_eq!(body["errors"][0]["msg"], "Must be a valid email address");
        assert_eq!(state.users.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_with_short_password_is_400_and_persists_nothing() {
        let (state, _dir) = AppState::for_tests().await;
        let app = build_app(state.clone());

        let (status, body) = send(
            &app,
            json_req(
                "POST",
                "/users",
                json!({ "email": "a@x.io", "password": "12345", "name": "Ann" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"].as_array().unwrap().len(), 1);
        assert_eq!(body["errors"][0]["path"], "password");
        assert_eq!(state.users.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_with_missing_fields_lists_every_violation() {
        let (state, _dir) = AppState::for_tests().await;
        let app = build_app(state);

        let (status, body) = send(&app, json_req("POST", "/users", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn create_duplicate_email_is_400_with_error_message() {
        let (state, _dir) = AppState::for_tests().await;
        let app = build_app(state);

        create(&app, "dup@example.com").await;
        let (status, body) = send(
            &app,
            json_req(
                "POST",
                "/users",
                json!({ "email": "dup@example.com", "password": "secret1", "name": "B" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("email"));
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let (state, _dir) = AppState::for_tests().await;
        let app = build_app(state);

        let req = Request::builder()
            .method("POST")
            .uri("/users")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn multipart_create_stores_photo_and_returns_absolute_url() {
        let (state, dir) = AppState::for_tests().await;
        let app = build_app(state.clone());

        let (status, body) = send(
            &app,
            multipart_req(
                "POST",
                "/users",
                &[("email", "pic@example.com"), ("password", "secret1"), ("name", "Pic")],
                &[("photo", "my face.png", "png-data")],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");

        let url = body["photo"].as_str().unwrap();
        assert!(url.starts_with("http://test.local/uploads/"), "{url}");
        assert!(url.ends_with("-myface.png"), "{url}");

        let id = body["id"].as_i64().unwrap() as i32;
        let stored = state.users.find_by_id(id).await.unwrap().unwrap();
        let rel = stored.photo.unwrap();
        assert!(rel.starts_with("uploads/"));
        let file = rel.trim_start_matches("uploads/");
        assert_eq!(std::fs::read(dir.path().join(file)).unwrap(), b"png-data");

        let res = app
            .clone()
            .oneshot(empty_req("GET", &format!("/{rel}")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn multipart_rejects_second_photo_and_foreign_file_fields() {
        let (state, _dir) = AppState::for_tests().await;
        let app = build_app(state.clone());

        let (status, _) = send(
            &app,
            multipart_req(
                "POST",
                "/users",
                &[("email", "a@x.io"), ("password", "secret1"), ("name", "A")],
                &[("photo", "a.png", "1"), ("photo", "b.png", "2")],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            multipart_req(
                "POST",
                "/users",
                &[("email", "a@x.io"), ("password", "secret1"), ("name", "A")],
                &[("avatar", "a.png", "1")],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("avatar"));
        assert_eq!(state.users.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_paginates_with_links() {
        let (state, _dir) = AppState::for_tests().await;
        let app = build_app(state);
        for i in 0..25 {
            create(&app, &format!("user{i}@example.com")).await;
        }

        let (status, body) = send(&app, empty_req("GET", "/users?page=2&pageSize=10")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 25);
        assert_eq!(body["totalPages"], 3);
        assert_eq!(body["currentPage"], 2);
        assert_eq!(body["nextPage"], "/users?page=3&pageSize=10");
        assert_eq!(body["prevPage"], "/users?page=1&pageSize=10");
        let users = body["users"].as_array().unwrap();
        assert_eq!(users.len(), 10);
        assert_eq!(users[0]["email"], "user10@example.com");
        assert_eq!(users[9]["email"], "user19@example.com");

        let (_, body) = send(&app, empty_req("GET", "/users?page=3&pageSize=10")).await;
        assert!(body["nextPage"].is_null());
        assert_eq!(body["users"].as_array().unwrap().len(), 5);

        let (_, body) = send(&app, empty_req("GET", "/users")).await;
        assert!(body["prevPage"].is_null());
        assert_eq!(body["currentPage"], 1);
        assert_eq!(body["users"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn list_with_garbage_params_uses_defaults() {
        let (state, _dir) = AppState::for_tests().await;
        let app = build_app(state);

        let (status, body) = send(&app, empty_req("GET", "/users?page=abc&pageSize=0")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentPage"], 1);
        assert_eq!(body["totalPages"], 0);
        assert!(body["nextPage"].is_null());

        let (status, _) = send(&app, empty_req("GET", "/users?page=-2")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_missing_or_non_numeric_id_is_404() {
        let (state, _dir) = AppState::for_tests().await;
        let app = build_app(state);

        for uri in ["/users/12345", "/users/abc"] {
            let (status, body) = send(&app, empty_req("GET", uri)).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body, json!({ "error": "User not found" }));
        }
    }

    #[tokio::test]
    async fn get_existing_user() {
        let (state, _dir) = AppState::for_tests().await;
        let app = build_app(state);
        let created = create(&app, "get@example.com").await;

        let (status, body) = send(
            &app,
            empty_req("GET", &format!("/users/{}", created["id"])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, created);
    }

    #[tokio::test]
    async fn get_and_list_return_absolute_photo_urls() {
        let (state, _dir) = AppState::for_tests().await;
        let app = build_app(state);

        let (status, created) = send(
            &app,
            multipart_req(
                "POST",
                "/users",
                &[("email", "face@example.com"), ("password", "secret1"), ("name", "Face")],
                &[("photo", "face.png", "png")],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{created}");

        let (status, body) = send(
            &app,
            empty_req("GET", &format!("/users/{}", created["id"])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let url = body["photo"].as_str().unwrap();
        assert!(url.starts_with("http://test.local/uploads/"), "{url}");
        assert!(url.ends_with("-face.png"), "{url}");

        let (status, body) = send(&app, empty_req("GET", "/users")).await;
        assert_eq!(status, StatusCode::OK);
        let listed = body["users"][0]["photo"].as_str().unwrap();
        assert_eq!(listed, url);
    }

    #[tokio::test]
    async fn update_name_leaves_rest_and_photo_handling() {
        let (state, _dir) = AppState::for_tests().await;
        let app = build_app(state.clone());

        let (_, created) = send(
            &app,
            multipart_req(
                "POST",
                "/users",
                &[("email", "up@example.com"), ("password", "secret1"), ("name", "Up")],
                &[("photo", "first.png", "1")],
            ),
        )
        .await;
        let id = created["id"].as_i64().unwrap() as i32;
        let before = state.users.find_by_id(id).await.unwrap().unwrap();

        // no file: photo kept
        let (status, body) = send(
            &app,
            json_req("PUT", &format!("/users/{id}"), json!({ "name": "Renamed" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Renamed");
        assert_eq!(body["photo"], created["photo"]);
        let after = state.users.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(after.email, before.email);
        assert_eq!(after.password, before.password);
        assert_eq!(after.photo, before.photo);

        // new file: photo replaced
        let (status, body) = send(
            &app,
            multipart_req("PUT", &format!("/users/{id}"), &[], &[("photo", "second.png", "2")]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["photo"].as_str().unwrap().ends_with("-second.png"));
        let after = state.users.find_by_id(id).await.unwrap().unwrap();
        assert_ne!(after.photo, before.photo);
        assert_eq!(after.name, "Renamed");
    }

    #[tokio::test]
    async fn update_failures_carry_their_reason() {
        let (state, _dir) = AppState::for_tests().await;
        let app = build_app(state);
        let a = create(&app, "a@example.com").await;
        create(&app, "b@example.com").await;
        let uri = format!("/users/{}", a["id"]);

        let (status, body) = send(&app, json_req("PUT", &uri, json!({ "email": "broken" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["path"], "email");

        let (status, body) =
            send(&app, json_req("PUT", &uri, json!({ "email": "b@example.com" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("email"));

        let (status, body) =
            send(&app, json_req("PUT", "/users/999", json!({ "name": "Ghost" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "User not found");
    }

    #[tokio::test]
    async fn delete_then_get_is_404() {
        let (state, _dir) = AppState::for_tests().await;
        let app = build_app(state);
        let created = create(&app, "del@example.com").await;
        let uri = format!("/users/{}", created["id"]);

        let res = app.clone().oneshot(empty_req("DELETE", &uri)).await.unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());

        let (status, _) = send(&app, empty_req("GET", &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, empty_req("DELETE", &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "User not found");
    }
}
