use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    middleware,
    routing::{get, post},
    Router,
};
use reqgate::binder::Bind;
use reqgate::endpoint::WebResponse;
use reqgate::extractors::{chain, from_auth_header, from_header, from_param};
use reqgate::keyauth::{Config, KeyAuth, Next};
use reqgate::schema::{Fields, Record};
use reqgate_axum::{key_auth, ApiKey, AxumRequest, AxumResponse, WebError};
use tower::ServiceExt;

fn app(config: Config<AxumRequest>) -> Router {
    let gate = Arc::new(KeyAuth::new(config).unwrap());
    Router::new()
        .route("/", get(|ApiKey(key): ApiKey| async move { format!("ok {}", key) }))
        .layer(middleware::from_fn_with_state(gate, key_auth))
}

async fn text(response: axum::response::Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn secret() -> Config<AxumRequest> {
    Config::new()
        .extractor(from_header("X-Api-Key"))
        .validator(|_: &AxumRequest, key: &str| Ok(key == "SECRET"))
}

#[tokio::test]
async fn accepted_key_reaches_the_handler() {
    let request = Request::get("/").header("X-Api-Key", "SECRET").body(Body::empty()).unwrap();
    let response = app(secret()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "ok SECRET");
}

#[tokio::test]
async fn missing_key_is_challenged() {
    let request = Request::get("/").body(Body::empty()).unwrap();
    let response = app(secret()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        r#"ApiKey realm="Restricted""#
    );
    assert_eq!(text(response).await, "missing or invalid API Key");
}

#[tokio::test]
async fn bearer_challenge_with_scope() {
    let config = Config::new()
        .extractor(chain(vec![from_auth_header("Authorization", "Bearer")]))
        .realm("api")
        .error("insufficient_scope")
        .scope("read write")
        .validator(|_: &AxumRequest, _: &str| Ok(false));

    let request = Request::get("/")
        .header(header::AUTHORIZATION, "Bearer x")
        .body(Body::empty())
        .unwrap();
    let response = app(config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        r#"Bearer realm="api", error="insufficient_scope", scope="read write""#
    );
}

#[tokio::test]
async fn success_handler_decorates_the_downstream_response() {
    let config = secret().success_handler(|request: &mut AxumRequest, next: Next<'_, AxumRequest>| {
        let mut response = next.run(request)?;
        response.set_header("X-Authenticated", "yes")?;
        Ok(response)
    });

    let request = Request::get("/").header("X-Api-Key", "SECRET").body(Body::empty()).unwrap();
    let response = app(config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-authenticated"], "yes");
    assert_eq!(text(response).await, "ok SECRET");
}

#[tokio::test]
async fn success_handler_may_answer_itself() {
    let config = secret().success_handler(|_: &mut AxumRequest, _: Next<'_, AxumRequest>| {
        let mut response = AxumResponse::default();
        response.set_status(202)?;
        response.body_text("accepted")?;
        Ok(response)
    });

    let request = Request::get("/").header("X-Api-Key", "SECRET").body(Body::empty()).unwrap();
    let response = app(config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(text(response).await, "accepted");
}

#[tokio::test]
async fn route_parameters_behind_route_layer() {
    let gate = Arc::new(
        KeyAuth::new(
            Config::new()
                .extractor(from_param("key"))
                .validator(|_: &AxumRequest, key: &str| Ok(key == "k")),
        )
        .unwrap(),
    );
    let app = Router::new()
        .route("/keys/:key", get(|ApiKey(key): ApiKey| async move { key }))
        .route_layer(middleware::from_fn_with_state(gate, key_auth));

    let accepted = app
        .clone()
        .oneshot(Request::get("/keys/k").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);
    assert_eq!(text(accepted).await, "k");

    let refused = app
        .oneshot(Request::get("/keys/x").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(refused.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn handlers_without_the_gate_are_unauthenticated() {
    let app = Router::new().route("/", get(|ApiKey(key): ApiKey| async move { key }));
    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[derive(Debug, Default)]
struct Search {
    terms: Vec<String>,
    page: u32,
    user: String,
}

impl Record for Search {
    fn describe(fields: &mut Fields<Self>) {
        fields.field("Terms", |search| &mut search.terms).tag("query", "q");
        fields.field("Page", |search| &mut search.page).tag("form", "page");
        fields.field("User", |search| &mut search.user).tag("header", "X-User");
    }
}

async fn search(request: AxumRequest) -> Result<String, WebError> {
    let mut found = Search::default();
    let bind = Bind::new(&request).enable_splitting(true);
    bind.query(&mut found)?;
    bind.form(&mut found)?;
    bind.header(&mut found)?;
    Ok(format!("{} {:?} {}", found.user, found.terms, found.page))
}

#[tokio::test]
async fn binding_from_an_axum_request() {
    let app = Router::new().route("/search", post(search));
    let request = Request::post("/search?q=rust,axum")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("X-User", "ferris")
        .body(Body::from("page=3"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, r#"ferris ["rust", "axum"] 3"#);
}

#[tokio::test]
async fn binding_errors_are_bad_requests() {
    let app = Router::new().route("/search", post(search));
    let request = Request::post("/search")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("page=third"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn multipart_bodies_are_parsed() {
    let body = "--XYZ\r\n\
        Content-Disposition: form-data; name=\"page\"\r\n\r\n\
        7\r\n\
        --XYZ\r\n\
        Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        hello\r\n\
        --XYZ--\r\n";

    let app = Router::new().route(
        "/upload",
        post(|request: AxumRequest| async move {
            use reqgate::endpoint::WebRequest;
            let form = request.multipart().unwrap();
            let file = &form.file.get("upload").unwrap()[0];
            format!(
                "{} {} {}",
                form.value.first("page").unwrap(),
                file.filename,
                String::from_utf8_lossy(&file.content)
            )
        }),
    );

    let request = Request::post("/upload")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XYZ")
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(text(response).await, "7 a.txt hello");
}
