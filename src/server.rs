use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::batch::{GenerateAiPostsParams, GeneratePostsParams, PostService};
use crate::error::{ApiError, CredentialError};
use crate::models::GenerationSettings;

#[derive(Clone)]
pub struct AppState {
    pub service: PostService,
    pub admin_token: String,
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/settings", get(get_settings).post(save_settings))
        .route("/categories", get(list_categories))
        .route("/generate-posts", post(generate_posts))
        .route("/api-key", get(api_key_status).post(save_api_key))
        .route("/test-api-key", post(test_api_key))
        .route("/available-models", get(available_models))
        .route("/generate-ai-posts", post(generate_ai_posts))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new().nest("/api/v1", api).with_state(state)
}

/// Response body shared by every endpoint.
#[derive(Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: None,
        data: Some(data),
    })
}

fn ok_with_message<T: Serialize>(message: impl Into<String>, data: Option<T>) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: Some(message.into()),
        data,
    })
}

/// Malformed bodies get the envelope too, not axum's plain-text rejection.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if authenticate(&state.admin_token, request.headers()) {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "rejected unauthenticated request");
    let body = Envelope::<()> {
        success: false,
        message: Some("Unauthorized".to_string()),
        data: None,
    };
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"fakepost\"")],
        Json(body),
    )
        .into_response()
}

fn authenticate(admin_token: &str, headers: &HeaderMap) -> bool {
    let Some(auth_str) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    if let Some(token) = auth_str.strip_prefix("Bearer ")
        && constant_time_eq(token.trim(), admin_token)
    {
        debug!("authenticated via bearer token");
        return true;
    }

    // Basic auth: any user name, the admin token as password
    if let Some(encoded) = auth_str.strip_prefix("Basic ") {
        use base64::Engine;
        if let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded.trim())
            && let Ok(credentials) = String::from_utf8(decoded)
            && let Some((_user, password)) = credentials.split_once(':')
            && constant_time_eq(password, admin_token)
        {
            debug!("authenticated via HTTP Basic Auth");
            return true;
        }
    }

    false
}

/// Constant-time string comparison for token checks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    ok(state.service.settings.get().await)
}

async fn save_settings(
    State(state): State<AppState>,
    payload: Result<Json<GenerationSettings>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let saved = state.service.settings.save(body(payload)?).await?;
    let message = if saved.changed {
        "Settings saved successfully"
    } else {
        "Settings unchanged"
    };
    Ok(ok_with_message(message, Some(saved)))
}

async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let categories = state.service.content.list_categories().await?;
    Ok(ok(categories))
}

async fn generate_posts(
    State(state): State<AppState>,
    payload: Result<Json<GeneratePostsParams>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.service.generate_filler(body(payload)?).await?;
    Ok(ok_with_message(outcome.message, Some(outcome.result)))
}

async fn generate_ai_posts(
    State(state): State<AppState>,
    payload: Result<Json<GenerateAiPostsParams>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.service.generate_ai(body(payload)?).await?;
    Ok(ok_with_message(outcome.message, Some(outcome.result)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiKeyBody {
    #[serde(default)]
    api_key: String,
}

async fn api_key_status(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(ok(state.service.credentials.status().await?))
}

async fn save_api_key(
    State(state): State<AppState>,
    payload: Result<Json<ApiKeyBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let saved = state.service.credentials.save(&body(payload)?.api_key).await?;
    let status = state.service.credentials.status().await?;
    Ok(ok_with_message(saved.message(), Some(status)))
}

async fn test_api_key(
    State(state): State<AppState>,
    payload: Result<Json<ApiKeyBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    match state.service.credentials.test(&body(payload)?.api_key).await {
        Ok(()) => {
            info!("API key test passed");
            Ok(ok_with_message::<()>("API key is valid", None))
        }
        // A rejected key is a client problem here, whatever the provider said.
        Err(CredentialError::Provider(e)) => {
            info!(error = %e, "API key test failed");
            Err(ApiError::bad_request(e.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn available_models(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let models = state.service.credentials.list_models().await?;
    Ok(ok(models))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use base64::Engine;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::batch::GenerationDefaults;
    use crate::credentials::CredentialManager;
    use crate::credentials::tests::{ScriptedProvider, VALID_KEY};
    use crate::gemini::RawModel;
    use crate::platform::SqliteStore;
    use crate::settings::{SettingsStore, SizeLimits};
    use crate::settings::tests::MemoryOptions;
    use crate::{db, store};

    const TOKEN: &str = "s3cret-admin-token";

    struct Harness {
        _dir: tempfile::TempDir,
        router: Router,
        news_id: i64,
    }

    async fn harness(provider: ScriptedProvider) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::open(&dir.path().join("test.db")).await.unwrap();
        let default_id = store::upsert_category(&pool, "Uncategorized").await.unwrap();
        store::set_setting(&pool, store::DEFAULT_CATEGORY_KEY, &default_id.to_string())
            .await
            .unwrap();
        let news_id = store::upsert_category(&pool, "News").await.unwrap();

        let options = Arc::new(MemoryOptions::default());
        let provider = Arc::new(provider);
        let limits = SizeLimits {
            max_posts: 10,
            ..Default::default()
        };
        let service = PostService {
            content: Arc::new(SqliteStore::new(pool, "http://blog.test")),
            settings: SettingsStore::new(options.clone()).with_limits(limits),
            credentials: CredentialManager::new(options, provider.clone()),
            provider,
            defaults: GenerationDefaults {
                limits,
                default_model: "gemini-1.5-flash-latest".to_string(),
                credit_url: "https://example.com".to_string(),
            },
        };
        let router = build_router(AppState {
            service,
            admin_token: TOKEN.to_string(),
        });
        Harness {
            _dir: dir,
            router,
            news_id,
        }
    }

    async fn call(router: &Router, method: &str, uri: &str, payload: Option<Value>) -> (StatusCode, Value) {
        let mut builder = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
        let body = match payload {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn requests_without_token_are_rejected() {
        let h = harness(ScriptedProvider::default()).await;
        let response = h
            .router
            .clone()
            .oneshot(HttpRequest::get("/api/v1/settings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = h
            .router
            .clone()
            .oneshot(
                HttpRequest::get("/api/v1/settings")
                    .header(header::AUTHORIZATION, "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn basic_auth_uses_token_as_password() {
        let h = harness(ScriptedProvider::default()).await;
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!("admin:{TOKEN}"));
        let response = h
            .router
            .clone()
            .oneshot(
                HttpRequest::get("/api/v1/settings")
                    .header(header::AUTHORIZATION, format!("Basic {encoded}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn settings_round_trip() {
        let h = harness(ScriptedProvider::default()).await;

        let (status, body) = call(&h.router, "GET", "/api/v1/settings", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["postsMax"], 5);

        let mut settings = body["data"].clone();
        settings["titleMax"] = json!(12);
        let (status, body) = call(&h.router, "POST", "/api/v1/settings", Some(settings.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Settings saved successfully");
        assert_eq!(body["data"]["changed"], true);

        let (_, body) = call(&h.router, "POST", "/api/v1/settings", Some(settings)).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["changed"], false);
    }

    #[tokio::test]
    async fn inverted_settings_are_a_bad_request() {
        let h = harness(ScriptedProvider::default()).await;
        let mut settings = serde_json::to_value(GenerationSettings::default()).unwrap();
        settings["postsMin"] = json!(9);
        settings["postsMax"] = json!(2);

        let (status, body) = call(&h.router, "POST", "/api/v1/settings", Some(settings)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().starts_with("posts range is invalid"));

        let (_, body) = call(&h.router, "GET", "/api/v1/settings", None).await;
        assert_eq!(body["data"]["postsMin"], 1);
    }

    #[tokio::test]
    async fn malformed_body_gets_envelope() {
        let h = harness(ScriptedProvider::default()).await;
        let (status, body) = call(&h.router, "POST", "/api/v1/settings", Some(json!({ "postsMin": "x" }))).await;
        assert!(status.is_client_error());
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn generate_posts_in_category() {
        let h = harness(ScriptedProvider::default()).await;
        let (status, body) = call(
            &h.router,
            "POST",
            "/api/v1/generate-posts",
            Some(json!({
                "posts": 3,
                "titleWords": { "min": 2, "max": 4 },
                "content": 2,
                "contentUnit": "paragraphs",
                "categories": [h.news_id]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Successfully created 3 posts in categories: News");
        assert_eq!(body["data"]["successCount"], 3);
        assert_eq!(body["data"]["errorCount"], 0);
        assert_eq!(body["data"]["categories"], json!(["News"]));
        let url = body["data"]["createdPosts"][0]["url"].as_str().unwrap();
        assert!(url.starts_with("http://blog.test/"));

        let (_, body) = call(&h.router, "GET", "/api/v1/categories", None).await;
        let news = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["name"] == "News")
            .unwrap()
            .clone();
        assert_eq!(news["count"], 3);
        let uncategorized = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["name"] == "Uncategorized")
            .unwrap()
            .clone();
        assert_eq!(uncategorized["count"], 0);
    }

    #[tokio::test]
    async fn generate_posts_over_limit() {
        let h = harness(ScriptedProvider::default()).await;
        let (status, body) = call(&h.router, "POST", "/api/v1/generate-posts", Some(json!({ "posts": 11 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "post count 11 exceeds the per-batch limit of 10");
    }

    #[tokio::test]
    async fn oversized_post_bodies_are_a_bad_request() {
        let h = harness(ScriptedProvider::default()).await;
        let (status, body) = call(
            &h.router,
            "POST",
            "/api/v1/generate-posts",
            Some(json!({ "posts": 1, "titleWords": 4000000000u32, "content": 4000000000u32 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "title must be at most 100, got 4000000000");

        let mut settings = serde_json::to_value(GenerationSettings::default()).unwrap();
        settings["contentMax"] = json!(4000000000u32);
        let (status, body) = call(&h.router, "POST", "/api/v1/settings", Some(settings)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "content must be at most 5000, got 4000000000");

        let (_, body) = call(&h.router, "GET", "/api/v1/categories", None).await;
        assert!(body["data"].as_array().unwrap().iter().all(|c| c["count"] == 0));
    }

    #[tokio::test]
    async fn api_key_lifecycle() {
        let h = harness(ScriptedProvider::default()).await;

        let (status, body) = call(&h.router, "POST", "/api/v1/api-key", Some(json!({ "apiKey": "nope" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid API key format. Please check your Gemini API key.");

        let (status, body) = call(&h.router, "POST", "/api/v1/api-key", Some(json!({ "apiKey": VALID_KEY }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "API key saved successfully");
        assert_eq!(body["data"]["hasKey"], true);

        let (_, body) = call(&h.router, "GET", "/api/v1/api-key", None).await;
        assert_eq!(body["data"], json!({ "hasKey": true }));

        let (_, body) = call(&h.router, "POST", "/api/v1/api-key", Some(json!({ "apiKey": "" }))).await;
        assert_eq!(body["message"], "API key disconnected successfully");
        assert_eq!(body["data"]["hasKey"], false);
    }

    #[tokio::test]
    async fn test_api_key_failure_is_bad_request() {
        let h = harness(ScriptedProvider {
            valid_key: Some(VALID_KEY.to_string()),
            ..Default::default()
        })
        .await;

        let (status, body) = call(&h.router, "POST", "/api/v1/test-api-key", Some(json!({ "apiKey": VALID_KEY }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "API key is valid");

        let (status, body) = call(&h.router, "POST", "/api/v1/test-api-key", Some(json!({ "apiKey": "AIzaBad" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "API key not valid.");

        let (status, body) = call(&h.router, "POST", "/api/v1/test-api-key", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "API key is required for testing");
    }

    #[tokio::test]
    async fn available_models_need_a_key() {
        let h = harness(ScriptedProvider {
            models: vec![RawModel {
                name: "models/gemini-pro".to_string(),
                supported_generation_methods: vec!["generateContent".to_string()],
            }],
            ..Default::default()
        })
        .await;

        let (status, body) = call(&h.router, "GET", "/api/v1/available-models", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No API key configured");

        call(&h.router, "POST", "/api/v1/api-key", Some(json!({ "apiKey": VALID_KEY }))).await;
        let (status, body) = call(&h.router, "GET", "/api/v1/available-models", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["id"], "gemini-pro");
        assert_eq!(body["data"][0]["name"], "Gemini Pro");
    }

    #[tokio::test]
    async fn generate_ai_posts_end_to_end() {
        let h = harness(ScriptedProvider {
            replies: Mutex::new(vec![
                Ok("TITLE: Cats Rule\n\nCONTENT:\nThey nap.\n\nThey purr.".to_string()),
                Ok("TITLE: Cats Again\n\nCONTENT:\nStill napping.".to_string()),
            ]),
            ..Default::default()
        })
        .await;

        let request = json!({ "topic": "cats", "style": "casual", "posts": 2, "content": 2, "contentUnit": "paragraphs" });

        let (status, body) = call(&h.router, "POST", "/api/v1/generate-ai-posts", Some(request.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Gemini API key not configured. Please add your API key first."
        );

        call(&h.router, "POST", "/api/v1/api-key", Some(json!({ "apiKey": VALID_KEY }))).await;
        let (status, body) = call(&h.router, "POST", "/api/v1/generate-ai-posts", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["message"],
            "Successfully generated 2 AI-powered posts on topic \"cats\""
        );
        assert_eq!(body["data"]["createdPosts"][0]["title"], "Cats Rule");
        assert_eq!(body["data"]["createdPosts"][1]["title"], "Cats Again");
    }

    #[tokio::test]
    async fn ai_batch_with_every_item_failing_is_server_error() {
        let h = harness(ScriptedProvider::default()).await;
        call(&h.router, "POST", "/api/v1/api-key", Some(json!({ "apiKey": VALID_KEY }))).await;

        let (status, body) = call(
            &h.router,
            "POST",
            "/api/v1/generate-ai-posts",
            Some(json!({ "topic": "cats", "posts": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["message"],
            "Failed to generate any posts. Post 1: no scripted reply; Post 2: no scripted reply"
        );
    }
}
