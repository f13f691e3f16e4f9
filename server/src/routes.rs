use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use image::RgbImage;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use annotation::SessionId;
use segmentation::{PointLabel, PointPrompt};

use crate::encode::{decode_rgb, encode_mask_png, encode_rgb_png};
use crate::error::ApiError;
use crate::state::AppState;

const SESSION_HEADER: &str = "x-session-id";

/// Build the service router. The annotation frontend is served from a
/// different origin, hence the permissive CORS layer.
pub fn router(state: Arc<AppState>, body_limit: usize) -> Router {
    Router::new()
        .route("/spamcheck", post(spamcheck))
        .route("/checkavalanchetype", post(check_avalanche_type))
        .route("/upload", post(upload))
        .route("/add_point", post(add_point))
        .route("/undo", post(undo))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}

/// Screen an uploaded photograph for spam. Pure classification: the
/// segmentation backend is only ever initialized by `/upload`.
async fn spamcheck(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let image = image_from_multipart(multipart).await?;
    let classifier = Arc::clone(&state.spam);
    let verdict = task::spawn_blocking(move || classifier.predict(&image)).await??;
    Ok(Json(json!({ "spam": verdict.is_spam() })))
}

async fn check_avalanche_type(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let image = image_from_multipart(multipart).await?;
    let classifier = Arc::clone(&state.avalanche);
    let label = task::spawn_blocking(move || classifier.predict(&image)).await??;
    Ok(Json(json!({ "avalanche_type": label })))
}

/// Reset the caller's session to a fresh image. Backend initialization
/// (embedding computation for learned backends) happens here, once per
/// upload, off the request-handling threads.
async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let image = image_from_multipart(multipart).await?;
    let session = state.sessions.get_or_create(&session_id(&headers));
    let display = task::spawn_blocking(move || {
        let mut engine = session.blocking_lock();
        engine.reset(image).map(|display| display.clone())
    })
    .await??;
    Ok(Json(json!({ "image": encode_rgb_png(&display)? })))
}

#[derive(Debug, Deserialize)]
struct AddPointRequest {
    x: u32,
    y: u32,
    label: u8,
}

#[derive(Debug, Deserialize)]
struct AddPointQuery {
    #[serde(default)]
    multi_object: bool,
}

/// Core workflow step: feed one click to the session's segmentation
/// backend and return the recomposited display plus the new mask alone.
/// `mask` is null when the backend selected nothing for the click.
async fn add_point(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AddPointQuery>,
    Json(request): Json<AddPointRequest>,
) -> Result<Json<Value>, ApiError> {
    let label = PointLabel::try_from(request.label)?;
    let prompt = PointPrompt::new(request.x, request.y, label);

    let session = state.sessions.get_or_create(&session_id(&headers));
    let outcome = task::spawn_blocking(move || {
        session.blocking_lock().add_point(prompt, query.multi_object)
    })
    .await??;

    let mask = outcome.mask.as_ref().map(encode_mask_png).transpose()?;
    Ok(Json(json!({
        "image": encode_rgb_png(&outcome.display)?,
        "mask": mask,
    })))
}

async fn undo(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let session = state.sessions.get_or_create(&session_id(&headers));
    let display = task::spawn_blocking(move || {
        session.blocking_lock().undo().map(|display| display.clone())
    })
    .await??;
    Ok(Json(json!({ "image": encode_rgb_png(&display)? })))
}

/// Pull the `file` field out of a multipart upload and decode it. The
/// field must carry an `image/*` content type and a non-empty body.
async fn image_from_multipart(mut multipart: Multipart) -> Result<RgbImage, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let is_image = field
            .content_type()
            .map(|content_type| content_type.starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(ApiError::InvalidContentType);
        }
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(ApiError::MissingFile);
        }
        return decode_rgb(&bytes);
    }
    Err(ApiError::MissingFile)
}

fn session_id(headers: &HeaderMap) -> SessionId {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(SessionId::new)
        .unwrap_or_else(SessionId::default_session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use annotation::SessionStore;
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode, header};
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use http_body_util::BodyExt;
    use image::{GrayImage, Luma, Rgb};
    use segmentation::{
        BrightnessSpamClassifier, CandidateMask, PointSegmenter, SegmentationError,
        SnowlineAvalancheClassifier,
    };
    use std::io::Cursor;
    use tower::ServiceExt;

    const BOUNDARY: &str = "avalanche-test-boundary";
    const BODY_LIMIT: usize = 20 * 1024 * 1024;

    /// Backend double producing a fixed-radius disc around every click.
    #[derive(Default)]
    struct DiscSegmenter {
        dims: Option<(u32, u32)>,
    }

    impl PointSegmenter for DiscSegmenter {
        fn set_image(&mut self, image: &RgbImage) -> segmentation::Result<()> {
            self.dims = Some(image.dimensions());
            Ok(())
        }

        fn segment(
            &mut self,
            prompt: PointPrompt,
            _multi_object: bool,
        ) -> segmentation::Result<Vec<CandidateMask>> {
            let (width, height) = self.dims.ok_or(SegmentationError::NoImageSet)?;
            Ok(vec![CandidateMask {
                mask: disc_mask(width, height, prompt.x, prompt.y, 10),
                score: 1.0,
            }])
        }
    }

    fn disc_mask(width: u32, height: u32, cx: u32, cy: u32, radius: i64) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let dx = x as i64 - cx as i64;
            let dy = y as i64 - cy as i64;
            if dx * dx + dy * dy <= radius * radius {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }

    fn disc_state() -> Arc<AppState> {
        AppState::new(
            SessionStore::new(|| Box::new(DiscSegmenter::default())),
            Arc::new(BrightnessSpamClassifier::default()),
            Arc::new(SnowlineAvalancheClassifier),
        )
    }

    fn png_bytes(image: &RgbImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn multipart_body(bytes: &[u8], content_type: &str) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"photo.png\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn file_request(uri: &str, bytes: &[u8], content_type: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(bytes, content_type)))
            .unwrap()
    }

    fn json_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> Response<Body> {
        router(Arc::clone(state), BODY_LIMIT)
            .oneshot(request)
            .await
            .unwrap()
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn decoded_image(body: &Value, field: &str) -> RgbImage {
        let encoded = body[field].as_str().unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        image::load_from_memory(&bytes).unwrap().to_rgb8()
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let state = disc_state();
        let response = send(
            &state,
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "OK");
    }

    #[tokio::test]
    async fn test_spamcheck_flags_dark_images() {
        let state = disc_state();

        let dark = png_bytes(&RgbImage::new(32, 32));
        let response = send(&state, file_request("/spamcheck", &dark, "image/png")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["spam"], true);

        let snow = png_bytes(&RgbImage::from_pixel(32, 32, Rgb([230, 230, 230])));
        let response = send(&state, file_request("/spamcheck", &snow, "image/png")).await;
        assert_eq!(json_body(response).await["spam"], false);
    }

    #[tokio::test]
    async fn test_checkavalanchetype_reports_label() {
        let state = disc_state();
        let mut image = RgbImage::new(30, 30);
        for y in 0..10 {
            for x in 0..30 {
                image.put_pixel(x, y, Rgb([240, 240, 240]));
            }
        }
        let response = send(
            &state,
            file_request("/checkavalanchetype", &png_bytes(&image), "image/png"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["avalanche_type"], "loose");
    }

    #[tokio::test]
    async fn test_upload_echoes_image() {
        let state = disc_state();
        let image = RgbImage::from_fn(64, 64, |x, y| Rgb([x as u8, y as u8, 42]));
        let response = send(&state, file_request("/upload", &png_bytes(&image), "image/png")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(decoded_image(&body, "image"), image);
    }

    #[tokio::test]
    async fn test_add_point_before_upload_is_conflict() {
        let state = disc_state();
        let response = send(&state, json_request("/add_point", r#"{"x":5,"y":5,"label":1}"#)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("No image uploaded"));
    }

    #[tokio::test]
    async fn test_undo_before_upload_is_conflict() {
        let state = disc_state();
        let response = send(&state, empty_request("/undo")).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_upload_add_point_undo_scenario() {
        let state = disc_state();
        let black = RgbImage::new(200, 200);

        let response = send(&state, file_request("/upload", &png_bytes(&black), "image/png")).await;
        let uploaded = decoded_image(&json_body(response).await, "image");
        assert_eq!(uploaded, black);

        let response = send(
            &state,
            json_request("/add_point", r#"{"x":50,"y":50,"label":1}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;

        // The standalone mask is exactly the backend's disc.
        let encoded_mask = body["mask"].as_str().unwrap();
        let mask_bytes = STANDARD.decode(encoded_mask).unwrap();
        let mask = image::load_from_memory(&mask_bytes).unwrap().to_luma8();
        assert_eq!(mask, disc_mask(200, 200, 50, 50, 10));

        // The display shows the highlighted disc plus the click marker.
        let display = decoded_image(&body, "image");
        assert_ne!(display, black);
        assert_eq!(*display.get_pixel(50, 50), Rgb([255, 0, 0]));

        let response = send(&state, empty_request("/undo")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let restored = decoded_image(&json_body(response).await, "image");
        assert_eq!(restored, black);
    }

    #[tokio::test]
    async fn test_add_point_rejects_bad_label() {
        let state = disc_state();
        let black = png_bytes(&RgbImage::new(32, 32));
        send(&state, file_request("/upload", &black, "image/png")).await;

        let response = send(&state, json_request("/add_point", r#"{"x":5,"y":5,"label":3}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_add_point_rejects_out_of_bounds() {
        let state = disc_state();
        let black = png_bytes(&RgbImage::new(32, 32));
        send(&state, file_request("/upload", &black, "image/png")).await;

        let response = send(&state, json_request("/add_point", r#"{"x":99,"y":5,"label":1}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("outside"));
    }

    #[tokio::test]
    async fn test_wrong_content_type_rejected() {
        let state = disc_state();
        let response = send(
            &state,
            file_request("/upload", b"some text payload", "text/plain"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("Invalid file type"));
    }

    #[tokio::test]
    async fn test_missing_file_field_rejected() {
        let state = disc_state();
        let body = format!("--{BOUNDARY}--\r\n");
        let response = send(
            &state,
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let state = disc_state();
        let black = png_bytes(&RgbImage::new(32, 32));
        send(&state, file_request("/upload", &black, "image/png")).await;

        // A different session has no uploaded image yet.
        let request = Request::builder()
            .method("POST")
            .uri("/add_point")
            .header(header::CONTENT_TYPE, "application/json")
            .header(SESSION_HEADER, "other-client")
            .body(Body::from(r#"{"x":5,"y":5,"label":1}"#))
            .unwrap();
        let response = send(&state, request).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_background_point_yields_null_mask() {
        let state = AppState::new(
            SessionStore::new(|| Box::new(segmentation::RegionGrowSegmenter::default())),
            Arc::new(BrightnessSpamClassifier::default()),
            Arc::new(SnowlineAvalancheClassifier),
        );
        let black = png_bytes(&RgbImage::new(32, 32));
        send(&state, file_request("/upload", &black, "image/png")).await;

        let response = send(&state, json_request("/add_point", r#"{"x":5,"y":5,"label":0}"#)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["mask"].is_null());
        assert_eq!(decoded_image(&body, "image"), RgbImage::new(32, 32));
    }
}
