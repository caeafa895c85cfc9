use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::watch;
use crate::app::{AppHandle, WindowState};
use crate::launcher::LaunchError;
use shared::types::{AppDetail, AppRow};

#[derive(Clone)]
pub struct AppState {
    pub app: AppHandle,
    pub hash_rx: watch::Receiver<String>,
}

#[derive(Serialize)]
pub struct LaunchResponse {
    pub url: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/apps", get(list_apps))
        .route("/v1/apps/hash", get(get_hash))
        .route("/v1/apps/:name", get(get_app))
        .route("/v1/apps/:name/icon", get(get_icon))
        .route("/v1/apps/:name/launch", post(launch_app))
        .route("/v1/window", get(get_window))
        .route("/v1/window/show", post(show_window))
        .route("/v1/window/hide", post(hide_window))
        .route("/v1/window/close", post(close_window))
        .with_state(state)
}

fn internal_error(what: &str, e: anyhow::Error) -> StatusCode {
    tracing::error!("Failed to {}: {}", what, e);
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn list_apps(State(state): State<AppState>) -> Result<Json<Vec<AppRow>>, StatusCode> {
    state
        .app
        .list_apps()
        .await
        .map(Json)
        .map_err(|e| internal_error("list apps", e))
}

async fn get_hash(State(state): State<AppState>) -> String {
    state.hash_rx.borrow().clone()
}

async fn get_app(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AppDetail>, StatusCode> {
    state
        .app
        .get_app(name)
        .await
        .map_err(|e| internal_error("query app", e))?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_icon(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, StatusCode> {
    let icon = state
        .app
        .get_icon(name)
        .await
        .map_err(|e| internal_error("query icon", e))?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(([(header::CONTENT_TYPE, icon.content_type)], icon.bytes).into_response())
}

async fn launch_app(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<LaunchResponse>, StatusCode> {
    match state.app.launch(name).await {
        Ok(url) => Ok(Json(LaunchResponse { url })),
        Err(e) => match e.downcast_ref::<LaunchError>() {
            Some(LaunchError::UnknownApp(_)) => Err(StatusCode::NOT_FOUND),
            Some(LaunchError::Spawn { .. }) => Err(StatusCode::BAD_GATEWAY),
            None => Err(internal_error("launch app", e)),
        },
    }
}

async fn get_window(State(state): State<AppState>) -> Result<Json<WindowState>, StatusCode> {
    state
        .app
        .window()
        .await
        .map(Json)
        .map_err(|e| internal_error("query window", e))
}

async fn show_window(State(state): State<AppState>) -> Result<Json<WindowState>, StatusCode> {
    state
        .app
        .set_window_visible(true)
        .await
        .map(Json)
        .map_err(|e| internal_error("show window", e))
}

async fn hide_window(State(state): State<AppState>) -> Result<Json<WindowState>, StatusCode> {
    state
        .app
        .set_window_visible(false)
        .await
        .map(Json)
        .map_err(|e| internal_error("hide window", e))
}

async fn close_window(State(state): State<AppState>) -> StatusCode {
    match state.app.close().await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => internal_error("close window", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;
    use shared::types::ServiceInfo;
    use crate::app::{self, AppContext, AppSettings, DiscoveryEvent};
    use crate::config::ResolverConfig;
    use crate::launcher::testing::RecordingOpener;
    use crate::resolver::Resolver;

    const KIOSK: &str = "kiosk._http._tcp.local.";

    async fn test_state(opener: RecordingOpener) -> (AppState, CancellationToken) {
        let (handle, rx) = app::channel();
        let (hash_tx, hash_rx) = watch::channel(String::new());
        let cancel = CancellationToken::new();
        let ctx = AppContext::new(
            Resolver::new(&ResolverConfig::default()).unwrap(),
            Arc::new(opener),
            AppSettings { hide_on_launch: true },
            handle.clone(),
            hash_tx,
            cancel.clone(),
        );
        tokio::spawn(app::run(ctx, rx));

        handle
            .discovery(DiscoveryEvent::Resolved(ServiceInfo {
                name: KIOSK.to_string(),
                service_type: "_http._tcp.local.".to_string(),
                hostname: "kiosk.local.".to_string(),
                address: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
                port: 8080,
                properties: HashMap::new(),
            }))
            .await
            .unwrap();
        // Round-trip so the discovery above has been applied
        handle.list_apps().await.unwrap();

        (AppState { app: handle, hash_rx }, cancel)
    }

    async fn send(state: &AppState, method: Method, path: &str) -> Response {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .expect("failed to build request");
        router(state.clone()).oneshot(req).await.expect("oneshot failed")
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .expect("failed to read body");
        serde_json::from_slice(&bytes).expect("body is not valid JSON")
    }

    #[tokio::test]
    async fn test_list_apps() {
        let (state, _cancel) = test_state(RecordingOpener::default()).await;

        let resp = send(&state, Method::GET, "/v1/apps").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json[0]["key"], KIOSK);
        assert_eq!(json[0]["label"], "kiosk");
        assert_eq!(json[0]["has_icon"], false);
        assert_eq!(json[0]["url"], "http://10.0.0.5:8080/");
    }

    #[tokio::test]
    async fn test_get_app_detail_and_missing() {
        let (state, _cancel) = test_state(RecordingOpener::default()).await;

        let resp = send(&state, Method::GET, &format!("/v1/apps/{}", KIOSK)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "not_net_app");
        assert_eq!(json["service"]["port"], 8080);

        let resp = send(&state, Method::GET, "/v1/apps/ghost._http._tcp.local.").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unresolved_icon_is_not_found() {
        let (state, _cancel) = test_state(RecordingOpener::default()).await;

        let resp = send(&state, Method::GET, &format!("/v1/apps/{}/icon", KIOSK)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_hash_endpoint() {
        let (state, _cancel) = test_state(RecordingOpener::default()).await;

        let resp = send(&state, Method::GET, "/v1/apps/hash").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        assert_eq!(bytes.len(), 64);
    }

    #[tokio::test]
    async fn test_launch_opens_url_and_hides_window() {
        let opener = RecordingOpener::default();
        let (state, _cancel) = test_state(opener.clone()).await;

        let resp = send(&state, Method::POST, &format!("/v1/apps/{}/launch", KIOSK)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["url"], "http://10.0.0.5:8080/");
        assert_eq!(opener.opened(), vec!["http://10.0.0.5:8080/".to_string()]);

        let resp = send(&state, Method::GET, "/v1/window").await;
        assert_eq!(body_json(resp).await["visible"], false);
    }

    #[tokio::test]
    async fn test_launch_errors() {
        let (state, _cancel) = test_state(RecordingOpener::default()).await;
        let resp = send(&state, Method::POST, "/v1/apps/ghost._http._tcp.local./launch").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let (state, _cancel) = test_state(RecordingOpener::failing()).await;
        let resp = send(&state, Method::POST, &format!("/v1/apps/{}/launch", KIOSK)).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_window_show_hide_close() {
        let (state, cancel) = test_state(RecordingOpener::default()).await;

        let resp = send(&state, Method::POST, "/v1/window/hide").await;
        assert_eq!(body_json(resp).await["visible"], false);
        let resp = send(&state, Method::POST, "/v1/window/show").await;
        assert_eq!(body_json(resp).await["visible"], true);

        let resp = send(&state, Method::POST, "/v1/window/close").await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        tokio::time::timeout(std::time::Duration::from_secs(5), cancel.cancelled())
            .await
            .unwrap();
    }
}
