mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

use crate::config::Config;
use crate::location::LocationSession;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/region", get(handlers::region))
        .route("/api/regions", get(handlers::region_list))
        .route("/api/location", get(handlers::location_status))
        .route("/api/location/refresh", post(handlers::refresh_location))
        .route("/api/stations", get(handlers::station_list))
        .route("/api/features", get(handlers::feature_list))
        .route("/api/links", get(handlers::links))
        .route("/api/system", get(handlers::system_info))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn router_for_session(session: LocationSession) -> Router {
    build_router(Arc::new(AppState::new(session)))
}

pub async fn start(config: &Config) -> std::io::Result<()> {
    let app = router_for_session(config.build_session());
    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(provider = ?config.provider, "listening on http://{}", addr);
    eprintln!("  Zenkoku Taxi server listening on http://{}", addr);
    eprintln!("  Press Ctrl+C to stop.");

    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{
        Fix, FixSource, LocationError, LocationProvider, Permission, PositionOptions, StaticProvider,
    };
    use crate::region::Coordinate;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use chrono::Utc;
    use serde_json::Value;
    use std::sync::{mpsc, Mutex};
    use std::time::Duration;
    use tower::ServiceExt;

    struct FailingProvider(LocationError);

    impl LocationProvider for FailingProvider {
        fn request_permission(&self) -> Permission {
            Permission::Granted
        }

        fn current_position(&self, _opts: &PositionOptions) -> Result<Fix, LocationError> {
            Err(self.0.clone())
        }
    }

    /// Blocks inside `current_position` until released.
    struct GatedProvider {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl LocationProvider for GatedProvider {
        fn request_permission(&self) -> Permission {
            Permission::Granted
        }

        fn current_position(&self, _opts: &PositionOptions) -> Result<Fix, LocationError> {
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            Ok(Fix {
                latitude: 43.06,
                longitude: 141.35,
                accuracy: None,
                timestamp: Utc::now(),
                source: FixSource::Static,
            })
        }
    }

    fn opts() -> PositionOptions {
        PositionOptions {
            timeout: Duration::from_secs(1),
            maximum_age: Duration::ZERO,
        }
    }

    fn session_at(lat: f64, lon: f64, permission: Permission) -> LocationSession {
        let provider = StaticProvider::new(Coordinate { latitude: lat, longitude: lon }, Some(3.0))
            .with_permission(permission);
        LocationSession::new(Arc::new(provider), opts())
    }

    fn app() -> Router {
        router_for_session(session_at(35.1815, 136.9066, Permission::Granted))
    }

    async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_region_aichi() {
        let (status, body) = call(app(), Method::GET, "/api/region?lat=35.1815&lon=136.9066").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["region"], "愛知県");
        assert_eq!(body["matched"], true);
        assert_eq!(body["key"], "aichi");
    }

    #[tokio::test]
    async fn test_region_fallback() {
        let (status, body) = call(app(), Method::GET, "/api/region?lat=90&lon=180").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["region"], "その他地域");
        assert_eq!(body["matched"], false);
    }

    #[tokio::test]
    async fn test_region_missing_params() {
        let (status, body) = call(app(), Method::GET, "/api/region?lat=35.0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
    }

    #[tokio::test]
    async fn test_region_rejects_nan() {
        let (status, _) = call(app(), Method::GET, "/api/region?lat=NaN&lon=136.9").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_region_list() {
        let (status, body) = call(app(), Method::GET, "/api/regions").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 5);
        assert_eq!(body[0]["name"], "北海道");
    }

    #[tokio::test]
    async fn test_location_lifecycle() {
        let app = app();
        let (_, body) = call(app.clone(), Method::GET, "/api/location").await;
        assert_eq!(body["status"], "idle");

        let (status, body) = call(app.clone(), Method::POST, "/api/location/refresh").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["region"], "愛知県");
        assert_eq!(body["source"], "Static");

        let (_, body) = call(app.clone(), Method::GET, "/api/location").await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["report"]["region"], "愛知県");

        let (_, body) = call(app, Method::GET, "/api/links?app=true").await;
        assert_eq!(body["map_url"], "https://www.google.com/maps/@35.1815,136.9066,16z");
        assert_eq!(body["support_url"], "line://ti/p/@dhai52765howdah");
    }

    #[tokio::test]
    async fn test_refresh_permission_denied() {
        let app = router_for_session(session_at(35.0, 137.0, Permission::Denied));
        let (status, body) = call(app.clone(), Method::POST, "/api/location/refresh").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "location permission denied");

        let (_, body) = call(app, Method::GET, "/api/location").await;
        assert_eq!(body["status"], "permission_denied");
    }

    #[tokio::test]
    async fn test_stations() {
        let (status, body) = call(app(), Method::GET, "/api/stations").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 4);
        assert_eq!(body[1]["name"], "栄駅");
    }

    #[tokio::test]
    async fn test_features() {
        let (status, body) = call(app(), Method::GET, "/api/features?role=driver").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "driver");
        assert_eq!(body["features"].as_array().unwrap().len(), 4);
        assert_eq!(body["features"][2]["name"], "収益最適化");
        assert_eq!(
            body["features"][2]["notice"]["message"],
            "収益最適化機能は開発中です。v3.1.0でリリース予定です。"
        );

        let (status, _) = call(app(), Method::GET, "/api/features?role=pilot").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(app(), Method::GET, "/api/features").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_links_without_fix() {
        let (status, body) = call(app(), Method::GET, "/api/links").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["map_url"].is_null());
        assert_eq!(body["support_url"], "https://line.me/ti/p/@dhai52765howdah");
        assert_eq!(body["support_id"], "@dhai52765howdah");

        let (_, body) = call(app(), Method::GET, "/api/links?lat=43.06&lon=141.35").await;
        assert_eq!(body["map_url"], "https://www.google.com/maps/@43.06,141.35,16z");

        let (status, _) = call(app(), Method::GET, "/api/links?lat=43.06").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_region_malformed_number_is_json_400() {
        let (status, body) = call(app(), Method::GET, "/api/region?lat=abc&lon=1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
        assert_eq!(body["error"], "Invalid 'lat' value 'abc'");
    }

    #[tokio::test]
    async fn test_links_malformed_flag_is_json_400() {
        let (status, body) = call(app(), Method::GET, "/api/links?app=yes").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
        assert!(body["error"].as_str().unwrap().contains("'app'"));
    }

    #[tokio::test]
    async fn test_refresh_failures_map_to_gateway_codes() {
        let cases = [
            (LocationError::Timeout(Duration::from_millis(50)), StatusCode::GATEWAY_TIMEOUT),
            (LocationError::Unavailable("no network".into()), StatusCode::SERVICE_UNAVAILABLE),
            (LocationError::InvalidResponse("no latitude".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, expected) in cases {
            let session = LocationSession::new(Arc::new(FailingProvider(err.clone())), opts());
            let app = router_for_session(session);

            let (status, body) = call(app.clone(), Method::POST, "/api/location/refresh").await;
            assert_eq!(status, expected, "{}", err);
            assert_eq!(body["code"], expected.as_u16());
            assert_eq!(body["error"], err.to_string());

            let (_, body) = call(app, Method::GET, "/api/location").await;
            assert_eq!(body["status"], "failed");
        }
    }

    #[tokio::test]
    async fn test_concurrent_refresh_conflicts() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let provider = GatedProvider {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        let state = Arc::new(AppState::new(LocationSession::new(Arc::new(provider), opts())));

        let worker = {
            let state = state.clone();
            std::thread::spawn(move || state.session.refresh())
        };
        entered_rx.recv().unwrap();

        let (status, body) = call(build_router(state.clone()), Method::POST, "/api/location/refresh").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], 409);

        let (_, body) = call(build_router(state.clone()), Method::GET, "/api/location").await;
        assert_eq!(body["status"], "fetching");

        release_tx.send(()).unwrap();
        let report = worker.join().unwrap().unwrap();
        assert_eq!(report.region, "北海道");
    }

    #[tokio::test]
    async fn test_system_panel() {
        let (status, body) = call(app(), Method::GET, "/api/system").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"].as_array().unwrap().len(), 4);
        assert_eq!(body["status"][0]["label"], "バックエンド");
        assert_eq!(body["status"][0]["value"], "運用中");
        assert_eq!(body["highlights"][1], "プロフェッショナルLINEサポート 24/7");
    }
}
