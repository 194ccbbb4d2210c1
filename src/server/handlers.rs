use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::catalog::{
    feature_entries, nearby_stations, release_highlights, system_status, FeatureEntry, NearbyStation, Role,
    StatusItem,
};
use crate::links::map_url;
use crate::location::{LocationError, LocationReport, LocationStatus};
use crate::region::{Coordinate, RegionBoundingBox, RegionLookup};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

impl From<LocationError> for ApiError {
    fn from(e: LocationError) -> Self {
        let status = match e {
            LocationError::PermissionDenied => StatusCode::FORBIDDEN,
            LocationError::InFlight => StatusCode::CONFLICT,
            LocationError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            LocationError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            LocationError::InvalidResponse(_) | LocationError::InvalidCoordinate(_) => StatusCode::BAD_GATEWAY,
        };
        api_error(status, e.to_string())
    }
}

// Query values arrive as strings so that malformed input gets the JSON error body.
fn number_param(name: &str, raw: Option<&str>) -> Result<Option<f64>, ApiError> {
    raw.map(|v| {
        v.trim()
            .parse::<f64>()
            .map_err(|_| api_error(StatusCode::BAD_REQUEST, format!("Invalid '{}' value '{}'", name, v)))
    })
    .transpose()
}

fn flag_param(name: &str, raw: Option<&str>) -> Result<bool, ApiError> {
    match raw.map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(_) => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid '{}' value '{}'. Use 'true' or 'false'.", name, raw.unwrap_or_default()),
        )),
    }
}

fn coordinate_param(lat: Option<&str>, lon: Option<&str>) -> Result<Coordinate, ApiError> {
    let (Some(lat), Some(lon)) = (number_param("lat", lat)?, number_param("lon", lon)?) else {
        return Err(api_error(StatusCode::BAD_REQUEST, "Provide 'lat' and 'lon' parameters"));
    };
    let coord = Coordinate::new(lat, lon).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    if !coord.is_geographic() {
        tracing::debug!(%coord, "coordinate outside the lat/lon grid");
    }
    Ok(coord)
}

// ─── GET /api/region ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CoordQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
}

pub async fn region(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CoordQuery>,
) -> Result<Json<RegionLookup>, ApiError> {
    let coord = coordinate_param(params.lat.as_deref(), params.lon.as_deref())?;
    Ok(Json(state.regions.lookup(coord.latitude, coord.longitude)))
}

// ─── GET /api/regions ────────────────────────────────────────────

pub async fn region_list(State(state): State<Arc<AppState>>) -> Json<&'static [RegionBoundingBox]> {
    Json(state.regions.entries())
}

// ─── /api/location ───────────────────────────────────────────────

pub async fn location_status(State(state): State<Arc<AppState>>) -> Json<LocationStatus> {
    Json(state.session.status())
}

pub async fn refresh_location(State(state): State<Arc<AppState>>) -> Result<Json<LocationReport>, ApiError> {
    let start = Instant::now();
    let worker = state.clone();
    let outcome = tokio::task::spawn_blocking(move || worker.session.refresh())
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("location task failed: {}", e)))?;

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    match outcome {
        Ok(report) => {
            tracing::info!(region = report.region, reused = report.reused, elapsed_ms, "POST /api/location/refresh");
            Ok(Json(report))
        }
        Err(e) => {
            tracing::warn!(error = %e, elapsed_ms, "POST /api/location/refresh");
            Err(e.into())
        }
    }
}

// ─── GET /api/stations ───────────────────────────────────────────

pub async fn station_list() -> Json<&'static [NearbyStation]> {
    Json(nearby_stations())
}

// ─── GET /api/features ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct FeaturesQuery {
    pub role: Option<String>,
}

#[derive(Serialize)]
pub struct FeaturesResponse {
    pub role: Role,
    pub label: &'static str,
    pub description: &'static str,
    pub features: Vec<FeatureEntry>,
}

pub async fn feature_list(Query(params): Query<FeaturesQuery>) -> Result<Json<FeaturesResponse>, ApiError> {
    let role = params
        .role
        .as_deref()
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing 'role' parameter"))?
        .parse::<Role>()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    Ok(Json(FeaturesResponse {
        role,
        label: role.label(),
        description: role.description(),
        features: feature_entries(role),
    }))
}

// ─── GET /api/links ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LinksQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
    /// Whether the client can open the chat app scheme.
    pub app: Option<String>,
}

#[derive(Serialize)]
pub struct LinksResponse {
    pub map_url: Option<String>,
    pub support_url: String,
    pub support_id: String,
}

pub async fn links(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LinksQuery>,
) -> Result<Json<LinksResponse>, ApiError> {
    let app = flag_param("app", params.app.as_deref())?;
    let map = match (params.lat.as_deref(), params.lon.as_deref()) {
        (None, None) => match state.session.status() {
            LocationStatus::Ready { report } => Some(map_url(report.latitude, report.longitude)),
            _ => None,
        },
        (lat, lon) => {
            let c = coordinate_param(lat, lon)?;
            Some(map_url(c.latitude, c.longitude))
        }
    };

    Ok(Json(LinksResponse {
        map_url: map,
        support_url: state.support.url(app).to_string(),
        support_id: state.support.id.clone(),
    }))
}

// ─── GET /api/system ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct SystemResponse {
    pub status: &'static [StatusItem],
    pub highlights: &'static [&'static str],
}

pub async fn system_info() -> Json<SystemResponse> {
    Json(SystemResponse {
        status: system_status(),
        highlights: release_highlights(),
    })
}
