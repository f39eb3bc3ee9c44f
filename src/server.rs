use crate::config::AppConfig;
use crate::dashboard::{self, DashboardRequest, DashboardView, RegionValue};
use crate::data;
use crate::error::DashboardError;
use crate::processing::{self, Conversion, WeightUnit};
use crate::render;
use crate::types::{AugmentedRegion, ChoroplethMap};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::Point;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

// Wrapper for RTree indexing
struct AreaIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for AreaIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Point-in-region lookup over a joined map.
pub struct RegionLocator<'a> {
    map: &'a ChoroplethMap,
    tree: RTree<AreaIndex>,
}

impl<'a> RegionLocator<'a> {
    pub fn new(map: &'a ChoroplethMap) -> Self {
        let items: Vec<AreaIndex> = map
            .regions
            .iter()
            .enumerate()
            .filter_map(|(index, r)| {
                let rect = r.region.geometry.bounding_rect()?;
                Some(AreaIndex {
                    index,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();

        Self {
            map,
            tree: RTree::bulk_load(items),
        }
    }

    pub fn locate(&self, lon: f64, lat: f64) -> Option<&'a AugmentedRegion> {
        let map = self.map;
        let point = Point::new(lon, lat);
        let envelope = AABB::from_point([lon, lat]);

        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .filter_map(|candidate| map.regions.get(candidate.index))
            .find(|area| area.region.geometry.contains(&point))
    }
}

pub struct AppState {
    pub config: AppConfig,
}

/// Error body for the JSON API.
pub struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<DashboardError>() {
            Some(DashboardError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Some(DashboardError::Schema { .. }) | Some(DashboardError::EmptyRegionSet { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {:#}", self.0);
        }
        let body = serde_json::json!({ "error": format!("{:#}", self.0) });
        (status, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
pub struct ConvertParams {
    #[serde(default)]
    unit: WeightUnit,
    weight: f64,
    price_per_gram: f64,
    inr_per_usd: Option<f64>,
}

#[derive(Serialize)]
pub struct ConvertResponse {
    #[serde(flatten)]
    conversion: Conversion,
    summary: String,
}

#[derive(Deserialize)]
pub struct MapParams {
    country: Option<String>,
}

#[derive(Deserialize)]
pub struct RegionParams {
    lat: f64,
    lon: f64,
    country: Option<String>,
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let app = router(config);

    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(config: AppConfig) -> Router {
    let chart_service = ServeDir::new(&config.output.chart_dir);
    let state = Arc::new(AppState { config });

    Router::new()
        .route("/api/convert", get(convert_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/map", get(map_handler))
        .route("/api/region", get(region_handler))
        .nest_service("/charts", chart_service)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn convert_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConvertParams>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let rate = params.inr_per_usd.unwrap_or(state.config.charts.inr_per_usd);
    let conversion = processing::convert_price(params.unit, params.weight, params.price_per_gram, rate)?;
    Ok(Json(ConvertResponse {
        summary: conversion.summary(),
        conversion,
    }))
}

/// Re-reads every input, assembles the view and refreshes the chart files.
async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Query(request): Query<DashboardRequest>,
) -> Result<Json<DashboardView>, ApiError> {
    let view = tokio::task::spawn_blocking(move || -> Result<DashboardView> {
        let datasets = data::load_datasets(&state.config)?;
        let view = dashboard::assemble(&datasets, &request, &state.config)?;
        render::render_dashboard(&state.config, &view)?;
        Ok(view)
    })
    .await??;
    Ok(Json(view))
}

async fn map_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MapParams>,
) -> Result<Json<geojson::FeatureCollection>, ApiError> {
    let collection = tokio::task::spawn_blocking(move || -> Result<geojson::FeatureCollection> {
        let map = load_map(&state.config, params.country)?;
        Ok(map.to_feature_collection())
    })
    .await??;
    Ok(Json(collection))
}

async fn region_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RegionParams>,
) -> Result<Json<Option<RegionValue>>, ApiError> {
    let found = tokio::task::spawn_blocking(move || -> Result<Option<RegionValue>> {
        let map = load_map(&state.config, params.country)?;
        let locator = RegionLocator::new(&map);
        Ok(locator.locate(params.lon, params.lat).map(|area| RegionValue {
            name: area.region.name.clone(),
            value: area.value,
        }))
    })
    .await??;
    Ok(Json(found))
}

fn load_map(config: &AppConfig, country: Option<String>) -> Result<ChoroplethMap> {
    let purchases = data::load_purchases(&config.input.purchase_csv)?;
    let regions = data::load_regions(&config.input.regions, &config.map)?;
    let country = country.unwrap_or_else(|| config.map.country.clone());
    Ok(crate::choropleth::build(&regions, &purchases, &country)?)
}
