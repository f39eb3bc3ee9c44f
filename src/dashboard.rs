//! Request/response boundary for one dashboard refresh.
//!
//! A shell (CLI or HTTP) loads [`Datasets`](crate::data::Datasets), describes
//! the current selections in a [`DashboardRequest`], and gets back everything
//! the charts need. Nothing is cached between calls.

use crate::choropleth;
use crate::config::AppConfig;
use crate::data::Datasets;
use crate::error::DashboardError;
use crate::processing::{self, Conversion, PriceRange, TrendPoint, WeightUnit};
use crate::types::{Bounds, ChoroplethMap, PriceRecord, PurchaseRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Current selections. Unset options fall back to the configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DashboardRequest {
    pub unit: WeightUnit,
    pub weight: f64,
    pub price_per_gram: f64,
    pub inr_per_usd: Option<f64>,
    pub range: PriceRange,
    pub top_n: Option<usize>,
    pub month: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionValue {
    pub name: Option<String>,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapSummary {
    pub country: String,
    pub regions: Vec<RegionValue>,
    pub bounds: Bounds,
    pub min_value: f64,
    pub max_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub conversion: Conversion,
    pub conversion_summary: String,
    pub price_range: PriceRange,
    pub price_range_label: &'static str,
    pub prices: Vec<PriceRecord>,
    pub map: MapSummary,
    #[serde(skip)]
    pub choropleth: ChoroplethMap,
    pub top_states: Vec<PurchaseRecord>,
    pub trend_month: String,
    pub trend: Vec<TrendPoint>,
}

pub fn assemble(
    datasets: &Datasets,
    request: &DashboardRequest,
    config: &AppConfig,
) -> Result<DashboardView, DashboardError> {
    let inr_per_usd = request.inr_per_usd.unwrap_or(config.charts.inr_per_usd);
    let conversion = processing::convert_price(
        request.unit,
        request.weight,
        request.price_per_gram,
        inr_per_usd,
    )?;

    let prices = processing::filter_price_range(&datasets.prices, request.range);

    let country = request
        .country
        .clone()
        .unwrap_or_else(|| config.map.country.clone());
    let choropleth = choropleth::build(&datasets.regions, &datasets.purchases, &country)?;
    let (min_value, max_value) = choropleth.value_range();
    let map = MapSummary {
        country,
        regions: choropleth
            .regions
            .iter()
            .map(|r| RegionValue {
                name: r.region.name.clone(),
                value: r.value,
            })
            .collect(),
        bounds: choropleth.bounds.into(),
        min_value,
        max_value,
    };

    let top_n = request.top_n.unwrap_or(config.charts.top_n);
    let top_states = processing::top_purchases(&datasets.purchases, top_n);

    let trend_month = request
        .month
        .clone()
        .unwrap_or_else(|| config.charts.trend_month.clone());
    let trend = processing::monthly_trend(&datasets.prices, &trend_month);

    debug!(
        "Assembled dashboard: {} prices in range '{}', {} regions, {} trend points",
        prices.len(),
        request.range.label(),
        map.regions.len(),
        trend.len()
    );

    Ok(DashboardView {
        conversion_summary: conversion.summary(),
        conversion,
        price_range: request.range,
        price_range_label: request.range.label(),
        prices,
        map,
        choropleth,
        top_states,
        trend_month,
        trend,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RegionCollection, RegionGeometry};
    use geo::{coord, MultiPolygon, Rect};

    fn config() -> AppConfig {
        AppConfig::from_toml(
            r#"
            [input]
            price_csv = "prices.csv"
            purchase_csv = "purchases.csv"
            regions = "states.geojson"
            "#,
        )
        .unwrap()
    }

    fn datasets() -> Datasets {
        let square = |x: f64| {
            MultiPolygon::new(vec![Rect::new(coord! { x: x, y: 10.0 }, coord! { x: x + 1.0, y: 11.0 }).to_polygon()])
        };
        Datasets {
            prices: vec![
                PriceRecord {
                    index: 0,
                    year: 2012,
                    month: "Jan".into(),
                    price_inr_per_kg: 56_000.0,
                },
                PriceRecord {
                    index: 1,
                    year: 2012,
                    month: "Feb".into(),
                    price_inr_per_kg: 18_000.0,
                },
            ],
            purchases: vec![
                PurchaseRecord {
                    region_name: "goa".into(),
                    amount: 150.0,
                },
                PurchaseRecord {
                    region_name: "Kerala".into(),
                    amount: 90.0,
                },
            ],
            regions: RegionCollection {
                regions: vec![
                    RegionGeometry {
                        name: Some("Goa".into()),
                        country: Some("India".into()),
                        geometry: square(73.0),
                    },
                    RegionGeometry {
                        name: Some("Goa".into()),
                        country: Some("Brazil".into()),
                        geometry: square(-45.0),
                    },
                ],
                has_country_field: true,
            },
        }
    }

    #[test]
    fn defaults_come_from_config() {
        let view = assemble(&datasets(), &DashboardRequest::default(), &config()).unwrap();

        assert_eq!(view.map.country, "India");
        assert_eq!(view.map.regions.len(), 1);
        assert_eq!(view.map.regions[0].value, 150.0);
        assert_eq!(view.map.bounds.min_x, 73.0);
        assert_eq!(view.prices.len(), 2);
        assert_eq!(view.trend_month, "Jan");
        assert_eq!(view.trend.len(), 1);
        assert_eq!(view.top_states[0].region_name, "goa");
    }

    #[test]
    fn selections_override_defaults() {
        let request = DashboardRequest {
            unit: WeightUnit::Kilograms,
            weight: 1.0,
            price_per_gram: 90.0,
            inr_per_usd: Some(90.0),
            range: PriceRange::Below20k,
            top_n: Some(1),
            month: Some("Feb".into()),
            country: Some("brazil".into()),
        };
        let view = assemble(&datasets(), &request, &config()).unwrap();

        assert_eq!(view.conversion.total_usd, 1000.0);
        assert_eq!(view.prices.len(), 1);
        assert_eq!(view.prices[0].index, 1);
        assert_eq!(view.top_states.len(), 1);
        assert_eq!(view.trend[0].price_inr_per_kg, 18_000.0);
        assert_eq!(view.map.bounds.min_x, -45.0);
    }

    #[test]
    fn unknown_country_is_an_error() {
        let request = DashboardRequest {
            country: Some("Atlantis".into()),
            ..DashboardRequest::default()
        };
        let err = assemble(&datasets(), &request, &config()).unwrap_err();
        assert!(matches!(err, DashboardError::EmptyRegionSet { .. }));
    }

    #[test]
    fn view_serializes_without_geometry() {
        let view = assemble(&datasets(), &DashboardRequest::default(), &config()).unwrap();
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("choropleth").is_none());
        assert_eq!(json["price_range"], "all");
        assert_eq!(json["map"]["regions"][0]["name"], "Goa");
    }
}
