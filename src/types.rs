use geo::{MultiPolygon, Rect};
use serde::Serialize;

/// One administrative boundary from the geometry source.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionGeometry {
    pub name: Option<String>,
    pub country: Option<String>,
    pub geometry: MultiPolygon<f64>,
}

/// Loaded geometries plus whether the source schema had a country column at all.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCollection {
    pub regions: Vec<RegionGeometry>,
    pub has_country_field: bool,
}

/// One row of the state-wise purchase table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseRecord {
    pub region_name: String,
    pub amount: f64,
}

/// One row of the historical price table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRecord {
    // Row position in the source file, used as the "time period" axis.
    pub index: usize,
    pub year: i32,
    pub month: String,
    pub price_inr_per_kg: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedRegion {
    pub region: RegionGeometry,
    pub value: f64,
}

/// Joined regions ready to draw, with the rectangle to crop the map to.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoroplethMap {
    pub regions: Vec<AugmentedRegion>,
    pub bounds: Rect<f64>,
}

/// Serializable form of a bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl From<Rect<f64>> for Bounds {
    fn from(rect: Rect<f64>) -> Self {
        Self {
            min_x: rect.min().x,
            min_y: rect.min().y,
            max_x: rect.max().x,
            max_y: rect.max().y,
        }
    }
}
