//! State-wise join of purchase amounts onto region geometries.
//!
//! Names are matched case-insensitively and exactly (no trimming, no fuzzy
//! matching). Regions with no match, or with no name at all, get `0.0` so that
//! every region in the output carries exactly one value.

use crate::error::DashboardError;
use crate::types::{AugmentedRegion, ChoroplethMap, PurchaseRecord, RegionCollection, RegionGeometry};
use geo::{coord, BoundingRect, Rect};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use std::collections::HashMap;
use tracing::{debug, info};

/// Case-insensitive lookup over purchase records.
///
/// When several records share a name under case folding, the one whose
/// original-case name sorts lowest wins; identical names keep the first row.
pub struct PurchaseIndex<'a> {
    by_name: HashMap<String, &'a PurchaseRecord>,
}

impl<'a> PurchaseIndex<'a> {
    pub fn new(records: &'a [PurchaseRecord]) -> Self {
        let mut by_name: HashMap<String, &'a PurchaseRecord> = HashMap::new();
        for record in records {
            let key = record.region_name.to_lowercase();
            let keep_existing = by_name
                .get(&key)
                .is_some_and(|existing| existing.region_name <= record.region_name);
            if keep_existing {
                debug!("Duplicate purchase row '{}' ignored", record.region_name);
            } else {
                by_name.insert(key, record);
            }
        }
        Self { by_name }
    }

    pub fn get(&self, name: Option<&str>) -> f64 {
        name.and_then(|n| self.by_name.get(&n.to_lowercase()))
            .map(|record| record.amount)
            .unwrap_or(0.0)
    }
}

/// Keep only regions whose country matches `label`, ignoring case.
///
/// Sources without a country column pass through untouched.
pub fn filter_by_country(collection: &RegionCollection, label: &str) -> RegionCollection {
    if !collection.has_country_field {
        return collection.clone();
    }

    let label = label.to_lowercase();
    let regions = collection
        .regions
        .iter()
        .filter(|region| {
            region
                .country
                .as_deref()
                .is_some_and(|country| country.to_lowercase() == label)
        })
        .cloned()
        .collect();

    RegionCollection {
        regions,
        has_country_field: true,
    }
}

pub fn lookup_value(name: Option<&str>, records: &[PurchaseRecord]) -> f64 {
    PurchaseIndex::new(records).get(name)
}

/// Filter by country, attach purchase amounts and compute the map extent.
pub fn build(
    collection: &RegionCollection,
    records: &[PurchaseRecord],
    country_label: &str,
) -> Result<ChoroplethMap, DashboardError> {
    let filtered = filter_by_country(collection, country_label);
    debug!(
        "Kept {} of {} regions for '{}'",
        filtered.regions.len(),
        collection.regions.len(),
        country_label
    );

    let empty = || DashboardError::EmptyRegionSet {
        label: country_label.to_string(),
    };
    if filtered.regions.is_empty() {
        return Err(empty());
    }
    // Regions with no coordinates contribute nothing to the extent.
    let bounds = total_bounds(&filtered.regions).ok_or_else(empty)?;

    let index = PurchaseIndex::new(records);
    let regions: Vec<AugmentedRegion> = filtered
        .regions
        .into_iter()
        .map(|region| {
            let value = index.get(region.name.as_deref());
            AugmentedRegion { region, value }
        })
        .collect();

    let matched = regions.iter().filter(|r| r.value > 0.0).count();
    info!(
        "Joined {} purchase rows onto {} regions ({} non-zero)",
        records.len(),
        regions.len(),
        matched
    );

    Ok(ChoroplethMap { regions, bounds })
}

/// Tightest rectangle around every region that has coordinates.
pub fn total_bounds(regions: &[RegionGeometry]) -> Option<Rect<f64>> {
    regions
        .iter()
        .filter_map(|region| region.geometry.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            )
        })
}

impl ChoroplethMap {
    /// Smallest and largest value across regions, for the colour ramp.
    pub fn value_range(&self) -> (f64, f64) {
        self.regions.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
            (lo.min(r.value), hi.max(r.value))
        })
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .regions
            .iter()
            .map(|augmented| {
                let mut properties = JsonObject::new();
                properties.insert("name".to_string(), augmented.region.name.clone().into());
                properties.insert("country".to_string(), augmented.region.country.clone().into());
                properties.insert("value".to_string(), augmented.value.into());

                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(Value::from(&augmented.region.geometry))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}
