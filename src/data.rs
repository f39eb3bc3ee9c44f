use crate::config::{AppConfig, MapConfig};
use crate::error::DashboardError;
use crate::types::{PriceRecord, PurchaseRecord, RegionCollection, RegionGeometry};
use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use geo::MultiPolygon;
use geojson::{GeoJson, JsonObject};
use shapefile::dbase::FieldValue;
use shapefile::{Reader, ShapeReader};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::ZipArchive;

pub const STATE_COLUMN: &str = "State";
pub const PURCHASED_COLUMN: &str = "Silver_Purchased_kg";
pub const YEAR_COLUMN: &str = "Year";
pub const MONTH_COLUMN: &str = "Month";
pub const PRICE_COLUMN: &str = "Silver_Price_INR_per_kg";

const PURCHASE_SOURCE: &str = "purchase CSV";
const PRICE_SOURCE: &str = "price CSV";
const REGION_SOURCE: &str = "region geometry";

/// Everything one dashboard render needs, read fresh from disk.
#[derive(Debug, Clone)]
pub struct Datasets {
    pub prices: Vec<PriceRecord>,
    pub purchases: Vec<PurchaseRecord>,
    pub regions: RegionCollection,
}

pub fn load_datasets(config: &AppConfig) -> Result<Datasets> {
    let prices = load_prices(&config.input.price_csv)?;
    let purchases = load_purchases(&config.input.purchase_csv)?;
    let regions = load_regions(&config.input.regions, &config.map)?;

    info!(
        "Loaded {} price rows, {} purchase rows, {} regions",
        prices.len(),
        purchases.len(),
        regions.regions.len()
    );

    Ok(Datasets {
        prices,
        purchases,
        regions,
    })
}

pub fn load_purchases(path: &Path) -> Result<Vec<PurchaseRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open purchase CSV: {:?}", path))?;
    read_purchases(file)
}

pub fn read_purchases<R: Read>(reader: R) -> Result<Vec<PurchaseRecord>> {
    let mut rdr = ReaderBuilder::new().from_reader(reader);
    let headers = rdr.headers()?.clone();

    let state_idx = column_index(&headers, STATE_COLUMN, PURCHASE_SOURCE)?;
    let amount_idx = column_index(&headers, PURCHASED_COLUMN, PURCHASE_SOURCE)?;

    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record_line(&record);

        let region_name = record.get(state_idx).unwrap_or("").to_string();
        if region_name.is_empty() {
            return Err(row_error(PURCHASE_SOURCE, line, format!("empty '{}'", STATE_COLUMN)).into());
        }
        let amount = parse_f64(&record, amount_idx, PURCHASED_COLUMN, PURCHASE_SOURCE, line)?;
        if amount < 0.0 {
            return Err(row_error(
                PURCHASE_SOURCE,
                line,
                format!("negative '{}' value {}", PURCHASED_COLUMN, amount),
            )
            .into());
        }

        records.push(PurchaseRecord { region_name, amount });
    }

    debug!("Read {} purchase rows", records.len());
    Ok(records)
}

pub fn load_prices(path: &Path) -> Result<Vec<PriceRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open price CSV: {:?}", path))?;
    read_prices(file)
}

pub fn read_prices<R: Read>(reader: R) -> Result<Vec<PriceRecord>> {
    let mut rdr = ReaderBuilder::new().from_reader(reader);
    let headers = rdr.headers()?.clone();

    let year_idx = column_index(&headers, YEAR_COLUMN, PRICE_SOURCE)?;
    let month_idx = column_index(&headers, MONTH_COLUMN, PRICE_SOURCE)?;
    let price_idx = column_index(&headers, PRICE_COLUMN, PRICE_SOURCE)?;

    let mut records = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        let record = result?;
        let line = record_line(&record);

        let raw_year = record.get(year_idx).unwrap_or("").trim();
        let year: i32 = raw_year.parse().map_err(|_| {
            row_error(PRICE_SOURCE, line, format!("'{}' is not a year", raw_year))
        })?;
        let month = record.get(month_idx).unwrap_or("").to_string();
        let price_inr_per_kg = parse_f64(&record, price_idx, PRICE_COLUMN, PRICE_SOURCE, line)?;

        records.push(PriceRecord {
            index,
            year,
            month,
            price_inr_per_kg,
        });
    }

    debug!("Read {} price rows", records.len());
    Ok(records)
}

/// Load region boundaries from a Shapefile, a zipped Shapefile or a GeoJSON file.
pub fn load_regions(path: &Path, map: &MapConfig) -> Result<RegionCollection> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Input geometry file has no extension"))?;

    let collection = match extension.as_str() {
        "shp" => load_shapefile(path, map)?,
        "zip" => load_zipped_shapefile(path, map)?,
        "json" | "geojson" => load_geojson(path, map)?,
        _ => return Err(DashboardError::UnsupportedFormat(extension).into()),
    };

    info!(
        "Loaded {} regions from {:?} (country column present: {})",
        collection.regions.len(),
        path,
        collection.has_country_field
    );
    Ok(collection)
}

fn load_shapefile(path: &Path, map: &MapConfig) -> Result<RegionCollection> {
    let reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open Shapefile: {:?}", path))?;
    read_shapefile(reader, map)
}

/// Read the first `.shp` in the archive together with its `.dbf` sibling.
fn load_zipped_shapefile(path: &Path, map: &MapConfig) -> Result<RegionCollection> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open archive: {:?}", path))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("Failed to read zip archive: {:?}", path))?;

    let shp_name = archive
        .file_names()
        .find(|n| n.to_lowercase().ends_with(".shp"))
        .map(str::to_string)
        .ok_or_else(|| anyhow!("No .shp entry in archive {:?}", path))?;
    let dbf_wanted = format!("{}.dbf", &shp_name[..shp_name.len() - 4]).to_lowercase();
    let dbf_name = archive
        .file_names()
        .find(|n| n.to_lowercase() == dbf_wanted)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("No .dbf entry next to '{}' in archive {:?}", shp_name, path))?;
    debug!("Reading '{}' and '{}' from {:?}", shp_name, dbf_name, path);

    let shp = read_entry(&mut archive, &shp_name)?;
    let dbf = read_entry(&mut archive, &dbf_name)?;

    let shape_reader = ShapeReader::new(Cursor::new(shp))
        .with_context(|| format!("Failed to read '{}' from {:?}", shp_name, path))?;
    let dbase_reader = shapefile::dbase::Reader::new(Cursor::new(dbf))
        .with_context(|| format!("Failed to read '{}' from {:?}", dbf_name, path))?;
    read_shapefile(Reader::new(shape_reader, dbase_reader), map)
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive.by_name(name)?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

fn read_shapefile<T, D>(mut reader: Reader<T, D>, map: &MapConfig) -> Result<RegionCollection>
where
    T: Read + Seek,
    D: Read + Seek,
{
    let mut regions = Vec::new();
    let mut has_country_field = false;

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let name = match record.get(&map.name_column) {
            Some(value) => dbase_text(value, &map.name_column)?,
            None => return Err(DashboardError::missing_column(REGION_SOURCE, &map.name_column).into()),
        };
        let country = match record.get(&map.country_column) {
            Some(value) => {
                has_country_field = true;
                dbase_text(value, &map.country_column)?
            }
            None => None,
        };

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygon: {:?}", e))?,
            shapefile::Shape::PolygonM(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygonM: {:?}", e))?,
            shapefile::Shape::PolygonZ(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygonZ: {:?}", e))?,
            other => {
                warn!("Skipping non-polygon shape {:?} for {:?}", other.shapetype(), name);
                continue;
            }
        };

        regions.push(RegionGeometry {
            name,
            country,
            geometry,
        });
    }

    Ok(RegionCollection {
        regions,
        has_country_field,
    })
}

fn dbase_text(value: &FieldValue, column: &str) -> Result<Option<String>> {
    match value {
        FieldValue::Character(s) => Ok(s.clone()),
        FieldValue::Memo(s) => Ok(Some(s.clone())),
        _ => Err(DashboardError::schema(
            REGION_SOURCE,
            format!("column '{}' must be text", column),
        )
        .into()),
    }
}

fn load_geojson(path: &Path, map: &MapConfig) -> Result<RegionCollection> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    read_geojson(BufReader::new(file), map)
}

pub fn read_geojson<R: Read>(reader: R, map: &MapConfig) -> Result<RegionCollection> {
    let geojson = GeoJson::from_reader(reader).context("Failed to parse GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let empty = JsonObject::new();
    let has_name_field = collection.features.iter().any(|f| {
        f.properties
            .as_ref()
            .is_some_and(|props| props.contains_key(&map.name_column))
    });
    if !collection.features.is_empty() && !has_name_field {
        return Err(DashboardError::missing_column(REGION_SOURCE, &map.name_column).into());
    }
    let has_country_field = collection.features.iter().any(|f| {
        f.properties
            .as_ref()
            .is_some_and(|props| props.contains_key(&map.country_column))
    });

    let mut regions = Vec::new();

    for feature in collection.features {
        let props = feature.properties.as_ref().unwrap_or(&empty);
        let name = json_text(props, &map.name_column)?;
        let country = json_text(props, &map.country_column)?;

        let geometry = match feature.geometry {
            Some(geom) => {
                let valid_geo: geo::Geometry<f64> = geom
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert geojson geometry: {:?}", e))?;

                match valid_geo {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => {
                        warn!("Skipping non-polygon feature {:?}", name);
                        continue;
                    }
                }
            }
            None => {
                warn!("Skipping feature {:?} without geometry", name);
                continue;
            }
        };

        regions.push(RegionGeometry {
            name,
            country,
            geometry,
        });
    }

    Ok(RegionCollection {
        regions,
        has_country_field,
    })
}

fn json_text(props: &JsonObject, column: &str) -> Result<Option<String>> {
    match props.get(column) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(DashboardError::schema(
            REGION_SOURCE,
            format!("column '{}' must be text, got {}", column, other),
        )
        .into()),
    }
}

fn column_index(headers: &StringRecord, column: &str, source: &str) -> Result<usize, DashboardError> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| DashboardError::missing_column(source, column))
}

fn parse_f64(
    record: &StringRecord,
    idx: usize,
    column: &str,
    source: &str,
    line: u64,
) -> Result<f64, DashboardError> {
    let raw = record.get(idx).unwrap_or("").trim();
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(row_error(
            source,
            line,
            format!("'{}' value '{}' is not a number", column, raw),
        )),
    }
}

// Line the record starts on; quoted fields may span several lines.
fn record_line(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

fn row_error(source: &str, line: u64, message: String) -> DashboardError {
    DashboardError::schema(source, format!("line {}: {}", line, message))
}
