use silver_dashboard::config::AppConfig;
use silver_dashboard::dashboard::{assemble, DashboardRequest};
use silver_dashboard::data::load_datasets;
use silver_dashboard::error::DashboardError;
use silver_dashboard::processing::{PriceRange, WeightUnit};
use silver_dashboard::render::{render_dashboard, CHOROPLETH_FILE, MONTHLY_TREND_FILE};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const PRICES: &str = "\
Year,Month,Silver_Price_INR_per_kg
2016,Jan,36000
2016,Feb,38500
2017,Jan,39500
2017,Feb,41000
2018,Jan,39000
2011,Jan,18500
";

const PURCHASES: &str = "\
State,Silver_Purchased_kg
Maharashtra,420.5
gujarat,300
KARNATAKA,250
Kerala,120
Goa,150
Punjab,80
";

const STATES: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {"name": "Maharashtra", "admin": "India"},
     "geometry": {"type": "Polygon", "coordinates": [[[72.6,15.6],[80.9,15.6],[80.9,22.0],[72.6,22.0],[72.6,15.6]]]}},
    {"type": "Feature", "properties": {"name": "Gujarat", "admin": "India"},
     "geometry": {"type": "Polygon", "coordinates": [[[68.1,20.1],[74.5,20.1],[74.5,24.7],[68.1,24.7],[68.1,20.1]]]}},
    {"type": "Feature", "properties": {"name": "Karnataka", "admin": "India"},
     "geometry": {"type": "MultiPolygon", "coordinates": [[[[74.0,11.5],[78.6,11.5],[78.6,18.4],[74.0,18.4],[74.0,11.5]]]]}},
    {"type": "Feature", "properties": {"name": null, "admin": "India"},
     "geometry": {"type": "Polygon", "coordinates": [[[92.0,10.0],[93.0,10.0],[93.0,11.0],[92.0,10.0]]]}},
    {"type": "Feature", "properties": {"name": "Goa", "admin": "Brazil"},
     "geometry": {"type": "Polygon", "coordinates": [[[-45.0,-10.0],[-44.0,-10.0],[-44.0,-9.0],[-45.0,-10.0]]]}}
  ]
}"#;

fn write_fixture(dir: &Path) -> AppConfig {
    fs::write(dir.join("prices.csv"), PRICES).unwrap();
    fs::write(dir.join("purchases.csv"), PURCHASES).unwrap();
    fs::write(dir.join("states.geojson"), STATES).unwrap();

    let toml = format!(
        r#"
        [input]
        price_csv = {:?}
        purchase_csv = {:?}
        regions = {:?}

        [output]
        chart_dir = {:?}
        width = 640
        height = 480
        "#,
        dir.join("prices.csv"),
        dir.join("purchases.csv"),
        dir.join("states.geojson"),
        dir.join("charts"),
    );
    AppConfig::from_toml(&toml).unwrap()
}

#[test]
fn end_to_end_render_writes_all_charts() {
    let tmp = TempDir::new().unwrap();
    let config = write_fixture(tmp.path());

    let datasets = load_datasets(&config).unwrap();
    let request = DashboardRequest {
        unit: WeightUnit::Kilograms,
        weight: 1.5,
        price_per_gram: 80.0,
        range: PriceRange::From20kTo30k,
        ..DashboardRequest::default()
    };
    let view = assemble(&datasets, &request, &config).unwrap();

    assert_eq!(view.conversion_summary, "Total Cost: ₹120000.00 | $1445.78");
    assert!(view.prices.is_empty());

    let values: Vec<(Option<&str>, f64)> = view
        .map
        .regions
        .iter()
        .map(|r| (r.name.as_deref(), r.value))
        .collect();
    assert_eq!(
        values,
        vec![
            (Some("Maharashtra"), 420.5),
            (Some("Gujarat"), 300.0),
            (Some("Karnataka"), 250.0),
            (None, 0.0),
        ]
    );
    // Brazil's Goa is dropped, so neither its geometry nor the Goa amount shows up.
    assert!(view.map.regions.iter().all(|r| r.value != 150.0));
    assert_eq!(view.map.bounds.min_x, 68.1);
    assert_eq!(view.map.bounds.max_x, 93.0);
    assert_eq!(view.map.bounds.min_y, 10.0);
    assert_eq!(view.map.bounds.max_y, 24.7);

    let top: Vec<&str> = view.top_states.iter().map(|r| r.region_name.as_str()).collect();
    assert_eq!(top, vec!["Maharashtra", "gujarat", "KARNATAKA", "Goa", "Kerala"]);

    let years: Vec<i32> = view.trend.iter().map(|p| p.year).collect();
    assert_eq!(years, vec![2016, 2017, 2018, 2011]);

    let written = render_dashboard(&config, &view).unwrap();
    assert_eq!(written.len(), 4);
    for path in &written {
        assert!(path.exists(), "{:?} missing", path);
    }
    let map_svg = fs::read_to_string(config.output.chart_dir.join(CHOROPLETH_FILE)).unwrap();
    assert!(map_svg.contains("<polygon"));
    let trend_svg = fs::read_to_string(config.output.chart_dir.join(MONTHLY_TREND_FILE)).unwrap();
    assert!(trend_svg.contains("January Silver Price Trends Over Years"));
}

#[test]
fn below_twenty_thousand_keeps_original_row_index() {
    let tmp = TempDir::new().unwrap();
    let config = write_fixture(tmp.path());
    let datasets = load_datasets(&config).unwrap();

    let request = DashboardRequest {
        range: PriceRange::Below20k,
        ..DashboardRequest::default()
    };
    let view = assemble(&datasets, &request, &config).unwrap();
    assert_eq!(view.prices.len(), 1);
    assert_eq!(view.prices[0].index, 5);
}

#[test]
fn empty_purchase_table_zero_fills_the_map() {
    let tmp = TempDir::new().unwrap();
    let config = write_fixture(tmp.path());
    fs::write(&config.input.purchase_csv, "State,Silver_Purchased_kg\n").unwrap();

    let datasets = load_datasets(&config).unwrap();
    let view = assemble(&datasets, &DashboardRequest::default(), &config).unwrap();
    assert_eq!(view.map.regions.len(), 4);
    assert!(view.map.regions.iter().all(|r| r.value == 0.0));
    assert!(view.top_states.is_empty());
}

#[test]
fn missing_purchase_column_fails_to_load() {
    let tmp = TempDir::new().unwrap();
    let config = write_fixture(tmp.path());
    fs::write(&config.input.purchase_csv, "State,Gold_kg\nGoa,1\n").unwrap();

    let err = load_datasets(&config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DashboardError>(),
        Some(DashboardError::Schema { .. })
    ));
}

#[test]
fn unknown_country_is_empty_region_set() {
    let tmp = TempDir::new().unwrap();
    let config = write_fixture(tmp.path());
    let datasets = load_datasets(&config).unwrap();

    let request = DashboardRequest {
        country: Some("Nepal".into()),
        ..DashboardRequest::default()
    };
    let err = assemble(&datasets, &request, &config).unwrap_err();
    assert_eq!(err, DashboardError::EmptyRegionSet { label: "Nepal".into() });
}
