use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub charts: ChartConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub price_csv: PathBuf,
    pub purchase_csv: PathBuf,
    /// `.shp` or `.geojson`/`.json`
    pub regions: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_name_column")]
    pub name_column: String,
    #[serde(default = "default_country_column")]
    pub country_column: String,
    #[serde(default = "default_ramp_low")]
    pub ramp_low: String, // Hex code
    #[serde(default = "default_ramp_high")]
    pub ramp_high: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_trend_month")]
    pub trend_month: String,
    #[serde(default = "default_inr_per_usd")]
    pub inr_per_usd: f64,
    #[serde(default = "default_line_color")]
    pub line_color: String,
    #[serde(default = "default_bar_color")]
    pub bar_color: String,
    #[serde(default = "default_trend_color")]
    pub trend_color: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_chart_dir")]
    pub chart_dir: PathBuf,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_country() -> String {
    "India".to_string()
}
fn default_name_column() -> String {
    "name".to_string()
}
fn default_country_column() -> String {
    "admin".to_string()
}
fn default_ramp_low() -> String {
    "#f7fcf5".to_string()
}
fn default_ramp_high() -> String {
    "#00441b".to_string()
}
fn default_top_n() -> usize {
    5
}
fn default_trend_month() -> String {
    "Jan".to_string()
}
fn default_inr_per_usd() -> f64 {
    83.0
}
fn default_line_color() -> String {
    "#c0c0c0".to_string()
}
fn default_bar_color() -> String {
    "#4682b4".to_string()
}
fn default_trend_color() -> String {
    "#00008b".to_string()
}
fn default_chart_dir() -> PathBuf {
    PathBuf::from("charts")
}
fn default_width() -> u32 {
    1200
}
fn default_height() -> u32 {
    800
}
fn default_port() -> u16 {
    8080
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            country: default_country(),
            name_column: default_name_column(),
            country_column: default_country_column(),
            ramp_low: default_ramp_low(),
            ramp_high: default_ramp_high(),
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            trend_month: default_trend_month(),
            inr_per_usd: default_inr_per_usd(),
            line_color: default_line_color(),
            bar_color: default_bar_color(),
            trend_color: default_trend_color(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            chart_dir: default_chart_dir(),
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for hex in [
            &self.map.ramp_low,
            &self.map.ramp_high,
            &self.charts.line_color,
            &self.charts.bar_color,
            &self.charts.trend_color,
        ] {
            hex_to_rgb(hex)?;
        }
        if self.output.width == 0 || self.output.height == 0 {
            return Err(anyhow!("Chart size must be non-zero"));
        }
        Ok(())
    }
}

/// Parse `#rrggbb` (leading `#` optional).
pub fn hex_to_rgb(hex: &str) -> Result<(u8, u8, u8)> {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(anyhow!("Invalid colour '{}': expected #rrggbb", hex));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16)
            .with_context(|| format!("Invalid colour '{}'", hex))
    };
    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}
