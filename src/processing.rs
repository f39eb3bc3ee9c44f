//! Display-side transforms: the price calculator and the chart filters.

use crate::error::DashboardError;
use crate::types::{PriceRecord, PurchaseRecord};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const LOW_PRICE: f64 = 20_000.0;
const HIGH_PRICE: f64 = 30_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    Grams,
    Kilograms,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Conversion {
    pub weight_grams: f64,
    pub total_inr: f64,
    pub total_usd: f64,
}

impl Conversion {
    pub fn summary(&self) -> String {
        format!("Total Cost: ₹{:.2} | ${:.2}", self.total_inr, self.total_usd)
    }
}

/// Price of `weight` silver at `price_per_gram` INR, in rupees and dollars.
pub fn convert_price(
    unit: WeightUnit,
    weight: f64,
    price_per_gram: f64,
    inr_per_usd: f64,
) -> Result<Conversion, DashboardError> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(DashboardError::InvalidInput(format!("weight must be >= 0, got {}", weight)));
    }
    if !price_per_gram.is_finite() || price_per_gram < 0.0 {
        return Err(DashboardError::InvalidInput(format!(
            "price per gram must be >= 0, got {}",
            price_per_gram
        )));
    }
    if !inr_per_usd.is_finite() || inr_per_usd <= 0.0 {
        return Err(DashboardError::InvalidInput(format!(
            "INR to USD rate must be > 0, got {}",
            inr_per_usd
        )));
    }

    let weight_grams = match unit {
        WeightUnit::Grams => weight,
        WeightUnit::Kilograms => weight * 1000.0,
    };
    let total_inr = weight_grams * price_per_gram;
    let total_usd = total_inr / inr_per_usd;
    if !weight_grams.is_finite() || !total_inr.is_finite() || !total_usd.is_finite() {
        return Err(DashboardError::InvalidInput(format!(
            "total for {} g at {} INR/g is out of range",
            weight_grams, price_per_gram
        )));
    }

    Ok(Conversion {
        weight_grams,
        total_inr,
        total_usd,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum PriceRange {
    #[default]
    #[serde(rename = "all")]
    #[value(name = "all")]
    All,
    #[serde(rename = "below-20000")]
    #[value(name = "below-20000")]
    Below20k,
    #[serde(rename = "20000-30000")]
    #[value(name = "20000-30000")]
    From20kTo30k,
    #[serde(rename = "above-30000")]
    #[value(name = "above-30000")]
    Above30k,
}

impl PriceRange {
    pub fn label(&self) -> &'static str {
        match self {
            PriceRange::All => "All",
            PriceRange::Below20k => "< 20,000",
            PriceRange::From20kTo30k => "20,000-30,000",
            PriceRange::Above30k => "> 30,000",
        }
    }

    pub fn contains(&self, price: f64) -> bool {
        match self {
            PriceRange::All => true,
            PriceRange::Below20k => price < LOW_PRICE,
            PriceRange::From20kTo30k => (LOW_PRICE..=HIGH_PRICE).contains(&price),
            PriceRange::Above30k => price > HIGH_PRICE,
        }
    }
}

/// Rows inside `range`, in source order.
pub fn filter_price_range(prices: &[PriceRecord], range: PriceRange) -> Vec<PriceRecord> {
    prices
        .iter()
        .filter(|p| range.contains(p.price_inr_per_kg))
        .cloned()
        .collect()
}

/// The `n` largest purchases, largest first. Equal amounts keep input order.
pub fn top_purchases(records: &[PurchaseRecord], n: usize) -> Vec<PurchaseRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(Ordering::Equal));
    sorted.truncate(n);
    sorted
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub year: i32,
    pub price_inr_per_kg: f64,
}

/// Year-by-year prices for a single month label, e.g. `Jan`.
pub fn monthly_trend(prices: &[PriceRecord], month: &str) -> Vec<TrendPoint> {
    prices
        .iter()
        .filter(|p| p.month == month)
        .map(|p| TrendPoint {
            year: p.year,
            price_inr_per_kg: p.price_inr_per_kg,
        })
        .collect()
}

/// Full month name for chart titles; unknown labels come back unchanged.
pub fn month_name(label: &str) -> &str {
    match label {
        "Jan" => "January",
        "Feb" => "February",
        "Mar" => "March",
        "Apr" => "April",
        "May" => "May",
        "Jun" => "June",
        "Jul" => "July",
        "Aug" => "August",
        "Sep" => "September",
        "Oct" => "October",
        "Nov" => "November",
        "Dec" => "December",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(index: usize, year: i32, month: &str, value: f64) -> PriceRecord {
        PriceRecord {
            index,
            year,
            month: month.to_string(),
            price_inr_per_kg: value,
        }
    }

    fn purchase(name: &str, amount: f64) -> PurchaseRecord {
        PurchaseRecord {
            region_name: name.to_string(),
            amount,
        }
    }

    #[test]
    fn kilograms_are_scaled_to_grams() {
        let c = convert_price(WeightUnit::Kilograms, 2.0, 80.0, 80.0).unwrap();
        assert_eq!(c.weight_grams, 2000.0);
        assert_eq!(c.total_inr, 160_000.0);
        assert_eq!(c.total_usd, 2000.0);
        assert_eq!(c.summary(), "Total Cost: ₹160000.00 | $2000.00");
    }

    #[test]
    fn zero_weight_costs_nothing() {
        let c = convert_price(WeightUnit::Grams, 0.0, 95.0, 83.0).unwrap();
        assert_eq!(c.total_inr, 0.0);
        assert_eq!(c.total_usd, 0.0);
    }

    #[test]
    fn rejects_bad_converter_inputs() {
        assert!(convert_price(WeightUnit::Grams, -1.0, 1.0, 83.0).is_err());
        assert!(convert_price(WeightUnit::Grams, 1.0, -1.0, 83.0).is_err());
        assert!(convert_price(WeightUnit::Grams, 1.0, 1.0, 0.0).is_err());
        assert!(convert_price(WeightUnit::Grams, f64::NAN, 1.0, 83.0).is_err());
    }

    #[test]
    fn overflowing_totals_are_rejected() {
        let err = convert_price(WeightUnit::Grams, 1e200, 1e200, 83.0).unwrap_err();
        assert!(matches!(err, DashboardError::InvalidInput(_)));
        assert!(convert_price(WeightUnit::Kilograms, f64::MAX, 1.0, 83.0).is_err());
        assert!(convert_price(WeightUnit::Grams, 1e300, 1.0, 1e-300).is_err());
    }

    #[test]
    fn range_boundaries_belong_to_middle_band() {
        let prices = vec![
            price(0, 2010, "Jan", 19_999.0),
            price(1, 2010, "Feb", 20_000.0),
            price(2, 2010, "Mar", 30_000.0),
            price(3, 2010, "Apr", 30_001.0),
        ];

        let idx = |range| -> Vec<usize> {
            filter_price_range(&prices, range).iter().map(|p| p.index).collect()
        };
        assert_eq!(idx(PriceRange::All), vec![0, 1, 2, 3]);
        assert_eq!(idx(PriceRange::Below20k), vec![0]);
        assert_eq!(idx(PriceRange::From20kTo30k), vec![1, 2]);
        assert_eq!(idx(PriceRange::Above30k), vec![3]);
    }

    #[test]
    fn top_n_sorts_descending_and_keeps_ties_in_order() {
        let records = vec![
            purchase("A", 10.0),
            purchase("B", 30.0),
            purchase("C", 20.0),
            purchase("D", 30.0),
            purchase("E", 5.0),
        ];
        let names: Vec<String> = top_purchases(&records, 3)
            .into_iter()
            .map(|r| r.region_name)
            .collect();
        assert_eq!(names, vec!["B", "D", "C"]);
        assert_eq!(top_purchases(&records, 10).len(), 5);
        assert!(top_purchases(&[], 5).is_empty());
    }

    #[test]
    fn trend_picks_one_month_per_year() {
        let prices = vec![
            price(0, 2018, "Jan", 40_000.0),
            price(1, 2018, "Feb", 41_000.0),
            price(2, 2019, "Jan", 38_000.0),
        ];
        assert_eq!(
            monthly_trend(&prices, "Jan"),
            vec![
                TrendPoint {
                    year: 2018,
                    price_inr_per_kg: 40_000.0
                },
                TrendPoint {
                    year: 2019,
                    price_inr_per_kg: 38_000.0
                },
            ]
        );
        assert!(monthly_trend(&prices, "jan").is_empty());
        assert_eq!(month_name("Jan"), "January");
        assert_eq!(month_name("Q1"), "Q1");
    }
}
