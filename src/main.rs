use clap::{Args, Parser, Subcommand};
use silver_dashboard::dashboard::{self, DashboardRequest};
use silver_dashboard::processing::{self, PriceRange, WeightUnit};
use silver_dashboard::{config, data, render, server};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at DEBUG level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price a quantity of silver in INR and USD
    Convert {
        #[command(flatten)]
        price: PriceArgs,

        /// INR per USD
        #[arg(long, default_value_t = 83.0)]
        inr_per_usd: f64,
    },
    /// Load the datasets and write the dashboard charts as SVG
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,

        #[command(flatten)]
        price: PriceArgs,

        /// INR per USD (defaults to the configured rate)
        #[arg(long)]
        inr_per_usd: Option<f64>,

        /// Price band for the history chart
        #[arg(long, value_enum, default_value_t = PriceRange::All)]
        range: PriceRange,

        /// Number of states in the bar chart
        #[arg(long)]
        top: Option<usize>,

        /// Month label for the trend chart, e.g. Jan
        #[arg(long)]
        month: Option<String>,

        /// Country to keep from the boundary file
        #[arg(long)]
        country: Option<String>,
    },
    /// Serve the dashboard API and rendered charts
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[derive(Args)]
struct PriceArgs {
    #[arg(long, value_enum, default_value_t = WeightUnit::Grams)]
    unit: WeightUnit,

    #[arg(long, default_value_t = 0.0)]
    weight: f64,

    /// Price per gram in INR
    #[arg(long, default_value_t = 0.0)]
    price_per_gram: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Convert { price, inr_per_usd } => {
            let conversion =
                processing::convert_price(price.unit, price.weight, price.price_per_gram, inr_per_usd)?;
            println!("{}", conversion.summary());
        }
        Commands::Render {
            config,
            price,
            inr_per_usd,
            range,
            top,
            month,
            country,
        } => {
            info!("Rendering dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(&config)?;

            let datasets = data::load_datasets(&app_config)?;
            let request = DashboardRequest {
                unit: price.unit,
                weight: price.weight,
                price_per_gram: price.price_per_gram,
                inr_per_usd,
                range,
                top_n: top,
                month,
                country,
            };
            let view = dashboard::assemble(&datasets, &request, &app_config)?;

            println!("{}", view.conversion_summary);
            for path in render::render_dashboard(&app_config, &view)? {
                println!("Wrote {}", path.display());
            }
        }
        Commands::Serve { config } => {
            info!("Serving dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(&config)?;
            server::start_server(app_config).await?;
        }
    }

    Ok(())
}
