//! Security Incident Map CLI
//!
//! Renders the interactive incident map from the cleaned incident table and
//! the Natural Earth admin-0 country polygons.
//!
//! Usage:
//!   render-incident-map --incidents data/clean_data/cleaned_security_incidents.csv \
//!                       --countries data/maps/ne_110m_admin_0_countries.geojson \
//!                       --output outputs/security_incidents_interactive_map.html

use anyhow::Result;
use clap::Parser;
use incident_map::{
    build_map, loader, render, AliasNormalizer, CountryNameNormalizer, ExactNormalizer,
    LoadConfig, RenderConfig, DEFAULT_ADMIN_FIELD,
};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "render-incident-map",
    about = "Render an interactive world map of security incidents"
)]
struct Args {
    /// Path to the incident table (CSV, or JSON array)
    #[arg(
        short = 'i',
        long,
        default_value = "data/clean_data/cleaned_security_incidents.csv"
    )]
    incidents: PathBuf,

    /// Path to the country polygons GeoJSON
    #[arg(
        short = 'c',
        long,
        default_value = "data/maps/ne_110m_admin_0_countries.geojson"
    )]
    countries: PathBuf,

    /// Output HTML file
    #[arg(
        short,
        long,
        default_value = "outputs/security_incidents_interactive_map.html"
    )]
    output: PathBuf,

    /// JSON file of country name aliases ({"raw name": "Admin Name"})
    #[arg(short, long)]
    aliases: Option<PathBuf>,

    /// Also apply the built-in Natural Earth spelling aliases
    #[arg(long)]
    builtin_aliases: bool,

    /// Polygon property holding the country name
    #[arg(long, default_value = DEFAULT_ADMIN_FIELD)]
    admin_field: String,

    /// Also write the layer definitions as JSON
    #[arg(long)]
    layers_json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Exact matching unless an alias table was requested
fn build_normalizer(args: &Args) -> Result<Box<dyn CountryNameNormalizer>> {
    if args.aliases.is_none() && !args.builtin_aliases {
        return Ok(Box::new(ExactNormalizer));
    }

    let mut normalizer = if args.builtin_aliases {
        AliasNormalizer::with_natural_earth_defaults()
    } else {
        AliasNormalizer::new()
    };
    if let Some(path) = &args.aliases {
        normalizer.extend(AliasNormalizer::load(path)?);
    }
    info!("Using {} country name aliases", normalizer.len());

    Ok(Box::new(normalizer))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{}", "=".repeat(60));
    info!("Security Incident Map");
    info!("{}", "=".repeat(60));

    // Load inputs
    let load_config = LoadConfig {
        admin_field: args.admin_field.clone(),
        ..LoadConfig::default()
    };
    let incidents = loader::load_incidents(&args.incidents)?;
    let polygons = loader::load_country_polygons(&args.countries, &load_config)?;

    // Normalize, aggregate, join, color, render
    let normalizer = build_normalizer(&args)?;
    let config = RenderConfig::default();
    let build = build_map(&incidents, &polygons, normalizer.as_ref(), &config)?;

    // Show top 10 countries by incident count
    let mut ranked: Vec<_> = build.joined.iter().filter(|c| c.incident_count > 0).collect();
    ranked.sort_by(|a, b| {
        b.incident_count
            .cmp(&a.incident_count)
            .then_with(|| a.admin_name.cmp(&b.admin_name))
    });
    info!("\nTop 10 countries by incident count:");
    for country in ranked.iter().take(10) {
        info!("  {:>6} | {}", country.incident_count, country.admin_name);
    }

    // Write output
    render::write_document(&build.document, &args.output)?;

    if args.layers_json {
        let layers_path = args.output.with_extension("layers.json");
        render::write_layers_json(&build.document, &layers_path)?;
    }

    // Summary
    let summary = &build.summary;
    info!("\n{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!("Incidents loaded:      {}", summary.incidents_loaded);
    info!("Markers rendered:      {}", summary.markers_rendered);
    info!("Without coordinates:   {}", summary.incidents_without_coordinates);
    info!("Without date:          {}", summary.incidents_without_date);
    info!("Countries rendered:    {}", summary.polygons_rendered);
    info!("Countries w/ incidents: {}", summary.countries_with_incidents);
    info!("Scale range:           [{}, {}]", summary.scale_min, summary.scale_max);
    if !summary.unmatched_country_names.is_empty() {
        warn!(
            "{} incidents under {} unmatched country names: {}",
            summary.unmatched_incidents,
            summary.unmatched_country_names.len(),
            summary.unmatched_country_names.join(", ")
        );
    }

    Ok(())
}
