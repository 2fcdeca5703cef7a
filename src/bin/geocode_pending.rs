//! Runs a geocoding batch from the command line for one account.
//!
//! Usage: geocode_pending <owner-uuid> [all|batch|smart] [--dry-run]

use anyhow::Result;
use retail_map_api::config::Config;
use retail_map_api::db::Database;
use retail_map_api::geocode_runner::GeocodeRunner;
use retail_map_api::geocoding::GeocoderClient;
use retail_map_api::models::{GeocodeMode, GeocodeRequest};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let owner_id: Uuid = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("Usage: geocode_pending <owner-uuid> [mode] [--dry-run]"))?
        .parse()?;
    let mut mode = GeocodeMode::Smart;
    let mut dry_run = false;
    for arg in args {
        match arg.as_str() {
            "all" => mode = GeocodeMode::All,
            "batch" => mode = GeocodeMode::Batch,
            "smart" => mode = GeocodeMode::Smart,
            "--dry-run" => dry_run = true,
            other => anyhow::bail!("Unknown argument '{}'", other),
        }
    }

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;
    let geocoder = GeocoderClient::new(
        config.geocoder_base_url.clone(),
        config.geocoder_token.clone(),
    )?;

    println!("=== Batch Store Geocoding ===\n");

    let runner = GeocodeRunner::new(db.pool.clone(), geocoder, config.geocode_batch_size);
    let request = GeocodeRequest {
        mode,
        batch_size: None,
        dry_run,
    };
    let response = runner.run(owner_id, &request).await?;

    if response.dry_run {
        println!(
            "Dry run: {} pending, {} would be selected",
            response.total_pending, response.selected
        );
        for address in &response.sample_addresses {
            println!("  sample: {}", address);
        }
        return Ok(());
    }

    for result in &response.results {
        if result.success {
            println!(
                "  ✓ {} -> ({:.5}, {:.5})",
                result.suc_sap,
                result.lat.unwrap_or_default(),
                result.lon.unwrap_or_default()
            );
        } else {
            println!(
                "  ✗ {} -> {}",
                result.suc_sap,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    println!("\n=== Geocoding Complete ===");
    println!("Selected: {}", response.selected);
    println!("✓ Succeeded: {}", response.succeeded);
    println!("✗ Failed: {}", response.failed);
    println!("Remaining: {}", response.remaining);
    if response.recommend_rerun {
        println!("Run again to cover the remaining stores.");
    }

    Ok(())
}
