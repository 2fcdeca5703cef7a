use std::env;
use uuid::Uuid;

use retail_map_api::db::Database;
use retail_map_api::ingestion::IngestionService;
use retail_map_api::models::{CsvPayload, UploadRequest};

fn growth_request(code: &str) -> UploadRequest {
    UploadRequest {
        csv_data: CsvPayload {
            headers: vec![
                "Suc SAP".to_string(),
                "Sucursal".to_string(),
                "Formato".to_string(),
                "Estado".to_string(),
                "Crec% Ventas 2025 vs 2024".to_string(),
                "Crec% Ordenes".to_string(),
                "Crec% Ticket".to_string(),
            ],
            full_data: vec![vec![
                code.to_string(),
                "Sucursal Integración".to_string(),
                "Express".to_string(),
                "Jalisco".to_string(),
                "15.7%".to_string(),
                "2.1%".to_string(),
                "-0.5%".to_string(),
            ]],
        },
        filename: "integration.csv".to_string(),
        detected_format: Some("growth".to_string()),
    }
}

/// Integration smoke test for the full ingestion path against a real
/// database. Marked ignored to avoid running against production by
/// accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn ingestion_is_idempotent_per_day() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let service = IngestionService::new(db.pool.clone());

    // Fresh owner and store code per run to avoid conflicts
    let owner_id = Uuid::new_v4();
    let code = format!("IT{:06}", Uuid::new_v4().as_u128() % 1_000_000);
    let request = growth_request(&code);

    let first = service.run_growth(owner_id, &request).await?;
    assert_eq!(first.analytics.new_stores, 1);
    assert_eq!(first.analytics.metrics_imported, 1);
    assert_eq!(first.total_errors, 0);

    // Same file, same day: stores refreshed, metrics overwritten not duplicated
    let second = service.run_growth(owner_id, &request).await?;
    assert_eq!(second.analytics.new_stores, 0);
    assert_eq!(second.analytics.existing_stores, 1);
    assert_eq!(second.analytics.metrics_imported, 1);

    Ok(())
}
