use crate::errors::{AppError, ResultExt};
use crate::normalizer::StoreIdentity;
use chrono::NaiveDate;
use sqlx::{PgPool, QueryBuilder, Row};
use std::collections::HashMap;
use uuid::Uuid;

/// Result of reconciling one upload's store identities against the
/// account's known stores.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Complete `suc_sap -> store id` map covering inserts and updates.
    pub id_by_code: HashMap<String, Uuid>,
    pub new_stores: usize,
    pub existing_stores: usize,
}

/// Partitions incoming store identities into a single bulk insert and a
/// single bulk refresh, bounding database round-trips to a small constant
/// regardless of file size.
pub struct StoreReconciler {
    pool: PgPool,
}

impl StoreReconciler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reconciles `stores` for `owner_id`, stamping `period` as the upload
    /// date on both branches.
    ///
    /// A constraint violation on the bulk insert fails the whole ingestion;
    /// the single statement is atomic, so no compensating cleanup runs.
    pub async fn reconcile(
        &self,
        owner_id: Uuid,
        stores: &[StoreIdentity],
        period: NaiveDate,
    ) -> Result<ReconcileOutcome, AppError> {
        let mut outcome = ReconcileOutcome::default();
        if stores.is_empty() {
            return Ok(outcome);
        }

        // One upfront bulk read; never cached across requests
        let known: HashMap<String, Uuid> = sqlx::query(
            "SELECT suc_sap, id FROM stores WHERE owner_id = $1",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load known store codes")?
        .into_iter()
        .map(|row| (row.get::<String, _>("suc_sap"), row.get::<Uuid, _>("id")))
        .collect();

        let (to_touch, to_insert): (Vec<&StoreIdentity>, Vec<&StoreIdentity>) = stores
            .iter()
            .partition(|s| known.contains_key(&s.suc_sap));

        if !to_insert.is_empty() {
            let sample = to_insert[0].suc_sap.clone();
            let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
                "INSERT INTO stores (owner_id, suc_sap, sucursal, format, zona, distrito, \
                 estado, municipio, ciudad, calle, colonia, cp, first_seen, last_seen) ",
            );
            builder.push_values(&to_insert, |mut b, store| {
                b.push_bind(owner_id)
                    .push_bind(&store.suc_sap)
                    .push_bind(&store.sucursal)
                    .push_bind(&store.format)
                    .push_bind(&store.zona)
                    .push_bind(&store.distrito)
                    .push_bind(&store.estado)
                    .push_bind(&store.municipio)
                    .push_bind(&store.ciudad)
                    .push_bind(&store.calle)
                    .push_bind(&store.colonia)
                    .push_bind(&store.cp)
                    .push_bind(period)
                    .push_bind(period);
            });
            builder.push(" RETURNING suc_sap, id");

            let rows = builder
                .build()
                .fetch_all(&self.pool)
                .await
                .with_context(|| {
                    format!("Bulk store insert failed (sample code '{}')", sample)
                })?;
            for row in rows {
                outcome
                    .id_by_code
                    .insert(row.get::<String, _>("suc_sap"), row.get::<Uuid, _>("id"));
            }
            outcome.new_stores = to_insert.len();
        }

        if !to_touch.is_empty() {
            // Refresh last_seen plus address fields in one UNNEST update
            let codes: Vec<&str> = to_touch.iter().map(|s| s.suc_sap.as_str()).collect();
            let sucursales: Vec<&str> = to_touch.iter().map(|s| s.sucursal.as_str()).collect();
            let formats: Vec<&str> = to_touch.iter().map(|s| s.format.as_str()).collect();
            let zonas: Vec<Option<&str>> = to_touch.iter().map(|s| s.zona.as_deref()).collect();
            let distritos: Vec<Option<&str>> =
                to_touch.iter().map(|s| s.distrito.as_deref()).collect();
            let estados: Vec<Option<&str>> = to_touch.iter().map(|s| s.estado.as_deref()).collect();
            let municipios: Vec<Option<&str>> =
                to_touch.iter().map(|s| s.municipio.as_deref()).collect();
            let ciudades: Vec<Option<&str>> =
                to_touch.iter().map(|s| s.ciudad.as_deref()).collect();
            let calles: Vec<Option<&str>> = to_touch.iter().map(|s| s.calle.as_deref()).collect();
            let colonias: Vec<Option<&str>> =
                to_touch.iter().map(|s| s.colonia.as_deref()).collect();
            let cps: Vec<Option<&str>> = to_touch.iter().map(|s| s.cp.as_deref()).collect();

            sqlx::query(
                r#"
                UPDATE stores AS s SET
                    sucursal = u.sucursal,
                    format = u.format,
                    zona = u.zona,
                    distrito = u.distrito,
                    estado = u.estado,
                    municipio = u.municipio,
                    ciudad = u.ciudad,
                    calle = u.calle,
                    colonia = u.colonia,
                    cp = u.cp,
                    last_seen = $2,
                    updated_at = NOW()
                FROM UNNEST(
                    $3::text[], $4::text[], $5::text[], $6::text[], $7::text[], $8::text[],
                    $9::text[], $10::text[], $11::text[], $12::text[], $13::text[]
                ) AS u(suc_sap, sucursal, format, zona, distrito, estado, municipio, ciudad, calle, colonia, cp)
                WHERE s.owner_id = $1 AND s.suc_sap = u.suc_sap
                "#,
            )
            .bind(owner_id)
            .bind(period)
            .bind(codes)
            .bind(sucursales)
            .bind(formats)
            .bind(zonas)
            .bind(distritos)
            .bind(estados)
            .bind(municipios)
            .bind(ciudades)
            .bind(calles)
            .bind(colonias)
            .bind(cps)
            .execute(&self.pool)
            .await
            .context("Bulk store refresh failed")?;

            for store in &to_touch {
                if let Some(id) = known.get(&store.suc_sap) {
                    outcome.id_by_code.insert(store.suc_sap.clone(), *id);
                }
            }
            outcome.existing_stores = to_touch.len();
        }

        tracing::info!(
            "Reconciled {} stores: {} new, {} existing",
            stores.len(),
            outcome.new_stores,
            outcome.existing_stores
        );

        Ok(outcome)
    }
}
