use crate::errors::AppError;
use std::collections::HashSet;

// Schema limits; values are truncated before write so a bulk insert never
// trips a length constraint.
pub const MAX_SUC_SAP: usize = 50;
pub const MAX_SUCURSAL: usize = 255;
pub const MAX_FORMAT: usize = 100;
pub const MAX_GEO_FIELD: usize = 100;
pub const MAX_CALLE: usize = 255;
pub const MAX_CP: usize = 10;

/// Store-identity fields resolvable from a CSV header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreField {
    SucSap,
    Sucursal,
    Format,
    Zona,
    Distrito,
    Estado,
    Municipio,
    Ciudad,
    Calle,
    Colonia,
    Cp,
}

/// Candidate substrings per target field, evaluated independently and in
/// order; the first matching header wins. New file layouts are supported
/// by editing this table, not the resolution code.
const COLUMN_CANDIDATES: &[(StoreField, &[&str])] = &[
    // "sap" first: "suc" alone would also match a leading "Sucursal" column
    (StoreField::SucSap, &["sap", "suc"]),
    (StoreField::Sucursal, &["sucursal", "nombre", "name"]),
    (StoreField::Format, &["formato", "format"]),
    (StoreField::Zona, &["zona", "zone"]),
    (StoreField::Distrito, &["distrito", "district"]),
    (StoreField::Estado, &["estado", "state"]),
    (StoreField::Municipio, &["municipio"]),
    (StoreField::Ciudad, &["ciudad", "city"]),
    (StoreField::Calle, &["calle", "direccion", "street"]),
    (StoreField::Colonia, &["colonia"]),
    (StoreField::Cp, &["cp", "postal"]),
];

/// KPI column candidates for growth files.
const GROWTH_KPI_CANDIDATES: &[&[&str]] = &[&["venta", "revenue"], &["orden", "order"], &["ticket"]];

/// KPI column candidates for absolute files.
const ABSOLUTE_KPI_CANDIDATES: &[&[&str]] = &[&["venta"], &["orden"], &["ticket"]];

/// Header-to-index mapping resolved once per file.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    pub suc_sap: Option<usize>,
    pub sucursal: Option<usize>,
    pub format: Option<usize>,
    pub zona: Option<usize>,
    pub distrito: Option<usize>,
    pub estado: Option<usize>,
    pub municipio: Option<usize>,
    pub ciudad: Option<usize>,
    pub calle: Option<usize>,
    pub colonia: Option<usize>,
    pub cp: Option<usize>,
    /// KPI value columns in fixed order: revenue/ventas, orders, tickets.
    pub kpi: [Option<usize>; 3],
    /// Headers of the resolved KPI columns, kept for label extraction.
    pub kpi_headers: Vec<String>,
}

fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    for candidate in candidates {
        if let Some(idx) = lowered.iter().position(|h| h.contains(candidate)) {
            return Some(idx);
        }
    }
    None
}

/// Resolves the column map for a file.
///
/// Identity/address fields come from `COLUMN_CANDIDATES`. KPI columns are
/// matched by substring too, falling back to the last three columns when a
/// KPI header cannot be located by name.
pub fn resolve_columns(headers: &[String], growth: bool) -> Result<ColumnMap, AppError> {
    let mut map = ColumnMap::default();

    for (field, candidates) in COLUMN_CANDIDATES {
        let idx = find_column(headers, candidates);
        match field {
            StoreField::SucSap => map.suc_sap = idx,
            StoreField::Sucursal => map.sucursal = idx,
            StoreField::Format => map.format = idx,
            StoreField::Zona => map.zona = idx,
            StoreField::Distrito => map.distrito = idx,
            StoreField::Estado => map.estado = idx,
            StoreField::Municipio => map.municipio = idx,
            StoreField::Ciudad => map.ciudad = idx,
            StoreField::Calle => map.calle = idx,
            StoreField::Colonia => map.colonia = idx,
            StoreField::Cp => map.cp = idx,
        }
    }

    // Missing required *columns* is a whole-file precondition failure
    let mut missing = Vec::new();
    if map.suc_sap.is_none() {
        missing.push("suc_sap");
    }
    if map.format.is_none() {
        missing.push("formato");
    }
    if map.estado.is_none() {
        missing.push("estado");
    }
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Missing required columns: {}",
            missing.join(", ")
        )));
    }

    let kpi_candidates = if growth {
        GROWTH_KPI_CANDIDATES
    } else {
        ABSOLUTE_KPI_CANDIDATES
    };

    // KPI headers live past the identity columns; only search the tail so
    // "Ventas Crec%" is not confused with an identity field.
    let tail_start = headers.len().saturating_sub(3);
    let tail = &headers[tail_start..];
    for (slot, candidates) in kpi_candidates.iter().enumerate() {
        map.kpi[slot] = find_column(tail, candidates)
            .map(|i| i + tail_start)
            .or_else(|| {
                let fallback = tail_start + slot;
                (fallback < headers.len()).then_some(fallback)
            });
    }
    map.kpi_headers = map
        .kpi
        .iter()
        .flatten()
        .filter_map(|&i| headers.get(i).cloned())
        .collect();

    Ok(map)
}

// ============ Cell parsing ============

/// Parses a percentage cell like `"15.7%"` or `"15,7"` into display units
/// (15.7). Blank or unparseable cells yield `None`, never an error.
pub fn parse_percentage(cell: &str) -> Option<f64> {
    let cleaned = cell.trim().replace('%', "").replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a numeric cell, stripping thousands-separating commas.
pub fn parse_number(cell: &str) -> Option<f64> {
    let cleaned = cell.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses an integer cell, stripping thousands-separating commas.
/// Accepts values exported with a trailing ".0" by some spreadsheets.
pub fn parse_integer(cell: &str) -> Option<i64> {
    let cleaned = cell.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned
        .parse::<i64>()
        .ok()
        .or_else(|| cleaned.parse::<f64>().ok().map(|v| v.trunc() as i64))
}

/// Truncates to at most `max` characters, never splitting a code point.
pub fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

// ============ Normalized records ============

/// Typed store identity extracted from one CSV row, truncated to schema
/// limits.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreIdentity {
    pub suc_sap: String,
    pub sucursal: String,
    pub format: String,
    pub zona: Option<String>,
    pub distrito: Option<String>,
    pub estado: Option<String>,
    pub municipio: Option<String>,
    pub ciudad: Option<String>,
    pub calle: Option<String>,
    pub colonia: Option<String>,
    pub cp: Option<String>,
}

/// Growth KPI values for one row, stored as decimal fractions.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthValues {
    pub revenue_growth_pct: Option<f64>,
    pub orders_growth_pct: Option<f64>,
    pub ticket_growth_pct: Option<f64>,
}

/// Absolute KPI values for one row.
#[derive(Debug, Clone, PartialEq)]
pub struct AbsoluteValues {
    pub ventas: Option<f64>,
    pub ordenes: Option<i64>,
    pub tickets: Option<i64>,
}

/// Result of normalizing one file: aligned store and metric collections,
/// keyed positionally by `suc_sap`, plus per-row errors.
#[derive(Debug, Clone)]
pub struct NormalizedBatch<M> {
    pub stores: Vec<StoreIdentity>,
    /// One entry per retained row: (suc_sap, metric values).
    pub metrics: Vec<(String, M)>,
    pub errors: Vec<String>,
    pub rows_skipped: usize,
}

fn cell<'a>(row: &'a [String], idx: Option<usize>) -> &'a str {
    idx.and_then(|i| row.get(i)).map(|s| s.trim()).unwrap_or("")
}

fn optional_field(row: &[String], idx: Option<usize>, max: usize) -> Option<String> {
    let value = cell(row, idx);
    (!value.is_empty()).then(|| truncate(value, max))
}

/// Extracts and validates the store identity of one row.
///
/// Returns `None` for rows lacking `suc_sap`, `format`, or `estado`; the
/// caller records the positional error and continues with the batch.
fn extract_identity(row: &[String], map: &ColumnMap) -> Option<StoreIdentity> {
    let suc_sap = cell(row, map.suc_sap);
    let format = cell(row, map.format);
    let estado = cell(row, map.estado);
    if suc_sap.is_empty() || format.is_empty() || estado.is_empty() {
        return None;
    }

    let sucursal = cell(row, map.sucursal);
    Some(StoreIdentity {
        suc_sap: truncate(suc_sap, MAX_SUC_SAP),
        sucursal: truncate(
            if sucursal.is_empty() { suc_sap } else { sucursal },
            MAX_SUCURSAL,
        ),
        format: truncate(format, MAX_FORMAT),
        zona: optional_field(row, map.zona, MAX_GEO_FIELD),
        distrito: optional_field(row, map.distrito, MAX_GEO_FIELD),
        estado: Some(truncate(estado, MAX_GEO_FIELD)),
        municipio: optional_field(row, map.municipio, MAX_GEO_FIELD),
        ciudad: optional_field(row, map.ciudad, MAX_GEO_FIELD),
        calle: optional_field(row, map.calle, MAX_CALLE),
        colonia: optional_field(row, map.colonia, MAX_GEO_FIELD),
        cp: optional_field(row, map.cp, MAX_CP),
    })
}

fn normalize_rows<M>(
    rows: &[Vec<String>],
    map: &ColumnMap,
    mut extract_metric: impl FnMut(&[String]) -> M,
) -> NormalizedBatch<M> {
    let mut batch = NormalizedBatch {
        stores: Vec::new(),
        metrics: Vec::new(),
        errors: Vec::new(),
        rows_skipped: 0,
    };
    let mut seen_codes: HashSet<String> = HashSet::new();

    for (i, row) in rows.iter().enumerate() {
        let row_number = i + 1;

        let Some(identity) = extract_identity(row, map) else {
            batch
                .errors
                .push(format!("Row {}: missing required store fields", row_number));
            batch.rows_skipped += 1;
            continue;
        };

        // First occurrence stands; later repeats of the code are rejected
        if !seen_codes.insert(identity.suc_sap.clone()) {
            batch.errors.push(format!(
                "Row {}: duplicate store code '{}' in file",
                row_number, identity.suc_sap
            ));
            batch.rows_skipped += 1;
            continue;
        }

        let metric = extract_metric(row);
        batch.metrics.push((identity.suc_sap.clone(), metric));
        batch.stores.push(identity);
    }

    batch
}

/// Normalizes the data rows of a growth-format file. Percentage cells are
/// divided by 100 so storage only ever sees decimal fractions.
pub fn normalize_growth_rows(rows: &[Vec<String>], map: &ColumnMap) -> NormalizedBatch<GrowthValues> {
    normalize_rows(rows, map, |row| GrowthValues {
        revenue_growth_pct: parse_percentage(cell(row, map.kpi[0])).map(|v| v / 100.0),
        orders_growth_pct: parse_percentage(cell(row, map.kpi[1])).map(|v| v / 100.0),
        ticket_growth_pct: parse_percentage(cell(row, map.kpi[2])).map(|v| v / 100.0),
    })
}

/// Normalizes the data rows of an absolute-format file.
pub fn normalize_absolute_rows(
    rows: &[Vec<String>],
    map: &ColumnMap,
) -> NormalizedBatch<AbsoluteValues> {
    normalize_rows(rows, map, |row| AbsoluteValues {
        ventas: parse_number(cell(row, map.kpi[0])),
        ordenes: parse_integer(cell(row, map.kpi[1])),
        tickets: parse_integer(cell(row, map.kpi[2])),
    })
}
