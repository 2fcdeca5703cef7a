/// Unit tests for the CSV ingestion pipeline: format detection, column
/// resolution, cell parsing, and row normalization semantics.
use retail_map_api::csv_format::{detect_format, FormatType};
use retail_map_api::normalizer::{
    normalize_absolute_rows, normalize_growth_rows, parse_integer, parse_number,
    parse_percentage, resolve_columns, truncate, MAX_SUCURSAL, MAX_SUC_SAP,
};

fn headers(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn row(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn growth_headers() -> Vec<String> {
    headers(&[
        "Suc SAP",
        "Sucursal",
        "Formato",
        "Zona",
        "Estado",
        "Crec% Ventas 2025 vs 2024",
        "Crec% Ordenes",
        "Crec% Ticket",
    ])
}

fn absolute_headers() -> Vec<String> {
    headers(&[
        "Suc SAP", "Sucursal", "Formato", "Estado", "Ventas", "Ordenes", "Tickets",
    ])
}

#[cfg(test)]
mod format_detection_tests {
    use super::*;

    #[test]
    fn test_absolute_format_full_confidence() {
        let detection = detect_format(&headers(&["Ventas", "Ordenes", "Tickets"]));
        assert_eq!(detection.format_type, FormatType::Absolute);
        assert_eq!(detection.confidence, 1.0);
    }

    #[test]
    fn test_growth_format() {
        let detection = detect_format(&headers(&["Crec%", "Growth", "Revenue"]));
        assert_eq!(detection.format_type, FormatType::Growth);
    }

    #[test]
    fn test_unknown_format_zero_confidence() {
        let detection = detect_format(&headers(&["Foo", "Bar", "Baz"]));
        assert_eq!(detection.format_type, FormatType::Unknown);
        assert_eq!(detection.confidence, 0.0);
    }

    #[test]
    fn test_unknown_reports_matched_columns_for_diagnosis() {
        // One growth keyword is not enough to classify but is reported
        let detection = detect_format(&headers(&["Foo", "Bar", "Crec%"]));
        assert_eq!(detection.format_type, FormatType::Unknown);
        assert_eq!(detection.matched_columns, vec!["Crec%".to_string()]);
    }

    #[test]
    fn test_full_growth_file_headers() {
        let detection = detect_format(&growth_headers());
        assert_eq!(detection.format_type, FormatType::Growth);
    }
}

#[cfg(test)]
mod cell_parsing_tests {
    use super::*;

    #[test]
    fn test_parse_percentage_basic() {
        assert_eq!(parse_percentage("15.7%"), Some(15.7));
        assert_eq!(parse_percentage("15.7"), Some(15.7));
        assert_eq!(parse_percentage("-3.2%"), Some(-3.2));
        assert_eq!(parse_percentage("0%"), Some(0.0));
    }

    #[test]
    fn test_parse_percentage_locale_decimal() {
        // Comma used as decimal separator
        assert_eq!(parse_percentage("15,7%"), Some(15.7));
        assert_eq!(parse_percentage(" 8,25 "), Some(8.25));
    }

    #[test]
    fn test_parse_percentage_blank_or_garbage_is_none() {
        assert_eq!(parse_percentage(""), None);
        assert_eq!(parse_percentage("   "), None);
        assert_eq!(parse_percentage("n/a"), None);
        assert_eq!(parse_percentage("%"), None);
    }

    #[test]
    fn test_parse_number_strips_thousands_commas() {
        assert_eq!(parse_number("1,234,567.89"), Some(1234567.89));
        assert_eq!(parse_number("1000"), Some(1000.0));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("1,234"), Some(1234));
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer("42.0"), Some(42));
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("x"), None);
    }

    #[test]
    fn test_truncate_char_boundary_safe() {
        assert_eq!(truncate("Michoacán", 9), "Michoacán");
        assert_eq!(truncate("Michoacán", 8), "Michoacá");
        assert_eq!(truncate("abc", 50), "abc");
    }
}

#[cfg(test)]
mod column_resolution_tests {
    use super::*;

    #[test]
    fn test_resolves_identity_columns() {
        let map = resolve_columns(&growth_headers(), true).unwrap();
        assert_eq!(map.suc_sap, Some(0));
        assert_eq!(map.sucursal, Some(1));
        assert_eq!(map.format, Some(2));
        assert_eq!(map.zona, Some(3));
        assert_eq!(map.estado, Some(4));
    }

    #[test]
    fn test_suc_sap_not_confused_with_sucursal() {
        let map = resolve_columns(
            &headers(&["Sucursal", "Suc SAP", "Formato", "Estado", "Ventas", "Ordenes", "Tickets"]),
            false,
        )
        .unwrap();
        assert_eq!(map.suc_sap, Some(1));
        assert_eq!(map.sucursal, Some(0));
    }

    #[test]
    fn test_resolves_kpi_columns_by_name() {
        let map = resolve_columns(&growth_headers(), true).unwrap();
        assert_eq!(map.kpi, [Some(5), Some(6), Some(7)]);
    }

    #[test]
    fn test_missing_required_columns_is_whole_file_error() {
        let err = resolve_columns(&headers(&["Foo", "Bar", "Ventas", "Ordenes", "Tickets"]), false)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("suc_sap"));
        assert!(message.contains("estado"));
    }
}

#[cfg(test)]
mod normalization_tests {
    use super::*;

    #[test]
    fn test_growth_percentage_stored_as_decimal_fraction() {
        let map = resolve_columns(&growth_headers(), true).unwrap();
        let rows = vec![row(&[
            "S001", "Centro", "Express", "Norte", "Jalisco", "15.7%", "2.1%", "-0.5%",
        ])];
        let batch = normalize_growth_rows(&rows, &map);

        assert_eq!(batch.stores.len(), 1);
        let (code, values) = &batch.metrics[0];
        assert_eq!(code, "S001");
        assert!((values.revenue_growth_pct.unwrap() - 0.157).abs() < 1e-9);
        assert!((values.orders_growth_pct.unwrap() - 0.021).abs() < 1e-9);
        assert!((values.ticket_growth_pct.unwrap() + 0.005).abs() < 1e-9);
    }

    #[test]
    fn test_decimal_round_trips_to_display_percentage() {
        // Write path divides by 100; read path multiplies by 100
        let stored = parse_percentage("15.7%").unwrap() / 100.0;
        let displayed = stored * 100.0;
        assert!((displayed - 15.7).abs() < 0.01);
    }

    #[test]
    fn test_missing_required_fields_rejects_row_and_keeps_batch() {
        let map = resolve_columns(&growth_headers(), true).unwrap();
        let rows = vec![
            row(&["S001", "Centro", "Express", "", "Jalisco", "1%", "1%", "1%"]),
            row(&["", "Sur", "Express", "", "Jalisco", "2%", "2%", "2%"]),
            row(&["S003", "Norte", "", "", "Jalisco", "3%", "3%", "3%"]),
            row(&["S004", "Este", "Express", "", "", "4%", "4%", "4%"]),
        ];
        let batch = normalize_growth_rows(&rows, &map);

        assert_eq!(batch.stores.len(), 1);
        assert_eq!(batch.rows_skipped, 3);
        assert_eq!(batch.errors.len(), 3);
        assert!(batch.errors[0].starts_with("Row 2: missing required store fields"));
        assert!(batch.errors[1].starts_with("Row 3"));
        assert!(batch.errors[2].starts_with("Row 4"));
    }

    #[test]
    fn test_duplicate_code_keeps_first_occurrence() {
        let map = resolve_columns(&growth_headers(), true).unwrap();
        let rows = vec![
            row(&["S001", "Centro", "Express", "", "Jalisco", "1%", "1%", "1%"]),
            row(&["S001", "Otra", "Express", "", "Jalisco", "9%", "9%", "9%"]),
        ];
        let batch = normalize_growth_rows(&rows, &map);

        assert_eq!(batch.stores.len(), 1);
        assert_eq!(batch.stores[0].sucursal, "Centro");
        assert_eq!(batch.errors.len(), 1);
        assert!(batch.errors[0].contains("Row 2"));
        assert!(batch.errors[0].contains("duplicate store code 'S001'"));
    }

    #[test]
    fn test_blank_kpi_cells_become_null_not_errors() {
        let map = resolve_columns(&absolute_headers(), false).unwrap();
        let rows = vec![row(&["S001", "Centro", "Express", "Jalisco", "", "n/a", "120"])];
        let batch = normalize_absolute_rows(&rows, &map);

        assert!(batch.errors.is_empty());
        let (_, values) = &batch.metrics[0];
        assert_eq!(values.ventas, None);
        assert_eq!(values.ordenes, None);
        assert_eq!(values.tickets, Some(120));
    }

    #[test]
    fn test_absolute_values_parse_with_thousands_separators() {
        let map = resolve_columns(&absolute_headers(), false).unwrap();
        let rows = vec![row(&[
            "S001",
            "Centro",
            "Express",
            "Jalisco",
            "1,234,567.89",
            "4,521",
            "3,998",
        ])];
        let batch = normalize_absolute_rows(&rows, &map);

        let (_, values) = &batch.metrics[0];
        assert_eq!(values.ventas, Some(1234567.89));
        assert_eq!(values.ordenes, Some(4521));
        assert_eq!(values.tickets, Some(3998));
    }

    #[test]
    fn test_counts_above_i32_range_survive_without_wrapping() {
        // Chain-wide totals can exceed i32; the whole path carries i64
        let map = resolve_columns(&absolute_headers(), false).unwrap();
        let rows = vec![row(&[
            "S001",
            "Centro",
            "Express",
            "Jalisco",
            "9,800,000,000.50",
            "3,000,000,000",
            "2,147,483,648",
        ])];
        let batch = normalize_absolute_rows(&rows, &map);

        assert!(batch.errors.is_empty());
        let (_, values) = &batch.metrics[0];
        assert_eq!(values.ventas, Some(9_800_000_000.50));
        assert_eq!(values.ordenes, Some(3_000_000_000));
        assert_eq!(values.tickets, Some(2_147_483_648));
        assert!(values.ordenes.unwrap() > i64::from(i32::MAX));
    }

    #[test]
    fn test_over_length_fields_truncated_to_schema_limits() {
        let map = resolve_columns(&growth_headers(), true).unwrap();
        let long_code = "X".repeat(80);
        let long_name = "N".repeat(300);
        let rows = vec![row(&[
            &long_code, &long_name, "Express", "", "Jalisco", "1%", "1%", "1%",
        ])];
        let batch = normalize_growth_rows(&rows, &map);

        assert_eq!(batch.stores[0].suc_sap.chars().count(), MAX_SUC_SAP);
        assert_eq!(batch.stores[0].sucursal.chars().count(), MAX_SUCURSAL);
    }

    #[test]
    fn test_identity_fields_trimmed() {
        let map = resolve_columns(&growth_headers(), true).unwrap();
        let rows = vec![row(&[
            "  S001  ", " Centro ", " Express ", "", " Jalisco ", "1%", "1%", "1%",
        ])];
        let batch = normalize_growth_rows(&rows, &map);

        assert_eq!(batch.stores[0].suc_sap, "S001");
        assert_eq!(batch.stores[0].sucursal, "Centro");
        assert_eq!(batch.stores[0].estado.as_deref(), Some("Jalisco"));
    }
}

#[cfg(test)]
mod error_handling_tests {
    use retail_map_api::errors::AppError;

    #[test]
    fn test_app_error_types() {
        let db_error = AppError::DatabaseError(sqlx::Error::RowNotFound);
        assert!(matches!(db_error, AppError::DatabaseError(_)));

        let api_error = AppError::ExternalApiError("geocoder timeout".to_string());
        assert!(matches!(api_error, AppError::ExternalApiError(_)));

        let bad_request = AppError::BadRequest("Missing required columns".to_string());
        assert!(matches!(bad_request, AppError::BadRequest(_)));

        let unauthorized = AppError::Unauthorized("Missing bearer token".to_string());
        assert!(matches!(unauthorized, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_error_display() {
        let error = AppError::ExternalApiError("Connection timeout".to_string());
        let display = format!("{}", error);
        assert!(display.contains("External API error"));
        assert!(display.contains("Connection timeout"));

        let error = AppError::BadRequest("Missing required columns: suc_sap".to_string());
        let display = format!("{}", error);
        assert!(display.contains("Bad request"));
        assert!(display.contains("suc_sap"));
    }
}
