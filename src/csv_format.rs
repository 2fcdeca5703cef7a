use serde::{Deserialize, Serialize};

/// Metric family a CSV file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatType {
    Growth,
    Absolute,
    Unknown,
}

impl FormatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatType::Growth => "growth",
            FormatType::Absolute => "absolute",
            FormatType::Unknown => "unknown",
        }
    }
}

/// Result of classifying a header row.
///
/// `Unknown` is a reportable outcome, not an error: it blocks ingestion but
/// the matched columns are returned so a human can diagnose the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatDetection {
    #[serde(rename = "type")]
    pub format_type: FormatType,
    /// matches / 3, capped at 1.0.
    pub confidence: f64,
    pub matched_columns: Vec<String>,
}

/// Substrings that mark a header as a period-over-period growth KPI.
const GROWTH_KEYWORDS: [&str; 4] = ["%", "crec", "growth", "crecimiento"];

/// Substrings that mark a header as a raw-count KPI.
const ABSOLUTE_KEYWORDS: [&str; 3] = ["ventas", "ordenes", "tickets"];

/// Number of trailing columns assumed to carry the KPI values when no
/// explicit KPI columns are configured.
const KPI_COLUMN_COUNT: usize = 3;

/// Classifies a CSV header row as growth or absolute metrics.
///
/// Only the KPI-bearing headers are inspected (the last three columns in
/// upload contexts lacking configuration). A family wins with two or more
/// keyword matches; growth takes priority when both qualify.
pub fn detect_format(headers: &[String]) -> FormatDetection {
    let kpi_headers: Vec<&String> = headers
        .iter()
        .skip(headers.len().saturating_sub(KPI_COLUMN_COUNT))
        .collect();

    let mut growth_matches: Vec<String> = Vec::new();
    let mut absolute_matches: Vec<String> = Vec::new();

    for header in &kpi_headers {
        let lower = header.to_lowercase();
        if GROWTH_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            growth_matches.push((*header).clone());
        }
        if ABSOLUTE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            absolute_matches.push((*header).clone());
        }
    }

    // Growth checked first so it wins when both families qualify
    let (format_type, matched) = if growth_matches.len() >= 2 {
        (FormatType::Growth, growth_matches)
    } else if absolute_matches.len() >= 2 {
        (FormatType::Absolute, absolute_matches)
    } else {
        // A header can match both families; report it once
        let mut all = growth_matches;
        for header in absolute_matches {
            if !all.contains(&header) {
                all.push(header);
            }
        }
        (FormatType::Unknown, all)
    };

    let confidence = if format_type == FormatType::Unknown {
        0.0
    } else {
        (matched.len() as f64 / KPI_COLUMN_COUNT as f64).min(1.0)
    };

    FormatDetection {
        format_type,
        confidence,
        matched_columns: matched,
    }
}
