//! CSV file price data adapter.
//!
//! Reads `<base_path>/<source>.csv` files carrying at least a `Date` and a
//! `Close` column. Other columns are ignored.

use crate::domain::error::GlidepathError;
use crate::domain::price_history::PricePoint;
use crate::ports::data_port::PriceDataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d-%b-%Y", "%d-%m-%Y", "%d/%m/%Y"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, source: &str) -> PathBuf {
        if source.ends_with(".csv") {
            self.base_path.join(source)
        } else {
            self.base_path.join(format!("{}.csv", source))
        }
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

fn parse_close(value: &str) -> Option<f64> {
    let cleaned: String = value.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite() && *v > 0.0)
}

fn column(headers: &csv::StringRecord, name: &str) -> Result<usize, GlidepathError> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| GlidepathError::Data {
            reason: format!("missing {} column", name),
        })
}

/// Sorts by date and keeps the last record of each date.
fn resolve_duplicates(mut points: Vec<PricePoint>) -> Vec<PricePoint> {
    points.sort_by_key(|p| p.date);
    let mut resolved: Vec<PricePoint> = Vec::with_capacity(points.len());
    for point in points {
        match resolved.last_mut() {
            Some(last) if last.date == point.date => *last = point,
            _ => resolved.push(point),
        }
    }
    resolved
}

impl PriceDataPort for CsvAdapter {
    fn fetch_closes(&self, source: &str) -> Result<Vec<PricePoint>, GlidepathError> {
        let path = self.csv_path(source);
        let content = fs::read_to_string(&path).map_err(|e| GlidepathError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| GlidepathError::Data {
                reason: format!("CSV header error in {}: {}", path.display(), e),
            })?
            .clone();
        let date_col = column(&headers, "date")?;
        let close_col = column(&headers, "close")?;

        let mut points = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| GlidepathError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let raw_date = record.get(date_col).unwrap_or_default();
            let date = parse_date(raw_date).ok_or_else(|| GlidepathError::Data {
                reason: format!("invalid date '{}' on row {}", raw_date, line + 1),
            })?;

            let raw_close = record.get(close_col).unwrap_or_default();
            let Some(close) = parse_close(raw_close) else {
                tracing::warn!(
                    source,
                    %date,
                    value = raw_close,
                    "skipping row without a usable close"
                );
                continue;
            };

            points.push(PricePoint { date, close });
        }

        let points = resolve_duplicates(points);
        tracing::debug!(source, points = points.len(), "read price series");
        Ok(points)
    }

    fn list_sources(&self) -> Result<Vec<String>, GlidepathError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| GlidepathError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut sources = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| GlidepathError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(stem) = name_str.strip_suffix(".csv") {
                sources.push(stem.to_string());
            }
        }

        sources.sort();
        Ok(sources)
    }
}
