//! National holiday calendar client.
//!
//! Fetches `GET {base}?year=YYYY`, which returns `[{"date": "YYYY-MM-DD", "name": "..."}]`.

use std::time::Duration;

use chrono::NaiveDate;
use rollcall_core::error::{Result, RollcallError};
use rollcall_core::traits::Directory;
use rollcall_core::types::Holiday;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ApiHoliday {
    date: String,
    name: String,
}

/// HTTP client for the holiday API.
#[derive(Clone)]
pub struct HolidayClient {
    client: reqwest::Client,
    base_url: String,
}

impl HolidayClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_year(&self, year: i32) -> Result<Vec<Holiday>> {
        let url = format!("{}?year={year}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RollcallError::Other(format!("Holiday API request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(RollcallError::Other(format!(
                "Holiday API error {} for {year}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| RollcallError::Other(format!("Holiday API read failed: {e}")))?;
        let holidays = parse_holidays(&body)?;
        tracing::info!("📅 Fetched {} holidays for {}", holidays.len(), year);
        Ok(holidays)
    }

    /// Replace national holidays with `year` and `year + 1`. A year that fails
    /// to fetch is skipped; if nothing was fetched the stored calendar is kept.
    pub async fn sync(&self, directory: &dyn Directory, year: i32) -> Result<usize> {
        let mut all = Vec::new();
        for y in [year, year + 1] {
            match self.fetch_year(y).await {
                Ok(mut list) => all.append(&mut list),
                Err(e) => tracing::warn!("⚠️ Holiday fetch for {} failed: {e}", y),
            }
        }
        if all.is_empty() {
            tracing::warn!("⚠️ Holiday sync fetched nothing, keeping stored calendar");
            return Ok(0);
        }
        let n = directory.sync_national_holidays(&all)?;
        tracing::info!("📅 Synced {} national holidays", n);
        Ok(n)
    }
}

/// Parse the API payload. Entries with an unparsable date are skipped.
pub fn parse_holidays(body: &str) -> Result<Vec<Holiday>> {
    let raw: Vec<ApiHoliday> = serde_json::from_str(body)?;
    Ok(raw
        .into_iter()
        .filter_map(|h| match NaiveDate::parse_from_str(&h.date, "%Y-%m-%d") {
            Ok(date) => Some(Holiday {
                date,
                name: h.name,
                national: true,
                created_by: None,
            }),
            Err(_) => {
                tracing::warn!("⚠️ Skipping holiday with bad date '{}'", h.date);
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_holidays() {
        let body = r#"[
            {"date": "2026-01-01", "name": "Tahun Baru Masehi"},
            {"date": "2026-13-40", "name": "Broken"},
            {"date": "2026-08-17", "name": "Hari Kemerdekaan"}
        ]"#;
        let list = parse_holidays(body).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|h| h.national));
        assert_eq!(list[1].date, NaiveDate::from_ymd_opt(2026, 8, 17).unwrap());
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(parse_holidays(r#"{"error": "rate limited"}"#).is_err());
    }

    #[test]
    fn test_base_url_normalised() {
        let c = HolidayClient::new("https://libur.deno.dev/api/");
        assert_eq!(c.base_url, "https://libur.deno.dev/api");
    }
}
