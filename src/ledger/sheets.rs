//! Google Sheets ledger over the Sheets REST API (v4).
//!
//! Rows are `date | product | price | notes`. The header row is checked once per
//! process and rewritten only when it differs; data rows are never touched.
//! Values are written with `valueInputOption=RAW` so user text is never
//! interpreted as a formula.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::sheets_auth::{SheetsSession, TokenSource};
use super::{RecordSink, SinkError, LEDGER_HEADERS};
use crate::purchase::{parse_price, PurchaseRecord};

/// Production API endpoint
pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

const DATE_FORMAT: &str = "%Y-%m-%d";
/// Older rows carry the time of entry as well
const LEGACY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

pub struct SheetsLedger {
    client: reqwest::Client,
    session: SheetsSession,
    api_base: Url,
    spreadsheet_id: String,
    worksheet: Option<String>,
    headers_ready: OnceCell<()>,
}

impl SheetsLedger {
    /// `worksheet` selects a sheet by title; `None` means the first sheet.
    pub fn new(
        api_base: &str,
        spreadsheet_id: impl Into<String>,
        worksheet: Option<String>,
        token_source: TokenSource,
    ) -> Result<Self, SinkError> {
        let api_base = Url::parse(api_base)
            .map_err(|e| SinkError::Rejected(format!("invalid API base {api_base:?}: {e}")))?;
        let client = reqwest::Client::new();

        Ok(Self {
            session: SheetsSession::new(client.clone(), token_source),
            client,
            api_base,
            spreadsheet_id: spreadsheet_id.into(),
            worksheet,
            headers_ready: OnceCell::new(),
        })
    }

    /// A1 range qualified with the worksheet title when one is configured
    fn range(&self, cells: &str) -> String {
        match &self.worksheet {
            Some(title) => format!("'{}'!{cells}", title.replace('\'', "''")),
            None => cells.to_string(),
        }
    }

    /// `{base}/v4/spreadsheets/{id}` followed by `segments`
    fn url(&self, segments: &[&str]) -> Result<Url, SinkError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| SinkError::Rejected(format!("API base {} cannot hold a path", self.api_base)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(segments);
        Ok(url)
    }

    fn values_url(&self, range: &str) -> Result<Url, SinkError> {
        self.url(&[&self.spreadsheet_id, "values", range])
    }

    /// Send an authorized request, retrying once with a new token after a 401.
    async fn send<F>(&self, what: &str, build: F) -> Result<Response, SinkError>
    where
        F: Fn() -> RequestBuilder,
    {
        let token = self.session.token().await?;
        let response = dispatch(build().bearer_auth(token), what).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response, what).await;
        }

        info!(request = what, "Sheets answered 401, reacquiring access token");
        let token = self.session.reacquire().await?;
        let response = dispatch(build().bearer_auth(token), what).await?;
        check_status(response, what).await
    }

    async fn ensure_headers(&self) -> Result<(), SinkError> {
        self.headers_ready
            .get_or_try_init(|| self.provision_headers())
            .await
            .map(|_| ())
    }

    async fn provision_headers(&self) -> Result<(), SinkError> {
        let range = self.range("A1:D1");
        let url = self.values_url(&range)?;
        let current: ValueRange = self
            .send("read headers", || self.client.get(url.clone()))
            .await?
            .json()
            .await
            .map_err(|e| SinkError::Rejected(format!("header response: {e}")))?;

        let matches = current.values.first().is_some_and(|row| {
            row.len() == LEDGER_HEADERS.len()
                && row.iter().zip(LEDGER_HEADERS).all(|(cell, h)| cell.as_str() == Some(h))
        });
        if matches {
            debug!("Ledger headers already in place");
            return Ok(());
        }

        info!(range = %range, "Writing ledger header row");
        let mut url = url;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [LEDGER_HEADERS],
        });
        self.send("write headers", || {
            self.client.request(Method::PUT, url.clone()).json(&body)
        })
        .await?;

        if let Err(e) = self.format_headers().await {
            warn!(error = %e, "Could not format ledger header row");
        }
        Ok(())
    }

    /// Bold, centered, light grey header cells
    async fn format_headers(&self) -> Result<(), SinkError> {
        let mut meta_url = self.url(&[&self.spreadsheet_id])?;
        meta_url
            .query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");
        let meta: SpreadsheetMeta = self
            .send("read spreadsheet metadata", || self.client.get(meta_url.clone()))
            .await?
            .json()
            .await
            .map_err(|e| SinkError::Rejected(format!("metadata response: {e}")))?;

        let sheet = match &self.worksheet {
            Some(title) => meta.sheets.iter().find(|s| &s.properties.title == title),
            None => meta.sheets.first(),
        }
        .ok_or_else(|| SinkError::StoreNotFound("worksheet not found in spreadsheet".to_string()))?;

        let url = self.url(&[&format!("{}:batchUpdate", self.spreadsheet_id)])?;
        let body = json!({
            "requests": [{
                "repeatCell": {
                    "range": {
                        "sheetId": sheet.properties.sheet_id,
                        "startRowIndex": 0,
                        "endRowIndex": 1,
                        "startColumnIndex": 0,
                        "endColumnIndex": LEDGER_HEADERS.len(),
                    },
                    "cell": {
                        "userEnteredFormat": {
                            "backgroundColor": { "red": 0.9, "green": 0.9, "blue": 0.9 },
                            "horizontalAlignment": "CENTER",
                            "textFormat": { "bold": true },
                        }
                    },
                    "fields": "userEnteredFormat(backgroundColor,horizontalAlignment,textFormat)",
                }
            }]
        });
        self.send("format headers", || self.client.post(url.clone()).json(&body))
            .await?;
        Ok(())
    }

    async fn append_rows(&self, records: &[PurchaseRecord]) -> Result<(), SinkError> {
        self.ensure_headers().await?;

        let mut url = self.values_url(&format!("{}:append", self.range("A:D")))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let rows: Vec<Vec<Value>> = records.iter().map(record_row).collect();
        let body = json!({ "majorDimension": "ROWS", "values": rows });

        debug!(rows = records.len(), "Appending rows to Sheets ledger");
        self.send("append rows", || self.client.post(url.clone()).json(&body))
            .await?;
        Ok(())
    }
}

async fn dispatch(request: RequestBuilder, what: &str) -> Result<Response, SinkError> {
    request
        .send()
        .await
        .map_err(|e| SinkError::Connectivity(format!("{what}: {e}")))
}

async fn check_status(response: Response, what: &str) -> Result<Response, SinkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = format!("{what}: {status} {body}");
    Err(match status {
        StatusCode::NOT_FOUND => SinkError::StoreNotFound(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SinkError::Unauthorized(detail),
        _ => SinkError::Rejected(detail),
    })
}

fn record_row(record: &PurchaseRecord) -> Vec<Value> {
    let price = record
        .price()
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(record.price().to_string()));

    vec![
        Value::String(record.date().format(DATE_FORMAT).to_string()),
        Value::String(record.product().to_string()),
        price,
        Value::String(record.notes().to_string()),
    ]
}

fn cell_text(cell: Option<&Value>) -> String {
    match cell {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn decode_date(cell: Option<&Value>) -> Result<NaiveDate, String> {
    match cell {
        Some(Value::String(s)) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(s, LEGACY_DATE_FORMAT).map(|dt| dt.date()))
                .map_err(|_| format!("unrecognized date {s:?}"))
        }
        // Cells formatted as dates come back as serial day numbers.
        Some(Value::Number(n)) => {
            let days = n.as_f64().ok_or("date serial out of range")?.floor() as i64;
            NaiveDate::from_ymd_opt(1899, 12, 30)
                .zip(Duration::try_days(days))
                .and_then(|(epoch, offset)| epoch.checked_add_signed(offset))
                .ok_or_else(|| format!("date serial {n} out of range"))
        }
        _ => Err("missing date".to_string()),
    }
}

fn decode_price(cell: Option<&Value>) -> Result<Decimal, String> {
    match cell {
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map_err(|e| format!("price {n}: {e}")),
        Some(Value::String(s)) => parse_price(s).map_err(|e| e.to_string()),
        _ => Err("missing price".to_string()),
    }
}

fn decode_row(row: &[Value]) -> Result<PurchaseRecord, String> {
    let date = decode_date(row.first())?;
    let product = cell_text(row.get(1));
    let price = decode_price(row.get(2))?;
    let notes = cell_text(row.get(3));
    PurchaseRecord::new(date, product, price, notes).map_err(|e| e.to_string())
}

#[async_trait]
impl RecordSink for SheetsLedger {
    async fn append_record(&self, record: &PurchaseRecord) -> Result<(), SinkError> {
        self.append_rows(std::slice::from_ref(record)).await
    }

    async fn append_batch(&self, records: &[PurchaseRecord]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }
        self.append_rows(records).await
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<PurchaseRecord>, SinkError> {
        let mut url = self.values_url(&self.range("A2:D"))?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE");

        let data: ValueRange = self
            .send("read rows", || self.client.get(url.clone()))
            .await?
            .json()
            .await
            .map_err(|e| SinkError::Rejected(format!("rows response: {e}")))?;

        let records: Vec<PurchaseRecord> = data
            .values
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(|cell| !cell_text(Some(cell)).trim().is_empty()))
            .filter_map(|(index, row)| match decode_row(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    // Data starts on sheet row 2.
                    warn!(row = index + 2, error = %e, "Skipping malformed ledger row");
                    None
                }
            })
            .collect();

        let start = records.len().saturating_sub(limit);
        Ok(records[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(worksheet: Option<&str>) -> SheetsLedger {
        SheetsLedger::new(
            DEFAULT_API_BASE,
            "sheet-id",
            worksheet.map(str::to_string),
            TokenSource::Static("t".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_range_quoting() {
        assert_eq!(ledger(None).range("A1:D1"), "A1:D1");
        assert_eq!(ledger(Some("Purchases")).range("A:D"), "'Purchases'!A:D");
        assert_eq!(ledger(Some("Bob's")).range("A:D"), "'Bob''s'!A:D");
    }

    #[test]
    fn test_values_url() {
        let url = ledger(None).values_url("A2:D").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-id/values/A2:D"
        );
    }

    #[test]
    fn test_decode_legacy_and_numeric_cells() {
        let row = vec![json!("2024-03-01 14:30"), json!("قهوة"), json!(26.5), json!("بدون سكر")];
        let record = decode_row(&row).unwrap();
        assert_eq!(record.date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(record.price(), Decimal::new(265, 1));
        assert_eq!(record.notes(), "بدون سكر");

        let row = vec![json!(45352), json!("كولا"), json!("٢٣")];
        let record = decode_row(&row).unwrap();
        assert_eq!(record.date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(record.price(), Decimal::new(23, 0));
        assert_eq!(record.notes(), "");
    }

    #[test]
    fn test_decode_rejects_bad_rows() {
        assert!(decode_row(&[json!("yesterday"), json!("كولا"), json!(23)]).is_err());
        assert!(decode_row(&[json!("2024-03-01"), json!(""), json!(23)]).is_err());
        assert!(decode_row(&[json!("2024-03-01"), json!("كولا"), json!("غالي")]).is_err());
        assert!(decode_row(&[json!("2024-03-01"), json!("كولا")]).is_err());
    }

    #[test]
    fn test_record_row_uses_number_for_price() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let record = PurchaseRecord::new(day, "=SUM(A1)", Decimal::new(195, 1), "").unwrap();
        assert_eq!(
            record_row(&record),
            vec![json!("2024-03-01"), json!("=SUM(A1)"), json!(19.5), json!("")]
        );
    }
}
