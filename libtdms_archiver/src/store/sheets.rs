use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use url::Url;

use super::{non_finite_text, parse_sample_text, TabularStore};
use crate::column::Column;
use crate::error::StoreError;
use crate::naming::TableId;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const METADATA_FIELDS: &str = "sheets.properties(sheetId,title,gridProperties(rowCount,columnCount))";
// Sheet ids are positive 31 bit integers
const SHEET_ID_MASK: u64 = 0x7fff_ffff;

/// Authenticated connection to one remote spreadsheet.
///
/// The session is opened once by [`SheetsSession::connect`], which checks that the spreadsheet
/// is reachable with the given token, and stays usable until [`SheetsSession::close`].
#[derive(Debug)]
pub struct SheetsSession {
    agent: ureq::Agent,
    endpoint: Url,
    spreadsheet_id: String,
    token: String,
    open: AtomicBool,
}

impl SheetsSession {
    pub fn connect(endpoint: &str, spreadsheet_id: &str, token: &str) -> Result<Self, StoreError> {
        let endpoint = Url::parse(endpoint)?;
        if endpoint.cannot_be_a_base() {
            return Err(StoreError::Transport(format!(
                "endpoint {endpoint} cannot hold a request path"
            )));
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(REQUEST_TIMEOUT)
            .timeout_write(REQUEST_TIMEOUT)
            .build();
        let session = Self {
            agent,
            endpoint,
            spreadsheet_id: spreadsheet_id.to_string(),
            token: token.to_string(),
            open: AtomicBool::new(true),
        };
        let sheets = session.sheets()?;
        spdlog::info!(
            "Connected to spreadsheet {} holding {} sheets",
            session.spreadsheet_id,
            sheets.len()
        );
        Ok(session)
    }

    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            spdlog::info!("Closed session to spreadsheet {}", self.spreadsheet_id);
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn spreadsheet_url(&self, suffix: Option<&str>, query: &[(&str, &str)]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("v4").push("spreadsheets");
            match suffix {
                Some(suffix) => segments.push(&format!("{}{}", self.spreadsheet_id, suffix)),
                None => segments.push(&self.spreadsheet_id),
            };
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    fn values_url(&self, range: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.spreadsheet_url(None, query);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push("values").push(range);
        }
        url
    }

    fn get_json(&self, url: &Url) -> Result<Value, StoreError> {
        if !self.is_open() {
            return Err(StoreError::Closed);
        }
        let response = self
            .agent
            .get(url.as_str())
            .set("authorization", &format!("Bearer {}", self.token))
            .call()?;
        Ok(response.into_json::<Value>()?)
    }

    fn post_json(&self, url: &Url, body: &Value) -> Result<Value, StoreError> {
        if !self.is_open() {
            return Err(StoreError::Closed);
        }
        let response = self
            .agent
            .post(url.as_str())
            .set("authorization", &format!("Bearer {}", self.token))
            .send_json(body)?;
        Ok(response.into_json::<Value>()?)
    }

    fn sheets(&self) -> Result<Vec<SheetProperties>, StoreError> {
        let url = self.spreadsheet_url(None, &[("fields", METADATA_FIELDS)]);
        parse_metadata(self.get_json(&url)?)
    }

    fn values(&self, title: &str) -> Result<Vec<Column>, StoreError> {
        let url = self.values_url(
            &a1_range(title),
            &[
                ("majorDimension", "COLUMNS"),
                ("valueRenderOption", "UNFORMATTED_VALUE"),
            ],
        );
        parse_columns(title, self.get_json(&url)?)
    }

    /// All requests of one batch are applied together or not at all
    fn batch_update(&self, requests: Vec<Value>) -> Result<(), StoreError> {
        let url = self.spreadsheet_url(Some(":batchUpdate"), &[]);
        self.post_json(&url, &json!({ "requests": requests }))?;
        Ok(())
    }
}

/// A remote spreadsheet with one worksheet per table.
///
/// Layout matches the local workbook: column names in row 1, samples below. Each create and
/// append is a single batch update, so a column lands whole or not at all.
#[derive(Debug)]
pub struct SheetsStore {
    session: SheetsSession,
}

impl SheetsStore {
    pub fn new(session: SheetsSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SheetsSession {
        &self.session
    }

    fn find(&self, table: &TableId) -> Result<Option<SheetProperties>, StoreError> {
        Ok(self
            .session
            .sheets()?
            .into_iter()
            .find(|s| s.title == table.as_str()))
    }
}

impl Drop for SheetsStore {
    fn drop(&mut self) {
        self.session.close();
    }
}

impl TabularStore for SheetsStore {
    fn exists(&self, table: &TableId) -> Result<bool, StoreError> {
        Ok(self.find(table)?.is_some())
    }

    fn create(&self, table: &TableId, column: &Column) -> Result<(), StoreError> {
        let sheets = self.session.sheets()?;
        if sheets.iter().any(|s| s.title == table.as_str()) {
            return Err(StoreError::TableExists(table.to_string()));
        }
        let taken: Vec<i64> = sheets.iter().map(|s| s.sheet_id).collect();
        let sheet_id = sheet_id_for(table.as_str(), &taken);
        self.session
            .batch_update(create_requests(sheet_id, table.as_str(), column))
    }

    fn read_columns(&self, table: &TableId) -> Result<Vec<Column>, StoreError> {
        match self.find(table)? {
            Some(sheet) => self.session.values(&sheet.title),
            None => Err(StoreError::MissingTable(table.to_string())),
        }
    }

    fn append_column(&self, table: &TableId, column: &Column) -> Result<(), StoreError> {
        let sheet = self
            .find(table)?
            .ok_or_else(|| StoreError::MissingTable(table.to_string()))?;
        let used_columns = self.session.values(&sheet.title)?.len() as u64;
        self.session
            .batch_update(append_requests(&sheet, used_columns, column))
    }

    fn list_tables(&self) -> Result<Vec<TableId>, StoreError> {
        Ok(self
            .session
            .sheets()?
            .into_iter()
            .filter_map(|s| TableId::new(&s.title).ok())
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
    #[serde(default)]
    grid_properties: GridProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    row_count: u64,
    #[serde(default)]
    column_count: u64,
}

fn parse_metadata(body: Value) -> Result<Vec<SheetProperties>, StoreError> {
    let metadata: SpreadsheetMetadata = serde_json::from_value(body)?;
    Ok(metadata.sheets.into_iter().map(|s| s.properties).collect())
}

/// Parse a COLUMNS-major values response. Each column ends at its first empty cell.
fn parse_columns(title: &str, body: Value) -> Result<Vec<Column>, StoreError> {
    let columns = match body.get("values") {
        None => return Ok(Vec::new()),
        Some(Value::Array(columns)) => columns,
        Some(_) => {
            return Err(StoreError::BadResponse(format!(
                "values of sheet {title:?} is not an array"
            )))
        }
    };

    let mut parsed = Vec::with_capacity(columns.len());
    for (col, cells) in columns.iter().enumerate() {
        let cells = cells.as_array().ok_or_else(|| {
            StoreError::BadResponse(format!("column {} of sheet {title:?} is not an array", col + 1))
        })?;
        let name = match cells.first() {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let mut values = Vec::with_capacity(cells.len().saturating_sub(1));
        for (row, cell) in cells.iter().enumerate().skip(1) {
            let sample = match cell {
                Value::Null => break,
                Value::String(s) if s.is_empty() => break,
                Value::Number(n) => n.as_f64(),
                Value::String(s) => parse_sample_text(s),
                _ => None,
            };
            match sample {
                Some(sample) => values.push(sample),
                None => {
                    return Err(StoreError::BadCell(format!(
                        "sheet {title:?} row {} column {} holds {cell}, not a number",
                        row + 1,
                        col + 1
                    )))
                }
            }
        }
        parsed.push(Column { name, values });
    }
    Ok(parsed)
}

/// A1 notation covering a whole sheet. Quotes inside titles are doubled.
fn a1_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Stable id derived from the title, probing upward past ids already in use
fn sheet_id_for(title: &str, taken: &[i64]) -> i64 {
    let mut id = (fxhash::hash64(title) & SHEET_ID_MASK) as i64;
    while taken.contains(&id) {
        id = (id + 1) & SHEET_ID_MASK as i64;
    }
    id
}

fn cell(value: f64) -> Value {
    if value.is_finite() {
        json!({ "userEnteredValue": { "numberValue": value } })
    } else {
        json!({ "userEnteredValue": { "stringValue": non_finite_text(value) } })
    }
}

/// One row per cell: the column name followed by the samples
fn column_rows(column: &Column) -> Vec<Value> {
    let mut rows = Vec::with_capacity(column.len() + 1);
    rows.push(json!({ "values": [{ "userEnteredValue": { "stringValue": column.name } }] }));
    rows.extend(
        column
            .values
            .iter()
            .map(|v| json!({ "values": [cell(*v)] })),
    );
    rows
}

fn update_cells(sheet_id: i64, column_index: u64, column: &Column) -> Value {
    json!({
        "updateCells": {
            "start": { "sheetId": sheet_id, "rowIndex": 0, "columnIndex": column_index },
            "rows": column_rows(column),
            "fields": "userEnteredValue"
        }
    })
}

fn create_requests(sheet_id: i64, title: &str, column: &Column) -> Vec<Value> {
    vec![
        json!({
            "addSheet": {
                "properties": {
                    "sheetId": sheet_id,
                    "title": title,
                    "gridProperties": { "rowCount": column.len() + 1, "columnCount": 1 }
                }
            }
        }),
        update_cells(sheet_id, 0, column),
    ]
}

/// Grow the grid where the new column does not fit, then write it right of the used columns
fn append_requests(sheet: &SheetProperties, used_columns: u64, column: &Column) -> Vec<Value> {
    let mut requests = Vec::new();
    let grid = &sheet.grid_properties;
    let needed_rows = column.len() as u64 + 1;
    if needed_rows > grid.row_count {
        requests.push(json!({
            "appendDimension": {
                "sheetId": sheet.sheet_id,
                "dimension": "ROWS",
                "length": needed_rows - grid.row_count
            }
        }));
    }
    if used_columns + 1 > grid.column_count {
        requests.push(json!({
            "appendDimension": {
                "sheetId": sheet.sheet_id,
                "dimension": "COLUMNS",
                "length": used_columns + 1 - grid.column_count
            }
        }));
    }
    requests.push(update_cells(sheet.sheet_id, used_columns, column));
    requests
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: u64, columns: u64) -> SheetProperties {
        SheetProperties {
            sheet_id: 7,
            title: String::from("10hz"),
            grid_properties: GridProperties {
                row_count: rows,
                column_count: columns,
            },
        }
    }

    #[test]
    fn test_parse_metadata() {
        let body = json!({
            "sheets": [
                { "properties": { "sheetId": 0, "title": "10hz",
                    "gridProperties": { "rowCount": 1000, "columnCount": 26 } } },
                { "properties": { "sheetId": 12, "title": "20hz" } }
            ]
        });
        let sheets = parse_metadata(body).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].grid_properties.column_count, 26);
        assert_eq!(sheets[1].title, "20hz");
        assert_eq!(sheets[1].grid_properties, GridProperties::default());
        assert!(parse_metadata(json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_parse_columns() {
        let body = json!({
            "range": "'10hz'!A1:Z1000",
            "majorDimension": "COLUMNS",
            "values": [
                ["z-axis-2024-01-01_00-00-00", 0.5, 1, "-inf"],
                ["z-axis-2024-01-01_00-05-00", 2.5, ""]
            ]
        });
        let columns = parse_columns("10hz", body).unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].values[..2], [0.5, 1.0]);
        assert_eq!(columns[0].values[2], f64::NEG_INFINITY);
        assert_eq!(columns[1].values, vec![2.5]);
        assert!(parse_columns("empty", json!({ "range": "'empty'!A1:Z1000" }))
            .unwrap()
            .is_empty());
        assert!(matches!(
            parse_columns("bad", json!({ "values": [["a", "oops"]] })),
            Err(StoreError::BadCell(_))
        ));
    }

    #[test]
    fn test_a1_range_quotes_title() {
        assert_eq!(a1_range("10hz"), "'10hz'");
        assert_eq!(a1_range("it's"), "'it''s'");
    }

    #[test]
    fn test_sheet_id_avoids_taken_ids() {
        let id = sheet_id_for("10hz", &[]);
        assert!((0..=SHEET_ID_MASK as i64).contains(&id));
        assert_eq!(sheet_id_for("10hz", &[]), id);
        let next = sheet_id_for("10hz", &[id]);
        assert_ne!(next, id);
    }

    #[test]
    fn test_create_requests() {
        let column = Column::new("c", vec![1.0, f64::NAN]);
        let requests = create_requests(3, "10hz", &column);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["addSheet"]["properties"]["title"], "10hz");
        assert_eq!(
            requests[0]["addSheet"]["properties"]["gridProperties"]["rowCount"],
            3
        );
        let rows = requests[1]["updateCells"]["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["values"][0]["userEnteredValue"]["stringValue"], "c");
        assert_eq!(rows[1]["values"][0]["userEnteredValue"]["numberValue"], 1.0);
        assert_eq!(rows[2]["values"][0]["userEnteredValue"]["stringValue"], "NaN");
    }

    #[test]
    fn test_append_requests_grow_grid_only_when_needed() {
        let column = Column::new("c", vec![0.0; 4]);
        let requests = append_requests(&sheet(1000, 26), 2, &column);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["updateCells"]["start"]["columnIndex"], 2);

        let requests = append_requests(&sheet(3, 2), 2, &column);
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0]["appendDimension"]["dimension"], "ROWS");
        assert_eq!(requests[0]["appendDimension"]["length"], 2);
        assert_eq!(requests[1]["appendDimension"]["dimension"], "COLUMNS");
        assert_eq!(requests[1]["appendDimension"]["length"], 1);
        assert_eq!(requests[2]["updateCells"]["start"]["sheetId"], 7);
    }

    #[test]
    fn test_spreadsheet_urls() {
        let session = SheetsSession {
            agent: ureq::AgentBuilder::new().build(),
            endpoint: Url::parse("https://sheets.example.com/").unwrap(),
            spreadsheet_id: String::from("abc"),
            token: String::from("t"),
            open: AtomicBool::new(true),
        };
        assert_eq!(
            session.spreadsheet_url(Some(":batchUpdate"), &[]).as_str(),
            "https://sheets.example.com/v4/spreadsheets/abc:batchUpdate"
        );
        let url = session.values_url(&a1_range("10 hz"), &[("majorDimension", "COLUMNS")]);
        assert_eq!(url.path(), "/v4/spreadsheets/abc/values/'10%20hz'");
        assert_eq!(url.query(), Some("majorDimension=COLUMNS"));

        session.close();
        assert!(matches!(session.sheets(), Err(StoreError::Closed)));
    }
}
