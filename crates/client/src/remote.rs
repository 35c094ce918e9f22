//! `GridSource` over the remote spreadsheet service.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::json;
use sheetsync_core::{
    compact, ColumnValidation, Dimension, Grid, GridError, GridSource, SheetDownload, SheetRef,
};

use crate::client::{SheetsClient, ValueRange};

/// Remote grids. Every call runs the blocking client on smol's thread pool.
pub struct RemoteGrid {
    client: SheetsClient,
    /// spreadsheet id -> tab title -> numeric sheet id
    sheet_ids: Mutex<HashMap<String, HashMap<String, i64>>>,
}

impl RemoteGrid {
    pub fn new(client: SheetsClient) -> Self {
        Self {
            client,
            sheet_ids: Mutex::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &SheetsClient {
        &self.client
    }

    async fn sheet_id(&self, sheet: &SheetRef) -> Result<i64, GridError> {
        if let Some(id) = self
            .sheet_ids
            .lock()
            .get(&sheet.spreadsheet_id)
            .and_then(|tabs| tabs.get(&sheet.sheet_name))
        {
            return Ok(*id);
        }

        let client = self.client.clone();
        let spreadsheet_id = sheet.spreadsheet_id.clone();
        let props = smol::unblock(move || client.sheet_properties(&spreadsheet_id)).await?;
        let tabs: HashMap<String, i64> = props.into_iter().map(|p| (p.title, p.sheet_id)).collect();
        let id = tabs.get(&sheet.sheet_name).copied();
        self.sheet_ids
            .lock()
            .insert(sheet.spreadsheet_id.clone(), tabs);

        id.ok_or_else(|| {
            GridError::Http(
                404,
                format!("no sheet named '{}' in {}", sheet.sheet_name, sheet.spreadsheet_id),
            )
        })
    }
}

/// Cell text as the sync sees it. Booleans use the spreadsheet spelling.
fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(true) => "TRUE".to_string(),
        serde_json::Value::Bool(false) => "FALSE".to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn to_grid(block: ValueRange) -> Grid {
    let rows = block
        .values
        .iter()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();
    compact(rows)
}

fn validation_request(sheet_id: i64, rule: &ColumnValidation) -> Result<serde_json::Value, GridError> {
    let (row, col) = rule.range.start.zero_based()?;
    let values: Vec<_> = rule
        .options
        .iter()
        .map(|option| json!({ "userEnteredValue": option }))
        .collect();

    Ok(json!({
        "setDataValidation": {
            "range": {
                "sheetId": sheet_id,
                "startRowIndex": row,
                "endRowIndex": row + rule.range.size.height as usize,
                "startColumnIndex": col,
                "endColumnIndex": col + rule.range.size.width as usize,
            },
            "rule": {
                "condition": { "type": "ONE_OF_LIST", "values": values },
                "strict": !rule.multi_select,
                "showCustomUi": true,
            },
        }
    }))
}

impl GridSource for RemoteGrid {
    async fn get_values(
        &self,
        sheet: &SheetRef,
        dimension: Dimension,
        ranges: &[String],
    ) -> Result<Vec<Grid>, GridError> {
        let client = self.client.clone();
        let spreadsheet_id = sheet.spreadsheet_id.clone();
        let qualified = ranges
            .iter()
            .map(|r| sheet.parse_range(r).map(|_| sheet.qualify(r)))
            .collect::<Result<Vec<_>, _>>()?;

        let blocks =
            smol::unblock(move || client.batch_get(&spreadsheet_id, &qualified, dimension)).await?;
        log::debug!("read {} range(s) from {}", ranges.len(), sheet.sheet_name);
        Ok(blocks.into_iter().take(ranges.len()).map(to_grid).collect())
    }

    async fn put_values(
        &self,
        sheet: &SheetRef,
        dimension: Dimension,
        grid: Grid,
        range: &str,
    ) -> Result<(), GridError> {
        let client = self.client.clone();
        let spreadsheet_id = sheet.spreadsheet_id.clone();
        sheet.parse_range(range)?;
        let qualified = sheet.qualify(range);

        smol::unblock(move || client.update_values(&spreadsheet_id, &qualified, dimension, grid))
            .await?;
        Ok(())
    }

    async fn set_column_validation(
        &self,
        sheet: &SheetRef,
        rules: &[ColumnValidation],
    ) -> Result<(), GridError> {
        if rules.is_empty() {
            return Ok(());
        }
        let sheet_id = self.sheet_id(sheet).await?;
        let requests = rules
            .iter()
            .map(|rule| validation_request(sheet_id, rule))
            .collect::<Result<Vec<_>, _>>()?;

        let client = self.client.clone();
        let spreadsheet_id = sheet.spreadsheet_id.clone();
        smol::unblock(move || client.batch_update(&spreadsheet_id, requests)).await?;
        Ok(())
    }
}

impl SheetDownload for RemoteGrid {
    async fn sheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>, GridError> {
        let client = self.client.clone();
        let id = spreadsheet_id.to_string();
        let props = smol::unblock(move || client.sheet_properties(&id)).await?;

        let titles = props.iter().map(|p| p.title.clone()).collect();
        self.sheet_ids.lock().insert(
            spreadsheet_id.to_string(),
            props.into_iter().map(|p| (p.title, p.sheet_id)).collect(),
        );
        Ok(titles)
    }

    async fn download_sheets(
        &self,
        spreadsheet_id: &str,
        titles: &[String],
    ) -> Result<Vec<(String, Grid)>, GridError> {
        let client = self.client.clone();
        let id = spreadsheet_id.to_string();
        let ranges: Vec<String> = titles
            .iter()
            .map(|title| SheetRef::new(spreadsheet_id, title.as_str()).quoted_name())
            .collect();

        let blocks = smol::unblock(move || client.batch_get(&id, &ranges, Dimension::Rows)).await?;
        Ok(titles.iter().cloned().zip(blocks.into_iter().map(to_grid)).collect())
    }
}
