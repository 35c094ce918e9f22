// Wire-level tests for RemoteGrid against a mock spreadsheet service.

use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use sheetsync_client::{Credentials, RemoteGrid, SheetsClient};
use sheetsync_core::{
    CellAddress, CellRange, ColumnValidation, Dimension, FallbackGrid, GridError, GridSize,
    GridSource, MemoryGrid, SheetDownload, SheetRef,
};

fn remote(server: &MockServer, creds: Credentials) -> RemoteGrid {
    let client = SheetsClient::new(creds, &server.base_url(), Duration::from_secs(5)).unwrap();
    RemoteGrid::new(client)
}

fn sheet() -> SheetRef {
    SheetRef::new("book", "Data")
}

fn ranges(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_get_values_renders_cells_as_text() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v4/spreadsheets/book/values:batchGet")
            .query_param("ranges", "Data!A1:C3")
            .query_param("majorDimension", "ROWS")
            .query_param("valueRenderOption", "UNFORMATTED_VALUE")
            .query_param("key", "k-1");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "spreadsheetId": "book",
                "valueRanges": [{
                    "range": "Data!A1:C3",
                    "majorDimension": "ROWS",
                    "values": [["name", "score", "alive"], ["Ann", 5, true], ["Bob", 2.5, false, ""]]
                }]
            }));
    });

    let grid = remote(&server, Credentials::with_api_key("k-1"));
    let got = smol::block_on(grid.get_values(&sheet(), Dimension::Rows, &ranges(&["A1:C3"])))
        .unwrap();

    mock.assert();
    assert_eq!(
        got[0],
        vec![
            vec!["name".to_string(), "score".into(), "alive".into()],
            vec!["Ann".to_string(), "5".into(), "TRUE".into()],
            vec!["Bob".to_string(), "2.5".into(), "FALSE".into()],
        ]
    );
}

#[test]
fn test_missing_value_ranges_become_empty_grids() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/v4/spreadsheets/book/values:batchGet")
            .query_param("majorDimension", "COLUMNS")
            .header("authorization", "Bearer tok");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "valueRanges": [{ "range": "Data!A1:A" }] }));
    });

    let grid = remote(&server, Credentials::with_access_token("tok"));
    let got = smol::block_on(grid.get_values(
        &sheet(),
        Dimension::Columns,
        &ranges(&["A1:A", "B1:B"]),
    ))
    .unwrap();
    assert_eq!(got.len(), 2);
    assert!(got.iter().all(|g| g.is_empty()));
}

#[test]
fn test_put_values_sends_raw_block() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(PUT)
            .path("/v4/spreadsheets/book/values/Data!B2")
            .query_param("valueInputOption", "RAW")
            .json_body(json!({
                "range": "Data!B2",
                "majorDimension": "ROWS",
                "values": [["name", "score"], ["007", "5"], ["=A1", "3/4"]]
            }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "updatedCells": 6 }));
    });

    let grid = remote(&server, Credentials::with_api_key("k"));
    let block = vec![
        vec!["name".to_string(), "score".to_string()],
        vec!["007".to_string(), "5".to_string()],
        vec!["=A1".to_string(), "3/4".to_string()],
    ];
    smol::block_on(grid.put_values(&sheet(), Dimension::Rows, block, "B2")).unwrap();
    mock.assert();
}

#[test]
fn test_column_validation_batch_update() {
    let server = MockServer::start();
    let props = server.mock(|when, then| {
        when.method(GET)
            .path("/v4/spreadsheets/book")
            .query_param("fields", "sheets.properties");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "sheets": [
                    { "properties": { "sheetId": 0, "title": "Other", "index": 0 } },
                    { "properties": { "sheetId": 42, "title": "Data", "index": 1 } }
                ]
            }));
    });
    let update = server.mock(|when, then| {
        when.method(POST)
            .path("/v4/spreadsheets/book:batchUpdate")
            .json_body(json!({
                "requests": [{
                    "setDataValidation": {
                        "range": {
                            "sheetId": 42,
                            "startRowIndex": 1,
                            "endRowIndex": 3,
                            "startColumnIndex": 1,
                            "endColumnIndex": 2
                        },
                        "rule": {
                            "condition": {
                                "type": "ONE_OF_LIST",
                                "values": [{ "userEnteredValue": "red" }, { "userEnteredValue": "blue" }]
                            },
                            "strict": true,
                            "showCustomUi": true
                        }
                    }
                }]
            }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "replies": [{}] }));
    });

    let grid = remote(&server, Credentials::with_api_key("k"));
    let rule = ColumnValidation {
        range: CellRange::new(CellAddress::new("B", 2).unwrap(), GridSize::new(1, 2).unwrap())
            .unwrap(),
        options: vec!["red".into(), "blue".into()],
        multi_select: false,
    };

    smol::block_on(grid.set_column_validation(&sheet(), &[rule.clone()])).unwrap();
    smol::block_on(grid.set_column_validation(&sheet(), &[rule])).unwrap();

    // The numeric sheet id is looked up once
    props.assert_hits(1);
    update.assert_hits(2);
}

#[test]
fn test_range_for_another_tab_is_rejected_before_sending() {
    let server = MockServer::start();
    let any = server.mock(|when, then| {
        when.path_includes("/");
        then.status(500);
    });

    let grid = remote(&server, Credentials::with_api_key("k"));
    let err = smol::block_on(grid.get_values(&sheet(), Dimension::Rows, &ranges(&["Other!A1"])))
        .unwrap_err();
    assert!(matches!(err, GridError::InvalidRange(_)));
    let err = smol::block_on(grid.put_values(
        &sheet(),
        Dimension::Rows,
        vec![vec!["x".to_string()]],
        "Other!A1",
    ))
    .unwrap_err();
    assert!(matches!(err, GridError::InvalidRange(_)));
    any.assert_hits(0);
}

#[test]
fn test_same_tab_prefix_is_not_doubled() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v4/spreadsheets/book/values:batchGet")
            .query_param("ranges", "Data!A1:B2");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "valueRanges": [{ "values": [["a"]] }] }));
    });

    let grid = remote(&server, Credentials::with_api_key("k"));
    let got = smol::block_on(grid.get_values(&sheet(), Dimension::Rows, &ranges(&["Data!A1:B2"])))
        .unwrap();
    mock.assert();
    assert_eq!(got[0], vec![vec!["a".to_string()]]);
}

#[test]
fn test_no_rules_makes_no_request() {
    let server = MockServer::start();
    let any = server.mock(|when, then| {
        when.path_includes("/");
        then.status(500);
    });

    let grid = remote(&server, Credentials::with_api_key("k"));
    smol::block_on(grid.set_column_validation(&sheet(), &[])).unwrap();
    any.assert_hits(0);
}

#[test]
fn test_download_every_tab() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v4/spreadsheets/book");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "sheets": [
                    { "properties": { "sheetId": 0, "title": "Heroes" } },
                    { "properties": { "sheetId": 9, "title": "Loot Table" } }
                ]
            }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v4/spreadsheets/book/values:batchGet");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "valueRanges": [
                    { "range": "Heroes!A1:Z1000", "values": [["name"], ["Ann"]] },
                    { "range": "'Loot Table'!A1:Z1000", "values": [["item", 3]] }
                ]
            }));
    });

    let grid = remote(&server, Credentials::with_api_key("k"));
    let titles = smol::block_on(grid.sheet_titles("book")).unwrap();
    assert_eq!(titles, vec!["Heroes".to_string(), "Loot Table".to_string()]);

    let sheets = smol::block_on(grid.download_sheets("book", &titles)).unwrap();
    assert_eq!(sheets.len(), 2);
    assert_eq!(sheets[0].0, "Heroes");
    assert_eq!(sheets[0].1, vec![vec!["name".to_string()], vec!["Ann".to_string()]]);
    assert_eq!(sheets[1].1, vec![vec!["item".to_string(), "3".to_string()]]);
}

#[test]
fn test_http_errors_carry_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v4/spreadsheets/missing/values:batchGet");
        then.status(404).body("Requested entity was not found.");
    });
    server.mock(|when, then| {
        when.method(GET).path("/v4/spreadsheets/busy/values:batchGet");
        then.status(503).body("Backend unavailable");
    });

    let grid = remote(&server, Credentials::with_api_key("k"));
    let missing = SheetRef::new("missing", "Data");
    let err = smol::block_on(grid.get_values(&missing, Dimension::Rows, &ranges(&["A1"])))
        .unwrap_err();
    assert!(matches!(err, GridError::Http(404, ref body) if body.contains("not found")));
    assert!(!err.is_transport());

    let busy = SheetRef::new("busy", "Data");
    let err = smol::block_on(grid.get_values(&busy, Dimension::Rows, &ranges(&["A1"])))
        .unwrap_err();
    assert!(err.is_transport());
}

#[test]
fn test_fallback_to_memory_when_service_fails() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.path_includes("/");
        then.status(503);
    });

    let local = MemoryGrid::new().with_sheet(sheet(), vec![vec!["cached".to_string()]]);
    let grid = FallbackGrid::new(remote(&server, Credentials::with_api_key("k")), local);
    let got = smol::block_on(grid.get_values(&sheet(), Dimension::Rows, &ranges(&["A1:B2"])))
        .unwrap();
    assert_eq!(got[0], vec![vec!["cached".to_string()]]);
}
