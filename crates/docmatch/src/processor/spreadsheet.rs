use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zip::ZipArchive;

use crate::error::ProcessError;
use crate::processor::{ContentExtractor, Extraction, ExtractionMetadata, ExtractorKind};

const FORMAT: &str = "Excel";

/// Row and column limits of the xlsx format (row 1048576, column XFD).
const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;
/// Upper bound on cells materialised per sheet, padding included.
const MAX_SHEET_CELLS: usize = 4_000_000;

/// A single cell. Blank cells and column gaps serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

/// One worksheet: the first non-empty row as headers, everything after it as rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetTable {
    #[serde(skip)]
    pub name: String,
    pub headers: Vec<CellValue>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Reads OOXML workbooks (`.xlsx`) into per-sheet tables.
pub struct SpreadsheetExtractor;

impl SpreadsheetExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parses every worksheet in workbook order.
    pub fn read_workbook(&self, bytes: &[u8]) -> Result<Vec<SheetTable>, ProcessError> {
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| ProcessError::extraction(FORMAT, e))?;

        let shared_strings = match read_entry(&mut archive, "xl/sharedStrings.xml")? {
            Some(xml) => parse_shared_strings(&xml)?,
            None => Vec::new(),
        };

        let workbook_xml = read_entry(&mut archive, "xl/workbook.xml")?
            .ok_or_else(|| ProcessError::extraction(FORMAT, "workbook.xml is missing"))?;
        let sheets = parse_workbook(&workbook_xml)?;

        let relationships = match read_entry(&mut archive, "xl/_rels/workbook.xml.rels")? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };

        let mut tables = Vec::with_capacity(sheets.len());
        for (index, sheet) in sheets.into_iter().enumerate() {
            let path = sheet
                .relationship_id
                .as_ref()
                .and_then(|id| relationships.get(id))
                .map(|target| resolve_target(target))
                .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", index + 1));

            let xml = read_entry(&mut archive, &path)?.ok_or_else(|| {
                ProcessError::extraction(FORMAT, format!("worksheet '{}' is missing", sheet.name))
            })?;

            let rows = parse_sheet(&xml, &shared_strings)?;
            tables.push(into_table(sheet.name, rows));
        }

        Ok(tables)
    }
}

impl Default for SpreadsheetExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentExtractor for SpreadsheetExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Spreadsheet
    }

    fn extract(&self, bytes: &[u8]) -> Result<Extraction, ProcessError> {
        let _span = tracing::info_span!("processor.spreadsheet").entered();

        let tables = self.read_workbook(bytes)?;

        let mut by_name = Map::new();
        for table in &tables {
            let value = serde_json::to_value(table).map_err(|e| ProcessError::extraction(FORMAT, e))?;
            by_name.insert(table.name.clone(), value);
        }
        let text = serde_json::to_string(&Value::Object(by_name))
            .map_err(|e| ProcessError::extraction(FORMAT, e))?;

        let names: Vec<String> = tables.iter().map(|t| t.name.clone()).collect();
        let mut metadata = ExtractionMetadata::of_type("excel");
        metadata.total_sheets = Some(names.len());
        metadata.sheets = Some(names);

        Ok(Extraction { text, metadata })
    }
}

fn into_table(name: String, rows: Vec<Vec<CellValue>>) -> SheetTable {
    let mut rows = rows.into_iter();
    let mut headers = Vec::new();
    for row in rows.by_ref() {
        if row.iter().any(|cell| !cell.is_empty()) {
            headers = row;
            break;
        }
    }

    SheetTable {
        name,
        headers,
        rows: rows.collect(),
    }
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, ProcessError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ProcessError::extraction(FORMAT, e)),
    };

    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| ProcessError::extraction(FORMAT, format!("failed to read {}: {}", name, e)))?;
    Ok(Some(content))
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

fn xml_error(e: impl std::fmt::Display) -> ProcessError {
    ProcessError::extraction(FORMAT, format!("XML parsing error: {}", e))
}

fn attribute(element: &BytesStart, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .map(|a| {
            let raw = String::from_utf8_lossy(&a.value).into_owned();
            match quick_xml::escape::unescape(&raw) {
                Ok(unescaped) => unescaped.into_owned(),
                Err(_) => raw,
            }
        })
}

fn resolve_entity(name: &str) -> Option<String> {
    if let Some(code) = name.strip_prefix('#') {
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => code.parse().ok()?,
        };
        return char::from_u32(value).map(String::from);
    }
    quick_xml::escape::resolve_predefined_entity(name).map(str::to_string)
}

struct SheetEntry {
    name: String,
    relationship_id: Option<String>,
}

fn parse_workbook(xml: &str) -> Result<Vec<SheetEntry>, ProcessError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut sheets = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"sheet" => {
                let name = attribute(e, b"name").unwrap_or_else(|| format!("Sheet{}", sheets.len() + 1));
                sheets.push(SheetEntry {
                    name,
                    relationship_id: attribute(e, b"id"),
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }
    Ok(sheets)
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, ProcessError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut targets = HashMap::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attribute(e, b"Id"), attribute(e, b"Target")) {
                    targets.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }
    Ok(targets)
}

/// Shared string table. Rich text entries are flattened by concatenating
/// their runs; phonetic hints are dropped.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>, ProcessError> {
    let mut reader = Reader::from_str(xml);

    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_item = false;
    let mut in_text = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = true;
                    current.clear();
                }
                b"t" => in_text = in_item && phonetic_depth == 0,
                b"rPh" => phonetic_depth += 1,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = false;
                    strings.push(std::mem::take(&mut current));
                }
                b"t" => in_text = false,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                current.push_str(&e.decode().unwrap_or_default());
            }
            Ok(Event::GeneralRef(e)) if in_text => {
                if let Some(resolved) = resolve_entity(&String::from_utf8_lossy(&e)) {
                    current.push_str(&resolved);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }
    Ok(strings)
}

/// Column index (0-based) from a cell reference such as `AB12`. `None` when
/// the reference has no column letters.
fn column_index(reference: &str) -> Result<Option<usize>, ProcessError> {
    let mut column = 0usize;
    let mut seen = false;
    for c in reference.chars().take_while(char::is_ascii_alphabetic) {
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        column = column
            .checked_mul(26)
            .and_then(|n| n.checked_add(digit))
            .filter(|n| *n <= MAX_COLUMNS)
            .ok_or_else(|| out_of_range(format!("cell reference {reference} is beyond column XFD")))?;
        seen = true;
    }
    Ok(seen.then(|| column - 1))
}

fn out_of_range(cause: String) -> ProcessError {
    ProcessError::extraction(FORMAT, cause)
}

/// Dense row storage with the sheet limits of the format enforced, so cell
/// references in the file cannot drive allocation.
#[derive(Default)]
struct SheetGrid {
    rows: Vec<Vec<CellValue>>,
    cells: usize,
}

impl SheetGrid {
    /// Opens the row named by `r` (1-based), or the next one without it.
    fn start_row(&mut self, reference: Option<String>) -> Result<usize, ProcessError> {
        let index = match reference.and_then(|r| r.parse::<usize>().ok()) {
            Some(r) if r > MAX_ROWS => {
                return Err(out_of_range(format!(
                    "row {r} exceeds the sheet limit of {MAX_ROWS}"
                )))
            }
            Some(r) if r >= 1 => r - 1,
            _ => self.rows.len(),
        };
        if index >= MAX_ROWS {
            return Err(out_of_range(format!(
                "sheet has more than {MAX_ROWS} rows"
            )));
        }
        if self.rows.len() <= index {
            self.rows.resize_with(index + 1, Vec::new);
        }
        Ok(index)
    }

    fn place(&mut self, row: usize, column: usize, value: CellValue) -> Result<(), ProcessError> {
        if column >= MAX_COLUMNS {
            return Err(out_of_range(format!(
                "sheet has more than {MAX_COLUMNS} columns"
            )));
        }
        let cells = &mut self.rows[row];
        if column >= cells.len() {
            let grown = column + 1 - cells.len();
            if self.cells + grown > MAX_SHEET_CELLS {
                return Err(out_of_range(format!(
                    "sheet has more than {MAX_SHEET_CELLS} cells"
                )));
            }
            self.cells += grown;
            cells.resize(column + 1, CellValue::Empty);
        }
        cells[column] = value;
        Ok(())
    }
}

#[derive(Default)]
struct PendingCell {
    column: usize,
    cell_type: Option<String>,
    value: Option<String>,
}

impl PendingCell {
    fn resolve(self, shared_strings: &[String]) -> CellValue {
        let Some(raw) = self.value else {
            return CellValue::Empty;
        };

        match self.cell_type.as_deref() {
            Some("s") => raw
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| shared_strings.get(i))
                .map(|s| CellValue::Text(s.clone()))
                .unwrap_or(CellValue::Empty),
            Some("b") => CellValue::Bool(raw.trim() == "1"),
            Some("str") | Some("inlineStr") | Some("e") | Some("d") => CellValue::Text(raw),
            _ => parse_number(&raw),
        }
    }
}

fn parse_number(raw: &str) -> CellValue {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return CellValue::Integer(n);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                CellValue::Integer(f as i64)
            } else {
                CellValue::Float(f)
            }
        }
        _ => CellValue::Text(raw.to_string()),
    }
}

/// Worksheet rows, dense from row 1 to the last populated row. Missing rows
/// are empty and column gaps inside a row are `Empty`.
fn parse_sheet(xml: &str, shared_strings: &[String]) -> Result<Vec<Vec<CellValue>>, ProcessError> {
    let mut reader = Reader::from_str(xml);

    let mut grid = SheetGrid::default();
    let mut current_row: Option<usize> = None;
    let mut next_column = 0usize;
    let mut cell: Option<PendingCell> = None;
    let mut capture = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"row" => {
                    current_row = Some(grid.start_row(attribute(e, b"r"))?);
                    next_column = 0;
                }
                b"c" => {
                    let column = cell_column(e)?.unwrap_or(next_column);
                    cell = Some(PendingCell {
                        column,
                        cell_type: attribute(e, b"t"),
                        value: None,
                    });
                }
                b"v" | b"t" => {
                    capture = cell.is_some();
                    if let Some(pending) = cell.as_mut() {
                        pending.value.get_or_insert_with(String::new);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"row" => {
                    grid.start_row(attribute(e, b"r"))?;
                }
                b"c" => {
                    if let Some(row) = current_row {
                        let column = cell_column(e)?.unwrap_or(next_column);
                        grid.place(row, column, CellValue::Empty)?;
                        next_column = column + 1;
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) if capture => {
                if let Some(value) = cell.as_mut().and_then(|c| c.value.as_mut()) {
                    value.push_str(&e.decode().unwrap_or_default());
                }
            }
            Ok(Event::GeneralRef(e)) if capture => {
                if let Some(value) = cell.as_mut().and_then(|c| c.value.as_mut()) {
                    if let Some(resolved) = resolve_entity(&String::from_utf8_lossy(&e)) {
                        value.push_str(&resolved);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = false,
                b"c" => {
                    if let (Some(row), Some(pending)) = (current_row, cell.take()) {
                        let column = pending.column;
                        grid.place(row, column, pending.resolve(shared_strings))?;
                        next_column = column + 1;
                    }
                }
                b"row" => current_row = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }

    Ok(grid.rows)
}

fn cell_column(element: &BytesStart) -> Result<Option<usize>, ProcessError> {
    match attribute(element, b"r") {
        Some(reference) => column_index(&reference),
        None => Ok(None),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Packs raw part contents into an xlsx-shaped zip.
    pub(crate) fn build_xlsx(
        sheets: &[(&str, &str)],
        shared_strings: Option<&str>,
    ) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        let mut workbook = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
        );
        let mut rels = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (i, (name, _)) in sheets.iter().enumerate() {
            workbook.push_str(&format!(
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                name,
                i + 1,
                i + 1
            ));
            rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                i + 1,
                i + 1
            ));
        }
        workbook.push_str("</sheets></workbook>");
        rels.push_str("</Relationships>");

        writer.start_file("xl/workbook.xml", options).unwrap();
        writer.write_all(workbook.as_bytes()).unwrap();
        writer.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
        writer.write_all(rels.as_bytes()).unwrap();

        if let Some(strings) = shared_strings {
            writer.start_file("xl/sharedStrings.xml", options).unwrap();
            writer.write_all(strings.as_bytes()).unwrap();
        }

        for (i, (_, sheet_data)) in sheets.iter().enumerate() {
            writer
                .start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
                .unwrap();
            let xml = format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
                sheet_data
            );
            writer.write_all(xml.as_bytes()).unwrap();
        }

        writer.finish().unwrap().into_inner()
    }

    const SHARED: &str = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>A</t></si><si><t>B</t></si><si><t>C</t></si><si><r><t>Bold</t></r><r><t xml:space="preserve"> tail</t></r></si></sst>"#;

    #[test]
    fn test_preserves_header_and_column_order() {
        let sheet = concat!(
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="s"><v>2</v></c></row>"#,
            r#"<row r="2"><c r="A2"><v>1</v></c><c r="B2"><v>2</v></c><c r="C2"><v>3</v></c></row>"#,
            r#"<row r="3"><c r="A3"><v>4</v></c><c r="B3"><v>5</v></c><c r="C3"><v>6</v></c></row>"#,
        );
        let bytes = build_xlsx(&[("Orders", sheet)], Some(SHARED));

        let tables = SpreadsheetExtractor::new().read_workbook(&bytes).unwrap();

        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.name, "Orders");
        assert_eq!(
            table.headers,
            vec![
                CellValue::Text("A".into()),
                CellValue::Text("B".into()),
                CellValue::Text("C".into())
            ]
        );
        assert_eq!(
            table.rows,
            vec![
                vec![CellValue::Integer(1), CellValue::Integer(2), CellValue::Integer(3)],
                vec![CellValue::Integer(4), CellValue::Integer(5), CellValue::Integer(6)],
            ]
        );
    }

    #[test]
    fn test_extract_serializes_sheets_in_workbook_order() {
        let first = r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Zeta</t></is></c></row>"#;
        let second = r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Alpha</t></is></c></row>"#;
        let bytes = build_xlsx(&[("Zulu", first), ("Alpha", second)], None);

        let extraction = SpreadsheetExtractor::new().extract(&bytes).unwrap();

        assert_eq!(
            extraction.text,
            r#"{"Zulu":{"headers":["Zeta"],"rows":[]},"Alpha":{"headers":["Alpha"],"rows":[]}}"#
        );
        assert_eq!(extraction.metadata.doc_type, "excel");
        assert_eq!(
            extraction.metadata.sheets,
            Some(vec!["Zulu".to_string(), "Alpha".to_string()])
        );
        assert_eq!(extraction.metadata.total_sheets, Some(2));
    }

    #[test]
    fn test_rich_text_is_flattened() {
        let sheet = r#"<row r="1"><c r="A1" t="s"><v>3</v></c></row>"#;
        let bytes = build_xlsx(&[("Sheet1", sheet)], Some(SHARED));

        let tables = SpreadsheetExtractor::new().read_workbook(&bytes).unwrap();

        assert_eq!(tables[0].headers, vec![CellValue::Text("Bold tail".into())]);
    }

    #[test]
    fn test_header_is_first_non_empty_row_and_gaps_are_null() {
        let sheet = concat!(
            r#"<row r="2"><c r="A2" t="inlineStr"><is><t>Name</t></is></c><c r="C2" t="inlineStr"><is><t>Qty</t></is></c></row>"#,
            r#"<row r="4"><c r="A4" t="inlineStr"><is><t>Bolt</t></is></c><c r="C4"><v>2.5</v></c></row>"#,
        );
        let bytes = build_xlsx(&[("Sheet1", sheet)], None);

        let extraction = SpreadsheetExtractor::new().extract(&bytes).unwrap();
        let parsed: Value = serde_json::from_str(&extraction.text).unwrap();

        assert_eq!(
            parsed,
            serde_json::json!({
                "Sheet1": {
                    "headers": ["Name", null, "Qty"],
                    "rows": [[], ["Bolt", null, 2.5]]
                }
            })
        );
    }

    #[test]
    fn test_cell_types() {
        let sheet = r#"<row r="1"><c r="A1" t="b"><v>1</v></c><c r="B1" t="e"><v>#DIV/0!</v></c><c r="C1" t="str"><f>A1</f><v>x &amp; y</v></c><c r="D1"/></row>"#;
        let bytes = build_xlsx(&[("S", sheet)], None);

        let tables = SpreadsheetExtractor::new().read_workbook(&bytes).unwrap();

        assert_eq!(
            tables[0].headers,
            vec![
                CellValue::Bool(true),
                CellValue::Text("#DIV/0!".into()),
                CellValue::Text("x & y".into()),
                CellValue::Empty,
            ]
        );
    }

    #[test]
    fn test_not_a_zip_is_extraction_error() {
        match SpreadsheetExtractor::new().read_workbook(b"plain text") {
            Err(ProcessError::Extraction { format, .. }) => assert_eq!(format, "Excel"),
            other => panic!("Expected Extraction error, got {:?}", other),
        }
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A1").unwrap(), Some(0));
        assert_eq!(column_index("C7").unwrap(), Some(2));
        assert_eq!(column_index("AA10").unwrap(), Some(26));
        assert_eq!(column_index("XFD1").unwrap(), Some(16_383));
        assert_eq!(column_index("12").unwrap(), None);
    }

    fn assert_rejected(sheet: &str, expected: &str) {
        let bytes = build_xlsx(&[("Sheet1", sheet)], None);
        match SpreadsheetExtractor::new().read_workbook(&bytes) {
            Err(err @ ProcessError::Extraction { .. }) => {
                let message = err.to_string();
                assert!(message.starts_with("Failed to process Excel"), "{message}");
                assert!(message.contains(expected), "expected '{expected}' in '{message}'");
            }
            other => panic!("Expected Extraction error, got {:?}", other),
        }
    }

    #[test]
    fn test_row_beyond_sheet_limit_is_rejected() {
        assert_rejected(
            r#"<row r="1000000000"><c r="A1000000000"><v>1</v></c></row>"#,
            "row 1000000000",
        );
        assert_rejected(r#"<row r="1048577"/>"#, "row 1048577");
    }

    #[test]
    fn test_last_allowed_row_is_accepted() {
        let sheet = r#"<row r="1"><c r="A1"><v>1</v></c></row><row r="1048576"><c r="A1048576"><v>2</v></c></row>"#;
        let bytes = build_xlsx(&[("Sheet1", sheet)], None);

        let tables = SpreadsheetExtractor::new().read_workbook(&bytes).unwrap();

        assert_eq!(tables[0].rows.len(), 1_048_575);
        assert_eq!(tables[0].rows.last(), Some(&vec![CellValue::Integer(2)]));
    }

    #[test]
    fn test_column_beyond_xfd_is_rejected() {
        assert_rejected(r#"<row r="1"><c r="XFE1"><v>1</v></c></row>"#, "beyond column XFD");
        assert_rejected(r#"<row r="1"><c r="XFE1"/></row>"#, "beyond column XFD");
    }

    #[test]
    fn test_overlong_column_reference_does_not_overflow() {
        assert!(column_index("ZZZZZZZZZZZZZZZ1").is_err());
        assert_rejected(
            r#"<row r="1"><c r="ZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZ1"><v>1</v></c></row>"#,
            "beyond column XFD",
        );
    }

    #[test]
    fn test_padding_is_capped_per_sheet() {
        let mut sheet = String::new();
        for r in 1..=300 {
            sheet.push_str(&format!(r#"<row r="{r}"><c r="XFD{r}"><v>1</v></c></row>"#));
        }

        assert_rejected(&sheet, "cells");
    }
}
