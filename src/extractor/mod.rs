// Text extraction for the three uploaded document roles.
// Requirements documents are .docx or .pdf; defects and test cases are
// spreadsheet workbooks rendered one line per non-empty row.


use std::io::Read;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use tracing::debug;

use crate::{AnalyzerError, Result};

/// Delimiter between cell values on a rendered spreadsheet line
const CELL_DELIMITER: &str = " | ";

/// Extract the full text of a requirements document.
///
/// Accepts `.docx` and `.pdf`; any other extension is `UnsupportedFormat`.
/// Parser failures surface as `ExtractionFailed`.
#[inline]
pub fn extract_requirements(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "docx" => extract_docx(path),
        "pdf" => pdf_extract::extract_text(path)
            .map_err(|e| AnalyzerError::ExtractionFailed(format!("failed to parse PDF: {e}"))),
        _ => Err(AnalyzerError::UnsupportedFormat(ext)),
    }
}

/// Render a spreadsheet workbook as line-oriented text.
///
/// Every sheet is read in workbook-declared order; each row becomes one
/// line of trimmed, non-empty cell values joined by ` | `. Rows with no
/// non-empty cells are skipped. Sheets are concatenated with newline
/// separators between lines.
#[inline]
pub fn extract_spreadsheet(path: &Path) -> Result<String> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| AnalyzerError::ExtractionFailed(format!("failed to open workbook: {e}")))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let mut lines = Vec::new();

    for name in &sheet_names {
        let range = workbook.worksheet_range(name).map_err(|e| {
            AnalyzerError::ExtractionFailed(format!("failed to read sheet '{name}': {e}"))
        })?;

        for row in range.rows() {
            let cells: Vec<String> = row
                .iter()
                .map(cell_to_string)
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();

            if !cells.is_empty() {
                lines.push(cells.join(CELL_DELIMITER));
            }
        }
    }

    debug!(
        "Extracted {} lines from {} sheets in {}",
        lines.len(),
        sheet_names.len(),
        path.display()
    );

    Ok(lines.join("\n"))
}

/// Coerce a spreadsheet cell to text; empty/missing cells become ""
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{f:.0}")
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR:{e:?}"),
    }
}

/// Extract paragraph text from a .docx file (ZIP archive holding
/// `word/document.xml`)
fn extract_docx(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)
        .map_err(|e| AnalyzerError::ExtractionFailed(format!("failed to open document: {e}")))?;

    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| AnalyzerError::ExtractionFailed(format!("invalid .docx archive: {e}")))?;

    let mut document_xml = archive.by_name("word/document.xml").map_err(|_| {
        AnalyzerError::ExtractionFailed("no word/document.xml found in .docx".to_string())
    })?;

    let mut xml = String::new();
    document_xml
        .read_to_string(&mut xml)
        .map_err(|e| AnalyzerError::ExtractionFailed(format!("failed to read document.xml: {e}")))?;

    Ok(docx_xml_to_text(&xml))
}

/// Pull the plain text out of WordprocessingML: the character data inside
/// `<w:t>` runs, with a newline at each paragraph boundary (`<w:p>`).
fn docx_xml_to_text(xml: &str) -> String {
    let mut text = String::new();
    let mut in_text_run = false;
    let mut chars = xml.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '<' {
            let mut tag = String::new();
            for tag_char in chars.by_ref() {
                if tag_char == '>' {
                    break;
                }
                tag.push(tag_char);
            }

            if tag == "/w:t" {
                in_text_run = false;
            } else if tag.starts_with("w:t") && !tag.ends_with('/') {
                // "w:t" or "w:t xml:space=..." but not self-closing
                in_text_run = matches!(tag.as_bytes().get(3), None | Some(b' '));
            } else if (tag == "w:p" || tag.starts_with("w:p ")) && !tag.ends_with('/') {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
            }
        } else if in_text_run {
            text.push(c);
        }
    }

    // &amp; last so "&amp;lt;" does not double-unescape
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
