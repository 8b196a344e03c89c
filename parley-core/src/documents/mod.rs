// ABOUTME: Renders generated document content into the requested file format.
// ABOUTME: Text formats are written directly; PDF and OOXML have their own encoders.

mod ooxml;
mod pdf;

use crate::classifier::FileFormat;
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;

static CONTENT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\b(?:com|with)\b(.*)$").expect("content marker pattern is valid")
});

/// Text to put in the document: whatever follows the first standalone
/// "com" / "with" in the request, or the AI reply when nothing does.
pub fn document_content(user_text: &str, ai_text: &str) -> String {
    CONTENT_MARKER
        .captures(user_text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(ai_text)
        .to_string()
}

/// Encode `content` as a file of the given format
pub fn render(format: FileFormat, content: &str) -> Result<Vec<u8>> {
    match format {
        FileFormat::Txt | FileFormat::Py => Ok(content.as_bytes().to_vec()),
        FileFormat::Csv => Ok(render_csv(content).into_bytes()),
        FileFormat::Json => render_json(content),
        FileFormat::Pdf => Ok(pdf::render(content)),
        FileFormat::Docx => ooxml::docx(content).context("Failed to build docx"),
        FileFormat::Xlsx => ooxml::xlsx(content).context("Failed to build xlsx"),
        FileFormat::Pptx => ooxml::pptx(content).context("Failed to build pptx"),
    }
}

/// Non-empty lines become rows, `;` separates fields
fn render_csv(content: &str) -> String {
    let mut out = String::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let row: Vec<String> = line.split(';').map(csv_field).collect();
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Content that parses as JSON is kept, anything else is wrapped
fn render_json(content: &str) -> Result<Vec<u8>> {
    let value = serde_json::from_str::<serde_json::Value>(content)
        .unwrap_or_else(|_| serde_json::json!({ "conteudo": content }));
    serde_json::to_vec_pretty(&value).context("Failed to encode json document")
}

/// Split a line into cells on `;` when present, otherwise on `,`
pub(crate) fn split_cells(line: &str) -> Vec<&str> {
    let separator = if line.contains(';') { ';' } else { ',' };
    line.split(separator).map(str::trim).collect()
}
