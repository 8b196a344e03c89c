// ABOUTME: Minimal PDF 1.4 writer for generated documents.
// ABOUTME: Helvetica text with **bold** spans, word-wrapped and paginated on A4.

use regex::Regex;
use std::sync::LazyLock;

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN: u32 = 50;
const FONT_SIZE: u32 = 12;
const LEADING: u32 = 16;
/// Rough Helvetica capacity of one line at 12pt inside the margins
const MAX_LINE_CHARS: usize = 80;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;

static BOLD_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern is valid"));

/// A run of text in one font
#[derive(Debug, Clone, PartialEq)]
struct Span {
    text: String,
    bold: bool,
}

type Line = Vec<Span>;

/// Split a markdown-ish line into plain and bold spans
fn spans(line: &str) -> Vec<Span> {
    let mut out = Vec::new();
    let mut last = 0;
    for caps in BOLD_SPAN.captures_iter(line) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            out.push(Span {
                text: line[last..whole.start()].to_string(),
                bold: false,
            });
        }
        out.push(Span {
            text: inner.as_str().to_string(),
            bold: true,
        });
        last = whole.end();
    }
    if last < line.len() {
        out.push(Span {
            text: line[last..].to_string(),
            bold: false,
        });
    }
    out
}

/// Word-wrap one source line into output lines of at most MAX_LINE_CHARS
fn wrap(spans: Vec<Span>) -> Vec<Line> {
    let mut words: Vec<(String, bool)> = Vec::new();
    for span in spans {
        for word in span.text.split_whitespace() {
            let chars: Vec<char> = word.chars().collect();
            for chunk in chars.chunks(MAX_LINE_CHARS) {
                words.push((chunk.iter().collect(), span.bold));
            }
        }
    }

    let mut lines: Vec<Line> = Vec::new();
    let mut current: Line = Vec::new();
    let mut width = 0;
    for (word, bold) in words {
        let len = word.chars().count();
        let needed = if width == 0 { len } else { width + 1 + len };
        if needed > MAX_LINE_CHARS && width > 0 {
            lines.push(std::mem::take(&mut current));
            width = 0;
        }
        if width > 0 {
            if let Some(last) = current.last_mut() {
                last.text.push(' ');
            }
            width += 1;
        }
        width += len;
        match current.last_mut() {
            Some(last) if last.bold == bold => last.text.push_str(&word),
            _ => current.push(Span { text: word, bold }),
        }
    }
    lines.push(current);
    lines
}

/// Encode to WinAnsi bytes and escape for a PDF literal string
fn pdf_string(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 2);
    out.push(b'(');
    for ch in text.chars() {
        let byte = match ch {
            '€' => 0x80,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '–' => 0x96,
            '—' => 0x97,
            c if (c as u32) < 0x80 || ((c as u32) >= 0xA0 && (c as u32) <= 0xFF) => c as u32 as u8,
            _ => b'?',
        };
        if matches!(byte, b'(' | b')' | b'\\') {
            out.push(b'\\');
        }
        out.push(byte);
    }
    out.push(b')');
    out
}

fn page_stream(lines: &[Line]) -> Vec<u8> {
    let mut s = Vec::new();
    s.extend_from_slice(
        format!(
            "BT\n/F1 {} Tf\n{} TL\n{} {} Td\n",
            FONT_SIZE,
            LEADING,
            MARGIN,
            PAGE_HEIGHT - MARGIN - FONT_SIZE
        )
        .as_bytes(),
    );
    for line in lines {
        for span in line {
            let font = if span.bold { "F2" } else { "F1" };
            s.extend_from_slice(format!("/{} {} Tf ", font, FONT_SIZE).as_bytes());
            s.extend_from_slice(&pdf_string(&span.text));
            s.extend_from_slice(b" Tj\n");
        }
        s.extend_from_slice(b"T*\n");
    }
    s.extend_from_slice(b"ET\n");
    s
}

/// Render `content` to a complete PDF file
pub fn render(content: &str) -> Vec<u8> {
    let lines: Vec<Line> = content.lines().flat_map(|l| wrap(spans(l))).collect();
    let pages: Vec<&[Line]> = if lines.is_empty() {
        vec![&lines[..]]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };

    // 1 catalog, 2 page tree, 3-4 fonts, then a page and its content per page
    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", 5 + 2 * i))
        .collect();
    let mut objects: Vec<Vec<u8>> = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        )
        .into_bytes(),
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_vec(),
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
            .to_vec(),
    ];
    for (i, page) in pages.iter().enumerate() {
        let content_id = 6 + 2 * i;
        objects.push(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                PAGE_WIDTH, PAGE_HEIGHT, content_id
            )
            .into_bytes(),
        );
        let stream = page_stream(page);
        let mut body = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
        body.extend_from_slice(&stream);
        body.extend_from_slice(b"endstream");
        objects.push(body);
    }

    let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }
    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    out
}
