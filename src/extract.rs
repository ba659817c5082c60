//! Text extraction for uploaded documents (PDF, Word, plain text).
//!
//! Dispatch is on the declared MIME type with parameters stripped and case
//! folded. `application/msword` shares the OOXML reader with `.docx`; a
//! legacy binary `.doc` is not a ZIP container and fails as an extraction
//! error rather than an unsupported format.

use std::io::Read;
use std::path::Path;

use easyserve_core::Error;
use thiserror::Error as ThisError;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_MSWORD: &str = "application/msword";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_TEXT: &str = "text/plain";

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, ThisError)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Ooxml(String),
    #[error("TXT extraction failed: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

impl ExtractError {
    /// Map into the pipeline taxonomy, naming the file for failures.
    pub fn into_pipeline_error(self, file: &str) -> Error {
        match self {
            ExtractError::UnsupportedContentType(ct) => Error::UnsupportedFormat(ct),
            other => Error::extraction(file, other),
        }
    }
}

/// `"Text/Plain; charset=utf-8"` → `"text/plain"`.
pub fn normalize_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Best-effort MIME type from a file extension.
pub fn mime_from_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "docx" => Some(MIME_DOCX),
        "doc" => Some(MIME_MSWORD),
        "txt" | "text" | "md" => Some(MIME_TEXT),
        _ => None,
    }
}

pub fn is_supported(content_type: &str) -> bool {
    matches!(
        normalize_mime(content_type).as_str(),
        MIME_PDF | MIME_MSWORD | MIME_DOCX | MIME_TEXT
    )
}

/// Extract plain text from in-memory content.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match normalize_mime(content_type).as_str() {
        MIME_PDF => extract_pdf(bytes),
        MIME_MSWORD | MIME_DOCX => extract_docx(bytes),
        MIME_TEXT => Ok(String::from_utf8(bytes.to_vec())?),
        _ => Err(ExtractError::UnsupportedContentType(content_type.to_string())),
    }
}

/// Read a file and extract its text. Blocking; run it off the async runtime.
pub fn extract_file(path: &Path, content_type: &str) -> easyserve_core::Result<String> {
    let file = path.display().to_string();
    if !is_supported(content_type) {
        return Err(Error::UnsupportedFormat(content_type.to_string()));
    }
    let bytes = std::fs::read(path).map_err(|e| ExtractError::from(e).into_pipeline_error(&file))?;
    extract_text(&bytes, content_type).map_err(|e| e.into_pipeline_error(&file))
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Ooxml("word/document.xml not found".to_string()))?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    extract_paragraphs(&doc_xml)
}

/// Concatenate `<w:t>` runs per `<w:p>`, one paragraph per line.
fn extract_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" => current.push('\n'),
                b"p" => paragraphs.push(String::new()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs.join("\n"))
}
