//! Multi-format text extraction for uploaded documents.
//!
//! Dispatches on the file extension of the uploaded filename and returns
//! plain UTF-8 text: PDF via `pdf-extract`, Word and PowerPoint via their
//! OOXML ZIP payloads, `.txt`/`.md` read directly. Unsupported extensions
//! and unparseable files are both the uploader's problem and map to
//! [`PipelineError::InvalidInput`].

use std::io::Read;
use std::path::Path;

use crate::error::PipelineError;

/// Extensions accepted for upload, in the order shown to users.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = [".pdf", ".docx", ".txt", ".md", ".pptx"];

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Document format derived from a filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    Docx,
    Pptx,
}

impl DocumentFormat {
    /// Determine the format from the original (user-supplied) filename.
    ///
    /// Matching is case-insensitive on the extension. Anything outside
    /// [`SUPPORTED_EXTENSIONS`] is rejected before any file I/O happens.
    pub fn from_filename(filename: &str) -> Result<Self, PipelineError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "pptx" => Ok(Self::Pptx),
            "txt" | "md" => Ok(Self::PlainText),
            _ => Err(PipelineError::InvalidInput(format!(
                "Invalid file type. Supported formats: {}",
                SUPPORTED_EXTENSIONS.join(", ")
            ))),
        }
    }
}

/// Extract plain text from a document on disk.
///
/// The format comes from the original filename, not the path on disk, so
/// uploads saved under temporary names still extract correctly.
pub fn extract_text(path: &Path, format: DocumentFormat) -> Result<String, PipelineError> {
    match format {
        DocumentFormat::PlainText => read_plain_text(path),
        DocumentFormat::Pdf => extract_pdf(&read_bytes(path)?),
        DocumentFormat::Docx => extract_docx(&read_bytes(path)?),
        DocumentFormat::Pptx => extract_pptx(&read_bytes(path)?),
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, PipelineError> {
    std::fs::read(path).map_err(|e| {
        PipelineError::InvalidInput(format!("Could not read the uploaded document: {}", e))
    })
}

fn unparseable(detail: impl std::fmt::Display) -> PipelineError {
    PipelineError::InvalidInput(format!(
        "Could not extract text from the document: {}",
        detail
    ))
}

fn read_plain_text(path: &Path) -> Result<String, PipelineError> {
    let bytes = read_bytes(path)?;
    // Lossy fallback for non-UTF-8 text files rather than a hard error.
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

fn extract_pdf(bytes: &[u8]) -> Result<String, PipelineError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(unparseable)
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, PipelineError> {
    let entry = archive.by_name(name).map_err(unparseable)?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(unparseable)?;
    if out.len() as u64 >= max_bytes {
        return Err(unparseable(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, PipelineError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(unparseable)?;
    let doc_xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    collect_text_runs(&doc_xml)
}

fn extract_pptx(bytes: &[u8]) -> Result<String, PipelineError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(unparseable)?;
    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    // Deck order, not ZIP directory order.
    slide_names.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    let mut out = String::new();
    for name in slide_names {
        let xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        let text = collect_text_runs(&xml)?;
        if !out.is_empty() && !text.is_empty() {
            out.push('\n');
        }
        out.push_str(&text);
    }
    Ok(out)
}

/// Collect the contents of every `<w:t>`/`<a:t>` text run in an OOXML part.
///
/// Both WordprocessingML and DrawingML use a namespaced `t` element for
/// literal text, so one walker serves docx bodies and pptx slides. Text
/// inside runs is taken verbatim (runs carry their own significant
/// whitespace); paragraph ends and explicit breaks become newlines so the
/// extracted text reads like the rendered document.
fn collect_text_runs(xml: &[u8]) -> Result<String, PipelineError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                in_text_run = e.local_name().as_ref() == b"t";
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text_run => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(quick_xml::events::Event::Empty(e)) => match e.local_name().as_ref() {
                b"br" | b"cr" => out.push('\n'),
                b"tab" => out.push('\t'),
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(unparseable(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn docx_with_body(body_xml: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            let xml = format!(
                "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
                body_xml
            );
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    fn minimal_docx(text: &str) -> Vec<u8> {
        docx_with_body(&format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", text))
    }

    fn minimal_pptx(slide_texts: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (i, text) in slide_texts.iter().enumerate() {
                zip.start_file(
                    format!("ppt/slides/slide{}.xml", i + 1),
                    zip::write::SimpleFileOptions::default(),
                )
                .unwrap();
                let xml = format!(
                    "<?xml version=\"1.0\"?><p:sld xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\"><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:sld>",
                    text
                );
                zip.write_all(xml.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn unsupported_extension_rejected() {
        let err = DocumentFormat::from_filename("payload.exe").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert!(err.to_string().contains("Invalid file type"));
        assert!(err.to_string().contains(".pdf"));
    }

    #[test]
    fn missing_extension_rejected() {
        assert!(DocumentFormat::from_filename("README").is_err());
    }

    #[test]
    fn extension_matching_is_case_insensitive() {
        assert_eq!(
            DocumentFormat::from_filename("Report.PDF").unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::from_filename("notes.TXT").unwrap(),
            DocumentFormat::PlainText
        );
    }

    #[test]
    fn plain_text_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_temp(&dir, "notes.txt", "hello world\nsecond line".as_bytes());
        let text = extract_text(&path, DocumentFormat::PlainText).unwrap();
        assert_eq!(text, "hello world\nsecond line");
    }

    #[test]
    fn non_utf8_text_degrades_lossily() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_temp(&dir, "legacy.txt", &[b'o', b'k', 0xFF, b'!']);
        let text = extract_text(&path, DocumentFormat::PlainText).unwrap();
        assert!(text.starts_with("ok"));
        assert!(text.ends_with('!'));
    }

    #[test]
    fn invalid_pdf_is_invalid_input() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_temp(&dir, "bad.pdf", b"not a pdf");
        let err = extract_text(&path, DocumentFormat::Pdf).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn invalid_zip_is_invalid_input_for_docx() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_temp(&dir, "bad.docx", b"not a zip");
        let err = extract_text(&path, DocumentFormat::Docx).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn docx_text_runs_extracted() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_temp(&dir, "doc.docx", &minimal_docx("quarterly revenue report"));
        let text = extract_text(&path, DocumentFormat::Docx).unwrap();
        assert_eq!(text, "quarterly revenue report");
    }

    #[test]
    fn docx_paragraphs_and_breaks_become_newlines() {
        let dir = tempfile::TempDir::new().unwrap();
        let body = "<w:p><w:r><w:t>line one</w:t></w:r><w:r><w:br/></w:r><w:r><w:t>line two</w:t></w:r></w:p><w:p><w:r><w:t>second paragraph</w:t></w:r></w:p>";
        let path = write_temp(&dir, "doc.docx", &docx_with_body(body));
        let text = extract_text(&path, DocumentFormat::Docx).unwrap();
        assert_eq!(text, "line one\nline two\nsecond paragraph");
    }

    #[test]
    fn docx_run_whitespace_is_preserved() {
        let dir = tempfile::TempDir::new().unwrap();
        let body = "<w:p><w:r><w:t xml:space=\"preserve\">Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>";
        let path = write_temp(&dir, "doc.docx", &docx_with_body(body));
        let text = extract_text(&path, DocumentFormat::Docx).unwrap();
        assert_eq!(text, "Hello world");
    }

    #[test]
    fn pptx_slides_extracted_in_deck_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let slides: Vec<String> = (1..=11).map(|i| format!("slide number {}", i)).collect();
        let refs: Vec<&str> = slides.iter().map(String::as_str).collect();
        let path = write_temp(&dir, "deck.pptx", &minimal_pptx(&refs));
        let text = extract_text(&path, DocumentFormat::Pptx).unwrap();
        // slide10 and slide11 must sort after slide2 (numeric, not lexicographic)
        let pos_2 = text.find("slide number 2").unwrap();
        let pos_10 = text.find("slide number 10").unwrap();
        assert!(pos_2 < pos_10);
        assert!(text.starts_with("slide number 1"));
    }
}
