use crate::error::IngestError;
use crate::models::{DocumentLocation, LoadedDocument, SourceName};
use lopdf::Document;
use regex::Regex;
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

/// Recognized upload types, selected by file extension only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Pdf,
    Text,
    Docx,
    Csv,
}

impl DocumentKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Text),
            "docx" => Some(Self::Docx),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn from_name(name: &SourceName) -> Result<Self, IngestError> {
        Path::new(name.as_str())
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| IngestError::UnsupportedType(name.to_string()))
    }

    pub fn loader(self) -> &'static dyn DocumentLoader {
        match self {
            Self::Pdf => &PdfLoader,
            Self::Text => &TextLoader,
            Self::Docx => &DocxLoader,
            Self::Csv => &CsvLoader,
        }
    }
}

pub trait DocumentLoader: Sync {
    fn load(&self, bytes: &[u8]) -> Result<Vec<LoadedDocument>, IngestError>;
}

/// Extracts the documents of one source, choosing the loader from its name.
pub fn load_source(name: &SourceName, bytes: &[u8]) -> Result<Vec<LoadedDocument>, IngestError> {
    DocumentKind::from_name(name)?.loader().load(bytes)
}

pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn load(&self, bytes: &[u8]) -> Result<Vec<LoadedDocument>, IngestError> {
        let document =
            Document::load_mem(bytes).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(LoadedDocument {
                    location: DocumentLocation::Page(page_no),
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(
                "pdf had no readable page text".to_string(),
            ));
        }

        Ok(pages)
    }
}

pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn load(&self, bytes: &[u8]) -> Result<Vec<LoadedDocument>, IngestError> {
        Ok(vec![LoadedDocument {
            location: DocumentLocation::WholeFile,
            text: String::from_utf8_lossy(bytes).into_owned(),
        }])
    }
}

pub struct DocxLoader;

impl DocumentLoader for DocxLoader {
    fn load(&self, bytes: &[u8]) -> Result<Vec<LoadedDocument>, IngestError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|error| IngestError::Docx(format!("missing word/document.xml: {error}")))?
            .read_to_string(&mut xml)?;

        Ok(vec![LoadedDocument {
            location: DocumentLocation::WholeFile,
            text: docx_xml_to_text(&xml)?,
        }])
    }
}

pub fn docx_xml_to_text(xml: &str) -> Result<String, IngestError> {
    let breaks = Regex::new(r"</w:p>|<w:br\s*/>|<w:cr\s*/>")?;
    let tabs = Regex::new(r"<w:tab\s*/>")?;
    let tags = Regex::new(r"<[^>]+>")?;

    let text = breaks.replace_all(xml, "\n");
    let text = tabs.replace_all(&text, "\t");
    let text = tags.replace_all(&text, "");

    Ok(unescape_xml(text.trim()))
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub struct CsvLoader;

impl DocumentLoader for CsvLoader {
    fn load(&self, bytes: &[u8]) -> Result<Vec<LoadedDocument>, IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(bytes);
        let headers = reader.headers()?.clone();

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            let text = headers
                .iter()
                .zip(record.iter())
                .map(|(header, value)| format!("{}: {}", header.trim(), value.trim()))
                .collect::<Vec<_>>()
                .join("\n");

            if !text.trim().is_empty() {
                rows.push(LoadedDocument {
                    location: DocumentLocation::Row(index as u64),
                    text,
                });
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn name(raw: &str) -> SourceName {
        SourceName::new(raw).expect("valid source name")
    }

    #[test]
    fn extension_dispatch_is_case_insensitive() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(DocumentKind::from_name(&name("Manual.PDF"))?, DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_name(&name("notes.Txt"))?, DocumentKind::Text);
        assert_eq!(DocumentKind::from_name(&name("spec.docx"))?, DocumentKind::Docx);
        assert_eq!(DocumentKind::from_name(&name("parts.CSV"))?, DocumentKind::Csv);
        Ok(())
    }

    #[test]
    fn unrecognized_extensions_fail_explicitly() {
        for raw in ["sheet.xlsx", "parts.csc", "README", "archive.pdf.zip"] {
            let result = DocumentKind::from_name(&name(raw));
            assert!(
                matches!(result, Err(IngestError::UnsupportedType(_))),
                "{raw} should be unsupported"
            );
        }
    }

    #[test]
    fn text_loader_returns_whole_file() -> Result<(), Box<dyn std::error::Error>> {
        let documents = load_source(&name("note.txt"), "Check the oil level.".as_bytes())?;
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].location, DocumentLocation::WholeFile);
        assert_eq!(documents[0].text, "Check the oil level.");
        Ok(())
    }

    #[test]
    fn csv_loader_renders_one_document_per_row() -> Result<(), Box<dyn std::error::Error>> {
        let csv = "part,torque\nbolt A, 25 Nm\nbolt B,40 Nm\n";
        let documents = load_source(&name("parts.csv"), csv.as_bytes())?;
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].text, "part: bolt A\ntorque: 25 Nm");
        assert_eq!(documents[1].location, DocumentLocation::Row(1));
        Ok(())
    }

    #[test]
    fn docx_xml_keeps_paragraph_breaks() -> Result<(), Box<dyn std::error::Error>> {
        let xml = r#"<w:document><w:body><w:p><w:r><w:t>Open the valve</w:t></w:r></w:p><w:p><w:r><w:t>Torque &lt; 30 Nm &amp; check</w:t></w:r></w:p></w:body></w:document>"#;
        assert_eq!(
            docx_xml_to_text(xml)?,
            "Open the valve\nTorque < 30 Nm & check"
        );
        Ok(())
    }

    #[test]
    fn docx_loader_reads_document_xml() -> Result<(), Box<dyn std::error::Error>> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = ZipWriter::new(&mut buffer);
            writer.start_file("word/document.xml", SimpleFileOptions::default())?;
            writer.write_all(b"<w:p><w:t>Step one</w:t></w:p><w:p><w:t>Step two</w:t></w:p>")?;
            writer.finish()?;
        }

        let documents = load_source(&name("manual.docx"), buffer.get_ref())?;
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].text, "Step one\nStep two");
        Ok(())
    }

    #[test]
    fn broken_pdf_is_a_parse_error() {
        let result = load_source(&name("broken.pdf"), b"%PDF-1.4\n%broken");
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
    }
}
