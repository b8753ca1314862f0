//! Multi-format text extraction into document units

use calamine::Reader;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::{DocumentUnit, FileType};

/// Seconds to wait for pdf-extract before giving up on a file
const PDF_EXTRACT_TIMEOUT_SECS: u64 = 60;

/// Replace typographic characters PDF fonts commonly emit with ASCII
fn normalize_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace('\u{2014}', "--")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2022}', "* ")
        .replace('\u{2026}', "...")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Multi-format file parser
pub struct FileParser;

impl FileParser {
    /// Extract units from a file's bytes, dispatching on the file name's extension.
    ///
    /// PDFs yield one unit per page with extractable text; every other
    /// supported type yields a single unit without a page number.
    pub fn parse(file_name: &str, data: &[u8]) -> Result<Vec<DocumentUnit>> {
        let file_type = FileType::from_path(std::path::Path::new(file_name));

        let single = |content: String| -> Result<Vec<DocumentUnit>> {
            Ok(vec![DocumentUnit::new(
                file_name,
                file_type.clone(),
                None,
                content,
            )?])
        };

        match &file_type {
            FileType::Pdf => Self::parse_pdf(file_name, data),
            FileType::Docx => single(Self::parse_docx(file_name, data)?),
            FileType::Pptx => single(Self::parse_pptx(file_name, data)?),
            FileType::Txt | FileType::Markdown => {
                single(String::from_utf8_lossy(data).into_owned())
            }
            FileType::Html => single(Self::parse_html(file_name, data)?),
            FileType::Csv => single(Self::parse_csv(data)),
            FileType::Xlsx => single(Self::parse_xlsx(file_name, data)?),
            FileType::Other(ext) => Err(Error::UnsupportedFileType(format!(
                "{} ({})",
                file_name,
                if ext.is_empty() { "no extension" } else { ext.as_str() }
            ))),
        }
    }

    /// Parse a PDF into per-page units
    fn parse_pdf(file_name: &str, data: &[u8]) -> Result<Vec<DocumentUnit>> {
        let pages = match Self::extract_pdf_pages(data) {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!("lopdf could not read {}: {}, trying pdf-extract", file_name, e);
                Self::extract_pdf_pages_with_timeout(file_name, data)?
            }
        };

        let units = pages
            .into_iter()
            .map(|(page, text)| (page, normalize_pdf_text(&text)))
            .filter(|(_, text)| !text.is_empty())
            .map(|(page, text)| DocumentUnit::new(file_name, FileType::Pdf, Some(page), text))
            .collect::<Result<Vec<_>>>()?;

        if units.is_empty() {
            return Err(Error::extraction(
                file_name,
                "PDF appears to be image-based or has no extractable text",
            ));
        }

        Ok(units)
    }

    /// Per-page text through lopdf
    fn extract_pdf_pages(data: &[u8]) -> std::result::Result<BTreeMap<u32, String>, String> {
        let doc = lopdf::Document::load_mem(data).map_err(|e| e.to_string())?;
        let mut pages = BTreeMap::new();
        let mut failed = 0usize;

        for page_number in doc.get_pages().keys().copied() {
            match doc.extract_text(&[page_number]) {
                Ok(text) => {
                    pages.insert(page_number, text);
                }
                Err(e) => {
                    tracing::debug!("Could not extract page {}: {}", page_number, e);
                    failed += 1;
                }
            }
        }

        if pages.values().all(|t| t.trim().is_empty()) {
            return Err(format!("no text found ({} page(s) failed extraction)", failed));
        }
        Ok(pages)
    }

    /// Per-page text through pdf-extract, bounded by a timeout since some fonts hang it
    fn extract_pdf_pages_with_timeout(
        file_name: &str,
        data: &[u8],
    ) -> Result<BTreeMap<u32, String>> {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem_by_pages(&data_vec);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(Duration::from_secs(PDF_EXTRACT_TIMEOUT_SECS)) {
            Ok(Ok(pages)) => Ok(pages
                .into_iter()
                .enumerate()
                .map(|(i, text)| (i as u32 + 1, text))
                .collect()),
            Ok(Err(e)) => Err(Error::extraction(file_name, format!("pdf-extract failed: {}", e))),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::extraction(
                file_name,
                format!("PDF extraction timed out after {}s", PDF_EXTRACT_TIMEOUT_SECS),
            )),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(Error::extraction(file_name, "PDF extraction thread crashed"))
            }
        }
    }

    /// Parse DOCX document paragraphs
    fn parse_docx(file_name: &str, data: &[u8]) -> Result<String> {
        let doc = docx_rs::read_docx(data)
            .map_err(|e| Error::extraction(file_name, e.to_string()))?;

        let mut content = String::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                content.push_str(&t.text);
                            }
                        }
                    }
                }
                content.push('\n');
            }
        }

        Ok(content)
    }

    /// Parse PowerPoint slides in slide order
    fn parse_pptx(file_name: &str, data: &[u8]) -> Result<String> {
        use std::io::Read;

        let cursor = std::io::Cursor::new(data);
        let mut archive = zip::ZipArchive::new(cursor)
            .map_err(|e| Error::extraction(file_name, e.to_string()))?;

        let slide_number = |name: &str| -> u32 {
            name.trim_start_matches("ppt/slides/slide")
                .trim_end_matches(".xml")
                .parse()
                .unwrap_or(0)
        };

        let mut slide_names: Vec<String> = archive
            .file_names()
            .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
            .map(str::to_string)
            .collect();
        slide_names.sort_by_key(|name| slide_number(name));

        let mut content = String::new();
        for slide_name in slide_names {
            let mut file = match archive.by_name(&slide_name) {
                Ok(file) => file,
                Err(e) => {
                    tracing::debug!("{}: skipping {}: {}", file_name, slide_name, e);
                    continue;
                }
            };
            let mut xml = String::new();
            if file.read_to_string(&mut xml).is_err() {
                continue;
            }

            let slide_text = Self::extract_text_from_pptx_xml(&xml);
            if !slide_text.is_empty() {
                content.push_str(&format!(
                    "Slide {}:\n{}\n\n",
                    slide_number(&slide_name),
                    slide_text
                ));
            }
        }

        Ok(content)
    }

    /// Collect `<a:t>` runs from slide XML, one line per paragraph
    fn extract_text_from_pptx_xml(xml: &str) -> String {
        use quick_xml::events::Event;
        use quick_xml::Reader;

        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut lines = Vec::new();
        let mut line = Vec::new();
        let mut in_text = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
                Ok(Event::Text(e)) if in_text => {
                    if let Ok(text) = e.unescape() {
                        let text = text.trim();
                        if !text.is_empty() {
                            line.push(text.to_string());
                        }
                    }
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"t" => in_text = false,
                    b"p" if !line.is_empty() => lines.push(std::mem::take(&mut line).join(" ")),
                    _ => {}
                },
                Ok(Event::Eof) | Err(_) => break,
                _ => {}
            }
        }
        if !line.is_empty() {
            lines.push(line.join(" "));
        }

        lines.join("\n")
    }

    /// Parse HTML body text
    fn parse_html(file_name: &str, data: &[u8]) -> Result<String> {
        let html = String::from_utf8_lossy(data);
        let document = scraper::Html::parse_document(&html);
        let body_selector = scraper::Selector::parse("body")
            .map_err(|e| Error::extraction(file_name, e.to_string()))?;

        let content = document
            .select(&body_selector)
            .flat_map(|body| body.text())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(content)
    }

    /// Parse CSV rows as pipe-separated lines
    fn parse_csv(data: &[u8]) -> String {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(data);
        let mut content = String::new();

        if let Ok(headers) = reader.headers() {
            content.push_str(&headers.iter().collect::<Vec<_>>().join(" | "));
            content.push('\n');
        }

        for record in reader.records().flatten() {
            content.push_str(&record.iter().collect::<Vec<_>>().join(" | "));
            content.push('\n');
        }

        content
    }

    /// Parse every worksheet into one text block
    fn parse_xlsx(file_name: &str, data: &[u8]) -> Result<String> {
        let cursor = std::io::Cursor::new(data);
        let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
            .map_err(|e| Error::extraction(file_name, e.to_string()))?;

        let mut content = String::new();
        for sheet_name in workbook.sheet_names().to_vec() {
            let range = match workbook.worksheet_range(&sheet_name) {
                Ok(range) => range,
                Err(e) => {
                    tracing::debug!("{}: skipping sheet {}: {}", file_name, sheet_name, e);
                    continue;
                }
            };

            content.push_str(&format!("Sheet: {}\n", sheet_name));
            for row in range.rows() {
                let cells: Vec<String> = row
                    .iter()
                    .map(|cell| match cell {
                        calamine::Data::Empty => String::new(),
                        calamine::Data::String(s) => s.clone(),
                        calamine::Data::Float(f) => f.to_string(),
                        calamine::Data::Int(i) => i.to_string(),
                        calamine::Data::Bool(b) => b.to_string(),
                        other => other.to_string(),
                    })
                    .collect();

                if !cells.iter().all(String::is_empty) {
                    content.push_str(&cells.join(" | "));
                    content.push('\n');
                }
            }
            content.push('\n');
        }

        Ok(content)
    }
}
