//! CSV answer tables and chunk dumps

use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::types::{AnswerRow, Chunk, QuestionVariant};

/// Header row for an answer table of `variant`
pub fn answer_headers(variant: QuestionVariant) -> Vec<&'static str> {
    let mut headers = vec![variant.key_column(), "question"];
    if variant == QuestionVariant::Benchmarking {
        headers.extend(["esgType", "esgIndicators", "primaryDetails", "secondaryDetails"]);
    }
    headers.extend(["citationDetails", "pageNumber", "Answer", "sources", "error"]);
    headers
}

fn answer_record(variant: QuestionVariant, row: &AnswerRow) -> Vec<String> {
    let text = |field: &Option<String>| field.clone().unwrap_or_default();
    let t = &row.template;

    let mut record = vec![row.key.clone(), row.question.clone()];
    if variant == QuestionVariant::Benchmarking {
        record.extend([
            text(&t.esg_type),
            text(&t.esg_indicators),
            text(&t.primary_details),
            text(&t.secondary_details),
        ]);
    }
    record.extend([
        text(&t.citation_details),
        text(&t.page_number),
        row.answer.clone(),
        row.sources_cell(),
        text(&row.error),
    ]);
    record
}

/// Write the answer table as CSV to any writer
pub fn write_answers_to<W: Write>(
    writer: W,
    variant: QuestionVariant,
    rows: &[AnswerRow],
) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(answer_headers(variant))?;
    for row in rows {
        csv.write_record(answer_record(variant, row))?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the answer table to `path`
pub fn write_answers(path: &Path, variant: QuestionVariant, rows: &[AnswerRow]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_answers_to(file, variant, rows)?;
    tracing::info!("Wrote {} answer row(s) to {}", rows.len(), path.display());
    Ok(())
}

/// Write a chunk table for inspection
pub fn write_chunks_to<W: Write>(writer: W, chunks: &[Chunk]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["file_name", "page_number", "chunk_index", "length", "text"])?;
    for chunk in chunks {
        csv.write_record([
            chunk.file_name.clone(),
            chunk.page_number.map(|p| p.to_string()).unwrap_or_default(),
            chunk.index.to_string(),
            chunk.text.chars().count().to_string(),
            chunk.text.clone(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_chunks(path: &Path, chunks: &[Chunk]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_chunks_to(file, chunks)?;
    tracing::info!("Wrote {} chunk(s) to {}", chunks.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentUnit, FileType, QuestionTemplate, SourceRow};

    fn template() -> QuestionTemplate {
        QuestionTemplate {
            question: "Is there a policy?".into(),
            esg_type: Some("Governance".into()),
            citation_details: Some("Annual report".into()),
            page_number: Some("12".into()),
            ..Default::default()
        }
    }

    fn read_back(variant: QuestionVariant, rows: &[AnswerRow]) -> Vec<Vec<String>> {
        let mut buffer = Vec::new();
        write_answers_to(&mut buffer, variant, rows).unwrap();
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(buffer.as_slice())
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_document_analysis_layout() {
        let sources = vec![SourceRow {
            file_name: "contract.pdf".into(),
            page_number: Some(3),
            chunk_text: "...".into(),
        }];
        let row = AnswerRow::answered(
            "MG206855",
            "q For MG206855".into(),
            &template(),
            "Acme".into(),
            sources,
        );
        let table = read_back(QuestionVariant::DocumentAnalysis, &[row]);

        assert_eq!(
            table[0],
            vec![
                "documentID",
                "question",
                "citationDetails",
                "pageNumber",
                "Answer",
                "sources",
                "error"
            ]
        );
        assert_eq!(
            table[1],
            vec![
                "MG206855",
                "q For MG206855",
                "Annual report",
                "12",
                "Acme",
                "contract.pdf p.3",
                ""
            ]
        );
    }

    #[test]
    fn test_benchmarking_layout_includes_esg_columns() {
        let row = AnswerRow::failed(
            "AMETEK",
            "q For AMETEK".into(),
            &template(),
            "NULL",
            "quota, exceeded".into(),
            vec![],
        );
        let table = read_back(QuestionVariant::Benchmarking, &[row]);

        assert_eq!(table[0][0], "company");
        assert_eq!(table[0].len(), 11);
        assert_eq!(table[1][2], "Governance");
        assert_eq!(table[1][8], "NULL");
        assert_eq!(table[1][10], "quota, exceeded");
    }

    #[test]
    fn test_write_chunks_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.csv");
        let unit = DocumentUnit::new("a.pdf", FileType::Pdf, Some(2), "").unwrap();
        let chunks = vec![Chunk::from_unit(&unit, 0, "hello world")];

        write_chunks(&path, &chunks).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "file_name,page_number,chunk_index,length,text\na.pdf,2,0,11,hello world\n"
        );
    }
}
