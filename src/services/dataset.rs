// Labeled Dataset IO
// Reads `id,text,label` CSV files and writes per-requirement comparison tables.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::models::{ComparisonRow, LabeledRequirement};

const REQUIRED_COLUMNS: [&str; 3] = ["id", "text", "label"];

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Labeled data file not found: {0}")]
    NotFound(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required column {0:?}")]
    MissingColumn(&'static str),
    #[error("Duplicate requirement id {0:?}")]
    DuplicateId(String),
}

/// Load a labeled dataset from a CSV file.
pub fn load_requirements(path: &Path) -> Result<Vec<LabeledRequirement>, DatasetError> {
    if !path.exists() {
        return Err(DatasetError::NotFound(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let requirements = read_requirements(file)?;
    info!("[LOADER] {} labeled requirements from {}", requirements.len(), path.display());
    Ok(requirements)
}

/// Parse CSV rows with an `id,text,label` header (any column order).
pub fn read_requirements<R: Read>(reader: R) -> Result<Vec<LabeledRequirement>, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let mut columns = [0usize; 3];
    for (slot, name) in columns.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
            .ok_or(DatasetError::MissingColumn(name))?;
    }
    let [id_col, text_col, label_col] = columns;

    let mut seen = HashSet::new();
    let mut requirements = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or_default();

        let id = field(id_col).to_string();
        if !seen.insert(id.clone()) {
            return Err(DatasetError::DuplicateId(id));
        }

        requirements.push(LabeledRequirement {
            id,
            text: field(text_col).to_string(),
            label: field(label_col).trim().to_lowercase(),
        });
    }

    Ok(requirements)
}

/// Render rows as TSV with an `id, text, gold, rule_based, llm` header.
pub fn write_comparison<W: Write>(writer: W, rows: &[ComparisonRow]) -> std::io::Result<()> {
    let mut out = BufWriter::new(writer);
    writeln!(out, "id\ttext\tgold\trule_based\tllm")?;
    for row in rows {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            tsv_field(&row.id),
            tsv_field(&row.text),
            tsv_field(&row.gold),
            row.rule_based,
            row.llm
        )?;
    }
    out.flush()
}

pub fn write_comparison_tsv(path: &Path, rows: &[ComparisonRow]) -> Result<(), DatasetError> {
    let io_err = |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    write_comparison(file, rows).map_err(io_err)?;
    info!("[LOADER] comparison table written to {}", path.display());
    Ok(())
}

fn tsv_field(value: &str) -> String {
    value.replace(['\t', '\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Label;

    #[test]
    fn test_read_requirements_normalizes_labels() {
        let data = "id,text,label\nR1,\"The UI shall be fast, simple.\", Ambiguous \nR2,Respond within 200 ms.,CLEAR\n";
        let reqs = read_requirements(data.as_bytes()).unwrap();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].text, "The UI shall be fast, simple.");
        assert_eq!(reqs[0].label, "ambiguous");
        assert_eq!(reqs[1].label, "clear");
    }

    #[test]
    fn test_column_order_and_extra_columns() {
        let data = "label,notes,text,id\nclear,x,Log every request.,A-7\n";
        let reqs = read_requirements(data.as_bytes()).unwrap();
        assert_eq!(reqs[0].id, "A-7");
        assert_eq!(reqs[0].text, "Log every request.");
    }

    #[test]
    fn test_missing_column_fails() {
        let data = "id,text\nR1,Something\n";
        let err = read_requirements(data.as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn("label")));
    }

    #[test]
    fn test_duplicate_id_fails() {
        let data = "id,text,label\nR1,a,clear\nR1,b,ambiguous\n";
        let err = read_requirements(data.as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateId(id) if id == "R1"));
    }

    #[test]
    fn test_out_of_vocabulary_label_is_kept() {
        let data = "id,text,label\nR1,a,Unsure\n";
        let reqs = read_requirements(data.as_bytes()).unwrap();
        assert_eq!(reqs[0].label, "unsure");
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_requirements(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, DatasetError::NotFound(_)));
    }

    #[test]
    fn test_write_comparison_escapes_tabs() {
        let rows = vec![ComparisonRow {
            id: "R1".to_string(),
            text: "line one\twith tab\nline two".to_string(),
            gold: "ambiguous".to_string(),
            rule_based: Label::Ambiguous,
            llm: Label::Clear,
        }];
        let mut buf = Vec::new();
        write_comparison(&mut buf, &rows).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert_eq!(
            out,
            "id\ttext\tgold\trule_based\tllm\nR1\tline one with tab line two\tambiguous\tambiguous\tclear\n"
        );
    }

    #[test]
    fn test_write_comparison_tsv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results_comparison.tsv");
        write_comparison_tsv(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id\ttext\tgold\trule_based\tllm\n");
    }
}
