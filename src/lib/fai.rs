//! Parsing of the `.fai` text sidecar into [`SequenceDescriptor`] records.
//!
//! One record per line, tab-separated, following the teacher's habit
//! (`tools::extract::FastqIndexRange::from`) of driving `csv` with a
//! tab delimiter and `serde` row structs rather than hand-splitting lines.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::descriptor::{Format, SequenceDescriptor};
use crate::error::{RaidxError, Result};

#[derive(Debug, Deserialize)]
struct FastaRow {
    name: String,
    length: u64,
    seq_offset: u64,
    line_payload: u64,
    line_stride: u64,
}

#[derive(Debug, Deserialize)]
struct FastqRow {
    name: String,
    length: u64,
    seq_offset: u64,
    line_payload: u64,
    line_stride: u64,
    qual_offset: u64,
    qual_line_stride: u64,
}

/// Parsed `.fai` contents: the descriptors in file order plus the
/// name-to-id lookup. Built together so that a [`RaidxError::DuplicateName`]
/// is caught before either is handed to a caller.
pub struct ParsedFai {
    pub sequences: Vec<SequenceDescriptor>,
    pub name_to_id: HashMap<Box<str>, u32>,
}

/// Parse the `.fai` sidecar at `path`, whose row shape depends on `format`.
pub fn parse<P: AsRef<Path>>(path: P, format: Format) -> Result<ParsedFai> {
    let path = path.as_ref();
    let mut sequences = Vec::new();
    let mut name_to_id = HashMap::new();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)
        .map_err(|e| {
            log::debug!("fai parse error: {e}");
            RaidxError::SourceMissing(path.to_path_buf())
        })?;

    match format {
        Format::Fasta => {
            for result in reader.deserialize::<FastaRow>() {
                let row = result.map_err(|e| {
                    RaidxError::IndexMalformed(format!("{}: {e}", path.display()))
                })?;
                push_row(
                    &mut sequences,
                    &mut name_to_id,
                    path,
                    row.name,
                    row.length,
                    row.seq_offset,
                    row.line_payload,
                    row.line_stride,
                    0,
                    None,
                )?;
            }
        }
        Format::Fastq => {
            for result in reader.deserialize::<FastqRow>() {
                let row = result.map_err(|e| {
                    RaidxError::IndexMalformed(format!("{}: {e}", path.display()))
                })?;
                push_row(
                    &mut sequences,
                    &mut name_to_id,
                    path,
                    row.name,
                    row.length,
                    row.seq_offset,
                    row.line_payload,
                    row.line_stride,
                    row.qual_offset,
                    Some(row.qual_line_stride),
                )?;
            }
        }
    }

    if sequences.is_empty() {
        return Err(RaidxError::IndexMalformed(format!(
            "{}: no sequence records found",
            path.display()
        )));
    }

    Ok(ParsedFai { sequences, name_to_id })
}

#[allow(clippy::too_many_arguments)]
fn push_row(
    sequences: &mut Vec<SequenceDescriptor>,
    name_to_id: &mut HashMap<Box<str>, u32>,
    path: &Path,
    name: String,
    length: u64,
    seq_offset: u64,
    line_payload: u64,
    line_stride: u64,
    qual_offset: u64,
    qual_line_stride: Option<u64>,
) -> Result<()> {
    if name_to_id.contains_key(name.as_str()) {
        return Err(RaidxError::DuplicateName(name));
    }
    let id = u32::try_from(sequences.len())
        .map_err(|_| RaidxError::IndexMalformed(format!("{}: too many sequences", path.display())))?;
    let name: Box<str> = name.into_boxed_str();
    name_to_id.insert(name.clone(), id);
    sequences.push(SequenceDescriptor {
        id,
        name,
        length,
        line_payload,
        line_stride,
        seq_offset,
        qual_offset,
        qual_line_stride,
    });
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_fai(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn parses_fasta_rows() {
        let f = write_fai("chr1\t180\t6\t60\t61\nchr2\t10\t200\t60\t61\n");
        let parsed = parse(f.path(), Format::Fasta).unwrap();
        assert_eq!(parsed.sequences.len(), 2);
        assert_eq!(parsed.sequences[0].name.as_ref(), "chr1");
        assert_eq!(parsed.sequences[1].length, 10);
        assert_eq!(parsed.name_to_id["chr2"], 1);
    }

    #[test]
    fn tolerates_trailing_blank_line() {
        let f = write_fai("a\t10\t0\t60\t61\n\n");
        let parsed = parse(f.path(), Format::Fasta).unwrap();
        assert_eq!(parsed.sequences.len(), 1);
    }

    #[test]
    fn parses_fastq_rows_with_qual_offset() {
        let f = write_fai("r1\t10\t4\t10\t11\t18\t11\n");
        let parsed = parse(f.path(), Format::Fastq).unwrap();
        assert_eq!(parsed.sequences[0].qual_offset, 18);
        assert_eq!(parsed.sequences[0].qual_line_stride, Some(11));
    }

    #[test]
    fn rejects_duplicate_names() {
        let f = write_fai("a\t10\t0\t60\t61\na\t10\t100\t60\t61\n");
        assert!(matches::matches!(parse(f.path(), Format::Fasta), Err(RaidxError::DuplicateName(_))));
    }

    #[test]
    fn rejects_malformed_rows() {
        let f = write_fai("a\tnotanumber\t0\t60\t61\n");
        assert!(matches::matches!(parse(f.path(), Format::Fasta), Err(RaidxError::IndexMalformed(_))));
    }
}
