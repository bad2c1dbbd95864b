//! The index builder: the "external collaborator" the core may invoke to
//! materialize a missing `.fai`/`.gzi` sidecar, but never defines the
//! semantics of. Kept in its own module so that boundary is visible in the
//! source layout, not just in prose.
//!
//! FASTA geometry is discovered with a plain line scan (byte-exact offsets
//! are the whole point); FASTQ record boundaries are discovered with
//! `seq_io`, the same crate the rest of this crate already depends on for
//! record parsing.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use gzp::{deflate::Bgzf, BlockFormatSpec, FormatSpec};
use seq_io::fastq::OwnedRecord;

use crate::descriptor::Format;
use crate::error::{RaidxError, Result};
use crate::utils::BUFFERSIZE;

/// Build a `.fai` sidecar for `source_path` at `fai_path`.
pub fn build_fai(source_path: &Path, fai_path: &Path, format: Format) -> Result<()> {
    match format {
        Format::Fasta => build_fasta_fai(source_path, fai_path),
        Format::Fastq => build_fastq_fai(source_path, fai_path),
    }
}

struct InProgress {
    name: String,
    seq_offset: u64,
    length: u64,
    line_payload: Option<u64>,
    line_stride: Option<u64>,
}

impl InProgress {
    fn new(name: String, seq_offset: u64) -> Self {
        InProgress { name, seq_offset, length: 0, line_payload: None, line_stride: None }
    }

    fn add_line(&mut self, payload_len: u64, raw_len: u64) -> Result<()> {
        if payload_len == 0 {
            return Ok(());
        }
        match self.line_payload {
            None => {
                self.line_payload = Some(payload_len);
                self.line_stride = Some(raw_len);
            }
            Some(established) => {
                if payload_len > established {
                    return Err(RaidxError::IndexMalformed(format!(
                        "{}: sequence line longer than established wrap width",
                        self.name
                    )));
                }
            }
        }
        self.length += payload_len;
        Ok(())
    }

    fn finish(self) -> Result<(String, u64, u64, u64, u64)> {
        let line_payload = self
            .line_payload
            .ok_or_else(|| RaidxError::IndexMalformed(format!("{}: empty sequence record", self.name)))?;
        let line_stride = self.line_stride.unwrap();
        Ok((self.name, self.length, self.seq_offset, line_payload, line_stride))
    }
}

/// Split a line read by [`BufRead::read_line`] into its payload (with any
/// `\n`/`\r\n` terminator stripped) and the raw byte length read.
fn strip_terminator(line: &str) -> (&str, u64) {
    let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
    (trimmed, line.len() as u64)
}

fn build_fasta_fai(source_path: &Path, fai_path: &Path) -> Result<()> {
    let file = File::open(source_path).map_err(|_| RaidxError::SourceMissing(source_path.to_path_buf()))?;
    let mut reader = BufReader::with_capacity(BUFFERSIZE, file);
    let mut writer = BufWriter::with_capacity(BUFFERSIZE, File::create(fai_path)?);

    let mut offset: u64 = 0;
    let mut current: Option<InProgress> = None;
    let mut line = String::new();
    let mut any = false;

    loop {
        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break;
        }
        let raw_len = n as u64;

        if line.starts_with('>') {
            if let Some(c) = current.take() {
                write_fasta_row(&mut writer, c.finish()?)?;
                any = true;
            }
            let name = line[1..].trim_end().split_whitespace().next().unwrap_or("").to_string();
            current = Some(InProgress::new(name, offset + raw_len));
        } else {
            let (payload, _) = strip_terminator(&line);
            let payload_len = payload.len() as u64;
            match current.as_mut() {
                Some(c) => c.add_line(payload_len, raw_len)?,
                None => {
                    return Err(RaidxError::IndexMalformed(
                        "sequence data before any header line".to_string(),
                    ))
                }
            }
        }
        offset += raw_len;
    }

    if let Some(c) = current.take() {
        write_fasta_row(&mut writer, c.finish()?)?;
        any = true;
    }

    if !any {
        return Err(RaidxError::IndexMalformed(format!(
            "{}: no sequence records found",
            source_path.display()
        )));
    }

    Ok(())
}

fn write_fasta_row(writer: &mut impl Write, row: (String, u64, u64, u64, u64)) -> Result<()> {
    let (name, length, seq_offset, line_payload, line_stride) = row;
    writeln!(writer, "{name}\t{length}\t{seq_offset}\t{line_payload}\t{line_stride}")?;
    Ok(())
}

/// Build a `.fai` sidecar for an unwrapped (single-line-per-record) FASTQ
/// file, assuming every record's sequence and quality payload occupy
/// exactly one line each — the convention every `.fai`-producing tool
/// assumes for FASTQ.
fn build_fastq_fai(source_path: &Path, fai_path: &Path) -> Result<()> {
    let file = File::open(source_path).map_err(|_| RaidxError::SourceMissing(source_path.to_path_buf()))?;
    let reader = seq_io::fastq::Reader::new(BufReader::with_capacity(BUFFERSIZE, file));
    let mut writer = BufWriter::with_capacity(BUFFERSIZE, File::create(fai_path)?);

    let mut offset: u64 = 0;
    let mut any = false;

    for result in reader.into_records() {
        let rec: OwnedRecord =
            result.map_err(|e| RaidxError::IndexMalformed(format!("{}: {e}", source_path.display())))?;
        any = true;

        let name = std::str::from_utf8(&rec.head)
            .unwrap_or_default()
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_string();

        let seq_len = rec.seq.len() as u64;
        let qual_len = rec.qual.len() as u64;

        let header_len = 1 + rec.head.len() as u64 + 1; // '@' + head + '\n'
        let seq_offset = offset + header_len;
        let seq_line_len = seq_len + 1; // payload + '\n'
        let plus_len = 2; // '+' + '\n'
        let qual_offset = seq_offset + seq_line_len + plus_len;
        let qual_line_len = qual_len + 1;

        writeln!(
            writer,
            "{name}\t{seq_len}\t{seq_offset}\t{seq_len}\t{seq_line_len}\t{qual_offset}\t{qual_line_len}"
        )?;

        offset = qual_offset + qual_line_len;
    }

    if !any {
        return Err(RaidxError::IndexMalformed(format!(
            "{}: no FASTQ records found",
            source_path.display()
        )));
    }

    Ok(())
}

/// Build a `.gzi` sidecar for a BGZF-compressed `source_path` by walking
/// its block headers and footers. The footer's `amount` field (the
/// uncompressed size) is read directly from the trailing 8 bytes of each
/// block; no block is actually inflated, matching how `bgzip -r`
/// regenerates an index without a full decompression pass.
pub fn build_gzi(source_path: &Path, gzi_path: &Path) -> Result<()> {
    let mut file = File::open(source_path).map_err(|_| RaidxError::SourceMissing(source_path.to_path_buf()))?;
    let bgzf = Bgzf::new();

    let mut entries: Vec<(u64, u64)> = Vec::new();
    let mut compressed_offset: u64 = 0;
    let mut uncompressed_offset: u64 = 0;

    loop {
        let mut header = vec![0u8; Bgzf::HEADER_SIZE];
        match file.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(RaidxError::IOError(e)),
        }
        bgzf.check_header(&header).map_err(|e| {
            RaidxError::IndexMalformed(format!("{}: bad BGZF block header: {e}", source_path.display()))
        })?;
        let block_size = bgzf.get_block_size(&header).map_err(|e| {
            RaidxError::IndexMalformed(format!("{}: bad BGZF block size: {e}", source_path.display()))
        })?;

        let mut rest = vec![0u8; block_size - Bgzf::HEADER_SIZE];
        file.read_exact(&mut rest)?;
        let footer = bgzf.get_footer_values(&rest);

        compressed_offset += block_size as u64;
        if footer.amount == 0 {
            // The empty EOF marker block; not a seek target.
            break;
        }
        uncompressed_offset += footer.amount as u64;
        entries.push((compressed_offset, uncompressed_offset));
    }

    let mut writer = BufWriter::with_capacity(BUFFERSIZE, File::create(gzi_path)?);
    writer.write_u64::<LittleEndian>(entries.len() as u64)?;
    for (c, u) in entries {
        writer.write_u64::<LittleEndian>(c)?;
        writer.write_u64::<LittleEndian>(u)?;
    }

    Ok(())
}
