//! The per-worker reader: a private decoder (plain file or BGZF) that
//! borrows the shared index without owning it.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::sync::Arc;

use bytes::BytesMut;
use gzp::{deflate::Bgzf, BlockFormatSpec, FormatSpec};

use crate::descriptor::{Format, SequenceDescriptor};
use crate::error::{RaidxError, Result};
use crate::gzi::BlockOffsetTable;
use crate::index::SharedIndex;
use crate::translate::{self, Chunk, ReadPlan};
use crate::utils::BUFFERSIZE;

enum DecoderImpl {
    Plain(BufReader<File>),
    Bgzf(BgzfDecoder),
}

impl DecoderImpl {
    fn useek(&mut self, offset: u64) -> Result<()> {
        match self {
            DecoderImpl::Plain(r) => {
                r.seek(SeekFrom::Start(offset))?;
                Ok(())
            }
            DecoderImpl::Bgzf(d) => d.useek(offset),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match self {
            DecoderImpl::Plain(r) => {
                r.read_exact(buf).map_err(short_read_is_io_error)?;
                Ok(())
            }
            DecoderImpl::Bgzf(d) => d.read_exact(buf),
        }
    }
}

fn short_read_is_io_error(e: io::Error) -> RaidxError {
    // `Read::read_exact` already turns a short read into
    // `ErrorKind::UnexpectedEof`; every I/O failure here is surfaced
    // uniformly as `IOError`, and any bytes already written to the
    // caller's buffer are discarded by never returning them.
    RaidxError::IOError(e)
}

/// A sequential BGZF decoder that borrows a [`BlockOffsetTable`] by shared
/// `Arc` rather than owning a private copy or a raw pointer "stolen" from
/// the decoder — the safe-Rust replacement for the original's
/// steal-then-null-before-close trick.
struct BgzfDecoder {
    file: File,
    offsets: Arc<BlockOffsetTable>,
    bgzf: Bgzf,
    decompressor: libdeflater::Decompressor,
    block: Vec<u8>,
    block_pos: usize,
}

impl BgzfDecoder {
    fn new(file: File, offsets: Arc<BlockOffsetTable>) -> Self {
        BgzfDecoder {
            file,
            offsets,
            bgzf: Bgzf::new(),
            decompressor: libdeflater::Decompressor::new(),
            block: Vec::new(),
            block_pos: 0,
        }
    }

    fn useek(&mut self, target: u64) -> Result<()> {
        let (compressed_offset, skip) = self.offsets.locate(target);
        self.file.seek(SeekFrom::Start(compressed_offset))?;
        self.block.clear();
        self.block_pos = 0;
        self.fill_block()?;
        if (skip as usize) > self.block.len() {
            return Err(RaidxError::IOError(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "virtual offset skip past end of block",
            )));
        }
        self.block_pos = skip as usize;
        Ok(())
    }

    /// Read and decompress the next BGZF block at the file's current
    /// position. Leaves `self.block` empty at the true end-of-stream
    /// marker block.
    fn fill_block(&mut self) -> Result<()> {
        let mut header = vec![0u8; Bgzf::HEADER_SIZE];
        self.file.read_exact(&mut header)?;
        self.bgzf
            .check_header(&header)
            .map_err(|e| RaidxError::IndexMalformed(format!("bad BGZF block header: {e}")))?;
        let block_size = self
            .bgzf
            .get_block_size(&header)
            .map_err(|e| RaidxError::IndexMalformed(format!("bad BGZF block size: {e}")))?;

        let mut compressed = BytesMut::with_capacity(block_size - Bgzf::HEADER_SIZE);
        compressed.resize(block_size - Bgzf::HEADER_SIZE, 0);
        self.file.read_exact(&mut compressed)?;
        let footer = self.bgzf.get_footer_values(&compressed);

        if footer.amount == 0 {
            // The empty EOF marker block.
            self.block.clear();
            self.block_pos = 0;
            return Ok(());
        }

        self.block.clear();
        self.block.resize(footer.amount as usize, 0);
        let payload = &compressed[..compressed.len() - 8];
        self.decompressor
            .deflate_decompress(payload, &mut self.block)
            .map_err(|e| RaidxError::IOError(io::Error::new(io::ErrorKind::InvalidData, e.to_string())))?;

        let mut crc = libdeflater::Crc::new();
        crc.update(&self.block);
        if crc.sum() != footer.sum {
            return Err(RaidxError::IndexMalformed("BGZF block failed CRC check".to_string()));
        }

        self.block_pos = 0;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut written = 0;
        while written < buf.len() {
            if self.block_pos >= self.block.len() {
                self.fill_block()?;
                if self.block.is_empty() {
                    return Err(RaidxError::IOError(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "BGZF stream ended before requested bytes were read",
                    )));
                }
            }
            let available = self.block.len() - self.block_pos;
            let take = available.min(buf.len() - written);
            buf[written..written + take]
                .copy_from_slice(&self.block[self.block_pos..self.block_pos + take]);
            self.block_pos += take;
            written += take;
        }
        Ok(())
    }
}

/// A per-worker reader: a private decoder/file handle that references a
/// [`SharedIndex`] without re-reading or duplicating its sidecars.
pub struct Reader {
    index: SharedIndex,
    decoder: DecoderImpl,
}

enum Field {
    Seq,
    Qual,
}

impl Reader {
    /// Acquire one reference on `index` and open a fresh, private decoder.
    pub fn create(index: &SharedIndex) -> Result<Reader> {
        let index = index.acquire();
        let path = index.source_path();
        let decoder = if index.is_compressed() {
            let file = File::open(path).map_err(|_| RaidxError::SourceMissing(path.to_path_buf()))?;
            let offsets = index
                .block_offsets()
                .expect("compressed SharedIndex always carries a block-offset table")
                .clone();
            DecoderImpl::Bgzf(BgzfDecoder::new(file, offsets))
        } else {
            let file = File::open(path).map_err(|_| RaidxError::SourceMissing(path.to_path_buf()))?;
            DecoderImpl::Plain(BufReader::with_capacity(BUFFERSIZE, file))
        };
        Ok(Reader { index, decoder })
    }

    /// Close the private decoder and release one reference on the shared
    /// index. A plain drop, provided under the spec's name.
    pub fn destroy(self) {}

    /// Fetch the payload bytes for the inclusive range `[begin, end]` of
    /// `name`'s sequence.
    pub fn fetch_seq(&mut self, name: &str, begin: i64, end: i64) -> Result<Vec<u8>> {
        self.fetch(name, begin, end, Field::Seq)
    }

    /// Fetch the quality payload for the inclusive range `[begin, end]` of
    /// `name`'s record. Fails with [`RaidxError::NotFastq`] on a FASTA
    /// source.
    pub fn fetch_qual(&mut self, name: &str, begin: i64, end: i64) -> Result<Vec<u8>> {
        if self.index.format() != Format::Fastq {
            return Err(RaidxError::NotFastq);
        }
        self.fetch(name, begin, end, Field::Qual)
    }

    /// Convenience wrapper combining [`SharedIndex::parse_region`] and
    /// [`Reader::fetch_seq`].
    pub fn fetch_region(&mut self, region: &str) -> Result<Vec<u8>> {
        let r = self.index.parse_region(region)?;
        let name = self.index.name_at(r.id)?.to_string();
        if r.begin >= r.end {
            return Ok(Vec::new());
        }
        self.fetch_seq(&name, r.begin as i64, r.end as i64 - 1)
    }

    fn fetch(&mut self, name: &str, begin: i64, end: i64, field: Field) -> Result<Vec<u8>> {
        let desc: SequenceDescriptor = self.index.descriptor(name)?.clone();

        let length = desc.length as i64;
        let mut begin = begin;
        let mut end = end;
        let was_inverted = end < begin;
        if was_inverted {
            begin = end;
        }
        if begin < 0 {
            begin = 0;
        } else if begin > length {
            begin = length;
        }
        if end >= length {
            end = length - 1;
        }
        if was_inverted || end < begin {
            return Ok(Vec::new());
        }

        let (base_offset, line_stride) = match field {
            Field::Seq => (desc.seq_offset, desc.line_stride),
            Field::Qual => (
                desc.qual_offset,
                desc.qual_line_stride.unwrap_or(desc.line_stride),
            ),
        };

        let plan = translate::plan(
            base_offset,
            begin as u64,
            end as u64 + 1,
            desc.line_payload,
            line_stride,
        )?;

        self.read_plan(&plan)
    }

    fn read_plan(&mut self, plan: &ReadPlan) -> Result<Vec<u8>> {
        let total = plan.total_payload();
        let mut output = Vec::new();
        output
            .try_reserve_exact(total as usize)
            .map_err(|_| RaidxError::OutOfMemory)?;

        let max_raw = [
            plan.first_chunk.raw_len,
            plan.full_chunk.raw_len,
            plan.last_chunk.raw_len,
        ]
        .into_iter()
        .max()
        .unwrap_or(0) as usize;
        let mut scratch = vec![0u8; max_raw];

        self.decoder.useek(plan.first_byte)?;
        self.read_chunk(plan.first_chunk, &mut scratch, &mut output)?;
        for _ in 0..plan.full_chunk_count {
            self.read_chunk(plan.full_chunk, &mut scratch, &mut output)?;
        }
        self.read_chunk(plan.last_chunk, &mut scratch, &mut output)?;

        Ok(output)
    }

    fn read_chunk(&mut self, chunk: Chunk, scratch: &mut [u8], output: &mut Vec<u8>) -> Result<()> {
        if chunk.raw_len == 0 {
            return Ok(());
        }
        let raw_len = chunk.raw_len as usize;
        let payload_len = chunk.payload_len as usize;
        self.decoder.read_exact(&mut scratch[..raw_len])?;
        output.extend_from_slice(&scratch[..payload_len]);
        Ok(())
    }
}
