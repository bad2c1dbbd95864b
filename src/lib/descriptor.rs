//! The per-sequence physical layout record and the file-level format tag.

/// FASTA stores name + wrapped payload; FASTQ additionally stores a
/// same-length quality payload per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Fasta,
    Fastq,
}

/// The record for one sequence in the `.fai` sidecar.
///
/// Invariant: `line_stride > line_payload >= 1`, `length >= 0`, and the byte
/// at file offset `seq_offset + (k / line_payload) * line_stride + (k %
/// line_payload)` is the k-th payload byte of this sequence, for `0 <= k <
/// length`. The same relationship holds for `qual_offset` using
/// `qual_line_stride`, which is only meaningful for FASTQ records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceDescriptor {
    /// Dense integer position in insertion order.
    pub id: u32,
    /// The sequence name, exactly as it appeared in the `.fai` record.
    pub name: Box<str>,
    /// Logical base count (bytes of payload, excluding newlines).
    pub length: u64,
    /// Payload bytes per full wrapped line.
    pub line_payload: u64,
    /// On-disk bytes per line, including line terminator(s).
    pub line_stride: u64,
    /// Byte offset in the unwrapped file at which the sequence payload
    /// begins.
    pub seq_offset: u64,
    /// Byte offset at which the quality payload begins. Unused for FASTA.
    pub qual_offset: u64,
    /// On-disk bytes per quality line. `None` for FASTA records.
    pub qual_line_stride: Option<u64>,
}

impl SequenceDescriptor {
    /// `true` when the geometry can be safely handed to the coordinate
    /// translator: a non-zero line payload and a strictly wider stride.
    pub fn has_valid_geometry(&self) -> bool {
        self.line_payload > 0 && self.line_stride > self.line_payload
    }
}
