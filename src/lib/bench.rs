//! The `raidx` benchmark CLI: load one [`SharedIndex`], fan it out to a
//! pool of worker threads each driving a private [`Reader`], and report
//! aggregate throughput. Modeled directly on `bench_faigz.c`: same option
//! surface, same per-thread PRNG seeding, same summary shape.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use clap::Parser;
use log::{debug, warn};

use crate::descriptor::Format;
use crate::index::{Flags, SharedIndex};
use crate::reader::Reader;
use crate::utils::built_info;

#[derive(Parser, Debug)]
#[clap(name = "raidx", verbatim_doc_comment, version = built_info::VERSION.as_str())]
pub struct Opts {
    /// The input FASTA/FASTQ file (optionally BGZF-compressed).
    pub fasta: PathBuf,

    /// Number of worker threads.
    #[clap(short = 't', long, default_value = "4", display_order = 1)]
    pub threads: usize,

    /// Number of random fetches per thread.
    #[clap(short = 'n', long = "per-thread", default_value = "1000", display_order = 2)]
    pub per_thread: usize,

    /// Requested length of each fetch; clamped to the sequence's length.
    #[clap(short = 'l', long, default_value = "100", display_order = 3)]
    pub length: u64,

    /// Write every fetched slice as a FASTA record to this file.
    #[clap(short = 'o', long, display_order = 4)]
    pub output: Option<PathBuf>,

    /// PRNG seed; each thread's stream is seeded with `seed + thread_id`.
    #[clap(short = 's', long, default_value = "42", display_order = 5)]
    pub seed: u64,

    /// Log each fetch at debug level.
    #[clap(short = 'v', long, display_order = 6)]
    pub verbose: bool,
}

struct ThreadResult {
    bases_fetched: u64,
    elapsed: std::time::Duration,
}

/// A small, fast, non-cryptographic PRNG. The benchmark's randomness has
/// no correctness implications (§8's throughput property only cares about
/// the aggregate bases fetched), so a hand-rolled generator avoids adding
/// a dependency the rest of the crate has no other use for.
struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    fn new(seed: u64) -> Self {
        Xorshift64 { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// A value in `0..bound`, or `0` when `bound == 0`.
    fn below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            0
        } else {
            self.next_u64() % bound
        }
    }
}

pub fn run(opts: &Opts) -> anyhow::Result<()> {
    anyhow::ensure!(opts.threads >= 1, "--threads must be at least 1");
    anyhow::ensure!(opts.per_thread >= 1, "--per-thread must be at least 1");
    anyhow::ensure!(opts.length >= 1, "--length must be at least 1");

    log::info!("Benchmark configuration:");
    log::info!("  FASTA file:  {}", opts.fasta.display());
    log::info!("  Threads:     {}", opts.threads);
    log::info!(
        "  Seq count:   {} per thread ({} total)",
        opts.per_thread,
        opts.per_thread * opts.threads
    );
    log::info!("  Seq length:  {}", opts.length);
    log::info!("  Seed:        {}", opts.seed);

    let format = detect_format(&opts.fasta);
    let index = SharedIndex::load(&opts.fasta, format, Flags::CREATE_IF_MISSING)?;
    log::info!("Loaded index with {} sequences", index.nseq());

    let output = match &opts.output {
        Some(path) => Some(Arc::new(Mutex::new(std::fs::File::create(path)?))),
        None => None,
    };

    let results: Vec<ThreadResult> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..opts.threads)
            .map(|thread_id| {
                let index = index.acquire();
                let output = output.clone();
                let opts = &*opts;
                scope.spawn(move || worker(thread_id, index, opts, output))
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("worker thread panicked")).collect()
    });

    let total_bases: u64 = results.iter().map(|r| r.bases_fetched).sum();
    let total_time: f64 = results.iter().map(|r| r.elapsed.as_secs_f64()).sum();
    let avg_time = total_time / opts.threads as f64;
    let throughput = if avg_time > 0.0 { total_bases as f64 / avg_time } else { 0.0 };

    log::info!("Benchmark results:");
    log::info!("  Total sequences fetched: {}", opts.per_thread * opts.threads);
    log::info!("  Total bases fetched:     {total_bases}");
    log::info!("  Average time per thread: {avg_time:.3} seconds");
    log::info!("  Total throughput:        {throughput:.2} bases/second");

    Ok(())
}

fn worker(
    thread_id: usize,
    index: SharedIndex,
    opts: &Opts,
    output: Option<Arc<Mutex<std::fs::File>>>,
) -> ThreadResult {
    let thread_seed = opts.seed.wrapping_add(thread_id as u64);
    let mut rng = Xorshift64::new(thread_seed);
    if opts.verbose {
        debug!("Thread {thread_id}: starting with seed {thread_seed}");
    }

    let mut reader = match Reader::create(&index) {
        Ok(r) => r,
        Err(e) => {
            warn!("Thread {thread_id}: failed to create reader: {e}");
            return ThreadResult { bases_fetched: 0, elapsed: std::time::Duration::ZERO };
        }
    };

    let num_seqs = index.nseq();
    let mut bases_fetched: u64 = 0;
    let start = Instant::now();

    if num_seqs > 0 {
        for _ in 0..opts.per_thread {
            let seq_idx = rng.below(num_seqs as u64) as u32;
            let name = match index.name_at(seq_idx) {
                Ok(n) => n.to_string(),
                Err(_) => continue,
            };
            let total_len = match index.length_of(&name) {
                Ok(l) if l > 0 => l,
                _ => continue,
            };

            let adjusted_length = opts.length.min(total_len);
            let max_start = total_len - adjusted_length;
            let start_pos = if max_start > 0 { rng.below(max_start + 1) } else { 0 };
            let end_pos = (start_pos + adjusted_length - 1).min(total_len - 1);

            match reader.fetch_seq(&name, start_pos as i64, end_pos as i64) {
                Ok(seq) => {
                    bases_fetched += seq.len() as u64;
                    if let Some(out) = &output {
                        write_record(out, &name, start_pos, end_pos, &seq);
                    }
                    if opts.verbose {
                        debug!("Thread {thread_id}: fetched {name}:{start_pos}-{end_pos}");
                    }
                }
                Err(e) => {
                    if opts.verbose {
                        warn!("Thread {thread_id}: failed to fetch {name}:{start_pos}-{end_pos}: {e}");
                    }
                }
            }
        }
    }

    reader.destroy();
    index.release();
    ThreadResult { bases_fetched, elapsed: start.elapsed() }
}

fn write_record(out: &Arc<Mutex<std::fs::File>>, name: &str, start: u64, end: u64, seq: &[u8]) {
    let mut file = out.lock().expect("output mutex poisoned");
    let _ = writeln!(file, ">{name}:{start}-{end}");
    let _ = file.write_all(seq);
    let _ = writeln!(file);
    let _ = file.flush();
}

fn detect_format(path: &std::path::Path) -> Format {
    let full = path.to_string_lossy();
    let stripped = full.strip_suffix(".gz").unwrap_or(full.as_ref());
    if stripped.ends_with(".fq") || stripped.ends_with(".fastq") {
        Format::Fastq
    } else {
        Format::Fasta
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn xorshift_is_deterministic_for_a_given_seed() {
        let mut a = Xorshift64::new(7);
        let mut b = Xorshift64::new(7);
        for _ in 0..10 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn below_never_reaches_bound() {
        let mut rng = Xorshift64::new(123);
        for _ in 0..1000 {
            assert!(rng.below(17) < 17);
        }
    }

    #[test]
    fn below_zero_is_always_zero() {
        let mut rng = Xorshift64::new(123);
        assert_eq!(rng.below(0), 0);
    }

    #[test]
    fn detects_format_from_extension() {
        assert_eq!(detect_format(std::path::Path::new("x.fa")), Format::Fasta);
        assert_eq!(detect_format(std::path::Path::new("x.fasta.gz")), Format::Fasta);
        assert_eq!(detect_format(std::path::Path::new("x.fq")), Format::Fastq);
        assert_eq!(detect_format(std::path::Path::new("x.fastq.gz")), Format::Fastq);
    }

    fn base_opts() -> Opts {
        Opts {
            fasta: PathBuf::from("nonexistent.fa"),
            threads: 4,
            per_thread: 1000,
            length: 100,
            output: None,
            seed: 42,
            verbose: false,
        }
    }

    #[test]
    fn rejects_zero_threads() {
        let opts = Opts { threads: 0, ..base_opts() };
        assert!(run(&opts).is_err());
    }

    #[test]
    fn rejects_zero_per_thread() {
        let opts = Opts { per_thread: 0, ..base_opts() };
        assert!(run(&opts).is_err());
    }

    #[test]
    fn rejects_zero_length() {
        let opts = Opts { length: 0, ..base_opts() };
        assert!(run(&opts).is_err());
    }
}
