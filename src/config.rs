use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// A high-performance streaming prime sieve: unbounded, interruptible, and
/// resumable.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sieve forward from the last checkpoint, streaming primes to stdout.
    Run(RunConfig),
    /// Generate the base prime file consumed by `run` (one-time setup).
    DumpBasePrimes(DumpConfig),
}

#[derive(Args, Debug)]
pub struct RunConfig {
    /// Base prime file: odd primes as little-endian u64, ascending.
    #[arg(long, default_value = "base_primes.bin")]
    pub base_primes: PathBuf,

    /// Progress record, written periodically and at shutdown.
    #[arg(long, default_value = "sieve_progress.bin")]
    pub state_file: PathBuf,

    /// Sieve block size in bytes. Must be a multiple of 24 so the wheel
    /// pattern tiles block boundaries, and must match the run that wrote the
    /// progress record. Defaults to the largest such size fitting L1.
    #[arg(long)]
    pub block_bytes: Option<usize>,

    /// Seconds between periodic checkpoint writes.
    #[arg(long, default_value_t = 60)]
    pub save_interval_secs: u64,

    /// Ignore an existing progress record and start over from 0.
    #[arg(long)]
    pub fresh: bool,

    /// Stop after draining this many blocks instead of running until
    /// interrupted.
    #[arg(long)]
    pub max_blocks: Option<u64>,

    /// Write a JSON run summary to this path at shutdown.
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DumpConfig {
    /// Highest value to sieve. The default covers every base prime the
    /// engine can ever need: floor(sqrt(u64::MAX)).
    #[arg(long, default_value_t = 4_294_967_295)]
    pub limit: u64,

    /// Output path for the base prime file.
    #[arg(short, long, default_value = "base_primes.bin")]
    pub output: PathBuf,

    /// Sieve segment size in Kilobytes (KB).
    #[arg(long, default_value_t = 128)]
    pub segment_kb: usize,
}
