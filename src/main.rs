mod base_primes;
mod block;
mod checkpoint;
mod config;
mod output;
mod pipeline;
mod scan;
mod sieve;
mod stats;
mod wheel;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::base_primes::BoundedSieve;
use crate::checkpoint::Checkpoint;
use crate::config::{Cli, Command, DumpConfig, RunConfig};
use crate::output::Reporter;
use crate::pipeline::Pipeline;
use crate::sieve::BasePrime;
use crate::stats::SessionStats;

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(config) => run(config),
        Command::DumpBasePrimes(config) => dump_base_primes(config),
    }
}

fn run(config: RunConfig) -> Result<(), Box<dyn Error>> {
    // --- Startup validation (every fatal path stays ahead of thread spawn) ---
    let block_bytes = config.block_bytes.unwrap_or_else(block::default_block_bytes);
    if block_bytes == 0 || block_bytes % wheel::FILL_BYTES != 0 {
        eprintln!(
            "Error: block size {} is not a positive multiple of {} bytes.",
            block_bytes,
            wheel::FILL_BYTES
        );
        process::exit(1);
    }

    let base = match base_primes::load(&config.base_primes) {
        Ok(values) if values.is_empty() => {
            eprintln!(
                "Error: base prime file {} is empty.",
                config.base_primes.display()
            );
            process::exit(1);
        }
        Ok(values) => values,
        Err(err) => {
            eprintln!(
                "Error: cannot read base prime file {}: {}",
                config.base_primes.display(),
                err
            );
            process::exit(1);
        }
    };

    // A missing or short record is a cold start, not an error.
    let resumed = if config.fresh {
        None
    } else {
        Checkpoint::load(&config.state_file)
    };
    let start_cursor = resumed.map_or(0, |record| record.cursor);

    // Recomputing every next_bit from the restored cursor reproduces exactly
    // the carried state of an uninterrupted run.
    let mut primes: Vec<BasePrime> = base
        .iter()
        .map(|&p| BasePrime::new(p, start_cursor))
        .collect();

    let pipeline = Arc::new(Pipeline::new(block_bytes, start_cursor));
    {
        let pipeline = Arc::clone(&pipeline);
        ctrlc::set_handler(move || pipeline.stop())?;
    }

    let mut stats = SessionStats::new(
        resumed.map_or(0, |record| record.primes_found),
        resumed.map_or(0, |record| record.elapsed_secs),
    );
    let mut reporter = Reporter::new()?;

    let sieve_thread = {
        let pipeline = Arc::clone(&pipeline);
        thread::Builder::new()
            .name("sieve".into())
            .spawn(move || sieve::produce_blocks(&pipeline, &mut primes))?
    };

    // 2 lives outside the odd index space; report it once, at the very start.
    if start_cursor == 0 {
        stats.record(2);
        reporter.report(2, &stats)?;
    }

    // --- Drain loop ---
    let save_interval = Duration::from_secs(config.save_interval_secs);
    let mut last_save = Instant::now();
    // Progress the checkpoint may claim: only fully drained blocks count.
    let mut committed_cursor = start_cursor;
    let mut committed_primes = stats.primes_found;
    let mut drained = 0u64;

    if config.max_blocks == Some(0) {
        pipeline.stop();
    }
    while let Some(block) = pipeline.acquire_for_scan() {
        let end_cursor = block.end_cursor();
        let scanned = scan::scan_block(&block, |value| {
            stats.record(value);
            reporter.report(value, &stats)
        });
        pipeline.release_scanned(block);

        if scanned.is_err() {
            // The prime stream went away; wind down as if interrupted.
            pipeline.stop();
            break;
        }
        committed_cursor = end_cursor;
        committed_primes = stats.primes_found;
        drained += 1;

        if last_save.elapsed() >= save_interval {
            save_progress(&config, committed_cursor, committed_primes, &stats)?;
            last_save = Instant::now();
        }
        if config.max_blocks.is_some_and(|max| drained >= max) {
            pipeline.stop();
            break;
        }
    }

    // Join before the final write so the recorded cursor cannot race
    // in-flight sieve state.
    if sieve_thread.join().is_err() {
        eprintln!("Error: sieve thread panicked.");
        process::exit(1);
    }
    save_progress(&config, committed_cursor, committed_primes, &stats)?;
    reporter.finish()?;

    if let Some(path) = &config.summary {
        output::write_summary(path, &stats.summary(committed_cursor))?;
    }
    Ok(())
}

fn save_progress(
    config: &RunConfig,
    cursor: u64,
    primes_found: u64,
    stats: &SessionStats,
) -> Result<(), Box<dyn Error>> {
    Checkpoint {
        cursor,
        primes_found,
        elapsed_secs: stats.elapsed_secs(),
    }
    .save(&config.state_file)?;
    Ok(())
}

fn dump_base_primes(config: DumpConfig) -> Result<(), Box<dyn Error>> {
    if config.limit < 3 {
        eprintln!("Error: --limit must be at least 3.");
        process::exit(1);
    }
    let segment_bytes = config.segment_kb * 1024;
    if segment_bytes == 0 {
        eprintln!("Error: segment size cannot be 0.");
        process::exit(1);
    }

    println!("Sieving base primes up to {}...", config.limit);
    let bar = ProgressBar::new(config.limit);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>12}/{len:12} ({eta})")?
            .progress_chars("#>-"),
    );

    let file = File::create(&config.output)?;
    let mut writer = BufWriter::with_capacity(1 << 16, file);
    let mut written = 0u64;
    for prime in BoundedSieve::new(config.limit, segment_bytes) {
        // 2 is outside the engine's odd index space; the consumer reports it
        // directly on a cold start.
        if prime == 2 {
            continue;
        }
        writer.write_all(&prime.to_le_bytes())?;
        written += 1;
        if written % 65_536 == 0 {
            bar.set_position(prime);
        }
    }
    writer.flush()?;
    bar.finish_and_clear();

    println!("Wrote {} base primes to {}", written, config.output.display());
    Ok(())
}
