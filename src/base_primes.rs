use bitvec::prelude::*;
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Read the base prime file: little-endian u64 odd primes in strictly
/// ascending order, length inferred from the file size. A trailing partial
/// value is ignored.
pub fn load(path: &Path) -> io::Result<Vec<u64>> {
    let file = File::open(path)?;
    let count = (file.metadata()?.len() / 8) as usize;
    let mut reader = BufReader::with_capacity(1 << 16, file);

    let mut primes = Vec::with_capacity(count);
    let mut buf = [0u8; 8];
    for _ in 0..count {
        reader.read_exact(&mut buf)?;
        primes.push(u64::from_le_bytes(buf));
    }
    Ok(primes)
}

/// Bounded segmented sieve behind `dump-base-primes`: yields every prime up
/// to `limit` in ascending order. This is a one-time setup tool, so segments
/// cover the full number line (no odd-only packing) and composite marking is
/// parallelized across the seed primes.
pub struct BoundedSieve {
    limit: u64,
    sqrt_limit: u64,
    seed_primes: Vec<u32>,
    state: SieveState,
    segment_size_bits: u64,
}

enum SieveState {
    /// Index into `seed_primes`.
    Seed(usize),
    Segmented {
        segment_start: u64,
        segment: BitVec<u64, Lsb0>,
        segment_index: usize,
    },
}

impl BoundedSieve {
    pub fn new(limit: u64, segment_size_bytes: usize) -> Self {
        let sqrt_limit = (limit as f64).sqrt() as u64;

        let mut seed_sieve = bitvec![u8, Lsb0; 1; (sqrt_limit + 1) as usize];
        seed_sieve.set(0, false);
        if sqrt_limit >= 1 {
            seed_sieve.set(1, false);
        }
        for i in 2..=(sqrt_limit as f64).sqrt() as u64 {
            if seed_sieve[i as usize] {
                for j in (i * i..=sqrt_limit).step_by(i as usize) {
                    seed_sieve.set(j as usize, false);
                }
            }
        }

        let seed_primes: Vec<u32> = seed_sieve.iter_ones().map(|i| i as u32).collect();

        Self {
            limit,
            sqrt_limit,
            seed_primes,
            state: SieveState::Seed(0),
            segment_size_bits: (segment_size_bytes * 8) as u64,
        }
    }

    fn sieve_segment(start: u64, end: u64, seed_primes: &[u32]) -> BitVec<u64, Lsb0> {
        let mut segment = bitvec![u64, Lsb0; 0; (end - start) as usize]; // 0 means prime

        // u64 and AtomicU64 share a memory representation, and every access
        // below is atomic, so the reborrow is sound.
        let atomic_segment: &[AtomicU64] = unsafe {
            std::slice::from_raw_parts(
                segment.as_raw_slice().as_ptr() as *const AtomicU64,
                segment.as_raw_slice().len(),
            )
        };

        seed_primes.par_iter().for_each(|&seed| {
            let p = seed as u64;
            let mut mark_start = start.div_ceil(p) * p;
            if p * p > start {
                mark_start = p * p;
            }

            for multiple in (mark_start..end).step_by(p as usize) {
                let idx = (multiple - start) as usize;
                let word = idx / 64;
                let bit = idx % 64;
                if word < atomic_segment.len() {
                    atomic_segment[word].fetch_or(1 << bit, Ordering::Relaxed);
                }
            }
        });

        segment
    }
}

impl Iterator for BoundedSieve {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match &mut self.state {
                SieveState::Seed(index) => {
                    if *index < self.seed_primes.len() {
                        let prime = self.seed_primes[*index] as u64;
                        *index += 1;
                        if prime > self.limit {
                            return None;
                        }
                        return Some(prime);
                    }
                    let segment_start = self.sqrt_limit + 1;
                    if segment_start > self.limit {
                        return None;
                    }
                    let segment_end = (segment_start + self.segment_size_bits).min(self.limit + 1);
                    let segment =
                        Self::sieve_segment(segment_start, segment_end, &self.seed_primes);
                    self.state = SieveState::Segmented {
                        segment_start,
                        segment,
                        segment_index: 0,
                    };
                }
                SieveState::Segmented {
                    segment_start,
                    segment,
                    segment_index,
                } => {
                    while *segment_index < segment.len() {
                        if !segment[*segment_index] {
                            let prime = *segment_start + *segment_index as u64;
                            *segment_index += 1;
                            if prime > self.limit {
                                return None;
                            }
                            return Some(prime);
                        }
                        *segment_index += 1;
                    }

                    *segment_start += self.segment_size_bits;
                    if *segment_start > self.limit {
                        return None;
                    }
                    let segment_end = (*segment_start + self.segment_size_bits).min(self.limit + 1);
                    *segment = Self::sieve_segment(*segment_start, segment_end, &self.seed_primes);
                    *segment_index = 0;
                }
            }
        }
    }
}
