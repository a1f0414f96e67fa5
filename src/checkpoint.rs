use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// On-disk size of a progress record: three little-endian u64 fields.
pub const RECORD_BYTES: usize = 24;

/// Durable snapshot of consumer progress. `cursor` is always the end
/// boundary of a block the consumer finished scanning, so resuming from it
/// never re-emits a prime and never skips one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// Bit offset into the odd-number index space where sieving resumes.
    pub cursor: u64,
    /// Primes reported so far, 2 included.
    pub primes_found: u64,
    /// Wall-clock seconds accumulated across every run since the original
    /// cold start.
    pub elapsed_secs: u64,
}

impl Checkpoint {
    /// Load the record, or `None` for a missing or short file — both are a
    /// cold start, not an error. The format carries no checksum; a torn
    /// write that still spans a full record simply wins as-is.
    pub fn load(path: &Path) -> Option<Self> {
        let mut file = fs::File::open(path).ok()?;
        let mut buf = [0u8; RECORD_BYTES];
        file.read_exact(&mut buf).ok()?;

        let field = |i: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&buf[i * 8..(i + 1) * 8]);
            u64::from_le_bytes(bytes)
        };
        Some(Self {
            cursor: field(0),
            primes_found: field(1),
            elapsed_secs: field(2),
        })
    }

    /// Overwrite the record wholesale.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut buf = [0u8; RECORD_BYTES];
        buf[0..8].copy_from_slice(&self.cursor.to_le_bytes());
        buf[8..16].copy_from_slice(&self.primes_found.to_le_bytes());
        buf[16..24].copy_from_slice(&self.elapsed_secs.to_le_bytes());
        fs::write(path, buf)
    }
}
