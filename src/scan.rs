use std::io;

use crate::block::Block;

/// Drain a sieved block in ascending bit order, handing each surviving value
/// to the sink. A sink failure (the prime stream went away) aborts the scan.
/// Returns how many values were reported.
pub fn scan_block<F>(block: &Block, mut sink: F) -> io::Result<u64>
where
    F: FnMut(u64) -> io::Result<()>,
{
    let mut found = 0;
    for bit in block.bits().iter_ones() {
        sink(block.value_at(bit))?;
        found += 1;
    }
    Ok(found)
}
