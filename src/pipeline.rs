use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::block::Block;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SlotState {
    /// The sieve side may fill this slot.
    Empty,
    /// A sieved block is queued for the scan side.
    Ready,
}

struct Slot {
    state: SlotState,
    /// `None` while the owning side holds the block outside the lock.
    block: Option<Block>,
}

struct Shared {
    slots: [Slot; 2],
    /// Starting bit offset of the next block to be sieved. Advances only
    /// when a sieved block is published.
    global_cursor: u64,
    sieve_slot: usize,
    scan_slot: usize,
}

/// Double-buffered hand-off between the sieve thread and the scanning main
/// thread. Lookahead is exactly one block: the sieve can finish the block
/// after the one being scanned, then must wait, so a slow consumer stalls
/// the producer instead of letting it run ahead unbounded.
///
/// Each side toggles only its own slot index, and only inside the critical
/// section, so blocks travel in strictly increasing cursor order with no
/// skips or reordering.
pub struct Pipeline {
    shared: Mutex<Shared>,
    /// Signalled when a slot becomes `Ready`.
    ready: Condvar,
    /// Signalled when a slot becomes `Empty`.
    empty: Condvar,
    /// Cancellation flag; `stop` broadcasts both condvars so neither side
    /// can stay blocked after it is set.
    stop: AtomicBool,
    block_bits: u64,
}

impl Pipeline {
    pub fn new(block_bytes: usize, start_cursor: u64) -> Self {
        let slot = || Slot {
            state: SlotState::Empty,
            block: Some(Block::new(block_bytes)),
        };
        Self {
            shared: Mutex::new(Shared {
                slots: [slot(), slot()],
                global_cursor: start_cursor,
                sieve_slot: 0,
                scan_slot: 0,
            }),
            ready: Condvar::new(),
            empty: Condvar::new(),
            stop: AtomicBool::new(false),
            block_bits: (block_bytes * 8) as u64,
        }
    }

    pub fn block_bits(&self) -> u64 {
        self.block_bits
    }

    /// Request shutdown and wake both sides out of any blocking wait.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.ready.notify_all();
        self.empty.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().expect("pipeline mutex poisoned")
    }

    /// Take the next block to sieve, tagged with its cursor. Blocks until
    /// the slot is drained; returns `None` once the pipeline is stopped.
    pub fn acquire_for_sieve(&self) -> Option<Block> {
        let mut shared = self.lock();
        loop {
            if self.is_stopped() {
                return None;
            }
            let slot = shared.sieve_slot;
            if shared.slots[slot].state == SlotState::Empty {
                // A drained slot can still be empty-handed while the scan
                // side holds its block outside the lock.
                if let Some(mut block) = shared.slots[slot].block.take() {
                    block.cursor = shared.global_cursor;
                    return Some(block);
                }
            }
            shared = self.empty.wait(shared).expect("pipeline mutex poisoned");
        }
    }

    /// Queue a sieved block for the scan side and advance the global cursor
    /// past it.
    pub fn publish_sieved(&self, block: Block) {
        let mut shared = self.lock();
        let slot = shared.sieve_slot;
        debug_assert_eq!(shared.slots[slot].state, SlotState::Empty);
        debug_assert!(shared.slots[slot].block.is_none());
        debug_assert_eq!(block.cursor, shared.global_cursor);

        shared.slots[slot].block = Some(block);
        shared.slots[slot].state = SlotState::Ready;
        shared.global_cursor += self.block_bits;
        shared.sieve_slot = 1 - slot;
        drop(shared);
        self.ready.notify_all();
    }

    /// Take the next sieved block to drain. Blocks until one is queued;
    /// returns `None` once the pipeline is stopped.
    pub fn acquire_for_scan(&self) -> Option<Block> {
        let mut shared = self.lock();
        loop {
            if self.is_stopped() {
                return None;
            }
            let slot = shared.scan_slot;
            if shared.slots[slot].state == SlotState::Ready {
                if let Some(block) = shared.slots[slot].block.take() {
                    return Some(block);
                }
            }
            shared = self.ready.wait(shared).expect("pipeline mutex poisoned");
        }
    }

    /// Hand a fully drained block back to the sieve side.
    pub fn release_scanned(&self, block: Block) {
        let mut shared = self.lock();
        let slot = shared.scan_slot;
        debug_assert_eq!(shared.slots[slot].state, SlotState::Ready);
        debug_assert!(shared.slots[slot].block.is_none());

        shared.slots[slot].block = Some(block);
        shared.slots[slot].state = SlotState::Empty;
        shared.scan_slot = 1 - slot;
        drop(shared);
        self.empty.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    const BLOCK_BYTES: usize = 24;

    fn spawn_producer(pipeline: &Arc<Pipeline>, blocks: usize) -> thread::JoinHandle<usize> {
        let pipeline = Arc::clone(pipeline);
        thread::spawn(move || {
            let mut published = 0;
            while published < blocks {
                let Some(block) = pipeline.acquire_for_sieve() else {
                    break;
                };
                pipeline.publish_sieved(block);
                published += 1;
            }
            published
        })
    }

    #[test]
    fn blocks_arrive_in_cursor_order() {
        let pipeline = Arc::new(Pipeline::new(BLOCK_BYTES, 0));
        let producer = spawn_producer(&pipeline, 4);

        for expected in 0..4u64 {
            let block = pipeline.acquire_for_scan().unwrap();
            assert_eq!(block.cursor, expected * pipeline.block_bits());
            pipeline.release_scanned(block);
        }
        assert_eq!(producer.join().unwrap(), 4);
    }

    #[test]
    fn resumed_cursor_tags_the_first_block() {
        let pipeline = Arc::new(Pipeline::new(BLOCK_BYTES, 960));
        let producer = spawn_producer(&pipeline, 1);

        let block = pipeline.acquire_for_scan().unwrap();
        assert_eq!(block.cursor, 960);
        pipeline.release_scanned(block);
        producer.join().unwrap();
    }

    #[test]
    fn producer_stalls_one_block_ahead() {
        let pipeline = Arc::new(Pipeline::new(BLOCK_BYTES, 0));
        let published = Arc::new(AtomicUsize::new(0));

        let producer = {
            let pipeline = Arc::clone(&pipeline);
            let published = Arc::clone(&published);
            thread::spawn(move || {
                while let Some(block) = pipeline.acquire_for_sieve() {
                    pipeline.publish_sieved(block);
                    published.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        // Scan nothing: the producer may finish both blocks, then must wait
        // for a drained slot.
        thread::sleep(Duration::from_millis(100));
        assert_eq!(published.load(Ordering::SeqCst), 2);

        // Draining one block frees exactly one more slot.
        let block = pipeline.acquire_for_scan().unwrap();
        pipeline.release_scanned(block);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(published.load(Ordering::SeqCst), 3);

        pipeline.stop();
        producer.join().unwrap();
    }

    #[test]
    fn stop_wakes_a_blocked_producer() {
        let pipeline = Arc::new(Pipeline::new(BLOCK_BYTES, 0));
        let producer = spawn_producer(&pipeline, usize::MAX);

        thread::sleep(Duration::from_millis(50));
        pipeline.stop();
        // Two publishes fit before the producer blocks on a full pipeline.
        assert_eq!(producer.join().unwrap(), 2);
    }

    #[test]
    fn stop_wakes_a_blocked_consumer() {
        let pipeline = Arc::new(Pipeline::new(BLOCK_BYTES, 0));
        let consumer = {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || pipeline.acquire_for_scan().is_none())
        };

        thread::sleep(Duration::from_millis(50));
        pipeline.stop();
        assert!(consumer.join().unwrap());
    }

    #[test]
    fn consumer_waits_until_a_block_is_ready() {
        let pipeline = Arc::new(Pipeline::new(BLOCK_BYTES, 0));
        let got = Arc::new(AtomicUsize::new(0));

        let consumer = {
            let pipeline = Arc::clone(&pipeline);
            let got = Arc::clone(&got);
            thread::spawn(move || {
                let block = pipeline.acquire_for_scan().unwrap();
                got.store(1, Ordering::SeqCst);
                pipeline.release_scanned(block);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(got.load(Ordering::SeqCst), 0, "nothing published yet");

        let producer = spawn_producer(&pipeline, 1);
        producer.join().unwrap();
        consumer.join().unwrap();
        assert_eq!(got.load(Ordering::SeqCst), 1);
    }
}
