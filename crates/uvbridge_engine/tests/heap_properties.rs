//! Randomized allocator properties.
//!
//! A seeded mix of malloc / realloc / free must never hand out overlapping
//! or misaligned blocks, must keep block contents across moves, and must
//! return to the starting block count once everything is freed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use uvbridge_engine::{EngineHeap, BLOCK_ALIGN};
use uvbridge_memory::{Address, HeapBuffer, MemoryViews};

const OPERATIONS: usize = 2_000;

#[test]
fn test_random_allocation_sequence() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xA71A5);
    let mut memory = MemoryViews::new(HeapBuffer::new(1, 64).unwrap());
    let mut heap = EngineHeap::new(&memory);

    // (address, requested size, fill byte)
    let mut live: Vec<(Address, u32, u8)> = Vec::new();

    for step in 0..OPERATIONS {
        match rng.gen_range(0..3) {
            0 | 1 if live.len() < 64 => {
                let size = rng.gen_range(1..4096);
                let address = heap.malloc(&mut memory, size);
                assert!(!address.is_null(), "step {step}: malloc({size}) failed");
                assert!(address.is_aligned(BLOCK_ALIGN));
                let fill = rng.gen();
                memory.fill(address, size as usize, fill).unwrap();
                live.push((address, size, fill));
            }
            2 if !live.is_empty() && rng.gen_bool(0.3) => {
                let index = rng.gen_range(0..live.len());
                let (address, size, fill) = live[index];
                let grown = size + rng.gen_range(1..2048);
                let moved = heap.realloc(&mut memory, address, grown);
                assert!(!moved.is_null());
                assert!(memory.read_u8(moved, size as usize).unwrap().iter().all(|&b| b == fill));
                memory.fill(moved, grown as usize, fill).unwrap();
                live[index] = (moved, grown, fill);
            }
            _ if !live.is_empty() => {
                let index = rng.gen_range(0..live.len());
                let (address, size, fill) = live.swap_remove(index);
                assert!(memory.read_u8(address, size as usize).unwrap().iter().all(|&b| b == fill));
                heap.free(address);
            }
            _ => {}
        }

        let mut ranges: Vec<(u32, u32)> = live.iter().map(|&(a, s, _)| (a.get(), a.get() + s)).collect();
        ranges.sort_unstable();
        assert!(ranges.windows(2).all(|w| w[0].1 <= w[1].0), "step {step}: overlapping blocks");
    }

    for (address, _, _) in live.drain(..) {
        heap.free(address);
    }
    assert_eq!(heap.live_blocks(), 0);
    assert_eq!(heap.live_bytes(), 0);
}
