//! First-fit free-list allocator over a fixed range of linear memory.

use std::collections::BTreeMap;

/// Every block starts on this boundary, matching `malloc` on wasm32.
pub const ALIGN: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    address: u32,
    size: u32,
}

/// Allocation counters, used to check that nothing leaks or is freed twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    pub allocs: u64,
    pub frees: u64,
    /// Frees of addresses that were not live (double frees, wild pointers).
    pub invalid_frees: u64,
    pub failed_allocs: u64,
    /// Highest end address ever handed out.
    pub high_water: u32,
}

#[derive(Debug)]
pub struct FreeListAllocator {
    /// Free blocks sorted by address, never adjacent (always coalesced).
    free: Vec<Block>,
    /// Live blocks: address -> rounded size.
    live: BTreeMap<u32, u32>,
    stats: AllocStats,
}

impl FreeListAllocator {
    /// Manage `base..limit`. `base` must be non-zero so 0 can mean failure.
    pub fn new(base: u32, limit: u32) -> Self {
        let base = base.max(ALIGN).next_multiple_of(ALIGN);
        let free = if limit > base {
            vec![Block {
                address: base,
                size: limit - base,
            }]
        } else {
            Vec::new()
        };
        Self {
            free,
            live: BTreeMap::new(),
            stats: AllocStats {
                high_water: base,
                ..AllocStats::default()
            },
        }
    }

    /// Returns 0 when no free block is large enough.
    pub fn allocate(&mut self, size: u32) -> u32 {
        let Some(need) = size.max(1).checked_next_multiple_of(ALIGN) else {
            self.stats.failed_allocs += 1;
            return 0;
        };
        let Some(index) = self.free.iter().position(|b| b.size >= need) else {
            self.stats.failed_allocs += 1;
            return 0;
        };

        let block = &mut self.free[index];
        let address = block.address;
        if block.size == need {
            self.free.remove(index);
        } else {
            block.address += need;
            block.size -= need;
        }

        self.live.insert(address, need);
        self.stats.allocs += 1;
        self.stats.high_water = self.stats.high_water.max(address + need);
        address
    }

    /// Returns false (and counts it) if `address` was not live.
    pub fn free(&mut self, address: u32) -> bool {
        let Some(size) = self.live.remove(&address) else {
            self.stats.invalid_frees += 1;
            return false;
        };
        self.stats.frees += 1;

        let index = self.free.partition_point(|b| b.address < address);
        self.free.insert(index, Block { address, size });

        // Merge with the following block, then with the preceding one.
        if index + 1 < self.free.len() {
            let next = self.free[index + 1];
            if address + size == next.address {
                self.free[index].size += next.size;
                self.free.remove(index + 1);
            }
        }
        if index > 0 {
            let prev = self.free[index - 1];
            if prev.address + prev.size == address {
                self.free[index - 1].size += self.free[index].size;
                self.free.remove(index);
            }
        }
        true
    }

    pub fn is_live(&self, address: u32) -> bool {
        self.live.contains_key(&address)
    }

    pub fn live_blocks(&self) -> usize {
        self.live.len()
    }

    pub fn live_bytes(&self) -> u32 {
        self.live.values().sum()
    }

    pub fn stats(&self) -> AllocStats {
        self.stats
    }
}
