//! Fixed-capacity pool of player ids.
//!
//! Ids are handed out lowest-first from `[0, capacity)`, so a freed id is reused
//! by the next join before any higher one.

use shared::{NetError, Result};

/// Hands out player ids from a fixed range.
///
/// The allocator is owned by the session registry and mutated only from the
/// server loop, so it needs no interior locking.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    taken: Vec<bool>,
    in_use: u32,
}

impl IdAllocator {
    pub fn new(capacity: u32) -> Self {
        Self {
            taken: vec![false; capacity as usize],
            in_use: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.taken.len() as u32
    }

    /// Number of ids currently allocated.
    pub fn in_use(&self) -> u32 {
        self.in_use
    }

    /// True iff at least one id is free.
    pub fn has_capacity(&self) -> bool {
        self.in_use < self.capacity()
    }

    pub fn is_taken(&self, id: u32) -> bool {
        self.taken.get(id as usize).copied().unwrap_or(false)
    }

    /// Takes the lowest free id.
    pub fn allocate(&mut self) -> Result<u32> {
        let slot = self
            .taken
            .iter()
            .position(|taken| !taken)
            .ok_or(NetError::PoolExhausted {
                capacity: self.capacity(),
            })?;
        self.taken[slot] = true;
        self.in_use += 1;
        Ok(slot as u32)
    }

    /// Returns `id` to the pool. Releasing a free id is a no-op.
    pub fn release(&mut self, id: u32) -> Result<()> {
        let capacity = self.capacity();
        let slot = self
            .taken
            .get_mut(id as usize)
            .ok_or(NetError::InvalidId { id, capacity })?;
        if *slot {
            *slot = false;
            self.in_use -= 1;
        }
        Ok(())
    }
}
