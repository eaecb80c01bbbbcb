//! Atomic primitives layer
//!
//! Everything the locks and the pool need from the hardware: relaxed
//! statistics counters, a byte of independently testable flag bits, a
//! full memory barrier and a thread yield. One implementation on top of
//! `core::sync::atomic` serves every platform.

use core::sync::atomic::{fence, AtomicU8, AtomicUsize, Ordering};

/// Issue a sequentially consistent memory barrier
#[inline]
pub fn memory_barrier() {
    fence(Ordering::SeqCst);
}

/// Give up the rest of this thread's time slice
#[inline]
pub fn thread_yield() {
    std::thread::yield_now();
}

/// Compare-and-swap on a byte; `true` if `cell` held `old` and now holds `new`
#[inline]
pub fn compare_and_swap_u8(cell: &AtomicU8, old: u8, new: u8) -> bool {
    cell.compare_exchange(old, new, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

/// Mask for bit number `bit` within a flag byte (bit 0 is the high bit)
#[inline]
pub const fn bit_mask(bit: u8) -> u8 {
    0x80 >> (bit & 7)
}

/// Monotonic statistics counter
///
/// Increments are relaxed: counters are diagnostics, never used to
/// order memory.
#[derive(Debug, Default)]
pub struct Counter(AtomicUsize);

impl Counter {
    pub const fn new() -> Self {
        Counter(AtomicUsize::new(0))
    }

    /// Add one, returning the new value
    #[inline]
    pub fn increment(&self) -> usize {
        self.0.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Subtract one, returning the new value
    #[inline]
    pub fn decrement(&self) -> usize {
        self.0.fetch_sub(1, Ordering::Relaxed).wrapping_sub(1)
    }

    #[inline]
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    /// Reset to zero.
    ///
    /// Not synchronized with concurrent `increment` calls: an increment
    /// racing with the reset may be lost or survive it. Only call while no
    /// other thread is using the owner.
    #[inline]
    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

/// A byte of flag bits that can be set and cleared independently from
/// any thread
#[derive(Debug, Default)]
pub struct AtomicBits(AtomicU8);

impl AtomicBits {
    pub const fn new() -> Self {
        AtomicBits(AtomicU8::new(0))
    }

    /// Set the bits in `mask`, returning whether they were already set
    #[inline]
    pub fn test_and_set(&self, mask: u8) -> bool {
        self.0.fetch_or(mask, Ordering::AcqRel) & mask != 0
    }

    /// Clear the bits in `mask`, returning whether they were set before
    #[inline]
    pub fn test_and_clear(&self, mask: u8) -> bool {
        self.0.fetch_and(!mask, Ordering::AcqRel) & mask != 0
    }

    /// `test_and_set` that warns when the bit was already set
    pub fn set_checked(&self, mask: u8, name: &str) {
        if self.test_and_set(mask) {
            log::warn!("bit was already set: {} (mask {:#04x})", name, mask);
        }
    }

    /// `test_and_clear` that warns when the bit was already clear
    pub fn clear_checked(&self, mask: u8, name: &str) {
        if !self.test_and_clear(mask) {
            log::warn!("bit was already cleared: {} (mask {:#04x})", name, mask);
        }
    }

    #[inline]
    pub fn is_set(&self, mask: u8) -> bool {
        self.0.load(Ordering::Acquire) & mask != 0
    }

    #[inline]
    pub fn load(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counter_increment_decrement() {
        let c = Counter::new();
        assert_eq!(c.increment(), 1);
        assert_eq!(c.increment(), 2);
        assert_eq!(c.decrement(), 1);
        assert_eq!(c.get(), 1);
        c.reset();
        assert_eq!(c.get(), 0);
    }

    #[test]
    fn test_counter_concurrent() {
        let c = Arc::new(Counter::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&c);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        c.increment();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.get(), 4000);
    }

    #[test]
    fn test_bit_masks() {
        assert_eq!(bit_mask(0), 0x80);
        assert_eq!(bit_mask(1), 0x40);
        assert_eq!(bit_mask(2), 0x20);
        assert_eq!(bit_mask(8), 0x80);
    }

    #[test]
    fn test_bits_set_and_clear() {
        let bits = AtomicBits::new();
        assert!(!bits.test_and_set(0x80));
        assert!(bits.test_and_set(0x80));
        assert!(bits.is_set(0x80));
        assert!(!bits.is_set(0x40));

        assert!(!bits.test_and_set(0x40));
        assert_eq!(bits.load(), 0xC0);

        assert!(bits.test_and_clear(0x80));
        assert!(!bits.test_and_clear(0x80));
        assert_eq!(bits.load(), 0x40);
    }

    #[test]
    fn test_bits_single_winner() {
        let bits = Arc::new(AtomicBits::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bits = Arc::clone(&bits);
                thread::spawn(move || !bits.test_and_set(0x20))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_compare_and_swap() {
        let cell = AtomicU8::new(3);
        assert!(!compare_and_swap_u8(&cell, 2, 5));
        assert!(compare_and_swap_u8(&cell, 3, 5));
        assert_eq!(cell.load(Ordering::Relaxed), 5);
        memory_barrier();
    }
}
