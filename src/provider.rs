//! The page-granularity provider this allocator builds on: a
//! `heap_extend(n) -> base_or_fail` call plus a heap-low/heap-high query.
//! This crate supplies two implementations: [`SbrkProvider`], a thin
//! wrapper over `libc::sbrk`, and [`ArenaProvider`], a fixed-capacity
//! in-process stand-in used by the unit tests so they don't fight over the
//! real, process-global program break.
use libc::{c_void, intptr_t, sbrk};

use crate::error::AllocError;

/// A page-granularity memory source the heap shell extends into.
///
/// Implementations must guarantee that once `extend` returns a base
/// address, the region `[base, base + n)` stays valid and at that address
/// for the provider's lifetime — the allocator never returns memory to the
/// provider, so addresses are never invalidated by a later call.
pub trait PageProvider {
  /// Requests `n` additional bytes from the provider. Returns the address
  /// of the new region on success.
  fn extend(&mut self, n: usize) -> Result<usize, AllocError>;

  /// The address of the first byte ever handed out by this provider, or 0
  /// if `extend` has never been called.
  fn heap_low(&self) -> usize;

  /// The address one past the last byte ever handed out by this provider
  /// (i.e. the current program break), or 0 if `extend` has never been
  /// called.
  fn heap_high(&self) -> usize;
}

/// A [`PageProvider`] backed by `sbrk(2)`.
///
/// `sbrk` extends the process's data segment in place, so addresses handed
/// out here are stable for the life of the process — exactly the guarantee
/// `PageProvider` requires.
#[derive(Debug, Default)]
pub struct SbrkProvider {
  low: usize,
  high: usize,
}

impl SbrkProvider {
  /// Creates a provider that has not yet requested any memory.
  pub const fn new() -> Self {
    Self { low: 0, high: 0 }
  }
}

impl PageProvider for SbrkProvider {
  fn extend(&mut self, n: usize) -> Result<usize, AllocError> {
    let raw = unsafe { sbrk(n as intptr_t) };
    if raw == usize::MAX as *mut c_void {
      return Err(AllocError::ProviderExhausted);
    }

    let base = raw as usize;
    if self.low == 0 {
      self.low = base;
    }
    self.high = base + n;
    Ok(base)
  }

  fn heap_low(&self) -> usize {
    self.low
  }

  fn heap_high(&self) -> usize {
    self.high
  }
}

/// A fixed-capacity [`PageProvider`] backed by a single heap allocation made
/// once up front, used by this crate's own tests.
///
/// A growable `Vec<u8>` would not work here: reallocating the backing
/// buffer on growth would move every address the allocator has already
/// handed out, violating the stability guarantee `PageProvider` requires.
/// `ArenaProvider` instead reserves `capacity` bytes at construction and
/// only ever bumps a high-water mark inside that fixed region, the same
/// shape `sbrk` has against the real process break.
pub struct ArenaProvider {
  arena: Box<[u8]>,
  base: usize,
  cursor: usize,
}

impl ArenaProvider {
  /// Reserves `capacity` bytes of backing storage. No bytes are handed out
  /// to the allocator until `extend` is called.
  pub fn new(capacity: usize) -> Self {
    let arena = vec![0u8; capacity].into_boxed_slice();
    let base = arena.as_ptr() as usize;
    Self { arena, base, cursor: 0 }
  }

  /// Total backing capacity, used by tests that want to drive the provider
  /// to exhaustion.
  pub fn capacity(&self) -> usize {
    self.arena.len()
  }
}

impl PageProvider for ArenaProvider {
  fn extend(&mut self, n: usize) -> Result<usize, AllocError> {
    let new_cursor = self
      .cursor
      .checked_add(n)
      .filter(|&c| c <= self.arena.len())
      .ok_or(AllocError::ProviderExhausted)?;

    let base = self.base + self.cursor;
    self.cursor = new_cursor;
    Ok(base)
  }

  fn heap_low(&self) -> usize {
    self.base
  }

  fn heap_high(&self) -> usize {
    self.base + self.cursor
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn arena_provider_extends_contiguously() {
    let mut provider = ArenaProvider::new(4096);

    let a = provider.extend(64).unwrap();
    let b = provider.extend(128).unwrap();

    assert_eq!(b, a + 64);
    assert_eq!(provider.heap_low(), a);
    assert_eq!(provider.heap_high(), b + 128);
  }

  #[test]
  fn arena_provider_reports_exhaustion() {
    let mut provider = ArenaProvider::new(128);

    assert!(provider.extend(100).is_ok());
    assert_eq!(provider.extend(100), Err(AllocError::ProviderExhausted));
  }
}
