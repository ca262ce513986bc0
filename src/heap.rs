//! The heap shell: prologue/epilogue sentinels, heap extension, and the
//! public entry points — `allocate`, `release`, `reallocate`,
//! `zero_allocate` — built on the block codec, the free-list directory, and
//! the transition/placement engines.
//!
//! The allocator's state (`heap_start`, `epilogue`, and the bucket
//! directory) lives in one value type and the public surface is exposed as
//! methods on it, so tests stay parallelizable even though a single
//! instance is single-threaded.
use log::warn;

use crate::align;
use crate::block::{self, Addr, HEADER_SIZE, MIN_BLOCK_SIZE};
use crate::engine;
use crate::error::AllocError;
use crate::freelist::FreeListDirectory;
use crate::provider::PageProvider;

/// Size, in bytes, of the prologue sentinel (one header word, no payload).
pub(crate) const PROLOGUE_SIZE: usize = HEADER_SIZE;

/// Size, in bytes, of the epilogue sentinel (one header word).
const EPILOGUE_SIZE: usize = HEADER_SIZE;

/// Default extension granularity: when `find_fit` misses, the heap grows by
/// at least this many bytes.
pub const CHUNK: usize = 4096;

/// A segregated free-list allocator over a single, monotonically
/// extensible heap region obtained from `P`.
///
/// # Thread safety
///
/// Not thread-safe: every method takes `&mut self`, and the provider `P`
/// is expected to serialize its own calls with the allocator's, never to
/// be driven concurrently.
pub struct Allocator<P: PageProvider> {
  provider: P,
  /// Address of the first real block, immediately after the prologue.
  pub(crate) heap_start: Addr,
  /// Address of the epilogue header (one past the last real block).
  pub(crate) epilogue: Addr,
  pub(crate) freelist: FreeListDirectory,
}

impl<P: PageProvider> Allocator<P> {
  /// Initializes the allocator: writes the prologue and epilogue sentinels
  /// and seeds an initial free block by extending the heap by [`CHUNK`]
  /// bytes.
  ///
  /// Returns `Err` if the provider refuses the initial pages.
  pub fn init(mut provider: P) -> Result<Self, AllocError> {
    let base = provider.extend(PROLOGUE_SIZE + EPILOGUE_SIZE)?;
    let prologue = base;
    let heap_start = base + PROLOGUE_SIZE;

    unsafe {
      // Prologue: size 0, fixed sentinel encoding.
      block::write_header(prologue, 0, true, true, true);
      // Initial epilogue: its predecessor is the prologue, which has size
      // 0 (not 16), so prev-is-min is false here.
      block::write_header(heap_start, 0, false, true, true);
    }

    let mut alloc = Self { provider, heap_start, epilogue: heap_start, freelist: FreeListDirectory::new() };
    alloc.extend_heap(CHUNK)?;
    Ok(alloc)
  }

  /// Extends the heap by at least `n` bytes (rounded up to 16), replacing
  /// the old epilogue with a fresh free block and writing a new epilogue
  /// at the new high end. Coalesces with the previous tail if it was free.
  fn extend_heap(&mut self, n: usize) -> Result<(), AllocError> {
    let n = align!(n, align::BLOCK_ALIGN);
    let old_epilogue = self.epilogue;
    let prev_alloc = unsafe { block::prev_alloc(old_epilogue) };
    let prev_is_min = unsafe { block::prev_is_min(old_epilogue) };

    let base = self.provider.extend(n).inspect_err(|_| {
      warn!("extend_heap: provider refused to extend by {n} bytes");
    })?;
    debug_assert_eq!(base, old_epilogue, "provider must extend contiguously from the last epilogue");

    // The old epilogue becomes the header of a new free block spanning the
    // freshly extended region.
    unsafe {
      block::write_header(old_epilogue, n, prev_is_min, prev_alloc, false);
      if n > MIN_BLOCK_SIZE {
        block::write_footer(old_epilogue);
      }
      self.freelist.insert(old_epilogue, n);
    }

    self.epilogue = old_epilogue + n;
    unsafe {
      block::write_header(self.epilogue, 0, n == MIN_BLOCK_SIZE, false, true);
    }

    unsafe {
      engine::coalesce(&mut self.freelist, old_epilogue);
    }

    Ok(())
  }

  /// Allocates `size` bytes, returning a 16-byte-aligned address or `None`
  /// on overflow/exhaustion, or when `size == 0`.
  pub fn allocate(&mut self, size: usize) -> Option<Addr> {
    if size == 0 {
      return None;
    }

    let asize = align!(size + HEADER_SIZE, align::BLOCK_ALIGN).max(MIN_BLOCK_SIZE);

    let b = match engine::find_fit(&self.freelist, asize) {
      Some(b) => b,
      None => {
        self.extend_heap(asize.max(CHUNK)).ok()?;
        engine::find_fit(&self.freelist, asize)?
      }
    };

    unsafe {
      let original_size = engine::free_to_alloc(&mut self.freelist, b);
      engine::modify_next(b);
      engine::split(&mut self.freelist, b, asize, original_size);
    }

    #[cfg(debug_assertions)]
    crate::check::check_heap(self, line!());

    Some(block::payload(b))
  }

  /// Releases a pointer previously returned by `allocate`/`reallocate`/
  /// `zero_allocate`. A no-op on a null pointer (`p == 0`); undefined
  /// behavior on any other pointer not obtained from this allocator.
  pub fn release(&mut self, p: Addr) {
    if p == 0 {
      return;
    }

    let b = block::payload_to_block(p);
    unsafe {
      let size = block::size(b);
      engine::alloc_to_free(&mut self.freelist, b, size);
      engine::modify_next(b);
      engine::coalesce(&mut self.freelist, b);
    }

    #[cfg(debug_assertions)]
    crate::check::check_heap(self, line!());
  }

  /// Resizes the allocation at `p` to `size` bytes.
  ///
  /// - `size == 0` releases `p` and returns `None`.
  /// - `p == 0` is equivalent to `allocate(size)`.
  /// - Otherwise a fresh block is allocated, `min(size, old payload size)`
  ///   bytes are copied over, and the old block is released. Returns
  ///   `None` (leaving `p` valid) if the fresh allocation fails.
  pub fn reallocate(&mut self, p: Addr, size: usize) -> Option<Addr> {
    if size == 0 {
      self.release(p);
      return None;
    }
    if p == 0 {
      return self.allocate(size);
    }

    let old_block = block::payload_to_block(p);
    let old_payload_size = unsafe { block::payload_size(old_block) };

    let q = self.allocate(size)?;

    let copy_len = size.min(old_payload_size);
    unsafe {
      core::ptr::copy_nonoverlapping(p as *const u8, q as *mut u8, copy_len);
    }
    self.release(p);

    Some(q)
  }

  /// Allocates space for `n` elements of `size` bytes each, zero-filled.
  /// Returns `None` if `n * size` overflows or the allocation fails.
  pub fn zero_allocate(&mut self, n: usize, size: usize) -> Option<Addr> {
    let asize = Self::checked_elem_size(n, size).ok()?;
    let p = self.allocate(asize)?;
    unsafe {
      core::ptr::write_bytes(p as *mut u8, 0, asize);
    }
    Some(p)
  }

  /// Computes `n * size`, failing with [`AllocError::SizeOverflow`] instead
  /// of wrapping. Kept as a `Result`-returning step so `zero_allocate` can
  /// use `?` internally; the public surface still collapses this to `None`.
  fn checked_elem_size(n: usize, size: usize) -> Result<usize, AllocError> {
    n.checked_mul(size).ok_or(AllocError::SizeOverflow)
  }

  /// Payload size visible to the caller for the allocated block at `p`.
  pub fn payload_size(&self, p: Addr) -> usize {
    let b = block::payload_to_block(p);
    unsafe { block::payload_size(b) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::provider::ArenaProvider;

  fn fresh() -> Allocator<ArenaProvider> {
    let _ = env_logger::builder().is_test(true).try_init();
    Allocator::init(ArenaProvider::new(1 << 20)).unwrap()
  }

  #[test]
  fn init_writes_prologue_and_epilogue() {
    let alloc = fresh();
    unsafe {
      let prologue = alloc.heap_start - PROLOGUE_SIZE;
      assert_eq!(block::size(prologue), 0);
      assert!(block::self_alloc(prologue));
      assert_eq!(block::size(alloc.epilogue), 0);
      assert!(block::self_alloc(alloc.epilogue));
    }
  }

  #[test]
  fn allocate_returns_aligned_distinct_pointers() {
    let mut alloc = fresh();
    let p1 = alloc.allocate(1).unwrap();
    let p2 = alloc.allocate(1).unwrap();

    assert_ne!(p1, p2);
    assert_eq!(p1 % 16, 0);
    assert_eq!(p2 % 16, 0);

    let b1 = block::payload_to_block(p1);
    unsafe {
      assert_eq!(block::size(b1), MIN_BLOCK_SIZE);
      let next = block::next_on_heap(b1);
      assert!(block::prev_is_min(next));
    }
  }

  #[test]
  fn allocate_zero_returns_none() {
    let mut alloc = fresh();
    assert!(alloc.allocate(0).is_none());
  }

  #[test]
  fn release_null_is_noop() {
    let mut alloc = fresh();
    alloc.release(0);
  }

  #[test]
  fn release_reuses_freed_block_of_same_size() {
    let mut alloc = fresh();
    let p = alloc.allocate(4000).unwrap();
    alloc.release(p);

    let b = block::payload_to_block(p);
    unsafe {
      assert!(!block::self_alloc(b));
    }
    let epilogue_prev_alloc = unsafe { block::prev_alloc(alloc.epilogue) };
    assert!(!epilogue_prev_alloc);
  }

  #[test]
  fn three_releases_coalesce_into_one_block() {
    let mut alloc = fresh();
    let a = alloc.allocate(32).unwrap();
    let b = alloc.allocate(32).unwrap();
    let c = alloc.allocate(32).unwrap();

    alloc.release(a);
    alloc.release(c);
    alloc.release(b);

    let block_a = block::payload_to_block(a);
    let size = unsafe { block::size(block_a) };
    let bucket = crate::freelist::bucket_index(size);
    assert_eq!(alloc.freelist.scan(bucket, usize::MAX).filter(|&addr| addr == block_a).count(), 1);
  }

  #[test]
  fn reallocate_preserves_payload_bytes() {
    let mut alloc = fresh();
    let a = alloc.allocate(100).unwrap();
    unsafe {
      core::ptr::write_bytes(a as *mut u8, 0xAA, 100);
    }
    let b = alloc.reallocate(a, 200).unwrap();
    let bytes = unsafe { core::slice::from_raw_parts(b as *const u8, 100) };
    assert!(bytes.iter().all(|&byte| byte == 0xAA));
  }

  #[test]
  fn reallocate_zero_releases_and_returns_none() {
    let mut alloc = fresh();
    let a = alloc.allocate(64).unwrap();
    assert!(alloc.reallocate(a, 0).is_none());
  }

  #[test]
  fn reallocate_null_allocates() {
    let mut alloc = fresh();
    let p = alloc.reallocate(0, 64);
    assert!(p.is_some());
  }

  #[test]
  fn zero_allocate_overflow_returns_none() {
    let mut alloc = fresh();
    assert!(alloc.zero_allocate(usize::MAX, 2).is_none());
  }

  #[test]
  fn checked_elem_size_reports_overflow() {
    assert_eq!(
      Allocator::<ArenaProvider>::checked_elem_size(usize::MAX, 2),
      Err(AllocError::SizeOverflow)
    );
    assert_eq!(Allocator::<ArenaProvider>::checked_elem_size(16, 4), Ok(64));
  }

  #[test]
  fn zero_allocate_zero_fills_region() {
    let mut alloc = fresh();
    let p = alloc.zero_allocate(16, 4).unwrap();
    let bytes = unsafe { core::slice::from_raw_parts(p as *const u8, 64) };
    assert!(bytes.iter().all(|&b| b == 0));
  }

  #[test]
  fn exhaustion_returns_none_and_release_still_restores_invariants() {
    let mut alloc = Allocator::init(ArenaProvider::new(PROLOGUE_SIZE + EPILOGUE_SIZE + CHUNK)).unwrap();

    let mut last_ok = None;
    loop {
      match alloc.allocate(24) {
        Some(p) => last_ok = Some(p),
        None => break,
      }
    }

    assert!(alloc.allocate(24).is_none());
    if let Some(p) = last_ok {
      alloc.release(p);
    }
  }
}
