//! Debug-only consistency checker: walks the whole heap and its bucket
//! directory, asserting the block-layout and free-list invariants.
//!
//! `check_heap` is only compiled when `debug_assertions` are enabled, the
//! same cfg the rest of this crate's internal `debug_assert!` calls use,
//! rather than a bespoke feature flag.

use crate::block::{self, Addr};
#[cfg(debug_assertions)]
use crate::block::MIN_BLOCK_SIZE;
#[cfg(debug_assertions)]
use crate::freelist::{self, FreeListDirectory};
#[cfg(debug_assertions)]
use crate::heap::Allocator;
#[cfg(debug_assertions)]
use crate::provider::PageProvider;

/// Prints a block's decoded header — size, self/prev-allocated, prev-is-min
/// — to stderr.
///
/// # Safety
/// `b` must address a live header word.
pub unsafe fn print_alloc(b: Addr) {
  unsafe {
    eprintln!(
      "block {b:#x}: size={} self_alloc={} prev_alloc={} prev_is_min={}",
      block::size(b),
      block::self_alloc(b),
      block::prev_alloc(b),
      block::prev_is_min(b),
    );
  }
}

/// Walks the implicit list and the bucket directory, panicking on the
/// first invariant violation found. `line` identifies the call site for
/// diagnostics.
#[cfg(debug_assertions)]
pub fn check_heap<P: PageProvider>(alloc: &Allocator<P>, line: u32) {
  unsafe {
    check_sentinels(alloc, line);
    let implicit_free_count = check_implicit_list(alloc, line);
    let bucket_free_count = check_buckets(&alloc.freelist, line);
    assert_eq!(
      implicit_free_count, bucket_free_count,
      "check_heap[{line}]: implicit-list free count ({implicit_free_count}) != bucket free count ({bucket_free_count})"
    );
  }
}

#[cfg(debug_assertions)]
unsafe fn check_sentinels<P: PageProvider>(alloc: &Allocator<P>, line: u32) {
  unsafe {
    let prologue = alloc.heap_start - crate::heap::PROLOGUE_SIZE;
    assert_eq!(block::size(prologue), 0, "check_heap[{line}]: prologue size must be 0");
    assert!(block::self_alloc(prologue), "check_heap[{line}]: prologue must be self-allocated");
    assert!(block::prev_alloc(prologue), "check_heap[{line}]: prologue prev-allocated must be set");

    assert_eq!(block::size(alloc.epilogue), 0, "check_heap[{line}]: epilogue size must be 0");
    assert!(block::self_alloc(alloc.epilogue), "check_heap[{line}]: epilogue must be self-allocated");
  }
}

/// Walks the implicit list from the first real block to the epilogue,
/// checking bounds, bit-coherence, the no-adjacent-free invariant, and
/// footer mirroring. Returns the number of free blocks seen.
#[cfg(debug_assertions)]
unsafe fn check_implicit_list<P: PageProvider>(alloc: &Allocator<P>, line: u32) -> usize {
  let mut b = alloc.heap_start;
  let mut prev_was_free = false;
  let mut free_count = 0;

  unsafe {
    while b != alloc.epilogue {
      assert!(
        b >= alloc.heap_start && b < alloc.epilogue,
        "check_heap[{line}]: block {b:#x} lies outside the heap"
      );
      assert_eq!(b % 16, 0, "check_heap[{line}]: block {b:#x} is not 16-byte aligned");

      let size = block::size(b);
      assert!(size >= MIN_BLOCK_SIZE, "check_heap[{line}]: block {b:#x} smaller than MIN_BLOCK_SIZE");
      assert_eq!(size % 16, 0, "check_heap[{line}]: block {b:#x} size not a multiple of 16");

      let is_free = !block::self_alloc(b);
      assert!(
        !(prev_was_free && is_free),
        "check_heap[{line}]: two adjacent free blocks at/around {b:#x}"
      );

      if is_free {
        free_count += 1;
        if size > MIN_BLOCK_SIZE {
          let header_word = core::ptr::read(b as *const u64);
          let footer_word = core::ptr::read(block::footer(b) as *const u64);
          assert_eq!(header_word, footer_word, "check_heap[{line}]: header/footer mismatch at {b:#x}");
        }
      }

      prev_was_free = is_free;
      b = block::next_on_heap(b);
    }
  }

  free_count
}

/// Checks each bucket's members fall within its size class and (for
/// doubly linked buckets) satisfy the circular `next`/`prev` coherence
/// invariant. Returns the total member count across all buckets.
#[cfg(debug_assertions)]
unsafe fn check_buckets(dir: &FreeListDirectory, line: u32) -> usize {
  let mut total = 0;

  for i in 0..freelist::BUCKET_COUNT {
    let members: Vec<Addr> = dir.scan(i, usize::MAX).collect();
    total += members.len();

    for &b in &members {
      let size = unsafe { block::size(b) };
      assert_eq!(
        freelist::bucket_index(size),
        i,
        "check_heap[{line}]: block {b:#x} (size {size}) lives in bucket {i}, expected {}",
        freelist::bucket_index(size)
      );

      if i > 0 {
        let next = unsafe { block::read_link_next(b) };
        let prev = unsafe { block::read_link_prev(b) };
        assert_eq!(
          unsafe { block::read_link_prev(next) },
          b,
          "check_heap[{line}]: x.next.prev != x for block {b:#x}"
        );
        assert_eq!(
          unsafe { block::read_link_next(prev) },
          b,
          "check_heap[{line}]: x.prev.next != x for block {b:#x}"
        );
      }
    }
  }

  total
}
