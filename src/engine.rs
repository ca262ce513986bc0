//! The transition engine (`free_to_alloc`, `alloc_to_free`, `modify_next`,
//! `split`, `coalesce`) and the placement engine (`find_fit`).
//!
//! Every transition here must leave the block-layout and free-list
//! invariants intact; `check::check_heap` audits them under
//! `debug_assertions`.
use log::{debug, trace};

use crate::block::{self, Addr, MIN_BLOCK_SIZE};
use crate::freelist::FreeListDirectory;

/// Maximum number of blocks `find_fit` inspects per bucket before moving on
/// (or returning its best candidate so far).
pub const SEARCH_LIMIT: usize = 16;

/// A near-exact fit is accepted immediately if it wastes no more than this
/// many bytes.
const EXACT_FIT_SLACK: usize = 16;

/// Finds a free block of at least `asize` bytes using a size-class-directed,
/// bounded best-fit search.
///
/// Starting from the first bucket whose size class can hold `asize`, each
/// bucket is scanned up to [`SEARCH_LIMIT`] candidates. A block within
/// [`EXACT_FIT_SLACK`] bytes of `asize` is returned immediately; otherwise
/// the scan tracks the tightest fit seen and, failing to find one in this
/// bucket, moves to the next.
pub fn find_fit(dir: &FreeListDirectory, asize: usize) -> Option<Addr> {
  let i0 = crate::freelist::bucket_index(asize);

  for i in i0..crate::freelist::BUCKET_COUNT {
    trace!("find_fit: scanning bucket {i} for asize {asize}");
    let mut best: Option<(Addr, usize)> = None;

    for b in dir.scan(i, SEARCH_LIMIT) {
      let size = unsafe { block::size(b) };
      if size < asize {
        continue;
      }
      let slack = size - asize;
      if slack <= EXACT_FIT_SLACK {
        trace!("find_fit: near-exact fit {b:#x} (slack {slack})");
        return Some(b);
      }
      if best.is_none_or(|(_, best_slack)| slack < best_slack) {
        best = Some((b, slack));
      }
    }

    if let Some((b, _)) = best {
      return Some(b);
    }
  }

  None
}

/// Transitions a free block `b` to allocated: removes it from its bucket
/// and flips `self-allocated`, preserving the predecessor bits and the
/// block's current (pre-split) size. Returns that size, since `split`
/// needs it to compute how much tail to carve off.
///
/// # Safety
/// `b` must address a free block.
pub unsafe fn free_to_alloc(dir: &mut FreeListDirectory, b: Addr) -> usize {
  unsafe {
    let size = block::size(b);
    dir.remove(b, size);
    let prev_alloc = block::prev_alloc(b);
    let prev_is_min = block::prev_is_min(b);
    block::write_header(b, size, prev_is_min, prev_alloc, true);
    size
  }
}

/// Transitions an allocated block `b` of `size` bytes to free: flips
/// `self-allocated`, writes a footer if the block is not minimum-size, and
/// inserts it into the appropriate bucket.
///
/// # Safety
/// `b` must address an allocated block of exactly `size` bytes.
pub unsafe fn alloc_to_free(dir: &mut FreeListDirectory, b: Addr, size: usize) {
  unsafe {
    let prev_alloc = block::prev_alloc(b);
    let prev_is_min = block::prev_is_min(b);
    block::write_header(b, size, prev_is_min, prev_alloc, false);
    if size > MIN_BLOCK_SIZE {
      block::write_footer(b);
    }
    dir.insert(b, size);
  }
}

/// Rewrites the predecessor-state bits of `b`'s successor on the implicit
/// list to reflect `b`'s new state. Called after every operation that
/// changes a block's size or allocation state.
///
/// # Safety
/// `b` must address a live header word, and its successor (`next_on_heap`)
/// must be a live header word too (the epilogue counts).
pub unsafe fn modify_next(b: Addr) {
  unsafe {
    let n = block::next_on_heap(b);
    let prev_alloc = block::self_alloc(b);
    let prev_is_min = block::size(b) == MIN_BLOCK_SIZE;
    block::rewrite_prev_state(n, prev_alloc, prev_is_min);
  }
}

/// Splits `b` after it has just been transitioned to allocated with
/// `free_to_alloc`, carving off a free tail when the remainder would be at
/// least [`MIN_BLOCK_SIZE`] bytes.
///
/// # Safety
/// `b` must address a block just transitioned to allocated, with
/// `block::size(b)` still its pre-split (original free-block) size passed
/// in as `original_size`.
pub unsafe fn split(dir: &mut FreeListDirectory, b: Addr, asize: usize, original_size: usize) {
  let remainder = original_size - asize;
  if remainder < MIN_BLOCK_SIZE {
    return;
  }

  debug!("split: carving block {b:#x} ({original_size} bytes) into {asize} + {remainder}");

  unsafe {
    let self_alloc = block::self_alloc(b);
    let prev_alloc = block::prev_alloc(b);
    let prev_is_min = block::prev_is_min(b);
    block::write_header(b, asize, prev_is_min, prev_alloc, self_alloc);

    // The tail's predecessor is now b: always allocated, minimum-size iff
    // asize == MIN_BLOCK_SIZE. These bits are known directly, so the tail
    // is written once with its final header rather than patched after the
    // fact by a second pass over `modify_next(b)`.
    let t = b + asize;
    let t_prev_is_min = asize == MIN_BLOCK_SIZE;
    block::write_header(t, remainder, t_prev_is_min, true, false);
    if remainder > MIN_BLOCK_SIZE {
      block::write_footer(t);
    }
    dir.insert(t, remainder);

    modify_next(t);
  }
}

/// Merges `b`, just transitioned to free by `alloc_to_free`, with any free
/// implicit-list neighbors. Must be called immediately after
/// `alloc_to_free` and its matching `modify_next`.
///
/// The prologue is always encoded allocated, so the very first real
/// block's `prev_alloc` bit is always true and this never mistakes the
/// prologue for a free predecessor — no special-casing of `heap_start` is
/// needed here.
///
/// # Safety
/// `b` must address a free block whose implicit-list neighbors (successor
/// always, predecessor when `prev_alloc(b)` is false) are live header
/// words.
pub unsafe fn coalesce(dir: &mut FreeListDirectory, b: Addr) {
  unsafe {
    let b_size = block::size(b);
    let n = block::next_on_heap(b);
    let n_free = !block::self_alloc(n);

    let p_free = !block::prev_alloc(b);
    let p = if p_free { Some(block::prev_on_heap(b)) } else { None };

    match (p, n_free) {
      (Some(p), true) => {
        debug!("coalesce: merging predecessor {p:#x}, block {b:#x}, successor {n:#x}");
        let p_size = block::size(p);
        let n_size = block::size(n);
        dir.remove(b, b_size);
        dir.remove(p, p_size);
        dir.remove(n, n_size);

        let merged_size = p_size + b_size + n_size;
        let prev_alloc = block::prev_alloc(p);
        let prev_is_min = block::prev_is_min(p);
        block::write_header(p, merged_size, prev_is_min, prev_alloc, false);
        block::write_footer(p);
        dir.insert(p, merged_size);
        modify_next(p);
      }
      (Some(p), false) => {
        debug!("coalesce: merging predecessor {p:#x} with block {b:#x}");
        let p_size = block::size(p);
        dir.remove(b, b_size);
        dir.remove(p, p_size);

        let merged_size = p_size + b_size;
        let prev_alloc = block::prev_alloc(p);
        let prev_is_min = block::prev_is_min(p);
        block::write_header(p, merged_size, prev_is_min, prev_alloc, false);
        block::write_footer(p);
        dir.insert(p, merged_size);
        modify_next(p);
      }
      (None, true) => {
        debug!("coalesce: merging block {b:#x} with successor {n:#x}");
        let n_size = block::size(n);
        dir.remove(b, b_size);
        dir.remove(n, n_size);

        let merged_size = b_size + n_size;
        let prev_alloc = block::prev_alloc(b);
        let prev_is_min = block::prev_is_min(b);
        block::write_header(b, merged_size, prev_is_min, prev_alloc, false);
        block::write_footer(b);
        dir.insert(b, merged_size);
        modify_next(b);
      }
      (None, false) => {
        trace!("coalesce: block {b:#x} has no free neighbors");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn setup_two_blocks(sizes: [usize; 2]) -> (Vec<u8>, Addr) {
    let total: usize = sizes.iter().sum::<usize>() + block::HEADER_SIZE;
    let mut buf = vec![0u8; total];
    let base = buf.as_mut_ptr() as usize;

    unsafe {
      block::write_header(base, sizes[0], true, true, true);
      block::write_header(base + sizes[0], sizes[1], false, true, true);
      block::write_header(base + sizes[0] + sizes[1], 0, false, true, true);
    }
    (buf, base)
  }

  #[test]
  fn free_to_alloc_then_alloc_to_free_roundtrip() {
    let (mut _buf, base) = setup_two_blocks([32, 32]);
    let mut dir = FreeListDirectory::new();

    unsafe {
      block::write_header(base, 32, true, true, false);
      block::write_footer(base);
      dir.insert(base, 32);

      let removed_size = free_to_alloc(&mut dir, base);
      assert_eq!(removed_size, 32);
      assert!(block::self_alloc(base));
      assert_eq!(dir.head(crate::freelist::bucket_index(32)), None);

      alloc_to_free(&mut dir, base, 32);
      assert!(!block::self_alloc(base));
      assert_eq!(dir.head(crate::freelist::bucket_index(32)), Some(base));
    }
  }

  #[test]
  fn split_carves_tail_when_remainder_is_large_enough() {
    let (mut _buf, base) = setup_two_blocks([64, 16]);
    let mut dir = FreeListDirectory::new();

    unsafe {
      block::write_header(base, 64, true, true, true);
      split(&mut dir, base, 32, 64);

      assert_eq!(block::size(base), 32);
      assert!(block::self_alloc(base));

      let tail = base + 32;
      assert_eq!(block::size(tail), 32);
      assert!(!block::self_alloc(tail));
      assert!(block::prev_alloc(tail));
      assert_eq!(dir.head(crate::freelist::bucket_index(32)), Some(tail));
    }
  }

  #[test]
  fn split_does_nothing_when_remainder_too_small() {
    let (mut _buf, base) = setup_two_blocks([32, 16]);
    let mut dir = FreeListDirectory::new();

    unsafe {
      block::write_header(base, 32, true, true, true);
      split(&mut dir, base, 24, 32);
      assert_eq!(block::size(base), 32);
    }
  }

  #[test]
  fn coalesce_merges_free_successor() {
    let total = 32 + 32 + block::HEADER_SIZE;
    let mut buf = vec![0u8; total];
    let base = buf.as_mut_ptr() as usize;
    let mut dir = FreeListDirectory::new();

    unsafe {
      // block at base: just freed, allocated predecessor (heap start)
      block::write_header(base, 32, true, true, false);
      block::write_footer(base);
      // successor: free
      block::write_header(base + 32, 32, false, false, false);
      block::write_footer(base + 32);
      dir.insert(base + 32, 32);
      // epilogue
      block::write_header(base + 64, 0, false, true, true);

      coalesce(&mut dir, base);

      assert_eq!(block::size(base), 64);
      assert!(!block::self_alloc(base));
      assert_eq!(dir.total_len(), 1);
    }
  }
}
