//! The block codec: pure functions over a block address that encode and
//! decode the bit-packed header, locate the optional footer and intrusive
//! free-list links, and walk the implicit list to a block's neighbors.
//!
//! A block is identified solely by the address of its header word — there
//! is no owning Rust reference to it, since the same eight bytes change
//! meaning (payload, link pair, or footer) depending on the block's current
//! state. Every accessor here is `unsafe` for that reason: the caller must
//! know which interpretation currently applies.
//!
//! # Header layout (64 bits)
//!
//! ```text
//!   63                                   4   3   2   1   0
//!  ┌─────────────────────────────────────┬───┬───┬───┬───┐
//!  │            size (bytes)             │ 0 │ M │ A │ a │
//!  └─────────────────────────────────────┴───┴───┴───┴───┘
//!    M = prev-is-min   A = prev-allocated   a = self-allocated
//! ```
//!
//! Size is always a multiple of 16, so its low 4 bits are always zero —
//! the flag bits can be OR'd directly into the same word without a shift.
use core::ptr;

/// The address of a block's header word. Not a pointer type: it is only
/// ever dereferenced through the accessors in this module, each of which
/// knows which 8-byte region it is reading.
pub type Addr = usize;

/// Size, in bytes, of the header word (and of the footer, when present).
pub const HEADER_SIZE: usize = 8;

/// Total size of the smallest possible block: one header word plus 8 bytes
/// of payload/link space. Minimum-size blocks carry no footer.
pub const MIN_BLOCK_SIZE: usize = 16;

const SIZE_MASK: u64 = !0xF;
const PREV_MIN_BIT: u64 = 0b100;
const PREV_ALLOC_BIT: u64 = 0b010;
const SELF_ALLOC_BIT: u64 = 0b001;

#[inline]
unsafe fn read_word(addr: Addr) -> u64 {
  unsafe { ptr::read(addr as *const u64) }
}

#[inline]
unsafe fn write_word(addr: Addr, word: u64) {
  unsafe { ptr::write(addr as *mut u64, word) }
}

/// Packs a header (or footer) word from its logical fields.
#[inline]
pub fn pack(size: usize, prev_is_min: bool, prev_alloc: bool, self_alloc: bool) -> u64 {
  debug_assert_eq!(size & 0xF, 0, "block size must be a multiple of 16");
  (size as u64 & SIZE_MASK)
    | if prev_is_min { PREV_MIN_BIT } else { 0 }
    | if prev_alloc { PREV_ALLOC_BIT } else { 0 }
    | if self_alloc { SELF_ALLOC_BIT } else { 0 }
}

/// Total size of the block, in bytes.
///
/// # Safety
/// `b` must address a live header word.
pub unsafe fn size(b: Addr) -> usize {
  (unsafe { read_word(b) } & SIZE_MASK) as usize
}

/// Whether the block itself is allocated.
///
/// # Safety
/// `b` must address a live header word.
pub unsafe fn self_alloc(b: Addr) -> bool {
  unsafe { read_word(b) } & SELF_ALLOC_BIT != 0
}

/// Whether the implicit-list predecessor of `b` is allocated.
///
/// # Safety
/// `b` must address a live header word.
pub unsafe fn prev_alloc(b: Addr) -> bool {
  unsafe { read_word(b) } & PREV_ALLOC_BIT != 0
}

/// Whether the implicit-list predecessor of `b` has minimum size (16 bytes).
///
/// # Safety
/// `b` must address a live header word.
pub unsafe fn prev_is_min(b: Addr) -> bool {
  unsafe { read_word(b) } & PREV_MIN_BIT != 0
}

/// Writes a fresh header word at `b`, replacing whatever was there.
///
/// # Safety
/// `b` must address at least [`HEADER_SIZE`] writable bytes.
pub unsafe fn write_header(b: Addr, size: usize, prev_is_min: bool, prev_alloc: bool, self_alloc: bool) {
  unsafe { write_word(b, pack(size, prev_is_min, prev_alloc, self_alloc)) };
}

/// Writes a footer word identical to `b`'s current header. Only valid for
/// free, non-minimum blocks.
///
/// # Safety
/// `b` must address a live header word whose `size(b) > MIN_BLOCK_SIZE`,
/// and `footer(b)` must be writable.
pub unsafe fn write_footer(b: Addr) {
  let word = unsafe { read_word(b) };
  unsafe { write_word(footer(b), word) };
}

/// Only rewrites the predecessor-state bits (`prev-allocated`,
/// `prev-is-min`) of `b`'s header, leaving size and `self-allocated`
/// untouched. If `b` is itself a free non-minimum block, its footer is
/// rewritten to match.
///
/// # Safety
/// `b` must address a live header word.
pub unsafe fn rewrite_prev_state(b: Addr, prev_alloc: bool, prev_is_min: bool) {
  unsafe {
    let sz = size(b);
    let alloc = self_alloc(b);
    write_header(b, sz, prev_is_min, prev_alloc, alloc);
    if !alloc && sz > MIN_BLOCK_SIZE {
      write_footer(b);
    }
  }
}

/// Address of the payload region (for allocated blocks) or the first link
/// slot (for free blocks).
pub fn payload(b: Addr) -> Addr {
  b + HEADER_SIZE
}

/// Recovers the block address from a payload pointer previously returned to
/// a caller.
pub fn payload_to_block(p: Addr) -> Addr {
  p - HEADER_SIZE
}

/// Address of the footer word. Only meaningful for free, non-minimum
/// blocks.
///
/// # Safety
/// `b` must address a live header word with `size(b) > MIN_BLOCK_SIZE`.
pub unsafe fn footer(b: Addr) -> Addr {
  b + unsafe { size(b) } - HEADER_SIZE
}

/// Address of the implicit-list successor of `b` (may be the epilogue).
///
/// # Safety
/// `b` must address a live header word.
pub unsafe fn next_on_heap(b: Addr) -> Addr {
  b + unsafe { size(b) }
}

/// Address of the implicit-list predecessor of `b`.
///
/// Uses `prev_is_min` to skip straight to the fixed 16-byte offset when the
/// predecessor is minimum-size (it carries no footer to read). Otherwise
/// the predecessor's size is recovered from its footer, which lies
/// immediately before `b`.
///
/// # Safety
/// `b` must address a live header word, and `prev_alloc(b)` must be
/// `false` — there is no footer (and hence no predecessor lookup) when the
/// predecessor is allocated. The caller must also ensure `b` is not the
/// first real block after the prologue, since the prologue has no footer.
pub unsafe fn prev_on_heap(b: Addr) -> Addr {
  debug_assert!(!unsafe { prev_alloc(b) }, "predecessor has no footer when allocated");
  if unsafe { prev_is_min(b) } {
    b - MIN_BLOCK_SIZE
  } else {
    let prev_footer_word = unsafe { read_word(b - HEADER_SIZE) };
    let prev_size = (prev_footer_word & SIZE_MASK) as usize;
    b - prev_size
  }
}

/// Reads the `next` free-list link stored in the first 8 payload bytes.
/// Valid for both bucket disciplines.
///
/// # Safety
/// `b` must address a free block.
pub unsafe fn read_link_next(b: Addr) -> Addr {
  unsafe { ptr::read((b + HEADER_SIZE) as *const usize) }
}

/// Writes the `next` free-list link.
///
/// # Safety
/// `b` must address a free block with at least `HEADER_SIZE +
/// size_of::<usize>()` writable bytes.
pub unsafe fn write_link_next(b: Addr, next: Addr) {
  unsafe { ptr::write((b + HEADER_SIZE) as *mut usize, next) };
}

/// Reads the `prev` free-list link. Only valid for non-minimum free
/// blocks, which reserve a second link slot.
///
/// # Safety
/// `b` must address a free, non-minimum block.
pub unsafe fn read_link_prev(b: Addr) -> Addr {
  unsafe { ptr::read((b + HEADER_SIZE + core::mem::size_of::<usize>()) as *const usize) }
}

/// Writes the `prev` free-list link.
///
/// # Safety
/// `b` must address a free, non-minimum block.
pub unsafe fn write_link_prev(b: Addr, prev: Addr) {
  unsafe { ptr::write((b + HEADER_SIZE + core::mem::size_of::<usize>()) as *mut usize, prev) };
}

/// Payload size visible to the caller for an allocated block, per the
/// `reallocate` payload-size rule: minimum-size blocks expose 8 payload
/// bytes (the block minus its header), everything else exposes
/// `size - HEADER_SIZE`.
///
/// # Safety
/// `b` must address a live, allocated header word.
pub unsafe fn payload_size(b: Addr) -> usize {
  unsafe { size(b) } - HEADER_SIZE
}

#[cfg(test)]
mod tests {
  use super::*;

  fn with_buf<R>(len: usize, f: impl FnOnce(Addr) -> R) -> R {
    let mut buf = vec![0u8; len];
    let addr = buf.as_mut_ptr() as usize;
    let result = f(addr);
    drop(buf);
    result
  }

  #[test]
  fn pack_and_decode_roundtrip() {
    with_buf(32, |addr| unsafe {
      write_header(addr, 32, true, false, true);
      assert_eq!(size(addr), 32);
      assert!(prev_is_min(addr));
      assert!(!prev_alloc(addr));
      assert!(self_alloc(addr));
    });
  }

  #[test]
  fn footer_mirrors_header_for_free_non_min_block() {
    with_buf(48, |addr| unsafe {
      write_header(addr, 48, false, true, false);
      write_footer(addr);
      assert_eq!(read_word(addr), read_word(footer(addr)));
    });
  }

  #[test]
  fn next_on_heap_steps_by_size() {
    with_buf(64, |addr| unsafe {
      write_header(addr, 32, false, true, true);
      assert_eq!(next_on_heap(addr), addr + 32);
    });
  }

  #[test]
  fn prev_on_heap_uses_min_shortcut() {
    with_buf(64, |addr| unsafe {
      write_header(addr + 16, 32, true, false, true);
      assert_eq!(prev_on_heap(addr + 16), addr);
    });
  }

  #[test]
  fn prev_on_heap_reads_footer_for_non_min_predecessor() {
    with_buf(96, |addr| unsafe {
      write_header(addr, 48, false, true, false);
      write_footer(addr);
      write_header(addr + 48, 16, false, false, true);
      assert_eq!(prev_on_heap(addr + 48), addr);
    });
  }

  #[test]
  fn rewrite_prev_state_updates_footer_when_free() {
    with_buf(48, |addr| unsafe {
      write_header(addr, 48, false, true, false);
      write_footer(addr);
      rewrite_prev_state(addr, false, true);
      assert!(!prev_alloc(addr));
      assert!(prev_is_min(addr));
      assert_eq!(read_word(addr), read_word(footer(addr)));
    });
  }

  #[test]
  fn payload_size_handles_min_block() {
    with_buf(16, |addr| unsafe {
      write_header(addr, 16, false, true, true);
      assert_eq!(payload_size(addr), 8);
    });
  }
}
