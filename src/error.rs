//! Internal failure signals.
//!
//! The public surface (`allocate`, `release`, `reallocate`, `zero_allocate`)
//! never exposes this type directly — it returns raw pointers and collapses
//! every failure to null, matching the page-provider contract's error shape.
//! `AllocError` exists so the internal plumbing (`extend_heap`, the page
//! provider, the overflow check in `zero_allocate`) can use `Result` and `?`
//! instead of sentinel return values.
use core::fmt;

/// A fallible step inside the allocator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  /// The page provider refused to extend the heap.
  ProviderExhausted,
  /// A size computation (e.g. `n * size` in `zero_allocate`) overflowed.
  SizeOverflow,
}

impl fmt::Display for AllocError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AllocError::ProviderExhausted => write!(f, "page provider exhausted"),
      AllocError::SizeOverflow => write!(f, "requested size overflowed usize"),
    }
  }
}

impl core::error::Error for AllocError {}
