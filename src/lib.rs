//! # segalloc - A Segregated Free-List Memory Allocator
//!
//! This crate provides a general-purpose dynamic memory allocator that
//! manages a single contiguous, monotonically extensible heap region
//! obtained from a lower-level page-granularity provider. It exposes the
//! classical allocate/free/reallocate/zero-allocate interface over
//! byte-sized requests and returns pointers aligned to a 16-byte boundary.
//!
//! ## Overview
//!
//! Unlike a bump allocator, which only ever grows a pointer forward and
//! never reuses freed space, this allocator tracks free blocks in 14
//! size-segregated buckets so that released memory can be found again and
//! reused by later requests:
//!
//! ```text
//!   Segregated Free-List Allocator:
//!
//!   ┌────────────────────────────────────────────────────────────────────┐
//!   │                          HEAP MEMORY                               │
//!   │                                                                    │
//!   │  ┌──────┬────────┬──────┬────────────┬──────┬──────────────────┐  │
//!   │  │ Allo │  Free  │ Allo │    Free    │ Allo │   Free (tail)    │  │
//!   │  └──────┴────────┴──────┴────────────┴──────┴──────────────────┘  │
//!   │            ▲                   ▲                  ▲               │
//!   │            └───────────────────┴──────────────────┘               │
//!   │                   threaded through 14 size buckets                │
//!   │                   by `find_fit`'s bounded best-fit scan            │
//!   └────────────────────────────────────────────────────────────────────┘
//!
//!   Adjacent free blocks are coalesced immediately on release, so the
//!   implicit list never holds two free neighbors back to back.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   segalloc
//!   ├── align     - Alignment macros (align!, align_to!)
//!   ├── block     - Block header/footer codec and implicit-list walk
//!   ├── freelist  - The 14-bucket segregated free-list directory
//!   ├── engine    - Transition engine (free<->alloc, split, coalesce) and
//!   │               the placement engine (find_fit)
//!   ├── provider  - The page-granularity source the heap extends into
//!   ├── heap      - The heap shell: Allocator, init, allocate/release/...
//!   ├── check     - Debug-only consistency checker
//!   └── error     - Internal fallible-step error type
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use segalloc::heap::Allocator;
//! use segalloc::provider::SbrkProvider;
//!
//! fn main() {
//!     let mut allocator = Allocator::init(SbrkProvider::new()).unwrap();
//!
//!     let p = allocator.allocate(64).unwrap();
//!     unsafe {
//!         core::ptr::write_bytes(p as *mut u8, 0, 64);
//!     }
//!     allocator.release(p);
//! }
//! ```
//!
//! ## How It Works
//!
//! Every block begins with an 8-byte bit-packed header carrying its size
//! and three single-bit flags: whether the block itself is allocated,
//! whether its implicit-list predecessor is allocated, and whether that
//! predecessor has the minimum block size (16 bytes). Free blocks larger
//! than the minimum size also carry a footer mirroring the header, so a
//! release can walk backward to find a coalescing candidate without a
//! separate side table:
//!
//! ```text
//!   Allocated block:                Free block (non-minimum):
//!   ┌─────────┬─────────────┐       ┌─────────┬──────┬──────┬─────────┐
//!   │ header  │   payload   │       │ header  │ next │ prev │ footer  │
//!   │ 8 bytes │   N bytes   │       │ 8 bytes │ 8 B  │ 8 B  │ 8 bytes │
//!   └─────────┴─────────────┘       └─────────┴──────┴──────┴─────────┘
//! ```
//!
//! A request is routed by `find_fit` to the smallest bucket that could
//! hold it, then scanned (bounded best-fit, up to 16 candidates) for a
//! tight-enough block; a miss grows the heap by at least 4096 bytes. On
//! release, the freed block is merged with any free implicit-list
//! neighbors before being threaded back into its bucket.
//!
//! ## Features
//!
//! - **Block reuse**: freed memory is tracked in size-segregated buckets
//!   and reused by later allocations, unlike a pure bump allocator.
//! - **Immediate coalescing**: adjacent free blocks are always merged on
//!   release, bounding fragmentation growth.
//! - **Bounded best-fit placement**: a 16-candidate scan limit keeps
//!   `find_fit` O(1)-ish per bucket while still avoiding the worst
//!   fragmentation of plain first-fit.
//! - **Proper alignment**: every returned pointer is 16-byte aligned.
//! - **Pluggable page provider**: the heap shell extends into whatever
//!   [`provider::PageProvider`] it is given — a bundled `sbrk`-backed
//!   default, or a test double.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization primitives; concurrent
//!   access is the caller's responsibility.
//! - **Heap only grows**: memory is never returned to the page provider.
//! - **Unix-only default provider**: [`provider::SbrkProvider`] requires
//!   `libc` and `sbrk` (POSIX systems). Other providers can be supplied by
//!   implementing [`provider::PageProvider`].
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! Nearly every operation performs pointer arithmetic that cannot be proven
//! safe statically; the unsafe primitives are concentrated in `block` and
//! `freelist`, with `engine` and `heap` built out of those primitives
//! without further raw arithmetic of their own.

pub mod align;
pub mod block;
pub mod check;
pub mod engine;
pub mod error;
pub mod freelist;
pub mod heap;
pub mod provider;

pub use error::AllocError;
pub use heap::{Allocator, CHUNK};
pub use provider::{PageProvider, SbrkProvider};
