use std::io::Read;
use std::ptr;

use libc::sbrk;
use segalloc::heap::Allocator;
use segalloc::provider::SbrkProvider;
use segalloc::check::print_alloc;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `htop`, `gdb`, or just visually track how the program break moves as the
/// heap extends.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() {
  // The allocator holds its own state (heap bounds, the 14-bucket free-list
  // directory); it extends into the process break through `SbrkProvider`
  // rather than touching `sbrk` itself.
  let mut allocator = Allocator::init(SbrkProvider::new()).expect("initial heap pages");

  unsafe {
    print_program_break("start");
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 1) Allocate a small block and write through it.
    // ------------------------------------------------------------------
    let first = allocator.allocate(4).expect("allocate u32");
    println!("\n[1] Allocate 4 bytes");
    print_alloc(segalloc::block::payload_to_block(first));

    let first_ptr = first as *mut u32;
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first = 0x{:X}", first_ptr.read());

    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 2) Allocate 12 bytes, landing in a different bucket than [1].
    // ------------------------------------------------------------------
    let second = allocator.allocate(12).expect("allocate [u8; 12]");
    println!("\n[2] Allocate 12 bytes");
    print_alloc(segalloc::block::payload_to_block(second));

    ptr::write_bytes(second as *mut u8, 0xAB, 12);
    println!("[2] Initialized second block with 0xAB");

    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 3) Release [1], then allocate something small again and check
    //    whether the freed block was reused.
    // ------------------------------------------------------------------
    allocator.release(first);
    println!("\n[3] Released first block at {:?}", first as *const u8);

    let third = allocator.allocate(4).expect("allocate 4 bytes again");
    println!("[3] Allocate 4 bytes (check reuse of freed block)");
    print_alloc(segalloc::block::payload_to_block(third));
    println!(
      "[3] third == first? {}",
      if third == first { "yes, the free-list reused it" } else { "no, allocated elsewhere" }
    );

    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 4) Allocate a large block to observe heap growth.
    // ------------------------------------------------------------------
    print_program_break("before large alloc");
    let big = allocator.allocate(64 * 1024).expect("allocate 64 KiB");
    println!("\n[4] Allocate large 64 KiB block");
    print_alloc(segalloc::block::payload_to_block(big));
    print_program_break("after large alloc");

    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 5) Grow the block with reallocate and confirm the payload survives.
    // ------------------------------------------------------------------
    ptr::write_bytes(second as *mut u8, 0xCD, 12);
    let grown = allocator.reallocate(second, 64).expect("reallocate to 64 bytes");
    let bytes = std::slice::from_raw_parts(grown as *const u8, 12);
    println!("\n[5] Reallocated second block to 64 bytes; first 12 bytes preserved: {:?}", bytes);

    println!("\n[6] End of demo. Process will exit and the OS will reclaim all memory.");
  }
}
