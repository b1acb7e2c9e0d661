use evloop::memory::{PREFIX_SIZE, TrackingAllocator};

use std::alloc::{GlobalAlloc, Layout};
use std::sync::Arc;
use std::thread;

fn word_rounded(n: usize) -> usize {
    let word = std::mem::size_of::<libc::c_long>();
    n.div_ceil(word) * word
}

#[test]
fn test_allocate_and_release_balance() {
    let alloc = TrackingAllocator::new();
    assert_eq!(alloc.used_memory(), 0);

    let ptr = alloc.allocate(10);
    assert_eq!(alloc.used_memory(), word_rounded(10) + PREFIX_SIZE);
    assert_eq!(unsafe { alloc.size_of(ptr) }, word_rounded(10) + PREFIX_SIZE);

    unsafe { alloc.release(Some(ptr)) };
    assert_eq!(alloc.used_memory(), 0);

    // Releasing nothing is allowed.
    unsafe { alloc.release(None) };
    assert_eq!(alloc.used_memory(), 0);
}

#[test]
fn test_allocate_zeroed_is_zeroed() {
    let alloc = TrackingAllocator::new();

    let ptr = alloc.allocate_zeroed(64);
    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 64) };
    assert!(bytes.iter().all(|&b| b == 0));

    unsafe { alloc.release(Some(ptr)) };
    assert_eq!(alloc.used_memory(), 0);
}

#[test]
fn test_reallocate_keeps_contents_and_accounting() {
    let alloc = TrackingAllocator::new();

    let ptr = alloc.allocate(4);
    unsafe { std::ptr::copy_nonoverlapping(b"abcd".as_ptr(), ptr.as_ptr(), 4) };

    let ptr = unsafe { alloc.reallocate(Some(ptr), 100) };
    assert_eq!(unsafe { alloc.size_of(ptr) }, word_rounded(100) + PREFIX_SIZE);
    assert_eq!(alloc.used_memory(), word_rounded(100) + PREFIX_SIZE);

    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 4) };
    assert_eq!(bytes, b"abcd");

    unsafe { alloc.release(Some(ptr)) };
    assert_eq!(alloc.used_memory(), 0);
}

#[test]
fn test_reallocate_none_allocates() {
    let alloc = TrackingAllocator::new();

    let ptr = unsafe { alloc.reallocate(None, 20) };
    assert_eq!(alloc.used_memory(), word_rounded(20) + PREFIX_SIZE);

    unsafe { alloc.release(Some(ptr)) };
}

#[test]
fn test_duplicate_str_is_nul_terminated() {
    let alloc = TrackingAllocator::new();

    let ptr = alloc.duplicate_str("hello w");
    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 8) };
    assert_eq!(bytes, b"hello w\0");

    unsafe { alloc.release(Some(ptr)) };
    assert_eq!(alloc.used_memory(), 0);
}

#[test]
fn test_global_alloc_respects_alignment() {
    let alloc = TrackingAllocator::new();
    let layout = Layout::from_size_align(24, 64).unwrap();

    unsafe {
        let ptr = alloc.alloc(layout);
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % 64, 0);
        assert_eq!(alloc.used_memory(), word_rounded(24) + 64);

        let ptr = alloc.realloc(ptr, layout, 200);
        assert_eq!(ptr as usize % 64, 0);
        assert_eq!(alloc.used_memory(), word_rounded(200) + 64);

        alloc.dealloc(ptr, Layout::from_size_align(200, 64).unwrap());
    }

    assert_eq!(alloc.used_memory(), 0);
}

#[test]
fn test_thread_safe_accounting_across_threads() {
    let alloc = Arc::new(TrackingAllocator::new());
    alloc.enable_thread_safety();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let alloc = alloc.clone();
            thread::spawn(move || {
                for size in 1..200 {
                    let ptr = alloc.allocate(size);
                    unsafe { alloc.release(Some(ptr)) };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(alloc.used_memory(), 0);
}

#[test]
fn test_fragmentation_ratio_without_usage_is_zero() {
    let alloc = TrackingAllocator::new();
    assert_eq!(alloc.fragmentation_ratio(), 0.0);
}

#[cfg(target_os = "linux")]
#[test]
fn test_process_statistics_on_linux() {
    assert!(evloop::memory::stats::resident_set_size() > 0);

    let alloc = TrackingAllocator::new();
    let ptr = alloc.allocate(1024);
    assert!(alloc.fragmentation_ratio() > 0.0);
    unsafe { alloc.release(Some(ptr)) };

    // Reading smaps must not fail even if the figure is small.
    let _ = evloop::memory::stats::private_dirty();
}
