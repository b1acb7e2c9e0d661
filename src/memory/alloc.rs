use std::alloc::{GlobalAlloc, Layout, System, handle_alloc_error};
use std::mem;
use std::ptr::{self, NonNull};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Bytes reserved in front of every block to remember its size.
pub const PREFIX_SIZE: usize = mem::size_of::<usize>();

/// Alignment of blocks handed out by the `allocate` family.
const BLOCK_ALIGN: usize = mem::align_of::<usize>();

/// Called with the requested size when an allocation fails.
pub type OomHandler = fn(usize);

/// A size-tagging allocator with usage accounting.
///
/// Every block carries a hidden prefix holding the requested size, which
/// lets [`release`](Self::release) and [`size_of`](Self::size_of) work from
/// the pointer alone. Accounted sizes are rounded up to a multiple of
/// `size_of::<c_long>()` and include the prefix.
///
/// Accounting starts in single-threaded mode, where counter updates are
/// plain loads and stores. [`enable_thread_safety`](Self::enable_thread_safety)
/// switches every update and read to a mutex-guarded path; do it before
/// the allocator is shared between threads.
pub struct TrackingAllocator {
    used: AtomicUsize,
    thread_safe: AtomicBool,
    lock: Mutex<()>,
    oom_handler: Mutex<Option<OomHandler>>,
}

impl TrackingAllocator {
    /// Creates an allocator with nothing accounted.
    pub const fn new() -> Self {
        Self {
            used: AtomicUsize::new(0),
            thread_safe: AtomicBool::new(false),
            lock: Mutex::new(()),
            oom_handler: Mutex::new(None),
        }
    }

    /// Allocates `size` bytes.
    ///
    /// Never returns on exhaustion: the out-of-memory handler runs and the
    /// process aborts.
    pub fn allocate(&self, size: usize) -> NonNull<u8> {
        let ptr = unsafe { self.raw_alloc(size, BLOCK_ALIGN, false) };
        NonNull::new(ptr).unwrap_or_else(|| self.out_of_memory(size))
    }

    /// Allocates `size` zeroed bytes.
    pub fn allocate_zeroed(&self, size: usize) -> NonNull<u8> {
        let ptr = unsafe { self.raw_alloc(size, BLOCK_ALIGN, true) };
        NonNull::new(ptr).unwrap_or_else(|| self.out_of_memory(size))
    }

    /// Resizes a block, allocating a fresh one when `ptr` is `None`.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this allocator's `allocate` family and must
    /// not be used after this call.
    pub unsafe fn reallocate(&self, ptr: Option<NonNull<u8>>, size: usize) -> NonNull<u8> {
        let Some(ptr) = ptr else {
            return self.allocate(size);
        };

        let new = unsafe { self.raw_realloc(ptr.as_ptr(), BLOCK_ALIGN, size) };
        NonNull::new(new).unwrap_or_else(|| self.out_of_memory(size))
    }

    /// Frees a block. `None` is ignored.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this allocator's `allocate` family and must
    /// not be used after this call.
    pub unsafe fn release(&self, ptr: Option<NonNull<u8>>) {
        if let Some(ptr) = ptr {
            unsafe { self.raw_free(ptr.as_ptr(), BLOCK_ALIGN) };
        }
    }

    /// Copies `s` into a new NUL-terminated block.
    pub fn duplicate_str(&self, s: &str) -> NonNull<u8> {
        let len = s.len() + 1;
        let ptr = self.allocate(len);

        unsafe {
            ptr::copy_nonoverlapping(s.as_ptr(), ptr.as_ptr(), s.len());
            ptr.as_ptr().add(s.len()).write(0);
        }

        ptr
    }

    /// Usable size of a block as accounted, prefix included.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live block from this allocator's `allocate` family.
    pub unsafe fn size_of(&self, ptr: NonNull<u8>) -> usize {
        let size = unsafe { read_prefix(ptr.as_ptr()) };
        rounded(size) + PREFIX_SIZE
    }

    /// Bytes currently accounted as in use.
    pub fn used_memory(&self) -> usize {
        if self.thread_safe.load(Ordering::Acquire) {
            let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
            self.used.load(Ordering::Relaxed)
        } else {
            self.used.load(Ordering::Relaxed)
        }
    }

    /// Switches accounting to the mutex-guarded path.
    pub fn enable_thread_safety(&self) {
        self.thread_safe.store(true, Ordering::Release);
    }

    /// Replaces the out-of-memory handler.
    ///
    /// If the handler returns, the failed allocation is still fatal.
    pub fn set_oom_handler(&self, handler: OomHandler) {
        *self.oom_handler.lock().unwrap_or_else(|e| e.into_inner()) = Some(handler);
    }

    fn out_of_memory(&self, size: usize) -> ! {
        let handler = *self.oom_handler.lock().unwrap_or_else(|e| e.into_inner());
        handler.unwrap_or(default_oom)(size);

        let layout = Layout::from_size_align(size.max(1), BLOCK_ALIGN)
            .unwrap_or_else(|_| Layout::new::<usize>());
        handle_alloc_error(layout)
    }

    fn account_add(&self, n: usize) {
        if self.thread_safe.load(Ordering::Acquire) {
            let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
            self.used.fetch_add(n, Ordering::Relaxed);
        } else {
            let used = self.used.load(Ordering::Relaxed);
            self.used.store(used.wrapping_add(n), Ordering::Relaxed);
        }
    }

    fn account_sub(&self, n: usize) {
        if self.thread_safe.load(Ordering::Acquire) {
            let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
            self.used.fetch_sub(n, Ordering::Relaxed);
        } else {
            let used = self.used.load(Ordering::Relaxed);
            self.used.store(used.wrapping_sub(n), Ordering::Relaxed);
        }
    }

    unsafe fn raw_alloc(&self, size: usize, align: usize, zeroed: bool) -> *mut u8 {
        let header = header_size(align);
        let Some(layout) = block_layout(size, align) else {
            return ptr::null_mut();
        };

        let base = unsafe {
            if zeroed {
                System.alloc_zeroed(layout)
            } else {
                System.alloc(layout)
            }
        };
        if base.is_null() {
            return base;
        }

        let ptr = unsafe { base.add(header) };
        unsafe { write_prefix(ptr, size) };

        self.account_add(rounded(size) + header);
        ptr
    }

    unsafe fn raw_free(&self, ptr: *mut u8, align: usize) {
        let header = header_size(align);
        let size = unsafe { read_prefix(ptr) };

        self.account_sub(rounded(size) + header);

        if let Some(layout) = block_layout(size, align) {
            unsafe { System.dealloc(ptr.sub(header), layout) };
        }
    }

    unsafe fn raw_realloc(&self, ptr: *mut u8, align: usize, new_size: usize) -> *mut u8 {
        let header = header_size(align);
        let old_size = unsafe { read_prefix(ptr) };

        let (Some(old_layout), Some(new_layout)) =
            (block_layout(old_size, align), block_layout(new_size, align))
        else {
            return ptr::null_mut();
        };

        let base = unsafe { System.realloc(ptr.sub(header), old_layout, new_layout.size()) };
        if base.is_null() {
            return base;
        }

        let ptr = unsafe { base.add(header) };
        unsafe { write_prefix(ptr, new_size) };

        self.account_sub(rounded(old_size));
        self.account_add(rounded(new_size));
        ptr
    }
}

impl Default for TrackingAllocator {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        unsafe { self.raw_alloc(layout.size(), layout.align(), false) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        unsafe { self.raw_alloc(layout.size(), layout.align(), true) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { self.raw_free(ptr, layout.align()) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        unsafe { self.raw_realloc(ptr, layout.align(), new_size) }
    }
}

fn default_oom(size: usize) {
    tracing::error!(size, "out of memory trying to allocate {size} bytes");
    std::process::abort();
}

/// Rounds `n` up to a multiple of `size_of::<c_long>()`.
fn rounded(n: usize) -> usize {
    let word = mem::size_of::<libc::c_long>();
    if n & (word - 1) != 0 {
        n + word - (n & (word - 1))
    } else {
        n
    }
}

/// Room in front of a block: the size prefix, widened to keep the
/// payload aligned.
fn header_size(align: usize) -> usize {
    align.max(PREFIX_SIZE)
}

fn block_layout(size: usize, align: usize) -> Option<Layout> {
    let total = size.checked_add(header_size(align))?;
    Layout::from_size_align(total, align.max(BLOCK_ALIGN)).ok()
}

unsafe fn write_prefix(ptr: *mut u8, size: usize) {
    unsafe { (ptr.sub(PREFIX_SIZE) as *mut usize).write(size) }
}

unsafe fn read_prefix(ptr: *const u8) -> usize {
    unsafe { (ptr.sub(PREFIX_SIZE) as *const usize).read() }
}
