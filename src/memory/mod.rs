//! Memory accounting and process memory statistics.
//!
//! [`TrackingAllocator`] wraps the system allocator, tags every block with
//! its requested size and keeps a running total of the bytes in use. It
//! can be called directly through its `allocate` / `release` family or
//! installed as the process allocator:
//!
//! ```rust,ignore
//! use evloop::memory::TrackingAllocator;
//!
//! #[global_allocator]
//! static ALLOC: TrackingAllocator = TrackingAllocator::new();
//! ```
//!
//! The [`stats`] helpers read what the operating system reports about the
//! process and degrade to zero where that information is unavailable.

mod alloc;

pub mod stats;

pub use alloc::{OomHandler, PREFIX_SIZE, TrackingAllocator};
