//! Block allocators for fault injection and accounting.

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use tephra_arena::{ArenaError, ArenaResult, BlockAlloc, SystemBlockAlloc};

/// Block allocator that fails the n-th acquisition.
///
/// Every other request is delegated to [`SystemBlockAlloc`].
#[derive(Debug)]
pub struct FailingBlockAlloc {
    fail_on: usize,
    requests: AtomicUsize,
}

impl FailingBlockAlloc {
    /// Fails the `fail_on`-th allocate call (1-based).
    #[must_use]
    pub fn new(fail_on: usize) -> Self {
        Self {
            fail_on,
            requests: AtomicUsize::new(0),
        }
    }

    /// Returns the number of allocate calls seen so far.
    #[must_use]
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl BlockAlloc for FailingBlockAlloc {
    fn allocate(&self, layout: Layout) -> ArenaResult<NonNull<u8>> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on {
            return Err(ArenaError::OutOfMemory {
                size: layout.size(),
            });
        }
        SystemBlockAlloc.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        SystemBlockAlloc.deallocate(ptr, layout);
    }
}

/// Block allocator that counts acquisitions and bytes handed out.
#[derive(Debug, Default)]
pub struct CountingBlockAlloc {
    allocations: AtomicUsize,
    bytes: AtomicUsize,
}

impl CountingBlockAlloc {
    /// Creates a counting allocator with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of blocks handed out.
    #[must_use]
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    /// Returns the total bytes handed out.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.bytes.load(Ordering::SeqCst)
    }
}

impl BlockAlloc for CountingBlockAlloc {
    fn allocate(&self, layout: Layout) -> ArenaResult<NonNull<u8>> {
        let ptr = SystemBlockAlloc.allocate(layout)?;
        self.allocations.fetch_add(1, Ordering::SeqCst);
        self.bytes.fetch_add(layout.size(), Ordering::SeqCst);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        SystemBlockAlloc.deallocate(ptr, layout);
    }
}
