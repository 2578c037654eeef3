//! Polymorphic-allocator view of an arena.
//!
//! [`ArenaResource`] adapts an [`Arena`] to the runtime-dispatched allocator
//! contract from `allocator-api2`, so allocator-aware containers can draw
//! their storage from the arena. Deallocation is a no-op (the arena reclaims
//! in bulk) and two views are equal only if they refer to the same arena
//! instance.

use std::alloc::Layout;
use std::fmt;
use std::ptr::{self, NonNull};

use allocator_api2::alloc::{AllocError, Allocator};

use crate::arena::Arena;

/// A non-owning allocator handle over an [`Arena`].
///
/// Returned by [`Arena::memory_resource`]; lives as long as the arena borrow.
///
/// # Example
///
/// ```rust
/// use allocator_api2::vec::Vec;
/// use tephra_arena::Arena;
///
/// let arena = Arena::new();
/// let mut values = Vec::new_in(arena.memory_resource());
/// for i in 0..100 {
///     values.push(i);
/// }
/// assert_eq!(values.len(), 100);
/// assert!(arena.space_used() > 0);
/// ```
#[derive(Clone, Copy)]
pub struct ArenaResource<'a> {
    arena: &'a Arena,
}

impl<'a> ArenaResource<'a> {
    pub(crate) fn new(arena: &'a Arena) -> Self {
        Self { arena }
    }

    /// Returns the arena this view draws from.
    #[inline]
    #[must_use]
    pub fn arena(&self) -> &'a Arena {
        self.arena
    }
}

unsafe impl Allocator for ArenaResource<'_> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        // The allocator contract requires zero-size support; serve it with a
        // dangling, well-aligned pointer without touching the arena.
        if layout.size() == 0 {
            let dangling = layout.align() as *mut u8;
            let slice = ptr::slice_from_raw_parts_mut(dangling, 0);
            // SAFETY: align is nonzero, so the pointer is non-null.
            return Ok(unsafe { NonNull::new_unchecked(slice) });
        }

        let ptr = self
            .arena
            .alloc_aligned(layout.size(), layout.align())
            .map_err(|_| AllocError)?;
        let slice = ptr::slice_from_raw_parts_mut(ptr.as_ptr(), layout.size());
        // SAFETY: ptr is non-null.
        Ok(unsafe { NonNull::new_unchecked(slice) })
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        // The arena reclaims in bulk at reset or drop.
    }
}

impl PartialEq for ArenaResource<'_> {
    /// Two views are equal only if they refer to the same arena instance.
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.arena, other.arena)
    }
}

impl Eq for ArenaResource<'_> {}

impl fmt::Debug for ArenaResource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaResource")
            .field("arena", &self.arena.id())
            .finish()
    }
}
