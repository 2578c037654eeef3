//! The arena core.
//!
//! An [`Arena`] owns a chain of blocks and a cleanup chain. Allocation bumps
//! a cursor in the current block; when the block is exhausted a new one is
//! acquired with geometrically growing capacity, and requests at or above the
//! huge threshold get a dedicated block so they do not retire the current
//! one. All memory is reclaimed at once on [`reset`](Arena::reset) or drop,
//! after the cleanup chain has run in reverse registration order.
//!
//! # Use Cases
//!
//! - Query execution scratch space
//! - Per-request allocations with a bounded lifetime
//! - Parser and AST node storage
//!
//! # Thread Safety
//!
//! An arena is single-threaded: no locks, no atomics on the hot path. Use
//! one arena per thread; distinct arenas on distinct threads run fully in
//! parallel and only share the global metrics bank.

use std::alloc::Layout;
use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::ptr::NonNull;
use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::align::{DEFAULT_ALIGNMENT, MAX_ALIGNMENT};
use crate::block::Block;
use crate::cleanup::{self, CleanupChain, CleanupFn, CleanupNode, SliceCleanup};
use crate::error::{ArenaError, ArenaResult};
use crate::managed::{is_destructor_skippable, ArenaManaged};
use crate::metrics::{flush_local_metrics, with_local_metrics};
use crate::options::{ArenaOptions, MetricsFlush};
use crate::resource::ArenaResource;

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

/// A region allocator: bump allocation within large pre-reserved blocks,
/// released all at once on reset or drop.
///
/// Allocation methods take `&self` and return references borrowing the
/// arena; [`reset`](Arena::reset) takes `&mut self`, so the borrow checker
/// guarantees no allocation outlives the reset that reclaims it.
///
/// # Example
///
/// ```rust
/// use tephra_arena::Arena;
///
/// let mut arena = Arena::new();
///
/// let x = arena.alloc(42u64).unwrap();
/// assert_eq!(*x, 42);
///
/// let s = arena.alloc_str("scratch").unwrap();
/// assert_eq!(s, "scratch");
///
/// let reclaimed = arena.reset();
/// assert!(reclaimed > 0);
/// assert_eq!(arena.space_used(), 0);
/// ```
pub struct Arena {
    options: ArenaOptions,
    /// Chain head is the current block; `next` links lead back to the first.
    head: RefCell<Option<Box<Block>>>,
    cleanups: CleanupChain,
    /// Sum of block capacities.
    space_allocated: Cell<usize>,
    /// Sum of cursor positions, i.e. bytes served including alignment slack.
    space_used: Cell<usize>,
    /// Capacity of the last non-huge block, the base for doubling.
    last_block_size: Cell<usize>,
    id: u64,
}

impl Arena {
    /// Creates an arena with default options.
    ///
    /// No block is acquired until the first allocation.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ArenaOptions::new()).expect("default options are valid")
    }

    /// Creates an arena with the given options.
    ///
    /// Fires the `on_init` hook before returning.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidConfig`] if the options fail validation.
    pub fn with_options(options: ArenaOptions) -> ArenaResult<Self> {
        options.validate()?;

        let arena = Self {
            options,
            head: RefCell::new(None),
            cleanups: CleanupChain::new(),
            space_allocated: Cell::new(0),
            space_used: Cell::new(0),
            last_block_size: Cell::new(0),
            id: NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed),
        };

        with_local_metrics(|m| m.record_arena_created());
        debug!(arena = arena.id, "arena created");

        if let Some(hook) = &arena.options.hooks.on_init {
            hook(&arena);
        }
        Ok(arena)
    }

    /// Returns this arena's process-unique id, as used in trace events.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the configuration this arena was built with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ArenaOptions {
        &self.options
    }

    /// Allocates `size` bytes at the default alignment (8 bytes).
    ///
    /// The returned pointer is valid until the next [`reset`](Arena::reset)
    /// or until the arena is dropped.
    ///
    /// # Errors
    ///
    /// [`ArenaError::ZeroSizeAlloc`] for zero-size requests;
    /// [`ArenaError::OutOfMemory`] if a needed block cannot be acquired.
    pub fn alloc_bytes(&self, size: usize) -> ArenaResult<NonNull<u8>> {
        self.alloc_aligned(size, DEFAULT_ALIGNMENT)
    }

    /// Allocates `size` bytes aligned to `align`.
    ///
    /// # Errors
    ///
    /// [`ArenaError::ZeroSizeAlloc`], [`ArenaError::BadAlignment`],
    /// [`ArenaError::AlignmentTooLarge`], or [`ArenaError::OutOfMemory`].
    pub fn alloc_aligned(&self, size: usize, align: usize) -> ArenaResult<NonNull<u8>> {
        self.validate_request(size, align)?;
        let ptr = self.alloc_raw(size, align)?;
        self.fire_allocation_hook(None, size);
        Ok(ptr)
    }

    /// Allocates `size` bytes aligned to `align` and registers a cleanup
    /// record in the same operation.
    ///
    /// # Errors
    ///
    /// As [`alloc_aligned`](Arena::alloc_aligned), plus out-of-memory for
    /// the cleanup record itself; in that case the allocated bytes are
    /// abandoned and no record is registered.
    ///
    /// # Safety
    ///
    /// As [`add_cleanup`](Arena::add_cleanup).
    pub unsafe fn alloc_aligned_with_cleanup(
        &self,
        size: usize,
        align: usize,
        func: unsafe fn(*mut u8),
        arg: *mut u8,
    ) -> ArenaResult<NonNull<u8>> {
        self.validate_request(size, align)?;
        let ptr = self.alloc_raw(size, align)?;
        self.push_cleanup(func, arg)?;
        self.fire_allocation_hook(None, size);
        Ok(ptr)
    }

    /// Registers `func(arg)` to run at the next reset or at destruction.
    ///
    /// Records run in reverse registration order, exactly once.
    ///
    /// # Errors
    ///
    /// [`ArenaError::OutOfMemory`] if the record cannot be allocated.
    ///
    /// # Safety
    ///
    /// `arg` must remain valid until the record runs, `func` must not panic,
    /// and it must not call back into this arena.
    pub unsafe fn add_cleanup(&self, func: unsafe fn(*mut u8), arg: *mut u8) -> ArenaResult<()> {
        self.push_cleanup(func, arg)
    }

    /// Constructs `value` in arena memory.
    ///
    /// Unless `T` is destructor-skippable (no `Drop` glue, or `SKIP_DROP`
    /// declared), a cleanup record is registered that drops the value at the
    /// next reset or at destruction.
    ///
    /// # Errors
    ///
    /// [`ArenaError::OutOfMemory`] if storage or the cleanup record cannot
    /// be allocated; `value` is dropped normally in that case.
    pub fn create<T: ArenaManaged>(&self, value: T) -> ArenaResult<&mut T> {
        let layout = Layout::new::<T>();
        let ptr: NonNull<T> = if layout.size() == 0 {
            // SAFETY: any well-aligned dangling pointer is valid for a ZST.
            NonNull::dangling()
        } else {
            self.validate_request(layout.size(), layout.align())?;
            self.alloc_raw(layout.size(), layout.align())?.cast()
        };

        // SAFETY: ptr is valid and aligned for T.
        unsafe {
            ptr.as_ptr().write(value);
        }

        if !is_destructor_skippable::<T>() {
            if let Err(err) = self.push_cleanup(cleanup::drop_object::<T>, ptr.as_ptr().cast()) {
                // SAFETY: the value was just written and is not yet shared.
                unsafe {
                    std::ptr::drop_in_place(ptr.as_ptr());
                }
                return Err(err);
            }
        }

        self.fire_allocation_hook(Some(type_name::<T>()), layout.size());
        // SAFETY: disjoint from every other live allocation.
        Ok(unsafe { &mut *ptr.as_ptr() })
    }

    /// Constructs `len` default-initialized values of `T` in arena memory.
    ///
    /// A single cleanup record destroys all elements in reverse index order
    /// if `T` is not destructor-skippable.
    ///
    /// # Errors
    ///
    /// [`ArenaError::OutOfMemory`] if storage or the cleanup record cannot
    /// be allocated; already-constructed elements are dropped in that case.
    pub fn create_array<T: ArenaManaged + Default>(&self, len: usize) -> ArenaResult<&mut [T]> {
        if len == 0 {
            return Ok(&mut []);
        }

        let layout = Layout::array::<T>(len).expect("array layout overflow");
        let base: NonNull<T> = if layout.size() == 0 {
            NonNull::dangling()
        } else {
            self.validate_request(layout.size(), layout.align())?;
            self.alloc_raw(layout.size(), layout.align())?.cast()
        };

        for i in 0..len {
            // SAFETY: base is valid for len elements of T.
            unsafe {
                base.as_ptr().add(i).write(T::default());
            }
        }

        if !is_destructor_skippable::<T>() {
            if let Err(err) = self.push_slice_cleanup::<T>(base, len) {
                // SAFETY: all len elements were just initialized.
                unsafe {
                    for i in (0..len).rev() {
                        std::ptr::drop_in_place(base.as_ptr().add(i));
                    }
                }
                return Err(err);
            }
        }

        self.fire_allocation_hook(Some(type_name::<T>()), layout.size());
        // SAFETY: base is valid and initialized for len elements.
        Ok(unsafe { slice::from_raw_parts_mut(base.as_ptr(), len) })
    }

    /// Copies `value` into arena memory.
    ///
    /// The `Copy` bound makes this the raw-data path: no cleanup record is
    /// ever registered.
    ///
    /// # Errors
    ///
    /// [`ArenaError::OutOfMemory`] if a needed block cannot be acquired.
    pub fn alloc<T: Copy>(&self, value: T) -> ArenaResult<&mut T> {
        let layout = Layout::new::<T>();
        if layout.size() == 0 {
            self.fire_allocation_hook(Some(type_name::<T>()), 0);
            // SAFETY: any well-aligned dangling pointer is valid for a ZST.
            return Ok(unsafe { &mut *NonNull::<T>::dangling().as_ptr() });
        }

        self.validate_request(layout.size(), layout.align())?;
        let ptr = self.alloc_raw(layout.size(), layout.align())?.cast::<T>();
        // SAFETY: ptr is valid and aligned for T.
        unsafe {
            ptr.as_ptr().write(value);
        }
        self.fire_allocation_hook(Some(type_name::<T>()), layout.size());
        // SAFETY: disjoint from every other live allocation.
        Ok(unsafe { &mut *ptr.as_ptr() })
    }

    /// Copies a slice into arena memory.
    ///
    /// # Errors
    ///
    /// [`ArenaError::OutOfMemory`] if a needed block cannot be acquired.
    pub fn alloc_slice_copy<T: Copy>(&self, src: &[T]) -> ArenaResult<&mut [T]> {
        let layout = Layout::for_value(src);
        if layout.size() == 0 {
            // Empty slice, or a slice of ZSTs.
            // SAFETY: a dangling pointer is valid for zero bytes.
            return Ok(unsafe { slice::from_raw_parts_mut(NonNull::dangling().as_ptr(), src.len()) });
        }

        self.validate_request(layout.size(), layout.align())?;
        let ptr = self.alloc_raw(layout.size(), layout.align())?.cast::<T>();
        // SAFETY: src and the fresh arena region cannot overlap.
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), src.len());
        }
        self.fire_allocation_hook(Some(type_name::<T>()), layout.size());
        // SAFETY: ptr is valid and initialized for src.len() elements.
        Ok(unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), src.len()) })
    }

    /// Copies a string into arena memory.
    ///
    /// # Errors
    ///
    /// [`ArenaError::OutOfMemory`] if a needed block cannot be acquired.
    pub fn alloc_str(&self, s: &str) -> ArenaResult<&str> {
        let bytes = self.alloc_slice_copy(s.as_bytes())?;
        // SAFETY: the bytes were copied from valid UTF-8.
        Ok(unsafe { std::str::from_utf8_unchecked(bytes) })
    }

    /// Runs the cleanup chain, frees all blocks except (optionally) the
    /// first, rewinds the retained cursor, and fires the `on_reset` hook.
    ///
    /// Returns the number of bytes reclaimed. Taking `&mut self` guarantees
    /// no reference into the arena survives the call; a second consecutive
    /// reset is a no-op returning zero.
    pub fn reset(&mut self) -> usize {
        let executed = self.cleanups.run();
        let reclaimed = self.space_used.get();

        let retained_capacity = self.trim_blocks(self.options.retain_first_block);
        self.space_used.set(0);
        self.space_allocated.set(retained_capacity);
        self.last_block_size.set(retained_capacity);

        with_local_metrics(|m| {
            m.record_cleanups(executed);
            m.record_reset();
        });
        debug!(arena = self.id, reclaimed, "arena reset");

        if self.options.metrics_flush == MetricsFlush::OnReset {
            flush_local_metrics();
        }
        if let Some(hook) = &self.options.hooks.on_reset {
            hook(self, reclaimed);
        }
        reclaimed
    }

    /// Returns the bytes reserved from the block allocator.
    #[inline]
    #[must_use]
    pub fn space_allocated(&self) -> usize {
        self.space_allocated.get()
    }

    /// Returns the bytes served to callers, including alignment slack.
    ///
    /// Always at most [`space_allocated`](Arena::space_allocated).
    #[inline]
    #[must_use]
    pub fn space_used(&self) -> usize {
        self.space_used.get()
    }

    /// Returns the number of blocks currently in the chain.
    #[must_use]
    pub fn block_count(&self) -> usize {
        let head = self.head.borrow();
        let mut count = 0;
        let mut block = head.as_deref();
        while let Some(b) = block {
            count += 1;
            block = b.next.as_deref();
        }
        count
    }

    /// Returns the number of pending cleanup records.
    #[inline]
    #[must_use]
    pub fn cleanup_count(&self) -> usize {
        self.cleanups.len()
    }

    /// Returns a polymorphic-allocator view of this arena.
    ///
    /// The view satisfies the standard allocator contract (deallocation is a
    /// no-op; the arena reclaims in bulk) and compares equal only to views
    /// of the same arena instance. Its lifetime is tied to the arena borrow.
    #[must_use]
    pub fn memory_resource(&self) -> ArenaResource<'_> {
        ArenaResource::new(self)
    }

    /// Rejects invalid request parameters with a diagnostic error.
    fn validate_request(&self, size: usize, align: usize) -> ArenaResult<()> {
        if size == 0 {
            return Err(ArenaError::ZeroSizeAlloc);
        }
        if !align.is_power_of_two() {
            return Err(ArenaError::BadAlignment { align });
        }
        if align > MAX_ALIGNMENT {
            return Err(ArenaError::AlignmentTooLarge {
                align,
                max: MAX_ALIGNMENT,
            });
        }
        Ok(())
    }

    /// Bump-allocates without firing hooks. Parameters must be validated.
    fn alloc_raw(&self, size: usize, align: usize) -> ArenaResult<NonNull<u8>> {
        {
            let head = self.head.borrow();
            if let Some(block) = head.as_deref() {
                let before = block.used();
                if let Some(ptr) = block.allocate(size, align) {
                    self.bill(block.used() - before, size);
                    return Ok(ptr);
                }
            }
        }
        self.alloc_slow(size, align)
    }

    /// Miss path: acquire a new block, or a dedicated one for huge requests.
    #[cold]
    fn alloc_slow(&self, size: usize, align: usize) -> ArenaResult<NonNull<u8>> {
        if size >= self.options.huge_block_size || size > self.options.max_block_size {
            return self.alloc_huge(size, align);
        }

        let last = self.last_block_size.get();
        let growth = if last == 0 {
            self.options.initial_block_size
        } else {
            last.saturating_mul(2)
        };
        let capacity = growth.max(size).min(self.options.max_block_size);

        let mut block = Block::new(capacity, Arc::clone(&self.options.block_alloc))?;
        {
            let mut head = self.head.borrow_mut();
            if let Some(old) = head.take() {
                // The old current block never receives allocations again;
                // its tail is waste.
                with_local_metrics(|m| m.record_bytes_wasted(old.remaining()));
                block.next = Some(old);
            }
            *head = Some(block);
        }

        self.last_block_size.set(capacity);
        self.space_allocated.set(self.space_allocated.get() + capacity);
        with_local_metrics(|m| m.record_block_allocated(capacity));
        debug!(arena = self.id, capacity, "arena block allocated");

        let head = self.head.borrow();
        let block = head.as_deref().expect("block was just linked");
        let before = block.used();
        let ptr = block
            .allocate(size, align)
            .expect("fresh block must satisfy the request");
        self.bill(block.used() - before, size);
        Ok(ptr)
    }

    /// Serves one oversized request from a dedicated block.
    ///
    /// The dedicated block is linked behind the current block, which stays
    /// the allocation target for subsequent small requests.
    fn alloc_huge(&self, size: usize, align: usize) -> ArenaResult<NonNull<u8>> {
        let mut block = Block::new(size, Arc::clone(&self.options.block_alloc))?;
        let ptr = block
            .allocate(size, align)
            .expect("dedicated block must satisfy the request");

        {
            let mut head = self.head.borrow_mut();
            match head.as_mut() {
                Some(current) => {
                    block.next = current.next.take();
                    current.next = Some(block);
                }
                // First allocation of an empty arena: the (already full)
                // dedicated block becomes the chain head.
                None => *head = Some(block),
            }
        }

        self.space_allocated.set(self.space_allocated.get() + size);
        with_local_metrics(|m| m.record_block_allocated(size));
        debug!(arena = self.id, capacity = size, "dedicated arena block allocated");

        self.bill(size, size);
        Ok(ptr)
    }

    /// Accounts for one served request: `advance` cursor bytes for `size`
    /// requested bytes.
    fn bill(&self, advance: usize, size: usize) {
        self.space_used.set(self.space_used.get() + advance);
        with_local_metrics(|m| {
            m.record_bytes_served(size);
            m.record_bytes_wasted(advance - size);
        });
    }

    /// Allocates and links a cleanup record.
    fn push_cleanup(&self, func: CleanupFn, arg: *mut u8) -> ArenaResult<()> {
        let node = self
            .alloc_raw(mem::size_of::<CleanupNode>(), mem::align_of::<CleanupNode>())?
            .cast::<CleanupNode>();
        // SAFETY: node is valid and aligned; push overwrites the link.
        unsafe {
            node.as_ptr().write(CleanupNode {
                func,
                arg,
                next: std::ptr::null_mut(),
            });
        }
        self.cleanups.push(node);
        Ok(())
    }

    /// Allocates a slice record and links a cleanup destroying `len`
    /// elements of `T` in reverse index order.
    fn push_slice_cleanup<T>(&self, base: NonNull<T>, len: usize) -> ArenaResult<()> {
        let record = self
            .alloc_raw(mem::size_of::<SliceCleanup>(), mem::align_of::<SliceCleanup>())?
            .cast::<SliceCleanup>();
        // SAFETY: record is valid and aligned.
        unsafe {
            record.as_ptr().write(SliceCleanup {
                base: base.cast().as_ptr(),
                len,
            });
        }
        self.push_cleanup(cleanup::drop_slice::<T>, record.cast().as_ptr())
    }

    /// Frees blocks after a reset; returns the retained capacity.
    fn trim_blocks(&self, retain_first: bool) -> usize {
        let mut head = self.head.borrow_mut();
        let mut retained: Option<Box<Block>> = None;
        let mut current = head.take();

        while let Some(mut block) = current {
            current = block.next.take();
            if retain_first && current.is_none() {
                block.reset_cursor();
                retained = Some(block);
            } else {
                with_local_metrics(|m| m.record_block_released());
                drop(block);
            }
        }

        let capacity = retained.as_deref().map_or(0, Block::capacity);
        *head = retained;
        capacity
    }

    fn fire_allocation_hook(&self, type_tag: Option<&'static str>, size: usize) {
        if let Some(hook) = &self.options.hooks.on_allocation {
            hook(self, type_tag, size);
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("id", &self.id)
            .field("space_allocated", &self.space_allocated.get())
            .field("space_used", &self.space_used.get())
            .field("block_count", &self.block_count())
            .field("cleanup_count", &self.cleanups.len())
            .finish_non_exhaustive()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let executed = self.cleanups.run();
        let reclaimed = self.space_used.get();

        // Free every block iteratively so a long chain cannot overflow the
        // stack through nested drops.
        let mut current = self.head.borrow_mut().take();
        while let Some(mut block) = current {
            current = block.next.take();
            with_local_metrics(|m| m.record_block_released());
            drop(block);
        }
        self.space_used.set(0);
        self.space_allocated.set(0);

        with_local_metrics(|m| {
            m.record_cleanups(executed);
            m.record_arena_destroyed();
        });
        debug!(arena = self.id, reclaimed, "arena destroyed");

        if let Some(hook) = &self.options.hooks.on_destruction {
            hook(self, reclaimed);
        }
        if self.options.metrics_flush != MetricsFlush::Manual {
            flush_local_metrics();
        }
    }
}
