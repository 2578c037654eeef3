//! Arena configuration and observer hooks.

use std::fmt;
use std::sync::Arc;

use crate::arena::Arena;
use crate::block::{BlockAlloc, SystemBlockAlloc};
use crate::error::{ArenaError, ArenaResult};

/// Default size of the first block (64 KB).
pub const DEFAULT_INITIAL_BLOCK_SIZE: usize = 64 * 1024;

/// Default cap on geometric block growth (4 MB).
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Default threshold above which a request gets its own dedicated block (1 MB).
pub const DEFAULT_HUGE_BLOCK_SIZE: usize = 1024 * 1024;

/// When thread-local metrics are merged into the global bank.
///
/// Destruction always flushes unless the boundary is [`Manual`]: an arena
/// dying between resets would otherwise lose its counts.
///
/// [`Manual`]: MetricsFlush::Manual
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricsFlush {
    /// Flush at every arena reset and at destruction.
    #[default]
    OnReset,
    /// Flush only at arena destruction.
    OnDestruction,
    /// Flush only via [`flush_local_metrics`](crate::flush_local_metrics).
    Manual,
}

/// Observer callback fired after construction, before the first allocation.
pub type InitHook = Arc<dyn Fn(&Arena) + Send + Sync>;

/// Observer callback fired after each allocation. The type tag is
/// `Some(type_name)` for typed creation and `None` for raw requests; the
/// final argument is the requested size in bytes.
pub type AllocationHook = Arc<dyn Fn(&Arena, Option<&'static str>, usize) + Send + Sync>;

/// Observer callback fired after a reset or at destruction, with the number
/// of bytes reclaimed.
pub type ReclaimHook = Arc<dyn Fn(&Arena, usize) + Send + Sync>;

/// Observer callbacks fired synchronously from the arena's thread.
///
/// Each hook runs at most once per triggering event and must not call back
/// into the same arena.
#[derive(Default, Clone)]
pub struct ArenaHooks {
    pub(crate) on_init: Option<InitHook>,
    pub(crate) on_allocation: Option<AllocationHook>,
    pub(crate) on_reset: Option<ReclaimHook>,
    pub(crate) on_destruction: Option<ReclaimHook>,
}

impl ArenaHooks {
    /// Creates an empty hook set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initialization hook.
    #[must_use]
    pub fn on_init(mut self, hook: impl Fn(&Arena) + Send + Sync + 'static) -> Self {
        self.on_init = Some(Arc::new(hook));
        self
    }

    /// Sets the allocation hook.
    #[must_use]
    pub fn on_allocation(
        mut self,
        hook: impl Fn(&Arena, Option<&'static str>, usize) + Send + Sync + 'static,
    ) -> Self {
        self.on_allocation = Some(Arc::new(hook));
        self
    }

    /// Sets the reset hook.
    #[must_use]
    pub fn on_reset(mut self, hook: impl Fn(&Arena, usize) + Send + Sync + 'static) -> Self {
        self.on_reset = Some(Arc::new(hook));
        self
    }

    /// Sets the destruction hook.
    #[must_use]
    pub fn on_destruction(mut self, hook: impl Fn(&Arena, usize) + Send + Sync + 'static) -> Self {
        self.on_destruction = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for ArenaHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaHooks")
            .field("on_init", &self.on_init.is_some())
            .field("on_allocation", &self.on_allocation.is_some())
            .field("on_reset", &self.on_reset.is_some())
            .field("on_destruction", &self.on_destruction.is_some())
            .finish()
    }
}

/// Configuration for an [`Arena`].
///
/// # Example
///
/// ```rust
/// use tephra_arena::{Arena, ArenaOptions};
///
/// let options = ArenaOptions::new()
///     .with_initial_block_size(16 * 1024)
///     .with_huge_block_size(512 * 1024)
///     .with_retain_first_block(false);
///
/// let arena = Arena::with_options(options).unwrap();
/// assert_eq!(arena.space_allocated(), 0);
/// ```
#[derive(Clone)]
pub struct ArenaOptions {
    /// Size in bytes of the first block, allocated on demand.
    pub initial_block_size: usize,
    /// Upper bound on geometric block growth.
    pub max_block_size: usize,
    /// Requests of at least this size bypass the current block and receive
    /// a dedicated block.
    pub huge_block_size: usize,
    /// Whether `reset` keeps the first block with a rewound cursor.
    pub retain_first_block: bool,
    /// When thread-local metrics are merged into the global bank.
    pub metrics_flush: MetricsFlush,
    /// Block-level acquisition and release.
    pub block_alloc: Arc<dyn BlockAlloc>,
    /// Observer callbacks.
    pub hooks: ArenaHooks,
}

impl ArenaOptions {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initial_block_size: DEFAULT_INITIAL_BLOCK_SIZE,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            huge_block_size: DEFAULT_HUGE_BLOCK_SIZE,
            retain_first_block: true,
            metrics_flush: MetricsFlush::default(),
            block_alloc: Arc::new(SystemBlockAlloc),
            hooks: ArenaHooks::default(),
        }
    }

    /// Sets the size of the first block.
    #[must_use]
    pub fn with_initial_block_size(mut self, bytes: usize) -> Self {
        self.initial_block_size = bytes;
        self
    }

    /// Sets the cap on geometric block growth.
    #[must_use]
    pub fn with_max_block_size(mut self, bytes: usize) -> Self {
        self.max_block_size = bytes;
        self
    }

    /// Sets the dedicated-block threshold.
    #[must_use]
    pub fn with_huge_block_size(mut self, bytes: usize) -> Self {
        self.huge_block_size = bytes;
        self
    }

    /// Sets whether `reset` retains the first block.
    #[must_use]
    pub fn with_retain_first_block(mut self, retain: bool) -> Self {
        self.retain_first_block = retain;
        self
    }

    /// Sets the metrics flush boundary.
    #[must_use]
    pub fn with_metrics_flush(mut self, flush: MetricsFlush) -> Self {
        self.metrics_flush = flush;
        self
    }

    /// Sets the block allocator.
    #[must_use]
    pub fn with_block_alloc(mut self, block_alloc: Arc<dyn BlockAlloc>) -> Self {
        self.block_alloc = block_alloc;
        self
    }

    /// Sets the observer hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: ArenaHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidConfig`] when a size field is zero, the
    /// initial size is not a power of two, or the initial size exceeds the
    /// growth cap.
    pub fn validate(&self) -> ArenaResult<()> {
        if self.initial_block_size == 0 {
            return Err(ArenaError::invalid_config("initial_block_size must be > 0"));
        }
        if !self.initial_block_size.is_power_of_two() {
            return Err(ArenaError::invalid_config(
                "initial_block_size must be a power of 2",
            ));
        }
        if self.max_block_size < self.initial_block_size {
            return Err(ArenaError::invalid_config(
                "max_block_size must be >= initial_block_size",
            ));
        }
        if self.huge_block_size == 0 {
            return Err(ArenaError::invalid_config("huge_block_size must be > 0"));
        }
        Ok(())
    }
}

impl Default for ArenaOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ArenaOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaOptions")
            .field("initial_block_size", &self.initial_block_size)
            .field("max_block_size", &self.max_block_size)
            .field("huge_block_size", &self.huge_block_size)
            .field("retain_first_block", &self.retain_first_block)
            .field("metrics_flush", &self.metrics_flush)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
