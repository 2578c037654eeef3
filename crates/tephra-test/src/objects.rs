//! Fixture types whose destructors append to a shared log.

use std::cell::RefCell;
use std::rc::Rc;

use tephra_arena::arena_managed;

/// Shared destructor log. Single-threaded, like the arenas under test.
pub type DropLog = Rc<RefCell<Vec<char>>>;

/// Creates an empty destructor log.
#[must_use]
pub fn new_drop_log() -> DropLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Arena-constructable type that records its id when dropped.
pub struct Tracked {
    id: char,
    log: DropLog,
}
arena_managed!(Tracked);

impl Tracked {
    /// Creates a tracked value appending `id` to `log` on drop.
    #[must_use]
    pub fn new(id: char, log: &DropLog) -> Self {
        Self {
            id,
            log: Rc::clone(log),
        }
    }

    /// Returns the id this value will log.
    #[must_use]
    pub fn id(&self) -> char {
        self.id
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.log.borrow_mut().push(self.id);
    }
}

/// Arena-constructable type that opts out of destructor registration.
///
/// Its `Drop` impl still records to the log, so a test can verify the arena
/// never ran it.
pub struct CreateOnly {
    id: char,
    log: DropLog,
}
arena_managed!(CreateOnly, skip_drop);

impl CreateOnly {
    /// Creates a value whose destructor must never run under the arena.
    #[must_use]
    pub fn new(id: char, log: &DropLog) -> Self {
        Self {
            id,
            log: Rc::clone(log),
        }
    }

    /// Returns the id this value would log.
    #[must_use]
    pub fn id(&self) -> char {
        self.id
    }
}

impl Drop for CreateOnly {
    fn drop(&mut self) {
        self.log.borrow_mut().push(self.id);
    }
}
