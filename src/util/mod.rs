//! Utilities.

pub mod ns;

#[cfg(test)]
pub(crate) mod testing {
    use lazy_static::lazy_static;
    use std::sync::{Mutex, MutexGuard};

    lazy_static! {
        static ref LOCK: Mutex<()> = Mutex::new(());
    }

    /// Tests that depend on process-wide state the compilation entry
    /// point resets (the fresh-name counter, the state-variable
    /// registry) serialize on this lock.
    pub fn lock() -> MutexGuard<'static, ()> {
        LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }
}
