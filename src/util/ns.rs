//! Fresh-name allocation.
//!
//! Generated identifiers carry a numeric prefix drawn from a process-wide
//! monotone counter, so they can never collide with source identifiers
//! (which cannot start with a digit). The counter is reset only at the
//! compilation entry point, never mid-run.

use std::sync::atomic::{AtomicU64, Ordering};

static FRESH: AtomicU64 = AtomicU64::new(0);

/// Kind tag for generated locals.
pub const GLOCAL: &str = "glocal";
/// Kind tag for oracles guarding unguarded `pre`s.
pub const ORACLE: &str = "oracle";
/// Kind tag for call outputs.
pub const CALL: &str = "call";
/// Kind tag for oracles propagated from a callee.
pub const PORACLE: &str = "poracle";

/// Draw the next value of the process-wide counter.
pub fn fresh_id() -> u64 {
    FRESH.fetch_add(1, Ordering::SeqCst)
}

/// Reset the counter. Only the compilation entry point may call this.
pub fn reset_fresh_ids() {
    FRESH.store(0, Ordering::SeqCst);
}

/// A generated name: `"<n>_<kind>"`.
pub fn fresh_name(kind: &str) -> String {
    format!("{}_{}", fresh_id(), kind)
}

/// Whether `name` sits in the generated namespace (numeric prefix).
pub fn is_generated(name: &str) -> bool {
    name.split('_')
        .next()
        .map(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generated_names() {
        let a = fresh_name(GLOCAL);
        let b = fresh_name(ORACLE);
        assert!(is_generated(&a));
        assert!(is_generated(&b));
        assert!(a.ends_with("_glocal"));
        assert!(!is_generated("x"));
        assert!(!is_generated("x_1"));
    }

    #[test]
    fn monotone() {
        let _l = crate::util::testing::lock();
        let a = fresh_id();
        let b = fresh_id();
        assert!(b > a);
    }
}
