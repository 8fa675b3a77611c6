//! Invariant checking for contract tests
//!
//! Runtime invariant assertions that also record which invariants were
//! exercised, so tests can confirm the checks actually ran.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crabclip::assert_invariant;
//!
//! assert_invariant!(
//!     clips.len() <= max_records,
//!     "Store never exceeds max records",
//!     "storage::save"
//! );
//!
//! // In tests
//! crabclip::invariant_ppt::contract_test("store capacity", &[
//!     "Store never exceeds max records",
//! ]);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::thread_local;

thread_local! {
    static INVARIANT_LOG: RefCell<HashMap<String, u64>> = RefCell::new(HashMap::new());
}

/// Assert an invariant and log it for contract testing.
///
/// Panics if the condition is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::__assert_invariant_impl($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::__assert_invariant_impl($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __assert_invariant_impl(condition: bool, message: &str, context: Option<&str>) {
    INVARIANT_LOG.with(|log| {
        *log.borrow_mut().entry(message.to_string()).or_insert(0) += 1;
    });

    if !condition {
        let ctx = context.unwrap_or("unknown");
        panic!("INVARIANT VIOLATION [{}]: {}", ctx, message);
    }
}

/// How many times an invariant was checked on this thread
pub fn invariant_check_count(message: &str) -> u64 {
    INVARIANT_LOG.with(|log| log.borrow().get(message).copied().unwrap_or(0))
}

/// Panic unless every listed invariant was checked on this thread.
pub fn contract_test(test_name: &str, required_invariants: &[&str]) {
    let missing: Vec<&str> = required_invariants
        .iter()
        .copied()
        .filter(|invariant| invariant_check_count(invariant) == 0)
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: The following invariants were not checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

/// Clear the invariant log
pub fn clear_invariant_log() {
    INVARIANT_LOG.with(|log| log.borrow_mut().clear());
}

/// Invariant messages checked by the library, shared with contract tests
pub mod invariants {
    pub const STORE_CAPACITY: &str = "Store never exceeds max records";
    pub const STORE_UNIQUE_IDS: &str = "Store never holds duplicate clip ids";
    pub const SINGLE_SESSION: &str = "At most one capture session exists";
    pub const DURATION_MATCHES_CLOCK: &str = "Clip duration equals stop minus start";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checks_are_counted() {
        clear_invariant_log();
        crate::assert_invariant!(true, "counted invariant");
        crate::assert_invariant!(true, "counted invariant", "tests");
        assert_eq!(invariant_check_count("counted invariant"), 2);
        contract_test("counting", &["counted invariant"]);
    }

    #[test]
    #[should_panic(expected = "INVARIANT VIOLATION [tests]")]
    fn test_violation_panics() {
        crate::assert_invariant!(false, "always broken", "tests");
    }

    #[test]
    #[should_panic(expected = "CONTRACT FAILURE")]
    fn test_missing_invariant_fails_contract() {
        clear_invariant_log();
        contract_test("missing", &["never checked"]);
    }
}
