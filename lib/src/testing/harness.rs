//! Suite descriptors and the single-test runner.

use core::ffi::c_char;

use super::TestResult;
use crate::klog_info;

/// Result block filled in by a suite runner.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TestSuiteResult {
    pub name: *const c_char,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub elapsed_cycles: u64,
}

impl TestSuiteResult {
    pub const fn zeroed() -> Self {
        Self {
            name: core::ptr::null(),
            total: 0,
            passed: 0,
            failed: 0,
            elapsed_cycles: 0,
        }
    }
}

/// One registered suite, placed in the `.test_registry` section.
#[repr(C)]
pub struct TestSuiteDesc {
    pub name: *const c_char,
    pub run: Option<fn(*mut TestSuiteResult) -> i32>,
}

// SAFETY: Descriptors only reference 'static NUL-terminated names and fns.
unsafe impl Sync for TestSuiteDesc {}

/// Run one test function, logging its name and outcome.
pub fn run_single_test<F: FnOnce() -> TestResult>(name: &str, test_fn: F) -> TestResult {
    let result = test_fn();
    match result {
        TestResult::Pass => klog_info!("  ok   {}", name),
        TestResult::Fail => klog_info!("  FAIL {}", name),
        TestResult::Skipped => klog_info!("  skip {}", name),
    }
    result
}
