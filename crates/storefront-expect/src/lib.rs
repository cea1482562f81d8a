//! storefront-expect: polling assertions for storefront UI tests
//!
//! Assertions here never trust a single read. They sample the live page
//! repeatedly with escalating delays until the expected state shows up or
//! the timeout passes, then report a pass/fail verdict with a diagnostic.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  STOREFRONT-EXPECT Architecture                  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Matchers   │    │ poll_until │    │ Readers    │            │
//! │   │ sorted_by  │───►│ backoff    │───►│ elements   │───► page   │
//! │   │ storage_len│    │ deadline   │    │ storage    │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use storefront_expect::prelude::*;
//!
//! let prices = MockElements::new(["$29.99", "$15.99", "$9.99"]);
//! expect(&prices)
//!     .to_be_sorted_by(SortField::Price, SortOrder::Desc)
//!     .await
//!     .into_result()?;
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Suite-wide assertion configuration
pub mod config;
/// Sequence diff for failure reports
pub mod diff;
/// Page capabilities and their adapters
pub mod driver;
/// Test logging setup
pub mod logging;
/// Sorted-order and storage-length matchers
pub mod matchers;
/// Progressive polling primitive
pub mod poll;
mod result;
/// Sort criteria and value ordering
pub mod sort;
/// Storage value reading
pub mod storage;

pub use config::{EmptyPolicy, ExpectConfig, DEFAULT_BACKOFF_MS, DEFAULT_TIMEOUT_MS};
pub use diff::{diff_sequences, DiffLine, SequenceDiff};
pub use driver::{
    parse_cookie_header, Cookie, CookieReader, DocumentCookies, ElementCollection,
    ElementTextReader, LocalStorage, MemoryStorage, MockElements, MockEvaluator, ScriptEvaluator,
    Selector, StorageReader,
};
#[cfg(feature = "browser")]
pub use driver::CdpPage;
pub use logging::init_test_logging;
pub use matchers::{expect, expect_storage, Expectation, MatcherResult, Matchers, StorageExpectation};
pub use poll::{poll_until, BackoffSchedule, PollOptions, PollOutcome};
pub use result::{ExpectError, ExpectResult};
pub use sort::{SortField, SortOrder, SortSpec, SortValue};
pub use storage::{read_storage_json, StorageReading, CART_CONTENTS, SESSION_USERNAME};

/// Everything a test file usually needs
pub mod prelude {
    pub use super::driver::{
        Cookie, CookieReader, DocumentCookies, ElementCollection, ElementTextReader, LocalStorage,
        MemoryStorage, MockElements, ScriptEvaluator, Selector, StorageReader,
    };
    pub use super::matchers::{expect, expect_storage, Matchers};
    pub use super::storage::{read_storage_json, CART_CONTENTS, SESSION_USERNAME};
    pub use super::{
        EmptyPolicy, ExpectConfig, ExpectError, ExpectResult, PollOptions, SortField, SortOrder,
        SortSpec,
    };
}
