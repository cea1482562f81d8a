//! Polling matchers for storefront listings and storage.
//!
//! ```ignore
//! let matchers = Matchers::new(ExpectConfig::default())?;
//! matchers
//!     .expect(&prices)
//!     .to_be_sorted_by(SortField::Price, SortOrder::Desc)
//!     .await
//!     .into_result()?;
//! matchers
//!     .expect_storage(&storage)
//!     .to_have_storage_length(CART_CONTENTS, 2)
//!     .await
//!     .into_result()?;
//! ```
//!
//! Every matcher polls the live page until its condition holds or the
//! timeout passes. `.not()` inverts the verdict, but polling still waits for
//! the positive condition, so a negated matcher that passes always takes the
//! full timeout.

use crate::config::{EmptyPolicy, ExpectConfig};
use crate::diff::diff_sequences;
use crate::driver::{ElementCollection, ElementTextReader, ScriptEvaluator, Selector, StorageReader};
use crate::poll::{poll_until, PollOptions, PollOutcome};
use crate::result::{ExpectError, ExpectResult};
use crate::sort::{extract_values, first_violation, is_sorted, sorted_copy, SortField, SortOrder, SortSpec, SortValue};
use crate::storage::{read_storage_reading, StorageReading};
use std::fmt;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::debug;

/// Observed values shown when a negated sort matcher fails
const SUMMARY_VALUES: usize = 3;

type MessageFn = Box<dyn Fn() -> String + Send + Sync>;

/// Verdict of one matcher call.
///
/// The message is built on demand; passing assertions never pay for diffing.
pub struct MatcherResult {
    pass: bool,
    message: MessageFn,
}

impl MatcherResult {
    /// Create a result with a lazily rendered message
    pub fn new(pass: bool, message: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self {
            pass,
            message: Box::new(message),
        }
    }

    /// Whether the assertion passed
    #[must_use]
    pub const fn pass(&self) -> bool {
        self.pass
    }

    /// Render the diagnostic message
    #[must_use]
    pub fn message(&self) -> String {
        (self.message)()
    }

    /// `Ok(())` on pass, [`ExpectError::AssertionFailed`] otherwise
    pub fn into_result(self) -> ExpectResult<()> {
        if self.pass {
            Ok(())
        } else {
            Err(ExpectError::AssertionFailed {
                message: self.message(),
            })
        }
    }
}

impl fmt::Debug for MatcherResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatcherResult")
            .field("pass", &self.pass)
            .finish_non_exhaustive()
    }
}

fn matcher_hint(target: &str, negated: bool, matcher: &str, args: &str) -> String {
    let not = if negated { ".not()" } else { "" };
    format!("expect({target}){not}.{matcher}({args})")
}

fn timing_line<T, E>(outcome: &PollOutcome<T, E>) -> String {
    format!(
        "Polled {} time(s) over {}ms",
        outcome.attempts,
        outcome.elapsed.as_millis()
    )
}

// =============================================================================
// SORTED-ORDER MATCHER
// =============================================================================

/// Expectation over an ordered element collection
#[derive(Debug, Clone)]
pub struct Expectation<R> {
    reader: R,
    negated: bool,
    options: PollOptions,
    empty_policy: EmptyPolicy,
}

impl<R: ElementTextReader> Expectation<R> {
    /// Create an expectation with default timing and empty policy
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            negated: false,
            options: PollOptions::default(),
            empty_policy: EmptyPolicy::default(),
        }
    }

    /// Negate the expectation
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Override the timeout for this assertion only
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Replace timing options
    #[must_use]
    pub fn with_poll_options(mut self, options: PollOptions) -> Self {
        self.options = options;
        self
    }

    /// Set how an empty collection is judged
    #[must_use]
    pub const fn with_empty_policy(mut self, policy: EmptyPolicy) -> Self {
        self.empty_policy = policy;
        self
    }

    /// Assert the collection is sorted by `by` in `order`
    pub async fn to_be_sorted_by(&self, by: SortField, order: SortOrder) -> MatcherResult {
        self.to_match_sort(SortSpec::new(by, order)).await
    }

    /// Assert the collection follows `spec`
    pub async fn to_match_sort(&self, spec: SortSpec) -> MatcherResult {
        let reader = &self.reader;
        let field = &spec.by;
        let order = spec.order;
        let empty_policy = self.empty_policy;

        let outcome = poll_until(
            move || async move {
                let texts = reader.all_text_contents().await?;
                extract_values(&texts, field).map(Some)
            },
            |values: &Vec<SortValue>| is_sorted(values, order, empty_policy),
            &self.options,
        )
        .await;

        let pass = outcome.pass != self.negated;
        debug!(
            matcher = "to_be_sorted_by",
            %spec,
            negated = self.negated,
            pass,
            attempts = outcome.attempts,
            "assertion evaluated"
        );

        let hint = matcher_hint(
            &self.reader.describe(),
            self.negated,
            "to_be_sorted_by",
            &format!("{}, {}", spec.by, spec.order),
        );
        let report = SortReport {
            hint,
            spec,
            timing: timing_line(&outcome),
            last_error: outcome.last_error.map(|e| e.to_string()),
            condition_met: outcome.pass,
            values: outcome.value,
        };
        MatcherResult::new(pass, move || report.render())
    }
}

struct SortReport {
    hint: String,
    spec: SortSpec,
    timing: String,
    last_error: Option<String>,
    condition_met: bool,
    values: Option<Vec<SortValue>>,
}

impl SortReport {
    fn render(&self) -> String {
        let mut out = format!("{}\n\n", self.hint);
        let values = self.values.as_deref().unwrap_or_default();

        if self.condition_met {
            let first: Vec<String> = values
                .iter()
                .take(SUMMARY_VALUES)
                .map(ToString::to_string)
                .collect();
            let _ = writeln!(out, "Expected: not sorted by {}", self.spec);
            let _ = write!(out, "Received: first {SUMMARY_VALUES} values: [{}]", first.join(", "));
            return out;
        }

        if values.is_empty() {
            out.push_str("Error: Polling timed out or received empty data.\n");
            if let Some(err) = &self.last_error {
                let _ = writeln!(out, "Last error: {err}");
            }
            out.push_str(&self.timing);
            return out;
        }

        match first_violation(values, self.spec.order) {
            Some(v) => {
                let _ = writeln!(
                    out,
                    "Expected: \"{} {} {}\" ({})",
                    v.prev,
                    self.spec.order.expected_operator(),
                    v.curr,
                    self.spec
                );
                let _ = writeln!(
                    out,
                    "Received: \"{} {} {}\" at index {}",
                    v.prev,
                    self.spec.order.violation_operator(),
                    v.curr,
                    v.index
                );
                let expected = sorted_copy(values, self.spec.order);
                let _ = write!(out, "\nDiff:\n{}", diff_sequences(&expected, values));
            }
            None => {
                let _ = writeln!(out, "Expected: sorted by {}", self.spec);
                let _ = writeln!(out, "Received: {} value(s), never settled", values.len());
            }
        }
        out.push_str(&self.timing);
        out
    }
}

// =============================================================================
// STORAGE-LENGTH MATCHER
// =============================================================================

/// Expectation over a key-value store
#[derive(Debug, Clone)]
pub struct StorageExpectation<S> {
    reader: S,
    negated: bool,
    options: PollOptions,
}

impl<S: StorageReader> StorageExpectation<S> {
    /// Create an expectation with default timing
    pub fn new(reader: S) -> Self {
        Self {
            reader,
            negated: false,
            options: PollOptions::default(),
        }
    }

    /// Negate the expectation
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Override the timeout for this assertion only
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Replace timing options
    #[must_use]
    pub fn with_poll_options(mut self, options: PollOptions) -> Self {
        self.options = options;
        self
    }

    /// Assert `key` holds a JSON array of exactly `expected` elements
    pub async fn to_have_storage_length(&self, key: &str, expected: usize) -> MatcherResult {
        let reader = &self.reader;

        let outcome = poll_until(
            move || async move { read_storage_reading(reader, key).await.map(Some) },
            |reading: &StorageReading| reading.array_len() == Some(expected),
            &self.options,
        )
        .await;

        let pass = outcome.pass != self.negated;
        debug!(
            matcher = "to_have_storage_length",
            key,
            expected,
            negated = self.negated,
            pass,
            attempts = outcome.attempts,
            "assertion evaluated"
        );

        let report = StorageReport {
            hint: matcher_hint(
                &self.reader.describe(),
                self.negated,
                "to_have_storage_length",
                &format!("{key:?}, {expected}"),
            ),
            key: key.to_string(),
            expected,
            timing: timing_line(&outcome),
            last_error: outcome.last_error.map(|e| e.to_string()),
            condition_met: outcome.pass,
            reading: outcome.value.unwrap_or(StorageReading::Missing),
        };
        MatcherResult::new(pass, move || report.render())
    }
}

struct StorageReport {
    hint: String,
    key: String,
    expected: usize,
    timing: String,
    last_error: Option<String>,
    condition_met: bool,
    reading: StorageReading,
}

impl StorageReport {
    fn render(&self) -> String {
        let mut out = format!("{}\n\n", self.hint);

        if self.condition_met {
            let _ = writeln!(out, "Storage Key: {:?}", self.key);
            let _ = writeln!(out, "Expected length: not {}", self.expected);
            let _ = write!(out, "Received length: {}", self.expected);
            return out;
        }

        match &self.reading {
            StorageReading::Missing => {
                let _ = writeln!(out, "Key {:?} not found in storage", self.key);
                if let Some(err) = &self.last_error {
                    let _ = writeln!(out, "Last error: {err}");
                }
            }
            StorageReading::InvalidJson { raw } => {
                let _ = writeln!(out, "Storage Key: {:?}", self.key);
                let _ = writeln!(out, "Value error: Invalid JSON");
                let _ = writeln!(out, "Received: {raw:?}");
            }
            StorageReading::NotAnArray { raw } => {
                let _ = writeln!(out, "Storage Key: {:?}", self.key);
                let _ = writeln!(out, "Value error: Not an array");
                let _ = writeln!(out, "Received: {raw:?}");
            }
            StorageReading::Array { len } => {
                let _ = writeln!(out, "Storage Key: {:?}", self.key);
                let _ = writeln!(out, "Expected length: {}", self.expected);
                let _ = writeln!(out, "Received length: {len}");
            }
        }
        out.push_str(&self.timing);
        out
    }
}

// =============================================================================
// FACTORY
// =============================================================================

/// Matcher factory carrying suite-wide configuration
#[derive(Debug, Clone)]
pub struct Matchers {
    options: PollOptions,
    empty_policy: EmptyPolicy,
    test_id_attribute: String,
}

impl Default for Matchers {
    fn default() -> Self {
        let config = ExpectConfig::default();
        Self {
            options: PollOptions::default(),
            empty_policy: config.empty_policy,
            test_id_attribute: config.test_id_attribute,
        }
    }
}

impl Matchers {
    /// Build a factory from configuration
    pub fn new(config: ExpectConfig) -> ExpectResult<Self> {
        Ok(Self {
            options: config.poll_options()?,
            empty_policy: config.empty_policy,
            test_id_attribute: config.test_id_attribute,
        })
    }

    /// Timing options handed to every expectation
    #[must_use]
    pub const fn poll_options(&self) -> &PollOptions {
        &self.options
    }

    /// Expectation over an element collection
    pub fn expect<R: ElementTextReader>(&self, reader: R) -> Expectation<R> {
        Expectation::new(reader)
            .with_poll_options(self.options.clone())
            .with_empty_policy(self.empty_policy)
    }

    /// Expectation over a key-value store
    pub fn expect_storage<S: StorageReader>(&self, reader: S) -> StorageExpectation<S> {
        StorageExpectation::new(reader).with_poll_options(self.options.clone())
    }

    /// Element collection reader using the configured test-id attribute
    pub fn collection<E: ScriptEvaluator>(
        &self,
        evaluator: E,
        selector: Selector,
    ) -> ElementCollection<E> {
        ElementCollection::new(evaluator, selector).with_test_id_attribute(&self.test_id_attribute)
    }
}

/// Expectation over an element collection with default configuration
pub fn expect<R: ElementTextReader>(reader: R) -> Expectation<R> {
    Expectation::new(reader)
}

/// Expectation over a key-value store with default configuration
pub fn expect_storage<S: StorageReader>(reader: S) -> StorageExpectation<S> {
    StorageExpectation::new(reader)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MemoryStorage, MockElements, MockEvaluator};
    use crate::storage::CART_CONTENTS;
    use serde_json::json;

    mod matcher_result {
        use super::*;

        #[test]
        fn test_message_is_lazy() {
            use std::sync::atomic::{AtomicUsize, Ordering};
            use std::sync::Arc;

            let renders = Arc::new(AtomicUsize::new(0));
            let counter = renders.clone();
            let result = MatcherResult::new(true, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                "unused".to_string()
            });

            assert!(result.into_result().is_ok());
            assert_eq!(renders.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn test_failure_carries_message() {
            let err = MatcherResult::new(false, || "boom".to_string())
                .into_result()
                .unwrap_err();
            assert!(matches!(err, ExpectError::AssertionFailed { ref message } if message == "boom"));
        }

        #[test]
        fn test_debug_omits_closure() {
            let result = MatcherResult::new(false, String::new);
            assert!(format!("{result:?}").contains("pass: false"));
        }
    }

    mod sorted_by {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_passes_on_sorted_prices() {
            let prices = MockElements::new(["$3.00", "$5.00", "$10.00"]);
            let result = expect(&prices)
                .to_be_sorted_by(SortField::Price, SortOrder::Asc)
                .await;
            assert!(result.pass());
            assert_eq!(prices.reads(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_violation_report() {
            let prices = MockElements::new(["$5.00", "$3.00", "$10.00"]);
            let result = expect(&prices)
                .to_be_sorted_by(SortField::Price, SortOrder::Asc)
                .await;
            assert!(!result.pass());

            let message = result.message();
            assert!(message.starts_with("expect(mock.locator).to_be_sorted_by(price, asc)"));
            assert!(message.contains("Expected: \"5 ≤ 3\" (price asc)"));
            assert!(message.contains("Received: \"5 > 3\" at index 0"));
            assert!(message.contains("Diff:\n- Expected  - 1\n+ Received  + 1"));
            assert!(message.contains("Polled 8 time(s)"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_waits_for_resort() {
            let names = MockElements::new(["Sauce Labs Onesie", "Sauce Labs Backpack"])
                .then(["Sauce Labs Onesie", "Sauce Labs Backpack"])
                .then(["Sauce Labs Backpack", "Sauce Labs Onesie"]);
            let result = expect(&names)
                .to_be_sorted_by(SortField::Name, SortOrder::Asc)
                .await;
            assert!(result.pass());
            assert_eq!(names.reads(), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_placeholder_text_is_retried() {
            let prices = MockElements::new(["Loading..."]).then(["$9.99", "$7.99"]);
            let result = expect(&prices)
                .to_be_sorted_by(SortField::Price, SortOrder::Desc)
                .await;
            assert!(result.pass());
        }

        #[tokio::test(start_paused = true)]
        async fn test_empty_listing_fails_by_default() {
            let empty = MockElements::new(Vec::<String>::new());
            let result = expect(&empty)
                .with_timeout(Duration::from_millis(500))
                .to_be_sorted_by(SortField::Name, SortOrder::Asc)
                .await;
            assert!(!result.pass());
            assert!(result
                .message()
                .contains("Error: Polling timed out or received empty data."));
        }

        #[tokio::test(start_paused = true)]
        async fn test_empty_listing_pass_policy() {
            let empty = MockElements::new(Vec::<String>::new());
            let result = expect(&empty)
                .with_empty_policy(EmptyPolicy::Pass)
                .to_be_sorted_by(SortField::Name, SortOrder::Asc)
                .await;
            assert!(result.pass());
        }

        #[tokio::test(start_paused = true)]
        async fn test_last_error_reported_when_nothing_read() {
            let broken = MockElements::default().then_error("target closed");
            let result = expect(&broken)
                .with_timeout(Duration::from_millis(300))
                .to_be_sorted_by(SortField::Price, SortOrder::Asc)
                .await;
            let message = result.message();
            assert!(message.contains("received empty data"));
            assert!(message.contains("Last error: Driver error: target closed"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_negated_sorted_listing_fails() {
            let prices = MockElements::new(["$1", "$2", "$3", "$4"]);
            let result = expect(&prices)
                .not()
                .to_be_sorted_by(SortField::Price, SortOrder::Asc)
                .await;
            assert!(!result.pass());
            let message = result.message();
            assert!(message.starts_with("expect(mock.locator).not().to_be_sorted_by(price, asc)"));
            assert!(message.contains("Expected: not sorted by price asc"));
            assert!(message.contains("Received: first 3 values: [1, 2, 3]"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_negated_unsorted_listing_passes() {
            let prices = MockElements::new(["$2", "$1"]);
            let result = expect(&prices)
                .not()
                .with_timeout(Duration::from_millis(200))
                .to_be_sorted_by(SortField::Price, SortOrder::Asc)
                .await;
            assert!(result.pass());
        }

        #[tokio::test(start_paused = true)]
        async fn test_option_label_spec() {
            let names = MockElements::new(["Test.allTheThings()", "Sauce Labs Onesie"]);
            let spec = SortSpec::from_option_label("Name (Z to A)").unwrap();
            assert!(expect(&names).to_match_sort(spec).await.pass());
        }
    }

    mod storage_length {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_matching_length() {
            let storage = MemoryStorage::new().with_item(CART_CONTENTS, "[1,2,3]");
            let result = expect_storage(&storage)
                .to_have_storage_length(CART_CONTENTS, 3)
                .await;
            assert!(result.pass());
        }

        #[tokio::test(start_paused = true)]
        async fn test_length_mismatch_report() {
            let storage = MemoryStorage::new().with_item(CART_CONTENTS, "[1]");
            let result = expect_storage(&storage)
                .with_timeout(Duration::from_millis(400))
                .to_have_storage_length(CART_CONTENTS, 2)
                .await;
            assert!(!result.pass());
            let message = result.message();
            assert!(message.contains("Storage Key: \"cart-contents\""));
            assert!(message.contains("Expected length: 2\nReceived length: 1"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_not_an_array_report() {
            let storage = MemoryStorage::new().with_item(CART_CONTENTS, "{\"count\":2}");
            let result = expect_storage(&storage)
                .with_timeout(Duration::from_millis(200))
                .to_have_storage_length(CART_CONTENTS, 2)
                .await;
            let message = result.message();
            assert!(message.contains("Value error: Not an array"));
            assert!(!message.contains("Received length"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_key_polls_full_timeout() {
            let storage = MemoryStorage::new();
            let result = expect_storage(&storage)
                .to_have_storage_length(CART_CONTENTS, 0)
                .await;
            assert!(!result.pass());
            assert!(result
                .message()
                .contains("Key \"cart-contents\" not found in storage"));
            assert_eq!(storage.reads(), 8);
        }

        #[tokio::test(start_paused = true)]
        async fn test_negated_matching_length_fails() {
            let storage = MemoryStorage::new().with_item(CART_CONTENTS, "[]");
            let result = expect_storage(&storage)
                .not()
                .to_have_storage_length(CART_CONTENTS, 0)
                .await;
            assert!(!result.pass());
            assert!(result.message().contains("Expected length: not 0"));
        }
    }

    mod factory {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_config_flows_into_expectations() {
            let matchers = Matchers::new(
                ExpectConfig::new()
                    .with_timeout_ms(250)
                    .with_backoff_ms(vec![50])
                    .with_empty_policy(EmptyPolicy::Pass),
            )
            .unwrap();
            assert_eq!(matchers.poll_options().timeout, Duration::from_millis(250));

            let empty = MockElements::new(Vec::<String>::new());
            assert!(matchers
                .expect(&empty)
                .to_be_sorted_by(SortField::Name, SortOrder::Desc)
                .await
                .pass());

            let storage = MemoryStorage::new();
            let result = matchers
                .expect_storage(&storage)
                .to_have_storage_length(CART_CONTENTS, 1)
                .await;
            assert!(!result.pass());
            // 0, 50, 100, 150, 200, 250
            assert_eq!(storage.reads(), 6);
        }

        #[test]
        fn test_invalid_config_rejected() {
            let err = Matchers::new(ExpectConfig::new().with_backoff_ms(Vec::new())).unwrap_err();
            assert!(matches!(err, ExpectError::Config { .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_collection_uses_configured_attribute() {
            let matchers =
                Matchers::new(ExpectConfig::new().with_test_id_attribute("data-testid")).unwrap();
            let selector = Selector::test_id("inventory-item-price");
            let evaluator = MockEvaluator::new().with_result(
                selector.to_text_query("data-testid"),
                json!(["$7.99", "$9.99"]),
            );
            let prices = matchers.collection(&evaluator, selector);
            assert!(matchers
                .expect(&prices)
                .to_be_sorted_by(SortField::Price, SortOrder::Asc)
                .await
                .pass());
        }
    }
}
