//! Page capabilities consumed by the matchers.
//!
//! The matchers never talk to a browser directly. They read through
//! narrow async traits so any automation backend (or an in-memory double)
//! can sit behind them:
//!
//! ```text
//! ┌──────────────────────┐   ┌──────────────────────┐   ┌──────────────────┐
//! │ ElementTextReader    │   │ StorageReader        │   │ CookieReader     │
//! │  all_text_contents() │   │  get_item(key)       │   │  get_cookie(name)│
//! └─────────▲────────────┘   └─────────▲────────────┘   └────────▲─────────┘
//!           │ ElementCollection         │ LocalStorage            │ DocumentCookies
//!           └──────────┬────────────────┴─────────────────────────┘
//!              ┌───────┴─────────┐
//!              │ ScriptEvaluator │  CdpPage (feature "browser"), MockEvaluator
//!              └─────────────────┘
//! ```
//!
//! `CdpPage` also reads cookies straight from the browser context, which
//! includes `HttpOnly` cookies that `document.cookie` cannot see.

use crate::config::DEFAULT_TEST_ID_ATTRIBUTE;
use crate::result::{ExpectError, ExpectResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Reads the text of every element in a collection, in display order.
///
/// Each call must reflect the live page, not a cached snapshot.
#[async_trait]
pub trait ElementTextReader: Send + Sync {
    /// Text content of every matched element
    async fn all_text_contents(&self) -> ExpectResult<Vec<String>>;

    /// Short description used in matcher hints
    fn describe(&self) -> String {
        "locator".to_string()
    }
}

/// Reads raw string values from a durable key-value store
#[async_trait]
pub trait StorageReader: Send + Sync {
    /// Current raw value under `key`, `None` when absent
    async fn get_item(&self, key: &str) -> ExpectResult<Option<String>>;

    /// Short description used in matcher hints
    fn describe(&self) -> String {
        "storage".to_string()
    }
}

/// Evaluates an expression in the page context
#[async_trait]
pub trait ScriptEvaluator: Send + Sync {
    /// Evaluate `expression` and return its JSON value
    async fn evaluate(&self, expression: &str) -> ExpectResult<Value>;
}

/// A cookie visible to the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Domain, when the backend reports it
    pub domain: Option<String>,
    /// Path, when the backend reports it
    pub path: Option<String>,
}

impl Cookie {
    /// Cookie with just a name and value
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
        }
    }

    /// Set the domain
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Parse a `document.cookie` string (`"a=1; b=2"`)
#[must_use]
pub fn parse_cookie_header(header: &str) -> Vec<Cookie> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| Cookie::new(name, value.trim()))
        })
        .collect()
}

/// Looks up cookies by name
#[async_trait]
pub trait CookieReader: Send + Sync {
    /// The cookie called `name`, `None` when the page has none
    async fn get_cookie(&self, name: &str) -> ExpectResult<Option<Cookie>>;
}

#[async_trait]
impl<T: ElementTextReader + ?Sized> ElementTextReader for &T {
    async fn all_text_contents(&self) -> ExpectResult<Vec<String>> {
        (**self).all_text_contents().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[async_trait]
impl<T: ElementTextReader + ?Sized> ElementTextReader for Arc<T> {
    async fn all_text_contents(&self) -> ExpectResult<Vec<String>> {
        (**self).all_text_contents().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[async_trait]
impl<T: StorageReader + ?Sized> StorageReader for &T {
    async fn get_item(&self, key: &str) -> ExpectResult<Option<String>> {
        (**self).get_item(key).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[async_trait]
impl<T: StorageReader + ?Sized> StorageReader for Arc<T> {
    async fn get_item(&self, key: &str) -> ExpectResult<Option<String>> {
        (**self).get_item(key).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[async_trait]
impl<T: ScriptEvaluator + ?Sized> ScriptEvaluator for &T {
    async fn evaluate(&self, expression: &str) -> ExpectResult<Value> {
        (**self).evaluate(expression).await
    }
}

#[async_trait]
impl<T: ScriptEvaluator + ?Sized> ScriptEvaluator for Arc<T> {
    async fn evaluate(&self, expression: &str) -> ExpectResult<Value> {
        (**self).evaluate(expression).await
    }
}

#[async_trait]
impl<T: CookieReader + ?Sized> CookieReader for &T {
    async fn get_cookie(&self, name: &str) -> ExpectResult<Option<Cookie>> {
        (**self).get_cookie(name).await
    }
}

fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

// =============================================================================
// SCRIPT-BACKED ADAPTERS
// =============================================================================

/// How an element collection is located
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// CSS selector (e.g., ".inventory_item_price")
    Css(String),
    /// Test id, matched against the configured test-id attribute
    TestId(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a test id selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// CSS form of this selector
    #[must_use]
    pub fn to_css(&self, test_id_attribute: &str) -> String {
        match self {
            Self::Css(css) => css.clone(),
            Self::TestId(id) => format!("[{test_id_attribute}={}]", js_string(id)),
        }
    }

    /// Expression returning the text of every match, in document order
    #[must_use]
    pub fn to_text_query(&self, test_id_attribute: &str) -> String {
        format!(
            "Array.from(document.querySelectorAll({}), el => el.textContent ?? '')",
            js_string(&self.to_css(test_id_attribute))
        )
    }
}

/// [`ElementTextReader`] that queries the page through a [`ScriptEvaluator`]
#[derive(Debug, Clone)]
pub struct ElementCollection<E> {
    evaluator: E,
    selector: Selector,
    test_id_attribute: String,
}

impl<E: ScriptEvaluator> ElementCollection<E> {
    /// Create a collection reader using the default test-id attribute
    pub fn new(evaluator: E, selector: Selector) -> Self {
        Self {
            evaluator,
            selector,
            test_id_attribute: DEFAULT_TEST_ID_ATTRIBUTE.to_string(),
        }
    }

    /// Override the test-id attribute
    #[must_use]
    pub fn with_test_id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.test_id_attribute = attribute.into();
        self
    }

    /// The selector being read
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }
}

#[async_trait]
impl<E: ScriptEvaluator> ElementTextReader for ElementCollection<E> {
    async fn all_text_contents(&self) -> ExpectResult<Vec<String>> {
        let script = self.selector.to_text_query(&self.test_id_attribute);
        let value = self.evaluator.evaluate(&script).await?;
        let texts: Vec<Option<String>> = serde_json::from_value(value)?;
        Ok(texts.into_iter().map(Option::unwrap_or_default).collect())
    }

    fn describe(&self) -> String {
        format!("locator({})", self.selector.to_css(&self.test_id_attribute))
    }
}

/// [`StorageReader`] over the page's `window.localStorage`
#[derive(Debug, Clone)]
pub struct LocalStorage<E> {
    evaluator: E,
}

impl<E: ScriptEvaluator> LocalStorage<E> {
    /// Read local storage through `evaluator`
    pub const fn new(evaluator: E) -> Self {
        Self { evaluator }
    }

    /// Expression reading `key`
    #[must_use]
    pub fn get_item_script(key: &str) -> String {
        format!("window.localStorage.getItem({})", js_string(key))
    }
}

#[async_trait]
impl<E: ScriptEvaluator> StorageReader for LocalStorage<E> {
    async fn get_item(&self, key: &str) -> ExpectResult<Option<String>> {
        match self.evaluator.evaluate(&Self::get_item_script(key)).await? {
            Value::Null => Ok(None),
            Value::String(raw) => Ok(Some(raw)),
            other => Err(ExpectError::driver(format!(
                "localStorage.getItem returned a non-string value: {other}"
            ))),
        }
    }

    fn describe(&self) -> String {
        "page.localStorage".to_string()
    }
}

/// [`CookieReader`] over `document.cookie`.
///
/// Only sees cookies readable from script; `HttpOnly` cookies need a backend
/// with direct browser access such as `CdpPage`.
#[derive(Debug, Clone)]
pub struct DocumentCookies<E> {
    evaluator: E,
}

impl<E: ScriptEvaluator> DocumentCookies<E> {
    /// Expression reading every script-visible cookie
    pub const SCRIPT: &'static str = "document.cookie";

    /// Read cookies through `evaluator`
    pub const fn new(evaluator: E) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl<E: ScriptEvaluator> CookieReader for DocumentCookies<E> {
    async fn get_cookie(&self, name: &str) -> ExpectResult<Option<Cookie>> {
        match self.evaluator.evaluate(Self::SCRIPT).await? {
            Value::String(header) => Ok(parse_cookie_header(&header)
                .into_iter()
                .find(|cookie| cookie.name == name)),
            other => Err(ExpectError::driver(format!(
                "document.cookie returned a non-string value: {other}"
            ))),
        }
    }
}

// =============================================================================
// IN-MEMORY DOUBLES
// =============================================================================

#[derive(Debug, Clone)]
enum MockFrame {
    Texts(Vec<String>),
    Error(String),
}

/// Scripted element collection.
///
/// Each read returns the next frame; the last frame repeats forever. Useful
/// for simulating a listing that re-renders after a sort.
#[derive(Debug, Default)]
pub struct MockElements {
    frames: Vec<MockFrame>,
    reads: AtomicUsize,
}

impl MockElements {
    /// Collection that always renders `texts`
    #[must_use]
    pub fn new<S: Into<String>>(texts: impl IntoIterator<Item = S>) -> Self {
        Self::default().then(texts)
    }

    /// Render `texts` on the next read
    #[must_use]
    pub fn then<S: Into<String>>(mut self, texts: impl IntoIterator<Item = S>) -> Self {
        self.frames
            .push(MockFrame::Texts(texts.into_iter().map(Into::into).collect()));
        self
    }

    /// Fail the next read with a driver error
    #[must_use]
    pub fn then_error(mut self, message: impl Into<String>) -> Self {
        self.frames.push(MockFrame::Error(message.into()));
        self
    }

    /// Number of reads so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ElementTextReader for MockElements {
    async fn all_text_contents(&self) -> ExpectResult<Vec<String>> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst);
        let Some(frame) = self.frames.get(read).or_else(|| self.frames.last()) else {
            return Ok(Vec::new());
        };
        match frame {
            MockFrame::Texts(texts) => Ok(texts.clone()),
            MockFrame::Error(message) => Err(ExpectError::driver(message.clone())),
        }
    }

    fn describe(&self) -> String {
        "mock.locator".to_string()
    }
}

/// Shared in-memory key-value store.
///
/// Clones share the same map, so a test can hand one clone to a matcher and
/// mutate through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
    cookies: Arc<Mutex<HashMap<String, Cookie>>>,
    reads: Arc<AtomicUsize>,
}

impl MemoryStorage {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item
    #[must_use]
    pub fn with_item(self, key: &str, value: &str) -> Self {
        self.set_item(key, value);
        self
    }

    fn items(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set `key` to `value`
    pub fn set_item(&self, key: &str, value: &str) {
        self.items().insert(key.to_string(), value.to_string());
    }

    /// Remove `key`
    pub fn remove_item(&self, key: &str) {
        self.items().remove(key);
    }

    /// Remove every item and cookie
    pub fn clear(&self) {
        self.items().clear();
        self.cookies().clear();
    }

    fn cookies(&self) -> MutexGuard<'_, HashMap<String, Cookie>> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a cookie
    #[must_use]
    pub fn with_cookie(self, name: &str, value: &str) -> Self {
        self.set_cookie(Cookie::new(name, value));
        self
    }

    /// Set or replace a cookie
    pub fn set_cookie(&self, cookie: Cookie) {
        self.cookies().insert(cookie.name.clone(), cookie);
    }

    /// Write `value` after `delay`, like a UI that persists shortly after a click.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn set_item_after(
        &self,
        key: &str,
        value: &str,
        delay: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        let (key, value) = (key.to_string(), value.to_string());
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            store.set_item(&key, &value);
        })
    }

    /// Number of reads so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageReader for MemoryStorage {
    async fn get_item(&self, key: &str) -> ExpectResult<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.items().get(key).cloned())
    }

    fn describe(&self) -> String {
        "memory.storage".to_string()
    }
}

#[async_trait]
impl CookieReader for MemoryStorage {
    async fn get_cookie(&self, name: &str) -> ExpectResult<Option<Cookie>> {
        Ok(self.cookies().get(name).cloned())
    }
}

/// Script evaluator returning canned results
#[derive(Debug, Default)]
pub struct MockEvaluator {
    results: HashMap<String, Value>,
    history: Mutex<Vec<String>>,
}

impl MockEvaluator {
    /// Create an evaluator with no canned results
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `value` whenever `expression` is evaluated
    #[must_use]
    pub fn with_result(mut self, expression: impl Into<String>, value: Value) -> Self {
        self.results.insert(expression.into(), value);
        self
    }

    /// Expressions evaluated so far
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ScriptEvaluator for MockEvaluator {
    async fn evaluate(&self, expression: &str) -> ExpectResult<Value> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(expression.to_string());
        self.results
            .get(expression)
            .cloned()
            .ok_or_else(|| ExpectError::driver(format!("no mock result for {expression}")))
    }
}

// =============================================================================
// CHROMIUM (CDP)
// =============================================================================

#[cfg(feature = "browser")]
mod cdp {
    use super::{async_trait, Cookie, CookieReader, ExpectError, ExpectResult, ScriptEvaluator, Value};
    use chromiumoxide::Page;

    /// [`ScriptEvaluator`] backed by a live chromiumoxide page
    #[derive(Debug, Clone)]
    pub struct CdpPage {
        page: Page,
    }

    impl CdpPage {
        /// Wrap an open page
        #[must_use]
        pub const fn new(page: Page) -> Self {
            Self { page }
        }

        /// The underlying page
        #[must_use]
        pub const fn page(&self) -> &Page {
            &self.page
        }
    }

    #[async_trait]
    impl ScriptEvaluator for CdpPage {
        async fn evaluate(&self, expression: &str) -> ExpectResult<Value> {
            let result = self
                .page
                .evaluate(expression)
                .await
                .map_err(|e| ExpectError::driver(e.to_string()))?;
            Ok(result.value().cloned().unwrap_or(Value::Null))
        }
    }

    #[async_trait]
    impl CookieReader for CdpPage {
        async fn get_cookie(&self, name: &str) -> ExpectResult<Option<Cookie>> {
            let cookies = self
                .page
                .get_cookies()
                .await
                .map_err(|e| ExpectError::driver(e.to_string()))?;
            Ok(cookies.into_iter().find(|c| c.name == name).map(|c| Cookie {
                name: c.name,
                value: c.value,
                domain: Some(c.domain),
                path: Some(c.path),
            }))
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::CdpPage;
