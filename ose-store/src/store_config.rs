use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor, DEFAULT_FIELD_SEPARATOR};
use crate::errors::{ErrorKind, StoreError, StoreResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Settings shared by a [Store](crate::store::Store) and all its collections.
///
/// A config is mutable only until the store is opened; afterwards every
/// setter fails with `InvalidOperation`. Clones share the same settings.
#[derive(Clone, Default)]
pub struct StoreConfig {
    inner: Arc<StoreConfigInner>,
}

impl StoreConfig {
    pub fn new() -> Self {
        StoreConfig {
            inner: Arc::new(StoreConfigInner::new()),
        }
    }

    /// Separator of nested field paths, `.` by default.
    pub fn field_separator(&self) -> String {
        self.inner.field_separator.read_with(|it| it.clone())
    }

    pub fn set_field_separator(&self, separator: &str) -> StoreResult<()> {
        self.inner.check_mutable("Field separator")?;
        if separator.is_empty() {
            log::error!("Field separator cannot be empty");
            return Err(StoreError::new(
                "Field separator cannot be empty",
                ErrorKind::InvalidOperation,
            ));
        }
        self.inner
            .field_separator
            .write_with(|it| *it = separator.to_string());
        Ok(())
    }

    /// Field that `upsert` stamps with the write time in epoch milliseconds.
    pub fn timestamp_field(&self) -> Option<String> {
        self.inner.timestamp_field.read_with(|it| it.clone())
    }

    pub fn set_timestamp_field(&self, field: &str) -> StoreResult<()> {
        self.inner.check_mutable("Timestamp field")?;
        if field.is_empty() {
            log::error!("Timestamp field cannot be empty");
            return Err(StoreError::new(
                "Timestamp field cannot be empty",
                ErrorKind::InvalidOperation,
            ));
        }
        if field == crate::common::DOC_KEY {
            log::error!("Timestamp field cannot be {}", crate::common::DOC_KEY);
            return Err(StoreError::new(
                "Timestamp field cannot overwrite the document key",
                ErrorKind::InvalidOperation,
            ));
        }
        self.inner
            .timestamp_field
            .write_with(|it| *it = Some(field.to_string()));
        Ok(())
    }

    /// Upper bound on the number of documents one `find*` call returns.
    pub fn max_result_window(&self) -> Option<usize> {
        self.inner.max_result_window.read_with(|it| *it)
    }

    pub fn set_max_result_window(&self, window: usize) -> StoreResult<()> {
        self.inner.check_mutable("Max result window")?;
        if window == 0 {
            log::error!("Max result window must be positive");
            return Err(StoreError::new(
                "Max result window must be positive",
                ErrorKind::InvalidOperation,
            ));
        }
        self.inner.max_result_window.write_with(|it| *it = Some(window));
        Ok(())
    }

    /// Truncates `items` to the configured result window.
    pub(crate) fn cap<T>(&self, mut items: Vec<T>) -> Vec<T> {
        if let Some(window) = self.max_result_window() {
            if items.len() > window {
                log::warn!(
                    "Truncating {} results to the max result window of {}",
                    items.len(),
                    window
                );
                items.truncate(window);
            }
        }
        items
    }

    pub(crate) fn freeze(&self) {
        self.inner.configured.store(true, Ordering::Relaxed);
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.configured.load(Ordering::Relaxed)
    }
}

struct StoreConfigInner {
    configured: AtomicBool,
    field_separator: Atomic<String>,
    timestamp_field: Atomic<Option<String>>,
    max_result_window: Atomic<Option<usize>>,
}

impl Default for StoreConfigInner {
    fn default() -> Self {
        StoreConfigInner::new()
    }
}

impl StoreConfigInner {
    fn new() -> Self {
        StoreConfigInner {
            configured: AtomicBool::new(false),
            field_separator: atomic(DEFAULT_FIELD_SEPARATOR.to_string()),
            timestamp_field: atomic(None),
            max_result_window: atomic(None),
        }
    }

    fn check_mutable(&self, setting: &str) -> StoreResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            log::error!("{} cannot be changed after the store is opened", setting);
            return Err(StoreError::new(
                &format!("{} cannot be changed after the store is opened", setting),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}
