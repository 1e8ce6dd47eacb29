//! Item mappers
//!
//! An [`ItemMapper`] turns one submitted item into the line that gets
//! persisted. Mappers only run inside the drain, which is mutually
//! exclusive, so they need no synchronization of their own.
//!
//! Returning `Ok(None)` persists an empty line. Separators are the mapper's
//! business: [`DisplayMapper`] writes none, [`LineMapper`] appends `\n`.
//!
//! # Example
//!
//! ```
//! use spool_sinks::{DisplayMapper, ItemMapper, LineMapper};
//!
//! let mapper = LineMapper::new(DisplayMapper);
//! assert_eq!(mapper.map(&42).unwrap().as_deref(), Some("42\n"));
//! ```

use std::error::Error as StdError;
use std::fmt;

use serde::Serialize;

/// Boxed error carried as the source of a [`MapError`]
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Maps one item to its persisted line
pub trait ItemMapper<T>: Send + Sync {
    /// Map an item; `Ok(None)` means "nothing to say" and persists an empty line
    fn map(&self, item: &T) -> Result<Option<String>, MapError>;
}

impl<T, F> ItemMapper<T> for F
where
    F: Fn(&T) -> Option<String> + Send + Sync,
{
    fn map(&self, item: &T) -> Result<Option<String>, MapError> {
        Ok(self(item))
    }
}

/// Failure to map an item
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct MapError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl MapError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Uses the item's `Display` output as the line, with no separator
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayMapper;

impl<T: fmt::Display> ItemMapper<T> for DisplayMapper {
    fn map(&self, item: &T) -> Result<Option<String>, MapError> {
        Ok(Some(item.to_string()))
    }
}

/// Appends a newline to whatever the inner mapper produces
///
/// An absent inner result becomes a bare `\n`, so every item still
/// occupies exactly one line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineMapper<M> {
    inner: M,
}

impl<M> LineMapper<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> M {
        self.inner
    }
}

impl<T, M: ItemMapper<T>> ItemMapper<T> for LineMapper<M> {
    fn map(&self, item: &T) -> Result<Option<String>, MapError> {
        let mut line = self.inner.map(item)?.unwrap_or_default();
        line.push('\n');
        Ok(Some(line))
    }
}

/// JSON Lines encoding for any serializable item
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesMapper;

impl<T: Serialize> ItemMapper<T> for JsonLinesMapper {
    fn map(&self, item: &T) -> Result<Option<String>, MapError> {
        let mut line = serde_json::to_string(item)
            .map_err(|e| MapError::with_source("failed to encode item as JSON", e))?;
        line.push('\n');
        Ok(Some(line))
    }
}
