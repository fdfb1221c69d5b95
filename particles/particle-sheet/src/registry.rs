//! Shared sheet cache
//!
//! Sheets are keyed by name and held weakly: the registry never keeps a sheet
//! alive on its own, every particle system that uses it does.

use log::trace;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::error::Result;
use crate::sheet::Sheet;

/// Name-keyed cache of loaded sheets
#[derive(Debug, Default)]
pub struct SheetRegistry {
    sheets: Mutex<HashMap<String, Weak<Sheet>>>,
}

impl SheetRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Sheet registered under `name`, if it is still alive
    pub fn get(&self, name: &str) -> Option<Arc<Sheet>> {
        self.sheets.lock().get(name).and_then(Weak::upgrade)
    }

    /// Register a sheet, replacing any previous entry of the same name
    pub fn insert(&self, name: impl Into<String>, sheet: Sheet) -> Arc<Sheet> {
        let sheet = Arc::new(sheet);
        self.sheets.lock().insert(name.into(), Arc::downgrade(&sheet));
        sheet
    }

    /// Return the live sheet for `name` or load and register a new one.
    ///
    /// The loader runs with the registry locked so concurrent callers never
    /// load the same sheet twice.
    pub fn get_or_load_with<F>(&self, name: &str, load: F) -> Result<Arc<Sheet>>
    where
        F: FnOnce() -> Result<Sheet>,
    {
        let mut sheets = self.sheets.lock();
        if let Some(sheet) = sheets.get(name).and_then(Weak::upgrade) {
            trace!("Sheet cache hit for {name}");
            return Ok(sheet);
        }

        trace!("Sheet cache miss for {name}");
        let sheet = Arc::new(load()?);
        sheets.insert(name.to_owned(), Arc::downgrade(&sheet));
        Ok(sheet)
    }

    /// Drop entries whose sheets have been released, returning how many
    pub fn purge(&self) -> usize {
        let mut sheets = self.sheets.lock();
        let before = sheets.len();
        sheets.retain(|_, sheet| sheet.strong_count() > 0);
        before - sheets.len()
    }

    /// Number of registered names, live or not
    pub fn len(&self) -> usize {
        self.sheets.lock().len()
    }

    /// Whether no names are registered
    pub fn is_empty(&self) -> bool {
        self.sheets.lock().is_empty()
    }
}
