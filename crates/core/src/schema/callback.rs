//! Labelled function values inside declarative configs.

use alloc::rc::Rc;
use alloc::string::String;
use core::fmt;
use core::ops::Deref;
use serde::{Serialize, Serializer};

/// A shared function value with a human-readable label.
///
/// Configs are plain data everywhere except where the user supplies code
/// (computed defaults, custom aggregators, custom filters). Those members hold
/// a `Callback`, which serializes as its label so configs can still be hashed
/// and logged.
pub struct Callback<F: ?Sized> {
    label: String,
    func: Rc<F>,
}

impl<F: ?Sized> Callback<F> {
    /// Wraps an already shared function.
    pub fn from_rc(label: impl Into<String>, func: Rc<F>) -> Self {
        Self {
            label: label.into(),
            func,
        }
    }

    /// Returns the label.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<F: ?Sized> Clone for Callback<F> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            func: Rc::clone(&self.func),
        }
    }
}

impl<F: ?Sized> Deref for Callback<F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.func
    }
}

impl<F: ?Sized> fmt::Debug for Callback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({})", self.label)
    }
}

impl<F: ?Sized> Serialize for Callback<F> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label)
    }
}
