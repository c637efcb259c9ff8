//! `Vec<T>` already binds to `LIST` (§3); a field that should instead bind to
//! the `ARRAY` operator — and so become eligible for the byte/bool/int/long
//! wire specialisations of §4.5 — wraps its elements in `PArray<T>` instead.

use std::ops::{Deref, DerefMut};

/// A field type that binds to the `ARRAY` container tag rather than `LIST`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PArray<T>(pub Vec<T>);

impl<T> PArray<T> {
    #[must_use]
    pub fn new(elements: Vec<T>) -> Self {
        Self(elements)
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T> From<Vec<T>> for PArray<T> {
    fn from(v: Vec<T>) -> Self {
        Self(v)
    }
}

impl<T> FromIterator<T> for PArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(Vec::from_iter(iter))
    }
}

impl<T> Deref for PArray<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for PArray<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
