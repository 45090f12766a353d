// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Category sets attached to line records.
//!
//! A category is a `(field, cat)` pair linking a primitive to attribute
//! records in layer `field`. Categories travel with the geometry record and
//! are opaque to the topology layer.

use serde::Serialize;
use smallvec::SmallVec;

/// Categories of one line, kept in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LineCats {
    entries: SmallVec<[(i32, i32); 2]>,
}

impl LineCats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single category in `field`.
    pub fn single(field: i32, cat: i32) -> Self {
        let mut cats = Self::new();
        cats.add(field, cat);
        cats
    }

    /// Adds a category unless the same pair is already present.
    pub fn add(&mut self, field: i32, cat: i32) {
        if !self.entries.contains(&(field, cat)) {
            self.entries.push((field, cat));
        }
    }

    /// First category in `field`.
    pub fn get(&self, field: i32) -> Option<i32> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|&(_, c)| c)
    }

    /// Removes every category of `field`. Returns how many were removed.
    pub fn remove_field(&mut self, field: i32) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(f, _)| *f != field);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.entries.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_ignores_duplicates() {
        let mut cats = LineCats::single(1, 10);
        cats.add(1, 10);
        cats.add(1, 11);
        cats.add(2, 10);
        assert_eq!(cats.len(), 3);
        assert_eq!(cats.get(1), Some(10));
        assert_eq!(cats.get(3), None);
    }

    #[test]
    fn remove_field() {
        let mut cats = LineCats::single(1, 10);
        cats.add(1, 11);
        cats.add(2, 5);
        assert_eq!(cats.remove_field(1), 2);
        assert_eq!(cats.iter().collect::<Vec<_>>(), vec![(2, 5)]);
    }
}
