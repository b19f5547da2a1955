//! Pagination result for list operations

use crate::core::field::FieldValue;
use serde::Serialize;

/// One window of a listing
///
/// Only identifiers are returned so the caller can page without
/// materializing full instances.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPage {
    /// Keys in `[position, position + count)` of the ordered candidate set
    pub id_list: Vec<FieldValue>,

    /// Position the window starts at, echoed back
    pub position: usize,

    /// Size of the whole candidate set (after filters)
    pub total: usize,
}

impl ListPage {
    pub fn new(id_list: Vec<FieldValue>, position: usize, total: usize) -> Self {
        Self {
            id_list,
            position,
            total,
        }
    }

    /// Whether another window follows this one
    pub fn has_next(&self) -> bool {
        self.position + self.id_list.len() < self.total
    }

    /// Position of the next window, if any
    pub fn next_position(&self) -> Option<usize> {
        self.has_next().then(|| self.position + self.id_list.len())
    }
}
