//! Parameter Set Item

use std::cell::Cell;

/// Stores the values of a named parameter and whether it was looked up.
#[derive(Clone, Debug, Default)]
pub struct ParamSetItem<T> {
    /// The values.
    pub values: Vec<T>,

    /// Set when a lookup touched this item.
    pub looked_up: Cell<bool>,
}

impl<T> ParamSetItem<T> {
    /// Returns a new `ParamSetItem`.
    ///
    /// * `values` - The values.
    pub fn new(values: Vec<T>) -> Self {
        Self {
            values,
            looked_up: Cell::new(false),
        }
    }
}
