//! Sorting of items for presentation: directories first, then one field.

mod comparer;

pub use comparer::{ItemComparer, SortOrder, sort_items};
