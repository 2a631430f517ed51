use std::cmp::Ordering;
use std::fmt;

use clap::ValueEnum;

use crate::item::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum SortOrder {
    /// Directories first, input order otherwise.
    #[default]
    None,
    NameAsc,
    NameDesc,
    ModifiedAsc,
    ModifiedDesc,
    TypeAsc,
    TypeDesc,
    SizeAsc,
    SizeDesc,
}

impl SortOrder {
    pub fn is_descending(self) -> bool {
        matches!(
            self,
            SortOrder::NameDesc | SortOrder::ModifiedDesc | SortOrder::TypeDesc | SortOrder::SizeDesc
        )
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => write!(f, "{}", value.get_name()),
            None => write!(f, "{:?}", self),
        }
    }
}

/// Total order over items. The directories-first partition is never reversed;
/// descending orders only flip the field comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemComparer {
    order: SortOrder,
}

impl ItemComparer {
    pub fn new(order: SortOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn compare(&self, a: &Item, b: &Item) -> Ordering {
        let partition = b.is_directory().cmp(&a.is_directory());
        if partition != Ordering::Equal || self.order == SortOrder::None {
            return partition;
        }

        let field = match self.order {
            SortOrder::None => Ordering::Equal,
            SortOrder::NameAsc | SortOrder::NameDesc => compare_names(a.name(), b.name()),
            SortOrder::ModifiedAsc | SortOrder::ModifiedDesc => a.modified().cmp(&b.modified()),
            SortOrder::TypeAsc | SortOrder::TypeDesc => {
                compare_names(a.type_label(), b.type_label())
            }
            SortOrder::SizeAsc | SortOrder::SizeDesc => a.size().cmp(&b.size()),
        };
        let field = if self.order.is_descending() {
            field.reverse()
        } else {
            field
        };

        field.then_with(|| compare_names(a.name(), b.name()))
    }

    /// Stable sort, so `SortOrder::None` keeps the input order within each partition.
    pub fn sort(&self, items: &mut [Item]) {
        items.sort_by(|a, b| self.compare(a, b));
    }
}

pub fn sort_items(items: &mut [Item], order: SortOrder) {
    ItemComparer::new(order).sort(items);
}

/// Case-insensitive, with an ordinal tie-break so the order stays total.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| a.cmp(b))
}
