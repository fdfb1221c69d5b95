//! `Debug` helpers for large per-particle and per-sample tables.
//!
//! Sheets carry 512 samples per sequence and attribute columns hold thousands
//! of floats, so a plain `{:#?}` of either is unreadable. Fields use these
//! through `custom_debug`:
//!
//! ```rust,ignore
//! #[derive(custom_debug::Debug)]
//! struct Column {
//!     #[debug(with = particle_utils::debug::trimmed_collection_fmt)]
//!     values: Vec<f32>,
//! }
//! ```

use std::{cmp, fmt, sync};

const FIRST_N_ELEMENTS: usize = 3;

pub trait HasLength {
    type Item: fmt::Debug;

    fn item_count(&self) -> usize;
    fn first_n(&self, elements: usize) -> &[Self::Item];
}

impl<T: fmt::Debug> HasLength for [T] {
    type Item = T;
    fn item_count(&self) -> usize {
        self.len()
    }
    fn first_n(&self, elements: usize) -> &[Self::Item] {
        &self[..cmp::min(elements, self.len())]
    }
}

impl<T: fmt::Debug> HasLength for Vec<T> {
    type Item = T;
    fn item_count(&self) -> usize {
        self.len()
    }
    fn first_n(&self, elements: usize) -> &[Self::Item] {
        self.as_slice().first_n(elements)
    }
}

impl<T: ?Sized + HasLength> HasLength for Box<T> {
    type Item = T::Item;
    fn item_count(&self) -> usize {
        self.as_ref().item_count()
    }
    fn first_n(&self, elements: usize) -> &[Self::Item] {
        self.as_ref().first_n(elements)
    }
}

impl<T: ?Sized + HasLength> HasLength for sync::Arc<T> {
    type Item = T::Item;
    fn item_count(&self) -> usize {
        self.as_ref().item_count()
    }
    fn first_n(&self, elements: usize) -> &[Self::Item] {
        self.as_ref().first_n(elements)
    }
}

#[cfg(not(feature = "debug-print-all"))]
pub fn trimmed_collection_fmt<T: ?Sized + HasLength>(n: &T, f: &mut fmt::Formatter) -> fmt::Result {
    let head = n.first_n(FIRST_N_ELEMENTS);
    let remaining = n.item_count().saturating_sub(head.len());

    if remaining == 0 {
        write!(f, "{:#?}", head)
    } else {
        write!(f, "{:#?} + {} elements", head, remaining)
    }
}

#[cfg(feature = "debug-print-all")]
pub fn trimmed_collection_fmt<T: ?Sized + HasLength>(n: &T, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{:#?}", n.first_n(n.item_count()))
}

/// Same as [`trimmed_collection_fmt`] for optional collections.
pub fn option_trimmed_collection_fmt<T: HasLength>(
    n: &Option<T>,
    f: &mut fmt::Formatter,
) -> fmt::Result {
    match n {
        Some(inner) => {
            write!(f, "Some(")?;
            trimmed_collection_fmt(inner, f)?;
            write!(f, ")")
        }
        None => write!(f, "None"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Wrapper(Vec<u32>);

    impl fmt::Debug for Wrapper {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            trimmed_collection_fmt(&self.0, f)
        }
    }

    #[test]
    fn test_short_collection_prints_everything() {
        let text = format!("{:?}", Wrapper(vec![1, 2]));
        assert!(text.contains('1'));
        assert!(!text.contains("elements"));
    }

    #[cfg(not(feature = "debug-print-all"))]
    #[test]
    fn test_long_collection_is_trimmed() {
        let text = format!("{:?}", Wrapper((0..512).collect()));
        assert!(text.ends_with("+ 509 elements"));
    }

    #[test]
    fn test_arc_slice_has_length() {
        let shared: sync::Arc<[f32]> = vec![0.5; 10].into();
        assert_eq!(shared.item_count(), 10);
        assert_eq!(shared.first_n(3).len(), 3);
    }
}
