pub use unique::UniqueExt;

mod unique {
    use std::{cmp::Eq, collections::HashSet, hash::Hash};

    /// Iterator adapter yielding each item the first time it is seen
    pub struct Unique<I: Iterator> {
        iter: I,
        seen: HashSet<I::Item>,
    }

    impl<I: Iterator> Iterator for Unique<I>
    where
        I::Item: Eq + Hash + Clone,
    {
        type Item = I::Item;

        fn next(&mut self) -> Option<Self::Item> {
            while let Some(next) = self.iter.next() {
                if self.seen.insert(next.clone()) {
                    return Some(next);
                }
            }

            None
        }
    }

    pub trait UniqueExt: Iterator {
        fn unique(self) -> Unique<Self>
        where
            Self::Item: Eq + Hash + Clone,
            Self: Sized,
        {
            Unique {
                iter: self,
                seen: HashSet::new(),
            }
        }
    }

    impl<I: Iterator> UniqueExt for I {}
}

/// Trims category names, drops blank ones and duplicates, keeping the first occurrence order
pub fn normalize_categories(categories: &[String]) -> Vec<String> {
    categories
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .unique()
        .map(str::to_string)
        .collect()
}
