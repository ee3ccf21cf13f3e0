//! In-memory chunk sorters.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Chunks up to this length are always sorted by insertion.
const ADAPTIVE_INSERTION_LIMIT: usize = 32;

/// In-memory sorter interface. Sorts a bounded slice of records in place.
pub trait InMemorySorter {
    fn sort_by<T, F>(&self, items: &mut [T], compare: F)
    where
        F: Fn(&T, &T) -> Ordering;
}

/// Available in-memory sorting strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SorterKind {
    /// Stable insertion sort. Quadratic, but cheap on the short and mostly ordered chunks the
    /// collector produces.
    Insertion,
    /// Insertion sort for short or nearly ordered chunks, stable `O(n log n)` sort otherwise.
    Adaptive,
}

impl InMemorySorter for SorterKind {
    fn sort_by<T, F>(&self, items: &mut [T], compare: F)
    where
        F: Fn(&T, &T) -> Ordering,
    {
        match self {
            SorterKind::Insertion => insertion_sort_by(items, compare),
            SorterKind::Adaptive => adaptive_sort_by(items, compare),
        }
    }
}

impl Default for SorterKind {
    fn default() -> Self {
        SorterKind::Insertion
    }
}

impl FromStr for SorterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "insertion" => Ok(SorterKind::Insertion),
            "adaptive" => Ok(SorterKind::Adaptive),
            _ => Err(format!("unknown sorter: {}", s)),
        }
    }
}

impl fmt::Display for SorterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SorterKind::Insertion => write!(f, "insertion"),
            SorterKind::Adaptive => write!(f, "adaptive"),
        }
    }
}

/// Stable insertion sort.
pub fn insertion_sort_by<T, F>(items: &mut [T], compare: F)
where
    F: Fn(&T, &T) -> Ordering,
{
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && compare(&items[j - 1], &items[j]) == Ordering::Greater {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}

fn adaptive_sort_by<T, F>(items: &mut [T], compare: F)
where
    F: Fn(&T, &T) -> Ordering,
{
    if items.len() <= ADAPTIVE_INSERTION_LIMIT {
        return insertion_sort_by(items, compare);
    }

    let descents = items
        .windows(2)
        .filter(|pair| compare(&pair[0], &pair[1]) == Ordering::Greater)
        .count();

    // nearly ordered: one descent per eight records at most
    if descents * 8 <= items.len() {
        insertion_sort_by(items, compare);
    } else {
        items.sort_by(compare);
    }
}
