use std::cmp::Ordering;

/// Two keys land in one group iff `compare` returns `Equal`. Partitions must
/// have been sorted with the same ordering.
pub trait KeyOrdering<K: ?Sized> {
    fn compare(&self, left: &K, right: &K) -> Ordering;

    fn equal(&self, left: &K, right: &K) -> bool {
        self.compare(left, right) == Ordering::Equal
    }
}

impl<K: ?Sized, F> KeyOrdering<K> for F
where
    F: Fn(&K, &K) -> Ordering,
{
    fn compare(&self, left: &K, right: &K) -> Ordering {
        self(left, right)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrdering;

impl<K: Ord + ?Sized> KeyOrdering<K> for NaturalOrdering {
    fn compare(&self, left: &K, right: &K) -> Ordering {
        left.cmp(right)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReverseOrdering<O>(pub O);

impl<K: ?Sized, O: KeyOrdering<K>> KeyOrdering<K> for ReverseOrdering<O> {
    fn compare(&self, left: &K, right: &K) -> Ordering {
        self.0.compare(right, left)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiCaseInsensitive;

impl<K: AsRef<str> + ?Sized> KeyOrdering<K> for AsciiCaseInsensitive {
    fn compare(&self, left: &K, right: &K) -> Ordering {
        let left = left.as_ref().bytes().map(|b| b.to_ascii_lowercase());
        let right = right.as_ref().bytes().map(|b| b.to_ascii_lowercase());
        left.cmp(right)
    }
}
