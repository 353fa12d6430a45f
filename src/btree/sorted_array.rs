use std::ops::Index;

/// Growable array used for the keys, values and children of a node.
///
/// The backing storage is allocated for `b + 1` elements, so a node can hold one
/// element more than the branching factor allows until it is split.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SortedArray<T> {
    items: Vec<T>,
}

impl<T> SortedArray<T> {
    pub(crate) fn with_capacity(branching_factor: usize) -> SortedArray<T> {
        SortedArray {
            items: Vec::with_capacity(branching_factor + 1),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> &mut T {
        &mut self.items[index]
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub(crate) fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub(crate) fn into_vec(self) -> Vec<T> {
        self.items
    }

    /// Insert an element at the given position and move all following elements one slot to the right.
    ///
    /// The capacity is not checked: nodes are allowed to overflow by one element before they are split.
    pub(crate) fn insert_at(&mut self, index: usize, element: T) {
        self.items.insert(index, element);
    }

    /// Replaces the element at the given position.
    pub(crate) fn set(&mut self, index: usize, element: T) {
        self.items[index] = element;
    }

    pub(crate) fn push(&mut self, element: T) {
        self.items.push(element);
    }

    /// Moves all elements starting at `at` into a new array with the same capacity.
    pub(crate) fn split_off(&mut self, at: usize) -> SortedArray<T> {
        let mut items = Vec::with_capacity(self.items.capacity());
        items.extend(self.items.drain(at..));
        SortedArray { items }
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }
}

impl<T> SortedArray<T>
where
    T: Ord,
{
    /// Leftmost position at which `x` can be inserted without breaking the order.
    pub(crate) fn bisect_left(&self, x: &T) -> usize {
        self.items.partition_point(|item| item < x)
    }

    /// Rightmost position at which `x` can be inserted without breaking the order.
    pub(crate) fn bisect_right(&self, x: &T) -> usize {
        self.items.partition_point(|item| item <= x)
    }
}

impl<T> Index<usize> for SortedArray<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a SortedArray<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
