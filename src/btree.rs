use std::{fmt::Debug, iter::FusedIterator};

use tracing::{debug, trace};

use crate::{
    error::{Error, Result},
    BtreeConfig,
};

use node::{Branch, InsertResult, Leaf, Node, NodeArena, NodeId, SearchResult, Slot};

mod node;
mod sorted_array;

/// B+ tree index mapping 64 bit keys to one or more values.
///
/// The key is typically a hash of the value and is computed by the caller.
/// Distinct values with the same key are kept in a sorted collision group, so the index
/// behaves like a set of `(key, value)` pairs.
/// Values can only be added: deleting an entry is explicitly not implemented.
///
/// The root of the tree is always a branch node, even if the index is empty.
pub struct BtreeIndex<V> {
    nodes: NodeArena<V>,
    root_id: NodeId,
    branching_factor: usize,
    nr_elements: usize,
}

impl<V> BtreeIndex<V> {
    /// Create a new empty index with the given branching factor.
    pub fn new(branching_factor: usize) -> Result<BtreeIndex<V>> {
        BtreeIndex::with_config(BtreeConfig::default().branching_factor(branching_factor))
    }

    /// Create a new empty index with the given configuration.
    pub fn with_config(config: BtreeConfig) -> Result<BtreeIndex<V>> {
        BtreeIndex::with_capacity(config, 0)
    }

    /// Create a new instance with the given configuration and capacity in number of elements.
    ///
    /// The capacity is only a hint used to reserve space for the nodes.
    pub fn with_capacity(config: BtreeConfig, capacity: usize) -> Result<BtreeIndex<V>> {
        let branching_factor = config.validate()?;

        // Leaves are at least half full, plus some space for the branches above them
        let estimated_leaves = capacity / branching_factor.div_ceil(2);
        let mut nodes = NodeArena::with_capacity(2 + estimated_leaves + estimated_leaves / 2);

        // Always add a root branch with an empty leaf beneath it
        let root_id = nodes.allocate(Node::Branch(Branch::new(branching_factor, None)));
        let first_leaf = nodes.allocate(Node::Leaf(Leaf::new(branching_factor, root_id)));
        nodes.branch_mut(root_id).children.push(first_leaf);

        Ok(BtreeIndex {
            nodes,
            root_id,
            branching_factor,
            nr_elements: 0,
        })
    }

    /// Returns true if the index does not contain any elements.
    pub fn is_empty(&self) -> bool {
        self.nr_elements == 0
    }

    /// Returns the number of values in the index, including the ones sharing a key.
    pub fn len(&self) -> usize {
        self.nr_elements
    }

    /// Maximum number of keys per leaf and children per branch.
    pub fn branching_factor(&self) -> usize {
        self.branching_factor
    }

    /// Number of levels of the tree, including the root and the leaf level.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut current = self.root_id;
        while let Node::Branch(branch) = self.nodes.get(current) {
            current = branch.children[0];
            height += 1;
        }
        height
    }

    /// Returns the keys of every node, grouped by the level of the tree.
    ///
    /// The first entry is the root level, the last one the leaf level.
    /// Inside a level, the nodes are ordered from left to right.
    /// This is meant for debugging and testing, the layout of the tree is not part of the
    /// stable interface.
    pub fn node_keys_by_level(&self) -> Vec<Vec<Vec<i64>>> {
        let mut result = Vec::new();
        let mut level = vec![self.root_id];
        while !level.is_empty() {
            let mut next_level = Vec::new();
            let mut level_keys = Vec::with_capacity(level.len());
            for id in level {
                let node = self.nodes.get(id);
                level_keys.push(node.keys().as_slice().to_vec());
                if let Node::Branch(branch) = node {
                    next_level.extend(branch.children.iter().copied());
                }
            }
            result.push(level_keys);
            level = next_level;
        }
        result
    }

    /// All keys with their slot, in ascending order of the keys.
    fn entries(&self) -> impl Iterator<Item = (i64, &Slot<V>)> + '_ {
        self.nodes
            .leaf_chain(self.nodes.leftmost_leaf(self.root_id))
            .flat_map(|leaf| leaf.keys.iter().copied().zip(leaf.values.iter()))
    }

    /// All values in ascending order of their keys.
    pub(crate) fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.entries().flat_map(|(_, slot)| slot.iter())
    }

    /// Splits a leaf holding one entry more than the branching factor allows.
    ///
    /// The first half stays in the (reused) arrays of the leaf, the second half is moved to a new leaf.
    /// The first key of the new right leaf is copied to the parent as separator.
    /// Returns the parent if it overflows now.
    fn split_leaf(&mut self, leaf_id: NodeId) -> Option<NodeId> {
        let Leaf {
            mut keys,
            mut values,
            parent,
            prev,
            next,
        } = self.nodes.take_leaf(leaf_id);

        let mid = keys.len() / 2;
        let right_keys = keys.split_off(mid);
        let right_values = values.split_off(mid);
        let separator = right_keys[0];

        let left_id = self.nodes.allocate(Node::Leaf(Leaf {
            keys,
            values,
            parent,
            prev,
            next: None,
        }));
        let right_id = self.nodes.allocate(Node::Leaf(Leaf {
            keys: right_keys,
            values: right_values,
            parent,
            prev: Some(left_id),
            next,
        }));
        self.nodes.leaf_mut(left_id).next = Some(right_id);

        // Repair the links of the neighbors
        if let Some(prev) = prev {
            self.nodes.leaf_mut(prev).next = Some(left_id);
        }
        if let Some(next) = next {
            self.nodes.leaf_mut(next).prev = Some(right_id);
        }

        trace!(separator, "split leaf");
        self.insert_separator(parent, leaf_id, separator, left_id, right_id)
    }

    /// Splits a branch holding one child more than the branching factor allows.
    ///
    /// The middle key is moved up to the parent and not kept in any of the two new branches.
    /// When splitting the root, a new root is created and the tree grows by one level.
    /// Returns the parent if it overflows now.
    fn split_branch(&mut self, branch_id: NodeId) -> Option<NodeId> {
        let Branch {
            mut keys,
            mut children,
            parent,
        } = self.nodes.take_branch(branch_id);

        let mid = children.len() / 2;
        let right_children = children.split_off(mid);
        let separator = keys[mid - 1];
        let right_keys = keys.split_off(mid);
        keys.truncate(mid - 1);

        let parent = match parent {
            Some(parent) => parent,
            None => {
                let new_root = self
                    .nodes
                    .allocate(Node::Branch(Branch::new(self.branching_factor, None)));
                self.root_id = new_root;
                debug!(root = ?new_root, "grow tree with new root");
                new_root
            }
        };

        let left_id = self.nodes.allocate(Node::Branch(Branch {
            keys,
            children,
            parent: Some(parent),
        }));
        let right_id = self.nodes.allocate(Node::Branch(Branch {
            keys: right_keys,
            children: right_children,
            parent: Some(parent),
        }));

        // Moved children need to know their new parent
        for new_parent in [left_id, right_id] {
            let children = self.nodes.branch(new_parent).children.as_slice().to_vec();
            for child in children {
                self.nodes.get_mut(child).set_parent(new_parent);
            }
        }

        trace!(separator, "split branch");
        self.insert_separator(parent, branch_id, separator, left_id, right_id)
    }

    /// Replaces the reference to a split node in its parent with the two new halves.
    ///
    /// Returns the parent if it has more children than the branching factor allows.
    fn insert_separator(
        &mut self,
        parent: NodeId,
        old_id: NodeId,
        separator: i64,
        left_id: NodeId,
        right_id: NodeId,
    ) -> Option<NodeId> {
        let branch = self.nodes.branch_mut(parent);
        if branch.children.is_empty() {
            // This is a new root
            branch.children.push(left_id);
            branch.children.push(right_id);
            branch.keys.push(separator);
        } else {
            let i = branch.keys.bisect_left(&separator);
            // The old node might share its ID with one of the halves, since its slot was released
            debug_assert!(
                [old_id, left_id, right_id].contains(&branch.children[i]),
                "separator {} does not point to the split node",
                separator
            );
            branch.children.set(i, right_id);
            branch.children.insert_at(i, left_id);
            branch.keys.insert_at(i, separator);
        }

        if branch.children.len() > self.branching_factor {
            Some(parent)
        } else {
            None
        }
    }
}

impl<V> BtreeIndex<V>
where
    V: PartialOrd,
{
    /// Create a new index and insert all given key/value pairs.
    ///
    /// Fails when the configuration is invalid or colliding values can't be ordered.
    pub fn bulk_load<I>(config: BtreeConfig, entries: I) -> Result<BtreeIndex<V>>
    where
        I: IntoIterator<Item = (i64, V)>,
    {
        BtreeIndex::try_bulk_load(
            config,
            entries
                .into_iter()
                .map(Ok::<_, std::convert::Infallible>),
        )
    }

    /// Create a new index and insert all key/value pairs, where computing a key might have failed.
    ///
    /// The first failed key computation aborts the loading and is returned as [`Error::Hash`].
    /// The partially loaded index is discarded in this case.
    pub fn try_bulk_load<I, E>(config: BtreeConfig, entries: I) -> Result<BtreeIndex<V>>
    where
        I: IntoIterator<Item = std::result::Result<(i64, V), E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let entries = entries.into_iter();
        let mut index = BtreeIndex::with_capacity(config, entries.size_hint().0)?;
        for entry in entries {
            let loaded = entry
                .map_err(|e| Error::Hash(e.into()))
                .and_then(|(key, value)| index.insert(key, value));
            if let Err(e) = loaded {
                debug!(loaded = index.len(), error = %e, "abort bulk load");
                return Err(e);
            }
        }
        Ok(index)
    }

    /// Insert a new value with the given key.
    ///
    /// Returns `false` if an equal value was already stored for this key, which leaves the index unchanged.
    /// Inserting a value that is different from the ones already stored with the same key
    /// needs to order the values. If they can't be ordered, [`Error::IncomparableValues`] is returned
    /// and the index is left unchanged.
    pub fn insert(&mut self, key: i64, value: V) -> Result<bool> {
        let leaf_id = self.nodes.search_leaf(self.root_id, key);
        let leaf = self.nodes.leaf_mut(leaf_id);
        match leaf.insert(key, value)? {
            InsertResult::AlreadyPresent => Ok(false),
            InsertResult::Inserted => {
                let overflow = leaf.len() > self.branching_factor;
                self.nr_elements += 1;
                if overflow {
                    // Propagate the split upwards until a parent has enough room
                    let mut overflowing = self.split_leaf(leaf_id);
                    while let Some(branch_id) = overflowing {
                        overflowing = self.split_branch(branch_id);
                    }
                }
                Ok(true)
            }
        }
    }
}

impl<V> BtreeIndex<V>
where
    V: PartialEq,
{
    /// Returns whether the index contains a value equal to the given one for this key.
    pub fn contains(&self, key: i64, value: &V) -> bool {
        let leaf_id = self.nodes.search_leaf(self.root_id, key);
        matches!(
            self.nodes.leaf(leaf_id).lookup(key, value),
            SearchResult::FoundEqual(_)
        )
    }
}

impl<V> BtreeIndex<V>
where
    V: Clone,
{
    /// Returns an iterator over a snapshot of all values, in ascending order of their keys.
    ///
    /// Values sharing a key are returned in their own order.
    /// The snapshot is independent of the index, so the index can be changed while iterating.
    ///
    /// # Example
    ///
    /// ```rust
    /// use hashed_btree_index::{BtreeIndex, Error};
    ///
    /// fn main() -> std::result::Result<(), Error> {
    ///     let mut b = BtreeIndex::new(2)?;
    ///     b.insert(10, "a")?;
    ///     b.insert(20, "b")?;
    ///     b.insert(5, "c")?;
    ///
    ///     let values: Vec<_> = b.iter().collect();
    ///     assert_eq!(vec!["c", "a", "b"], values);
    ///     Ok(())
    /// }
    /// ```
    pub fn iter(&self) -> Snapshot<V> {
        let mut values = Vec::with_capacity(self.nr_elements);
        values.extend(self.values().cloned());
        Snapshot {
            values: values.into_iter(),
        }
    }
}

impl<V> PartialEq for BtreeIndex<V>
where
    V: PartialEq,
{
    /// Two indexes are equal when they contain the same keys with the same values,
    /// regardless of their branching factor.
    fn eq(&self, other: &Self) -> bool {
        self.nr_elements == other.nr_elements && self.entries().eq(other.entries())
    }
}

impl<V> Eq for BtreeIndex<V> where V: Eq {}

impl<V> Debug for BtreeIndex<V>
where
    V: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries().flat_map(|(key, slot)| slot.iter().map(move |v| (key, v))))
            .finish()
    }
}

impl<V> IntoIterator for BtreeIndex<V> {
    type Item = V;
    type IntoIter = IntoIter<V>;

    /// Consumes the index and returns its values in ascending order of their keys.
    fn into_iter(mut self) -> IntoIter<V> {
        let mut leaves = Vec::new();
        let mut current = Some(self.nodes.leftmost_leaf(self.root_id));
        while let Some(id) = current {
            current = self.nodes.leaf(id).next;
            leaves.push(id);
        }
        let slots: Vec<Slot<V>> = leaves
            .into_iter()
            .flat_map(|id| self.nodes.take_leaf(id).values.into_vec())
            .collect();
        IntoIter {
            slots: slots.into_iter(),
            current: Vec::new().into_iter(),
            remaining: self.nr_elements,
        }
    }
}

/// Iterator over a snapshot of the values of a [`BtreeIndex`].
#[derive(Clone, Debug)]
pub struct Snapshot<V> {
    values: std::vec::IntoIter<V>,
}

impl<V> Iterator for Snapshot<V> {
    type Item = V;

    fn next(&mut self) -> Option<V> {
        self.values.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}

impl<V> ExactSizeIterator for Snapshot<V> {}

impl<V> FusedIterator for Snapshot<V> {}

/// Iterator over the values of a consumed [`BtreeIndex`].
pub struct IntoIter<V> {
    slots: std::vec::IntoIter<Slot<V>>,
    current: std::vec::IntoIter<V>,
    remaining: usize,
}

impl<V> Iterator for IntoIter<V> {
    type Item = V;

    fn next(&mut self) -> Option<V> {
        loop {
            if let Some(value) = self.current.next() {
                self.remaining -= 1;
                return Some(value);
            }
            self.current = self.slots.next()?.into_iter();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for IntoIter<V> {}

impl<V> FusedIterator for IntoIter<V> {}
