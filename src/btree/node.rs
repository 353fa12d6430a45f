use std::cmp::Ordering;

use tracing::trace;

use super::sorted_array::SortedArray;
use crate::error::{Error, Result};

/// Stable index of a node inside the [`NodeArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

/// The value(s) stored for a single key of a leaf.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Slot<V> {
    Single(V),
    /// Distinct values with the same key, sorted by their own order.
    Collision(Vec<V>),
}

impl<V> Slot<V> {
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        match self {
            Slot::Single(_) => 1,
            Slot::Collision(group) => group.len(),
        }
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, V> {
        match self {
            Slot::Single(value) => std::slice::from_ref(value).iter(),
            Slot::Collision(group) => group.iter(),
        }
    }

    fn contains(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.iter().any(|member| member == value)
    }

    /// Adds a value that is not equal to any of the existing values of this slot.
    ///
    /// A single value is promoted to a collision group.
    /// The position of the new value is determined before anything is changed,
    /// so the slot is untouched when the values can't be ordered.
    fn add(&mut self, key: i64, value: V) -> Result<()>
    where
        V: PartialOrd,
    {
        match self {
            Slot::Single(existing) => {
                let order = value
                    .partial_cmp(existing)
                    .ok_or(Error::IncomparableValues { key })?;
                let Slot::Single(existing) =
                    std::mem::replace(self, Slot::Collision(Vec::new()))
                else {
                    unreachable!("slot was checked to hold a single value")
                };
                let group = if order == Ordering::Less {
                    vec![value, existing]
                } else {
                    vec![existing, value]
                };
                trace!(key, "created collision group");
                *self = Slot::Collision(group);
            }
            Slot::Collision(group) => {
                let mut position = 0;
                for member in group.iter() {
                    match member.partial_cmp(&value) {
                        Some(Ordering::Less) => position += 1,
                        Some(_) => {}
                        None => return Err(Error::IncomparableValues { key }),
                    }
                }
                group.insert(position, value);
                trace!(key, members = group.len(), "extended collision group");
            }
        }
        Ok(())
    }
}

impl<V> IntoIterator for Slot<V> {
    type Item = V;
    type IntoIter = std::vec::IntoIter<V>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            Slot::Single(value) => vec![value].into_iter(),
            Slot::Collision(group) => group.into_iter(),
        }
    }
}

/// Result of looking up a key/value combination in a leaf.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SearchResult {
    /// Key does not exist; index is where it would be inserted.
    NotFound(usize),
    /// An equal value is stored for the key at the given index.
    FoundEqual(usize),
    /// The key exists at the given index, but none of its values is equal.
    FoundCollision(usize),
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum InsertResult {
    Inserted,
    AlreadyPresent,
}

pub(crate) struct Leaf<V> {
    pub(crate) keys: SortedArray<i64>,
    pub(crate) values: SortedArray<Slot<V>>,
    // The root is always a branch, so every leaf has a parent
    pub(crate) parent: NodeId,
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
}

impl<V> Leaf<V> {
    pub(crate) fn new(branching_factor: usize, parent: NodeId) -> Leaf<V> {
        Leaf {
            keys: SortedArray::with_capacity(branching_factor),
            values: SortedArray::with_capacity(branching_factor),
            parent,
            prev: None,
            next: None,
        }
    }

    /// Number of keys, which is also the number of slots.
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    /// Number of values including the members of collision groups.
    #[cfg(test)]
    pub(crate) fn number_of_values(&self) -> usize {
        self.values.iter().map(Slot::len).sum()
    }

    pub(crate) fn lookup(&self, key: i64, value: &V) -> SearchResult
    where
        V: PartialEq,
    {
        let i = self.keys.bisect_left(&key);
        if i >= self.keys.len() || self.keys[i] != key {
            SearchResult::NotFound(i)
        } else if self.values[i].contains(value) {
            SearchResult::FoundEqual(i)
        } else {
            SearchResult::FoundCollision(i)
        }
    }

    /// Inserts the value unless an equal value is already stored for this key.
    ///
    /// Leaves might hold one entry more than the branching factor afterwards,
    /// splitting them is the task of the tree.
    pub(crate) fn insert(&mut self, key: i64, value: V) -> Result<InsertResult>
    where
        V: PartialOrd,
    {
        match self.lookup(key, &value) {
            SearchResult::NotFound(i) => {
                self.keys.insert_at(i, key);
                self.values.insert_at(i, Slot::Single(value));
                Ok(InsertResult::Inserted)
            }
            SearchResult::FoundEqual(_) => Ok(InsertResult::AlreadyPresent),
            SearchResult::FoundCollision(i) => {
                self.values.get_mut(i).add(key, value)?;
                Ok(InsertResult::Inserted)
            }
        }
    }
}

pub(crate) struct Branch {
    pub(crate) keys: SortedArray<i64>,
    pub(crate) children: SortedArray<NodeId>,
    pub(crate) parent: Option<NodeId>,
}

impl Branch {
    pub(crate) fn new(branching_factor: usize, parent: Option<NodeId>) -> Branch {
        Branch {
            keys: SortedArray::with_capacity(branching_factor),
            children: SortedArray::with_capacity(branching_factor),
            parent,
        }
    }

    /// Child responsible for the key. Keys equal to a separator belong to the right child.
    pub(crate) fn child_for(&self, key: i64) -> NodeId {
        self.children[self.keys.bisect_right(&key)]
    }
}

pub(crate) enum Node<V> {
    Leaf(Leaf<V>),
    Branch(Branch),
}

impl<V> Node<V> {
    pub(crate) fn keys(&self) -> &SortedArray<i64> {
        match self {
            Node::Leaf(leaf) => &leaf.keys,
            Node::Branch(branch) => &branch.keys,
        }
    }

    pub(crate) fn set_parent(&mut self, parent: NodeId) {
        match self {
            Node::Leaf(leaf) => leaf.parent = parent,
            Node::Branch(branch) => branch.parent = Some(parent),
        }
    }
}

/// Owns all nodes of a tree. Nodes reference each other only by their [`NodeId`].
pub(crate) struct NodeArena<V> {
    slots: Vec<Option<Node<V>>>,
    free: Vec<NodeId>,
}

impl<V> NodeArena<V> {
    pub(crate) fn with_capacity(capacity: usize) -> NodeArena<V> {
        NodeArena {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    /// Number of allocated nodes.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Stores the node and returns its ID. Released slots are reused first.
    pub(crate) fn allocate(&mut self, node: Node<V>) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.slots[id.0] = Some(node);
            id
        } else {
            self.slots.push(Some(node));
            NodeId(self.slots.len() - 1)
        }
    }

    /// Removes the node from the arena and returns it.
    pub(crate) fn take(&mut self, id: NodeId) -> Node<V> {
        match self.slots.get_mut(id.0).and_then(Option::take) {
            Some(node) => {
                self.free.push(id);
                node
            }
            None => unreachable!("node {} is not allocated", id.0),
        }
    }

    pub(crate) fn get(&self, id: NodeId) -> &Node<V> {
        match self.slots.get(id.0) {
            Some(Some(node)) => node,
            _ => unreachable!("node {} is not allocated", id.0),
        }
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node<V> {
        match self.slots.get_mut(id.0) {
            Some(Some(node)) => node,
            _ => unreachable!("node {} is not allocated", id.0),
        }
    }

    pub(crate) fn leaf(&self, id: NodeId) -> &Leaf<V> {
        match self.get(id) {
            Node::Leaf(leaf) => leaf,
            Node::Branch(_) => unreachable!("node {} is not a leaf", id.0),
        }
    }

    pub(crate) fn leaf_mut(&mut self, id: NodeId) -> &mut Leaf<V> {
        match self.get_mut(id) {
            Node::Leaf(leaf) => leaf,
            Node::Branch(_) => unreachable!("node {} is not a leaf", id.0),
        }
    }

    pub(crate) fn branch(&self, id: NodeId) -> &Branch {
        match self.get(id) {
            Node::Branch(branch) => branch,
            Node::Leaf(_) => unreachable!("node {} is not a branch", id.0),
        }
    }

    pub(crate) fn branch_mut(&mut self, id: NodeId) -> &mut Branch {
        match self.get_mut(id) {
            Node::Branch(branch) => branch,
            Node::Leaf(_) => unreachable!("node {} is not a branch", id.0),
        }
    }

    pub(crate) fn take_leaf(&mut self, id: NodeId) -> Leaf<V> {
        match self.take(id) {
            Node::Leaf(leaf) => leaf,
            Node::Branch(_) => unreachable!("node {} is not a leaf", id.0),
        }
    }

    pub(crate) fn take_branch(&mut self, id: NodeId) -> Branch {
        match self.take(id) {
            Node::Branch(branch) => branch,
            Node::Leaf(_) => unreachable!("node {} is not a branch", id.0),
        }
    }

    /// Descends from `start` to the leaf that contains the key or would contain it.
    pub(crate) fn search_leaf(&self, start: NodeId, key: i64) -> NodeId {
        let mut current = start;
        loop {
            match self.get(current) {
                Node::Branch(branch) => current = branch.child_for(key),
                Node::Leaf(_) => return current,
            }
        }
    }

    /// Descends from `start` always taking the first child.
    pub(crate) fn leftmost_leaf(&self, start: NodeId) -> NodeId {
        let mut current = start;
        loop {
            match self.get(current) {
                Node::Branch(branch) => current = branch.children[0],
                Node::Leaf(_) => return current,
            }
        }
    }

    /// Iterates over the linked leaves, starting with the given one.
    pub(crate) fn leaf_chain(&self, first: NodeId) -> LeafChain<'_, V> {
        LeafChain {
            nodes: self,
            current: Some(first),
        }
    }
}

pub(crate) struct LeafChain<'a, V> {
    nodes: &'a NodeArena<V>,
    current: Option<NodeId>,
}

impl<'a, V> Iterator for LeafChain<'a, V> {
    type Item = &'a Leaf<V>;

    fn next(&mut self) -> Option<Self::Item> {
        let leaf = self.nodes.leaf(self.current?);
        self.current = leaf.next;
        Some(leaf)
    }
}
