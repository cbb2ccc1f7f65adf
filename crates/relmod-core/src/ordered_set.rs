//! # Ordered Unique Container
//!
//! [`OrderedSet`] is an insertion-ordered set: a doubly-linked list laid out
//! in a slab `Vec`, with a `BTreeMap` position index for membership tests.
//! Freed slots are reused, so interleaved adds and discards do not grow the
//! slab without bound.
//!
//! [`QuerySet`] — the result shape of every selection and navigation — is an
//! `OrderedSet` of instance handles.
//!
//! Iterators borrow the set, so mutating a set while iterating it is
//! rejected at compile time.

use crate::types::{InstanceHandle, ModelError};
use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{BitOr, BitOrAssign};

/// An insertion-ordered, duplicate-free set of instance handles.
pub type QuerySet = OrderedSet<InstanceHandle>;

// =============================================================================
// ORDERED SET
// =============================================================================

#[derive(Debug, Clone)]
struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Insertion-ordered set with set semantics.
///
/// - `add` appends at the tail and is a no-op for present elements.
/// - `discard` unlinks in place, preserving the relative order of the
///   remaining elements.
/// - Iteration (forward and reverse) reflects current insertion order.
/// - Equality against another `OrderedSet` is order-sensitive;
///   [`eq_unordered`](Self::eq_unordered) compares against a plain set.
#[derive(Debug, Clone)]
pub struct OrderedSet<T> {
    nodes: Vec<Node<T>>,
    index: BTreeMap<T, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    free: Vec<usize>,
}

impl<T> Default for OrderedSet<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            index: BTreeMap::new(),
            head: None,
            tail: None,
            free: Vec::new(),
        }
    }
}

impl<T: Ord + Copy> OrderedSet<T> {
    /// Create a new empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the set holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether `value` is a member of the set.
    #[must_use]
    pub fn contains(&self, value: T) -> bool {
        self.index.contains_key(&value)
    }

    /// Append `value` at the tail if it is not already present.
    ///
    /// Returns `true` if the set changed.
    pub fn add(&mut self, value: T) -> bool {
        if self.index.contains_key(&value) {
            return false;
        }

        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Node {
                    value,
                    prev: self.tail,
                    next: None,
                };
                slot
            }
            None => {
                self.nodes.push(Node {
                    value,
                    prev: self.tail,
                    next: None,
                });
                self.nodes.len() - 1
            }
        };

        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.index.insert(value, slot);
        true
    }

    /// Remove `value` if present; a no-op otherwise.
    ///
    /// Returns `true` if the set changed. The relative order of the
    /// remaining elements is preserved.
    pub fn discard(&mut self, value: T) -> bool {
        let Some(slot) = self.index.remove(&value) else {
            return false;
        };
        self.unlink(slot);
        true
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);

        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.free.push(slot);
    }

    /// The element at the head of the set, if any.
    #[must_use]
    pub fn first(&self) -> Option<T> {
        self.head.map(|slot| self.nodes[slot].value)
    }

    /// The element at the tail of the set, if any.
    #[must_use]
    pub fn last(&self) -> Option<T> {
        self.tail.map(|slot| self.nodes[slot].value)
    }

    /// Remove and return the tail (`last = true`) or head (`last = false`)
    /// element.
    pub fn pop(&mut self, last: bool) -> Result<T, ModelError> {
        let value = if last { self.last() } else { self.first() };
        let value = value.ok_or(ModelError::EmptyContainer)?;
        self.discard(value);
        Ok(value)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            set: self,
            cursor: self.head,
        }
    }

    /// Iterate in reverse insertion order.
    pub fn iter_reversed(&self) -> IterReversed<'_, T> {
        IterReversed {
            set: self,
            cursor: self.tail,
        }
    }

    /// Union preserving order: elements of `self` first, then elements of
    /// `other` not already seen.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for value in other.iter() {
            result.add(value);
        }
        result
    }

    /// Order-insensitive equality against a plain unordered set.
    #[must_use]
    pub fn eq_unordered(&self, other: &BTreeSet<T>) -> bool {
        self.len() == other.len() && self.iter().all(|value| other.contains(&value))
    }
}

// Order-sensitive equality, per the container contract.
impl<T: Ord + Copy> PartialEq for OrderedSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: Ord + Copy> Eq for OrderedSet<T> {}

impl<T: Ord + Copy> BitOr for &OrderedSet<T> {
    type Output = OrderedSet<T>;

    fn bitor(self, rhs: Self) -> OrderedSet<T> {
        self.union(rhs)
    }
}

impl<T: Ord + Copy> BitOrAssign<&OrderedSet<T>> for OrderedSet<T> {
    fn bitor_assign(&mut self, rhs: &Self) {
        for value in rhs.iter() {
            self.add(value);
        }
    }
}

impl<T: Ord + Copy> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.add(value);
        }
        set
    }
}

impl<T: Ord + Copy> Extend<T> for OrderedSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl<'a, T: Ord + Copy> IntoIterator for &'a OrderedSet<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

// =============================================================================
// ITERATORS
// =============================================================================

/// Forward iterator over an [`OrderedSet`].
pub struct Iter<'a, T> {
    set: &'a OrderedSet<T>,
    cursor: Option<usize>,
}

impl<T: Copy> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let slot = self.cursor?;
        let node = &self.set.nodes[slot];
        self.cursor = node.next;
        Some(node.value)
    }
}

/// Reverse iterator over an [`OrderedSet`].
pub struct IterReversed<'a, T> {
    set: &'a OrderedSet<T>,
    cursor: Option<usize>,
}

impl<T: Copy> Iterator for IterReversed<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let slot = self.cursor?;
        let node = &self.set.nodes[slot];
        self.cursor = node.prev;
        Some(node.value)
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

// Serialized as a plain sequence in insertion order.
impl<T: Ord + Copy + Serialize> Serialize for OrderedSet<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for value in self.iter() {
            seq.serialize_element(&value)?;
        }
        seq.end()
    }
}

impl<'de, T: Ord + Copy + Deserialize<'de>> Deserialize<'de> for OrderedSet<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SeqVisitor<T>(PhantomData<T>);

        impl<'de, T: Ord + Copy + Deserialize<'de>> Visitor<'de> for SeqVisitor<T> {
            type Value = OrderedSet<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a sequence of unique elements")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut set = OrderedSet::new();
                while let Some(value) = seq.next_element()? {
                    set.add(value);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_seq(SeqVisitor(PhantomData))
    }
}

// =============================================================================
// TESTS
// =============================================================================
