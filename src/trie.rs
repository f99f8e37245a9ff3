//! Bit-level prefix trie over IPv4/IPv6 addresses, used for longest-prefix
//! match lookups (CIDR input, overlapping/nested prefixes, or any IPv6
//! traffic).
//!
//! The trie has a two-phase lifecycle: a [`TrieBuilder`] accumulates
//! inserts, and [`TrieBuilder::finalize`] consumes it into a [`FrozenTrie`]
//! that owns the same nodes but exposes no insertion method, making
//! post-build mutation a compile error rather than a runtime check.

use crate::ip_address::IpAddress;

struct Node<T> {
  left: Option<Box<Node<T>>>,
  right: Option<Box<Node<T>>>,
  payload: Option<T>,
}

impl<T> Node<T> {
  fn empty() -> Self {
    Self { left: None, right: None, payload: None }
  }
}

/// Accumulates `(prefix, payload)` inserts for later longest-prefix-match
/// lookup. Consumed by [`TrieBuilder::finalize`] into a [`FrozenTrie`].
pub struct TrieBuilder<T> {
  v4_root: Node<T>,
  v6_root: Node<T>,
}

impl<T> Default for TrieBuilder<T> {
  fn default() -> Self {
    Self { v4_root: Node::empty(), v6_root: Node::empty() }
  }
}

impl<T> TrieBuilder<T> {
  /// Creates an empty builder with separate IPv4 and IPv6 roots.
  pub fn new() -> Self {
    Self::default()
  }

  /// Inserts `payload` at the node reached by descending `prefix_length`
  /// bits of `address`, creating any missing intermediate nodes.
  ///
  /// Multiple inserts at the same prefix overwrite the previous payload
  /// (last write wins).
  ///
  /// # Panics
  ///
  /// Panics if `prefix_length` exceeds the address family's bit width.
  pub fn insert(&mut self, address: IpAddress, prefix_length: u32, payload: T) {
    assert!(
      prefix_length <= address.bit_width(),
      "prefix length {prefix_length} exceeds bit width {}",
      address.bit_width()
    );

    let root = match address {
      IpAddress::V4(_) => &mut self.v4_root,
      IpAddress::V6(_) => &mut self.v6_root,
    };

    let mut node = root;
    for i in 0..prefix_length {
      let slot = if address.bit(i) { &mut node.right } else { &mut node.left };
      node = slot.get_or_insert_with(|| Box::new(Node::empty()));
    }
    node.payload = Some(payload);
  }

  /// Consumes the builder, returning an immutable [`FrozenTrie`].
  pub fn finalize(self) -> FrozenTrie<T> {
    FrozenTrie { v4_root: self.v4_root, v6_root: self.v6_root }
  }
}

/// An immutable, frozen trie produced by [`TrieBuilder::finalize`]. Carries
/// no insertion method, so further mutation is a compile-time impossibility.
pub struct FrozenTrie<T> {
  v4_root: Node<T>,
  v6_root: Node<T>,
}

impl<T> std::fmt::Debug for FrozenTrie<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FrozenTrie").finish_non_exhaustive()
  }
}

impl<T> FrozenTrie<T> {
  /// Walks from the root toward `address`, remembering the payload of the
  /// deepest visited node that has one, and returns it (the longest
  /// matching prefix). Returns `None` if no visited node carried a payload.
  pub fn lookup(&self, address: IpAddress) -> Option<&T> {
    let mut node = match address {
      IpAddress::V4(_) => &self.v4_root,
      IpAddress::V6(_) => &self.v6_root,
    };

    let mut best = node.payload.as_ref();
    for i in 0..address.bit_width() {
      let next = if address.bit(i) { &node.right } else { &node.left };
      match next {
        Some(child) => {
          node = child;
          if node.payload.is_some() {
            best = node.payload.as_ref();
          }
        }
        None => break,
      }
    }
    best
  }
}
