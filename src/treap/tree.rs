use crate::arena::Handle;
use crate::arena::Pool;
use crate::treap::node::Node;
use rand::Open01;
use rand::Rng;
use rand::XorShiftRng;
use std::cmp::Ordering;

const DEFAULT_CHUNK_SIZE: usize = 1024;

/// An ordered collection of keys implemented by a randomized treap.
///
/// A treap is a tree that satisfies both the binary search tree property and a heap property.
/// Each node has a key and a priority. The key of any node is greater than or equal to all keys in
/// its left subtree and less than or equal to all keys in its right subtree. The priority of a
/// node is less than or equal to the priority of all nodes in its subtrees. Priorities are drawn
/// independently and uniformly from the open interval (0, 1), so the expected height of the tree
/// is proportional to the logarithm of the number of keys.
///
/// Nodes live in a `Pool` and link to each other through copyable handles: `left` and `right`
/// carry ownership of the subtrees, while `parent` is a non-owning back-reference that every
/// structural change keeps in sync. Equal keys are retained, so the treap behaves as a multiset;
/// a key equal to an existing key always descends into the right subtree.
///
/// # Examples
///
/// ```
/// use treap_collections::treap::Treap;
///
/// let mut t = Treap::new();
/// t.insert(0);
/// t.insert(3);
///
/// assert_eq!(t.len(), 2);
/// assert_eq!(t.min(), Some(&0));
///
/// assert_eq!(t.remove(&0), Some(0));
/// assert_eq!(t.remove(&1), None);
/// ```
pub struct Treap<T: Ord> {
    nodes: Pool<Node<T>>,
    root: Option<Handle>,
    rng: XorShiftRng,
    len: usize,
}

impl<T: Ord> Treap<T> {
    /// Constructs a new, empty `Treap<T>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use treap_collections::treap::Treap;
    ///
    /// let mut t: Treap<u32> = Treap::new();
    /// ```
    pub fn new() -> Self {
        Self::with_rng(XorShiftRng::new_unseeded())
    }

    /// Constructs a new, empty `Treap<T>` that draws priorities from the given random number
    /// generator. Seeding the generator makes the shape of the tree reproducible.
    ///
    /// # Examples
    ///
    /// ```
    /// use rand::SeedableRng;
    /// use rand::XorShiftRng;
    /// use treap_collections::treap::Treap;
    ///
    /// let rng: XorShiftRng = SeedableRng::from_seed([1, 1, 1, 1]);
    /// let mut t = Treap::with_rng(rng);
    /// t.insert(1);
    /// assert!(t.contains(&1));
    /// ```
    pub fn with_rng(rng: XorShiftRng) -> Self {
        Treap {
            nodes: Pool::new(DEFAULT_CHUNK_SIZE),
            root: None,
            rng,
            len: 0,
        }
    }

    /// Inserts a key into the treap with a priority drawn uniformly from the open interval
    /// (0, 1). Keys already present are kept; the new occurrence descends into the right subtree
    /// of any node with an equal key.
    ///
    /// # Examples
    ///
    /// ```
    /// use treap_collections::treap::Treap;
    ///
    /// let mut t = Treap::new();
    /// t.insert(1);
    /// t.insert(1);
    /// assert_eq!(t.len(), 2);
    /// ```
    pub fn insert(&mut self, key: T) {
        let Open01(priority) = self.rng.gen::<Open01<f64>>();
        self.insert_with_priority(key, priority);
    }

    /// Inserts a key with an explicitly chosen priority instead of a sampled one, so tests can
    /// construct a tree of a known shape. The priority must be finite; the node with the smallest
    /// priority becomes the root.
    ///
    /// # Examples
    ///
    /// ```
    /// use treap_collections::treap::Treap;
    ///
    /// let mut t = Treap::new();
    /// t.insert_with_priority(2, 0.5);
    /// t.insert_with_priority(1, 0.8);
    /// t.insert_with_priority(3, 0.2);
    /// assert_eq!(t.root(), Some(&3));
    /// assert_eq!(t.min(), Some(&1));
    /// ```
    pub fn insert_with_priority(&mut self, key: T, priority: f64) {
        let id = self.nodes.allocate(Node::new(key, priority));
        match self.root {
            Some(root) => {
                self.attach(root, id);
                self.sift_up(id);
            }
            None => self.root = Some(id),
        }
        self.len += 1;
    }

    /// Removes one occurrence of a key from the treap. If the key exists in the treap, it will
    /// return the removed key. Otherwise it will return `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use treap_collections::treap::Treap;
    ///
    /// let mut t = Treap::new();
    /// t.insert(1);
    /// assert_eq!(t.remove(&1), Some(1));
    /// assert_eq!(t.remove(&1), None);
    /// ```
    pub fn remove(&mut self, key: &T) -> Option<T> {
        let id = self.find(key)?;
        // a heap-maximal priority forces the node to sift down to a leaf
        self.nodes[id].priority = f64::INFINITY;
        self.sift_down(id);
        debug_assert!(self.nodes[id].is_leaf());
        match self.nodes[id].parent {
            Some(parent) => {
                let node = &mut self.nodes[parent];
                if node.left == Some(id) {
                    node.left = None;
                } else {
                    node.right = None;
                }
            }
            None => self.root = None,
        }
        self.len -= 1;
        Some(self.nodes.free(id).key)
    }

    /// Checks if a key exists in the treap.
    ///
    /// # Examples
    ///
    /// ```
    /// use treap_collections::treap::Treap;
    ///
    /// let mut t = Treap::new();
    /// t.insert(1);
    /// assert_eq!(t.contains(&0), false);
    /// assert_eq!(t.contains(&1), true);
    /// ```
    pub fn contains(&self, key: &T) -> bool {
        self.find(key).is_some()
    }

    /// Returns an immutable reference to the first key on the search path that compares equal to
    /// a particular key. Returns `None` if the key does not exist in the treap.
    ///
    /// # Examples
    ///
    /// ```
    /// use treap_collections::treap::Treap;
    ///
    /// let mut t = Treap::new();
    /// t.insert(1);
    /// assert_eq!(t.get(&0), None);
    /// assert_eq!(t.get(&1), Some(&1));
    /// ```
    pub fn get(&self, key: &T) -> Option<&T> {
        self.find(key).map(|id| &self.nodes[id].key)
    }

    /// Returns the number of keys in the treap.
    ///
    /// # Examples
    ///
    /// ```
    /// use treap_collections::treap::Treap;
    ///
    /// let mut t = Treap::new();
    /// t.insert(1);
    /// assert_eq!(t.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the treap is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use treap_collections::treap::Treap;
    ///
    /// let t: Treap<u32> = Treap::new();
    /// assert!(t.is_empty());
    /// ```
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the key stored at the root of the treap, which is the key with the minimum
    /// priority. Returns `None` if the treap is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use treap_collections::treap::Treap;
    ///
    /// let mut t = Treap::new();
    /// assert_eq!(t.root(), None);
    /// t.insert_with_priority(1, 0.7);
    /// t.insert_with_priority(2, 0.3);
    /// assert_eq!(t.root(), Some(&2));
    /// ```
    pub fn root(&self) -> Option<&T> {
        self.root.map(|id| &self.nodes[id].key)
    }

    /// Returns the minimum key of the treap. Returns `None` if the treap is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use treap_collections::treap::Treap;
    ///
    /// let mut t = Treap::new();
    /// t.insert(1);
    /// t.insert(3);
    /// assert_eq!(t.min(), Some(&1));
    /// ```
    pub fn min(&self) -> Option<&T> {
        self.root.map(|root| {
            let mut current = root;
            while let Some(left) = self.nodes[current].left {
                current = left;
            }
            &self.nodes[current].key
        })
    }

    /// Returns the maximum key of the treap. Returns `None` if the treap is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use treap_collections::treap::Treap;
    ///
    /// let mut t = Treap::new();
    /// t.insert(1);
    /// t.insert(3);
    /// assert_eq!(t.max(), Some(&3));
    /// ```
    pub fn max(&self) -> Option<&T> {
        self.root.map(|root| {
            let mut current = root;
            while let Some(right) = self.nodes[current].right {
                current = right;
            }
            &self.nodes[current].key
        })
    }

    /// Returns an iterator over the treap. The iterator will yield keys using in-order traversal.
    ///
    /// # Examples
    ///
    /// ```
    /// use treap_collections::treap::Treap;
    ///
    /// let mut t = Treap::new();
    /// t.insert(1);
    /// t.insert(3);
    ///
    /// let mut iterator = t.iter();
    /// assert_eq!(iterator.next(), Some(&1));
    /// assert_eq!(iterator.next(), Some(&3));
    /// assert_eq!(iterator.next(), None);
    /// ```
    pub fn iter(&self) -> Iter<T> {
        Iter {
            nodes: &self.nodes,
            current: self.root,
            stack: Vec::new(),
        }
    }

    /// Walks the whole tree and asserts that the binary search tree property, the heap property,
    /// the parent back-references, and the recorded length all hold. A violation is a programming
    /// bug inside the treap, so the walk panics on the first one it finds. The checks are active
    /// in debug builds and compiled out under release.
    ///
    /// # Examples
    ///
    /// ```
    /// use treap_collections::treap::Treap;
    ///
    /// let mut t = Treap::new();
    /// t.insert(1);
    /// t.insert(2);
    /// t.assert_invariants();
    /// ```
    pub fn assert_invariants(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        let mut reachable = 0;
        if let Some(root) = self.root {
            assert!(
                self.nodes[root].parent.is_none(),
                "Expected the root to have no parent."
            );
            let mut stack: Vec<(Handle, Option<&T>, Option<&T>)> = vec![(root, None, None)];
            while let Some((id, lower, upper)) = stack.pop() {
                reachable += 1;
                let node = &self.nodes[id];
                if let Some(lower) = lower {
                    assert!(
                        *lower <= node.key,
                        "Expected every key in a right subtree to be at least its ancestor's key."
                    );
                }
                if let Some(upper) = upper {
                    assert!(
                        node.key <= *upper,
                        "Expected every key in a left subtree to be at most its ancestor's key."
                    );
                }
                if let Some(parent) = node.parent {
                    assert!(
                        node.priority >= self.nodes[parent].priority,
                        "Expected every child's priority to be at least its parent's priority."
                    );
                    let parent_node = &self.nodes[parent];
                    assert!(
                        (parent_node.left == Some(id)) ^ (parent_node.right == Some(id)),
                        "Expected the node to occupy exactly one child slot of its parent."
                    );
                }
                if let Some(left) = node.left {
                    assert_eq!(self.nodes[left].parent, Some(id));
                    stack.push((left, lower, Some(&node.key)));
                }
                if let Some(right) = node.right {
                    assert_eq!(self.nodes[right].parent, Some(id));
                    stack.push((right, Some(&node.key), upper));
                }
            }
        }
        assert_eq!(reachable, self.len);
        assert_eq!(self.nodes.len(), self.len);
    }

    fn find(&self, key: &T) -> Option<Handle> {
        let mut current = self.root;
        while let Some(id) = current {
            let node = &self.nodes[id];
            match key.cmp(&node.key) {
                Ordering::Less => current = node.left,
                Ordering::Greater => current = node.right,
                Ordering::Equal => return Some(id),
            }
        }
        None
    }

    fn attach(&mut self, root: Handle, id: Handle) {
        let mut current = root;
        loop {
            match self.nodes[id].key.cmp(&self.nodes[current].key) {
                Ordering::Less => match self.nodes[current].left {
                    Some(left) => current = left,
                    None => {
                        self.nodes[current].left = Some(id);
                        break;
                    }
                },
                // equal keys descend right
                Ordering::Greater | Ordering::Equal => match self.nodes[current].right {
                    Some(right) => current = right,
                    None => {
                        self.nodes[current].right = Some(id);
                        break;
                    }
                },
            }
        }
        self.nodes[id].parent = Some(current);
    }

    fn sift_up(&mut self, id: Handle) {
        while let Some(parent) = self.nodes[id].parent {
            if self.nodes[id].priority >= self.nodes[parent].priority {
                break;
            }
            if self.nodes[parent].left == Some(id) {
                self.rotate_right(id);
            } else {
                self.rotate_left(id);
            }
        }
    }

    fn sift_down(&mut self, id: Handle) {
        while let Some(child) = self.min_priority_child(id) {
            if self.nodes[id].left == Some(child) {
                self.rotate_right(child);
            } else {
                self.rotate_left(child);
            }
        }
    }

    fn min_priority_child(&self, id: Handle) -> Option<Handle> {
        let node = &self.nodes[id];
        match (node.left, node.right) {
            (Some(left), Some(right)) => {
                if self.nodes[left].priority < self.nodes[right].priority {
                    Some(left)
                } else {
                    Some(right)
                }
            }
            (Some(left), None) => Some(left),
            (None, Some(right)) => Some(right),
            (None, None) => None,
        }
    }

    /// Rotates a left child above its parent: the child's right subtree becomes the parent's left
    /// subtree and the parent becomes the child's right child. All affected parent
    /// back-references are rewritten, and the child takes over the parent's slot in the
    /// grandparent (or becomes the root).
    fn rotate_right(&mut self, id: Handle) {
        let parent = self.nodes[id].parent.expect("Expected a parent to rotate with.");
        let grandparent = self.nodes[parent].parent;
        let subtree = self.nodes[id].right;

        self.nodes[parent].left = subtree;
        if let Some(subtree) = subtree {
            self.nodes[subtree].parent = Some(parent);
        }

        self.nodes[id].right = Some(parent);
        self.nodes[parent].parent = Some(id);

        self.relink(parent, id, grandparent);
    }

    /// Rotates a right child above its parent. Mirror image of `rotate_right`.
    fn rotate_left(&mut self, id: Handle) {
        let parent = self.nodes[id].parent.expect("Expected a parent to rotate with.");
        let grandparent = self.nodes[parent].parent;
        let subtree = self.nodes[id].left;

        self.nodes[parent].right = subtree;
        if let Some(subtree) = subtree {
            self.nodes[subtree].parent = Some(parent);
        }

        self.nodes[id].left = Some(parent);
        self.nodes[parent].parent = Some(id);

        self.relink(parent, id, grandparent);
    }

    // The grandparent slot is chosen by identity of the displaced child, so equal keys cannot be
    // re-linked into the wrong side.
    fn relink(&mut self, old_child: Handle, new_child: Handle, grandparent: Option<Handle>) {
        self.nodes[new_child].parent = grandparent;
        match grandparent {
            Some(grandparent) => {
                let node = &mut self.nodes[grandparent];
                if node.left == Some(old_child) {
                    node.left = Some(new_child);
                } else {
                    node.right = Some(new_child);
                }
            }
            None => self.root = Some(new_child),
        }
    }
}

impl<T: Ord> IntoIterator for Treap<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        let Treap { nodes, root, .. } = self;
        IntoIter {
            nodes,
            current: root,
            stack: Vec::new(),
        }
    }
}

impl<'a, T: 'a + Ord> IntoIterator for &'a Treap<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An owning iterator for `Treap<T>`.
///
/// This iterator traverses the keys of a treap in-order, freeing each node's slot as it is
/// yielded.
pub struct IntoIter<T: Ord> {
    nodes: Pool<Node<T>>,
    current: Option<Handle>,
    stack: Vec<Handle>,
}

impl<T: Ord> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.current {
            self.stack.push(id);
            self.current = self.nodes[id].left;
        }
        self.stack.pop().map(|id| {
            let node = self.nodes.free(id);
            self.current = node.right;
            node.key
        })
    }
}

/// An iterator for `Treap<T>`.
///
/// This iterator traverses the keys of a treap in-order and yields immutable references.
pub struct Iter<'a, T: 'a + Ord> {
    nodes: &'a Pool<Node<T>>,
    current: Option<Handle>,
    stack: Vec<Handle>,
}

impl<'a, T: 'a + Ord> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let nodes = self.nodes;
        while let Some(id) = self.current {
            self.stack.push(id);
            self.current = nodes[id].left;
        }
        self.stack.pop().map(|id| {
            let node = &nodes[id];
            self.current = node.right;
            &node.key
        })
    }
}

impl<T: Ord> Default for Treap<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Treap;
    use quickcheck::quickcheck;
    use rand::Rng;

    #[test]
    fn test_len_empty() {
        let tree: Treap<u32> = Treap::new();
        assert_eq!(tree.len(), 0);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_min_max_empty() {
        let tree: Treap<u32> = Treap::new();
        assert_eq!(tree.min(), None);
        assert_eq!(tree.max(), None);
        assert_eq!(tree.root(), None);
    }

    #[test]
    fn test_insert() {
        let mut tree = Treap::new();
        tree.insert(1);
        assert!(tree.contains(&1));
        assert_eq!(tree.get(&1), Some(&1));
        tree.assert_invariants();
    }

    #[test]
    fn test_insert_duplicates() {
        let mut tree = Treap::new();
        tree.insert(1);
        tree.insert(1);
        assert_eq!(tree.len(), 2);
        tree.assert_invariants();
        assert_eq!(tree.remove(&1), Some(1));
        assert_eq!(tree.remove(&1), Some(1));
        assert_eq!(tree.remove(&1), None);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut tree = Treap::new();
        tree.insert(1);
        assert_eq!(tree.remove(&1), Some(1));
        assert!(!tree.contains(&1));
        assert_eq!(tree.get(&1), None);
        assert!(tree.is_empty());
        tree.assert_invariants();
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut tree = Treap::new();
        tree.insert(1);
        assert_eq!(tree.remove(&2), None);
        assert_eq!(tree.remove(&2), None);
        assert_eq!(tree.len(), 1);
        tree.assert_invariants();
    }

    #[test]
    fn test_remove_empty() {
        let mut tree: Treap<u32> = Treap::new();
        assert_eq!(tree.remove(&1), None);
    }

    #[test]
    fn test_min_max() {
        let mut tree = Treap::new();
        tree.insert(1);
        tree.insert(3);
        tree.insert(5);

        assert_eq!(tree.min(), Some(&1));
        assert_eq!(tree.max(), Some(&5));
    }

    #[test]
    fn test_fixed_priorities() {
        let mut tree = Treap::new();
        let pairs = [
            (5, 0.5),
            (3, 0.2),
            (8, 0.7),
            (1, 0.9),
            (4, 0.1),
            (7, 0.6),
            (9, 0.3),
        ];
        for &(key, priority) in &pairs {
            tree.insert_with_priority(key, priority);
        }
        tree.assert_invariants();
        assert_eq!(tree.root(), Some(&4));
        assert!(tree.contains(&8));

        assert_eq!(tree.remove(&5), Some(5));
        assert_eq!(tree.get(&5), None);
        for &(key, _) in pairs.iter().filter(|&&(key, _)| key != 5) {
            assert!(tree.contains(&key));
        }
        tree.assert_invariants();
    }

    #[test]
    fn test_iter() {
        let mut tree = Treap::new();
        tree.insert(1);
        tree.insert(5);
        tree.insert(3);

        assert_eq!(tree.iter().collect::<Vec<&u32>>(), vec![&1, &3, &5]);
    }

    #[test]
    fn test_into_iter() {
        let mut tree = Treap::new();
        tree.insert(1);
        tree.insert(5);
        tree.insert(3);

        assert_eq!(tree.into_iter().collect::<Vec<u32>>(), vec![1, 3, 5]);
    }

    #[test]
    fn test_invariants_random_operations() {
        let mut rng: rand::XorShiftRng = rand::SeedableRng::from_seed([1, 1, 1, 1]);
        let mut tree = Treap::new();
        let mut keys = Vec::new();
        for _ in 0..500 {
            let key = rng.gen::<u16>();
            tree.insert(key);
            keys.push(key);
            tree.assert_invariants();
        }
        for key in keys {
            assert_eq!(tree.remove(&key), Some(key));
            tree.assert_invariants();
        }
        assert!(tree.is_empty());
    }

    quickcheck! {
        fn qc_insert_then_contains(keys: Vec<i16>) -> bool {
            let mut tree = Treap::new();
            for key in &keys {
                tree.insert(*key);
            }
            tree.assert_invariants();
            tree.len() == keys.len() && keys.iter().all(|key| tree.contains(key))
        }

        fn qc_treap_equiv_sorted_vec(operations: Vec<(bool, i8)>) -> bool {
            let mut tree = Treap::new();
            let mut expected = Vec::new();
            for (is_insert, key) in operations {
                if is_insert {
                    tree.insert(key);
                    expected.push(key);
                } else {
                    let index = expected.iter().position(|other| *other == key);
                    match (tree.remove(&key), index) {
                        (Some(removed), Some(index)) => {
                            expected.remove(index);
                            if removed != key {
                                return false;
                            }
                        }
                        (None, None) => {}
                        _ => return false,
                    }
                }
                tree.assert_invariants();
            }
            expected.sort();
            tree.into_iter().collect::<Vec<i8>>() == expected
        }
    }
}
