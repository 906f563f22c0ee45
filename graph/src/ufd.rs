//! Union-find over a fixed element range, used to pre-cluster attractive
//! edges before decomposition solving.

/// Union-find with iterative two-pass path compression and smaller-root union.
#[derive(Debug, Clone)]
pub struct Ufd {
    parent: Vec<usize>,
}

impl Ufd {
    pub fn new(n_elements: usize) -> Self {
        Self {
            parent: (0..n_elements).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Find root with iterative path compression (two-pass).
    #[inline]
    pub fn find(&mut self, element: usize) -> usize {
        let mut root = element;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut current = element;
        while current != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }

        root
    }

    #[inline]
    pub fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            let (smaller, larger) = if root_a < root_b {
                (root_a, root_b)
            } else {
                (root_b, root_a)
            };
            self.parent[larger] = smaller;
        }
    }

    /// Root of every element, without compressing via `&mut` aliasing tricks.
    pub fn labeling(&mut self) -> Vec<usize> {
        (0..self.parent.len()).map(|e| self.find(e)).collect()
    }
}

/// Remaps labels to a dense 0-based range in first-occurrence order.
/// Returns the number of distinct labels.
pub fn relabel_consecutive(labels: &mut [u64]) -> u64 {
    let mut mapping = hashbrown::HashMap::new();
    let mut next = 0u64;
    for label in labels.iter_mut() {
        let dense = *mapping.entry(*label).or_insert_with(|| {
            let dense = next;
            next += 1;
            dense
        });
        *label = dense;
    }
    next
}
