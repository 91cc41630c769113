//! Mesh connectivity stored as nested lists of entity ids.
use fenris_nested_vec::NestedVec;

/// A list of lists: entity `i` is connected to the entities `ids(i)`.
///
/// Optionally carries an orientation sign (`+1` or `-1`) per connection, e.g. for the
/// face-edge incidence of a mesh.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Adjacency {
    lists: NestedVec<usize>,
    signs: Option<NestedVec<i8>>,
}

impl Adjacency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signs() -> Self {
        Self {
            lists: NestedVec::new(),
            signs: Some(NestedVec::new()),
        }
    }

    /// Append a new list of connections.
    ///
    /// # Panics
    ///
    /// Panics if the adjacency stores signs and the sign list is missing or has the wrong length,
    /// or if signs are given to an unsigned adjacency.
    pub fn push(&mut self, ids: &[usize], signs: Option<&[i8]>) {
        match (&mut self.signs, signs) {
            (Some(stored), Some(signs)) => {
                assert_eq!(ids.len(), signs.len(), "One sign per connection is required.");
                stored.push(signs);
            }
            (None, None) => {}
            _ => panic!("Signs must be given if and only if the adjacency is signed."),
        }
        self.lists.push(ids);
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The underlying nested lists of ids.
    pub fn lists(&self) -> &NestedVec<usize> {
        &self.lists
    }

    pub fn ids(&self, i: usize) -> &[usize] {
        self.lists.get(i).expect("Entity index out of bounds")
    }

    /// Signs of the connections of entity `i`, if the adjacency is signed.
    pub fn signs(&self, i: usize) -> Option<&[i8]> {
        self.signs
            .as_ref()
            .map(|signs| signs.get(i).expect("Entity index out of bounds"))
    }

    pub fn count(&self, i: usize) -> usize {
        self.ids(i).len()
    }

    pub fn max_count(&self) -> usize {
        self.lists.iter().map(<[usize]>::len).max().unwrap_or(0)
    }

    pub fn total_num_elements(&self) -> usize {
        self.lists.total_num_elements()
    }

    pub fn iter(&self) -> impl '_ + Iterator<Item = &[usize]> {
        self.lists.iter()
    }

    /// Build the transposed adjacency (unsigned) given the number of target entities.
    ///
    /// Connections are listed in increasing order of the source entity.
    pub fn transpose(&self, num_targets: usize) -> Adjacency {
        let mut transposed = vec![Vec::new(); num_targets];
        for (source, targets) in self.iter().enumerate() {
            for &target in targets {
                transposed[target].push(source);
            }
        }
        Adjacency::from(transposed)
    }
}

impl From<Vec<Vec<usize>>> for Adjacency {
    fn from(lists: Vec<Vec<usize>>) -> Self {
        Self {
            lists: NestedVec::from(lists),
            signs: None,
        }
    }
}
