/// Insertion-ordered collection keyed by registration id. Removal is a linear
/// scan that keeps the relative order of the remaining entries.
#[derive(Debug, Clone)]
pub(crate) struct Registry<I, T> {
    entries: Vec<(I, T)>,
}

impl<I, T> Default for Registry<I, T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<I: Copy + PartialEq, T> Registry<I, T> {
    pub(crate) fn push(&mut self, id: I, item: T) {
        self.entries.push((id, item));
    }

    pub(crate) fn remove(&mut self, id: I) -> Option<T> {
        let index = self.entries.iter().position(|(entry_id, _)| *entry_id == id)?;
        Some(self.entries.remove(index).1)
    }

    /// Returns how many entries were dropped.
    pub(crate) fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    pub(crate) fn get(&self, id: I) -> Option<&T> {
        self.entries
            .iter()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, item)| item)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (I, &T)> + '_ {
        self.entries.iter().map(|(id, item)| (*id, item))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
