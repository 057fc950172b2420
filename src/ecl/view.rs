//! Ordered, name addressable selections of a container's keywords.
//!
//! A [`FileView`] maps view positions onto positions in the container's
//! global index. The global view covers every keyword; block views cover
//! one keyword and everything up to the next keyword of the same name,
//! which is how restart files group one report step.

/// An ordered subset of a container's keywords.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileView {
    /// Global index of every keyword in the view, in file order.
    globals: Vec<usize>,
    names: Vec<String>,
}

impl FileView {
    /// Builds a view from `(global_index, name)` pairs in file order.
    pub fn new<'a>(items: impl IntoIterator<Item = (usize, &'a str)>) -> Self {
        let (globals, names) = items
            .into_iter()
            .map(|(global, name)| (global, name.to_string()))
            .unzip();
        Self { globals, names }
    }

    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }

    /// Global index of the keyword at view position `index`.
    pub fn global_index(&self, index: usize) -> Option<usize> {
        self.globals.get(index).copied()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Renames the keyword at view position `index`.
    pub(crate) fn rename(&mut self, index: usize, name: &str) {
        if let Some(slot) = self.names.get_mut(index) {
            *slot = name.to_string();
        }
    }

    /// View position of the `occurrence`th keyword called `name`.
    pub fn iget_named(&self, name: &str, occurrence: usize) -> Option<usize> {
        self.names
            .iter()
            .enumerate()
            .filter(|(_, n)| n.as_str() == name)
            .nth(occurrence)
            .map(|(i, _)| i)
    }

    pub fn num_named(&self, name: &str) -> usize {
        self.names.iter().filter(|n| n.as_str() == name).count()
    }

    pub fn has_kw(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Distinct keyword names in order of first appearance.
    pub fn distinct(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for name in &self.names {
            if !seen.contains(name) {
                seen.push(name.clone());
            }
        }
        seen
    }

    /// How many keywords of the same name precede view position `index`.
    pub fn occurrence(&self, index: usize) -> Option<usize> {
        let name = self.names.get(index)?;
        Some(self.names[..index].iter().filter(|n| *n == name).count())
    }

    /// The keywords from the `occurrence`th `name` up to, but not
    /// including, the next keyword called `name`.
    pub fn block(&self, name: &str, occurrence: usize) -> Option<FileView> {
        let start = self.iget_named(name, occurrence)?;
        let end = self.names[start + 1..]
            .iter()
            .position(|n| n == name)
            .map_or(self.len(), |offset| start + 1 + offset);
        Some(FileView {
            globals: self.globals[start..end].to_vec(),
            names: self.names[start..end].to_vec(),
        })
    }
}
