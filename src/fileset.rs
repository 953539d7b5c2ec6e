use std::collections::btree_map;
use std::collections::BTreeMap;

/// A set of task files: relative `/`-separated path to raw content.
///
/// Paths are case-sensitive and iterate in sorted order, which is what makes
/// snapshot encoding canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    files: BTreeMap<String, Vec<u8>>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a file, returning the previous content.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        self.files.insert(path.into(), content.into())
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Content of `path` if it is valid UTF-8
    pub fn text(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_slice()))
    }

    /// Files whose path satisfies `keep`.
    pub fn restrict<F>(&self, mut keep: F) -> FileSet
    where
        F: FnMut(&str) -> bool,
    {
        self.iter()
            .filter(|(path, _)| keep(path))
            .map(|(path, content)| (path.to_string(), content.to_vec()))
            .collect()
    }

    /// Split into `(matching, rest)` by path predicate.
    pub fn split<F>(&self, mut predicate: F) -> (FileSet, FileSet)
    where
        F: FnMut(&str) -> bool,
    {
        let mut positive = FileSet::new();
        let mut negative = FileSet::new();
        for (path, content) in self.iter() {
            let target = if predicate(path) {
                &mut positive
            } else {
                &mut negative
            };
            target.insert(path, content);
        }
        (positive, negative)
    }

    /// Copy every file of `other` into `self`, overwriting on conflict.
    pub fn overlay(&mut self, other: &FileSet) {
        for (path, content) in other.iter() {
            self.insert(path, content);
        }
    }
}

impl<K: Into<String>, V: Into<Vec<u8>>> FromIterator<(K, V)> for FileSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        FileSet {
            files: iter
                .into_iter()
                .map(|(path, content)| (path.into(), content.into()))
                .collect(),
        }
    }
}

impl IntoIterator for FileSet {
    type Item = (String, Vec<u8>);
    type IntoIter = btree_map::IntoIter<String, Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}
