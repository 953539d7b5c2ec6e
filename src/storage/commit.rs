use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

use super::object::{load_object, ObjectKind, ObjectReader, ObjectWriter, MAX_PARENTS};
use super::{ObjectId, StorageBackend};
use crate::error::{Error, Result};

/// Depth bound used when walking history.
pub const DEFAULT_HISTORY_DEPTH: usize = 20;

/// A recorded state of one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    /// Hash of the encoded commit (covers every other field)
    pub hash: ObjectId,
    pub snapshot_hash: ObjectId,
    /// Empty for a root commit, two or more for a propagation merge
    pub parent_hashes: Vec<ObjectId>,
    pub message: String,
    pub timestamp_millis: i64,
}

impl Commit {
    pub fn is_merge(&self) -> bool {
        self.parent_hashes.len() > 1
    }

    pub fn is_root(&self) -> bool {
        self.parent_hashes.is_empty()
    }
}

/// Commit DAG stored alongside the snapshots.
pub struct CommitGraph<'a, S> {
    backend: &'a S,
}

impl<'a, S: StorageBackend> CommitGraph<'a, S> {
    pub fn new(backend: &'a S) -> Self {
        CommitGraph { backend }
    }

    /// Record a commit stamped with the current wall-clock time.
    pub fn commit(
        &self,
        snapshot_hash: &str,
        parent_hashes: &[ObjectId],
        message: &str,
    ) -> Result<ObjectId> {
        let now = chrono::Utc::now().timestamp_millis();
        self.commit_at(snapshot_hash, parent_hashes, message, now)
    }

    /// Record a commit with an explicit timestamp.
    ///
    /// The snapshot and every parent must already be stored, so a commit can
    /// never point at something that does not exist.
    pub fn commit_at(
        &self,
        snapshot_hash: &str,
        parent_hashes: &[ObjectId],
        message: &str,
        timestamp_millis: i64,
    ) -> Result<ObjectId> {
        if !self.backend.object_exists(snapshot_hash)? {
            return Err(Error::NotFound {
                kind: ObjectKind::Snapshot,
                hash: snapshot_hash.to_string(),
            });
        }
        if parent_hashes.len() > MAX_PARENTS {
            return Err(Error::Corrupt(format!(
                "commit with {} parents exceeds the limit of {}",
                parent_hashes.len(),
                MAX_PARENTS
            )));
        }
        for parent in parent_hashes {
            if !self.backend.object_exists(parent)? {
                return Err(Error::NotFound {
                    kind: ObjectKind::Commit,
                    hash: parent.clone(),
                });
            }
        }

        let mut writer = ObjectWriter::new(ObjectKind::Commit);
        writer.put_str(snapshot_hash);
        writer.put_u32(parent_hashes.len() as u32);
        for parent in parent_hashes {
            writer.put_str(parent);
        }
        writer.put_i64(timestamp_millis).put_str(message);

        let hash = self.backend.write_object(&writer.finish())?;
        debug!(
            commit = %hash,
            snapshot = %snapshot_hash,
            parents = parent_hashes.len(),
            "stored commit"
        );
        Ok(hash)
    }

    pub fn get(&self, hash: &str) -> Result<Commit> {
        let raw = load_object(self.backend, hash, ObjectKind::Commit)?;
        let mut reader = ObjectReader::open(hash, &raw, ObjectKind::Commit)?;

        let snapshot_hash = reader.string()?;
        let parent_count = reader.count(MAX_PARENTS)?;
        let mut parent_hashes = Vec::with_capacity(parent_count);
        for _ in 0..parent_count {
            parent_hashes.push(reader.string()?);
        }
        let timestamp_millis = reader.i64()?;
        let message = reader.string()?;
        reader.finish()?;

        Ok(Commit {
            hash: hash.to_string(),
            snapshot_hash,
            parent_hashes,
            message,
            timestamp_millis,
        })
    }

    /// Whether `hash` names a stored commit object.
    pub fn contains(&self, hash: &str) -> Result<bool> {
        match self.backend.read_object(hash)? {
            Some(raw) => Ok(ObjectKind::of(&raw) == Some(ObjectKind::Commit)),
            None => Ok(false),
        }
    }

    /// Depth-first walk from `hash` through all parents.
    ///
    /// Each commit appears once, in pre-order. A commit is returned when its
    /// shortest path from the start is at most `max_depth`; reaching it again
    /// by a shorter path re-walks its parents with the smaller depth. A
    /// missing start commit is an error; a missing parent further down is
    /// skipped with a warning.
    pub fn ancestors(&self, hash: &str, max_depth: usize) -> Result<Vec<Commit>> {
        let mut result = Vec::new();
        let mut best_depth: HashMap<ObjectId, usize> = HashMap::new();
        let mut parents_of: HashMap<ObjectId, Vec<ObjectId>> = HashMap::new();
        let mut stack = vec![(hash.to_string(), 0usize)];

        while let Some((current, depth)) = stack.pop() {
            if depth > max_depth {
                continue;
            }
            if matches!(best_depth.get(&current), Some(&seen) if seen <= depth) {
                continue;
            }
            best_depth.insert(current.clone(), depth);

            let parents = match parents_of.get(&current) {
                Some(parents) => parents.clone(),
                None => {
                    let commit = match self.get(&current) {
                        Ok(commit) => commit,
                        Err(e) if depth > 0 && e.is_corruption() => {
                            warn!(commit = %current, "skipping unreadable ancestor: {}", e);
                            continue;
                        }
                        Err(e) => return Err(e),
                    };
                    let parents = commit.parent_hashes.clone();
                    parents_of.insert(current.clone(), parents.clone());
                    result.push(commit);
                    parents
                }
            };

            // Reverse so the first parent is explored first
            for parent in parents.iter().rev() {
                if !matches!(best_depth.get(parent), Some(&seen) if seen <= depth + 1) {
                    stack.push((parent.clone(), depth + 1));
                }
            }
        }

        Ok(result)
    }

    /// Whether `candidate` is reachable from `descendant` (a commit is its
    /// own ancestor).
    pub fn is_ancestor(&self, candidate: &str, descendant: &str) -> Result<bool> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([descendant.to_string()]);

        while let Some(current) = queue.pop_front() {
            if current == candidate {
                return Ok(true);
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            for parent in self.get(&current)?.parent_hashes {
                if !visited.contains(&parent) {
                    queue.push_back(parent);
                }
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileset::FileSet;
    use crate::storage::{FilesystemStorage, SnapshotStore};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        backend: FilesystemStorage,
    }

    impl Fixture {
        fn new() -> Result<Self> {
            let dir = TempDir::new()?;
            let backend = FilesystemStorage::new(dir.path());
            backend.initialize()?;
            Ok(Fixture { _dir: dir, backend })
        }

        fn graph(&self) -> CommitGraph<'_, FilesystemStorage> {
            CommitGraph::new(&self.backend)
        }

        fn snapshot(&self, content: &str) -> Result<ObjectId> {
            let files: FileSet = [("main.kt", content)].into_iter().collect();
            SnapshotStore::new(&self.backend).put(&files)
        }
    }

    #[test]
    fn test_commit_and_get() -> Result<()> {
        let fixture = Fixture::new()?;
        let graph = fixture.graph();
        let snap = fixture.snapshot("v1")?;

        let root = graph.commit_at(&snap, &[], "first", 1_000)?;
        let child = graph.commit_at(&snap, &[root.clone()], "second", 2_000)?;

        let commit = graph.get(&child)?;
        assert_eq!(commit.hash, child);
        assert_eq!(commit.snapshot_hash, snap);
        assert_eq!(commit.parent_hashes, vec![root.clone()]);
        assert_eq!(commit.message, "second");
        assert_eq!(commit.timestamp_millis, 2_000);
        assert!(!commit.is_merge());
        assert!(graph.get(&root)?.is_root());
        Ok(())
    }

    #[test]
    fn test_commit_identity_covers_every_field() -> Result<()> {
        let fixture = Fixture::new()?;
        let graph = fixture.graph();
        let snap_a = fixture.snapshot("a")?;
        let snap_b = fixture.snapshot("b")?;
        let root = graph.commit_at(&snap_a, &[], "root", 1)?;

        let base = graph.commit_at(&snap_a, &[root.clone()], "msg", 10)?;
        let variants = [
            graph.commit_at(&snap_b, &[root.clone()], "msg", 10)?,
            graph.commit_at(&snap_a, &[], "msg", 10)?,
            graph.commit_at(&snap_a, &[root.clone()], "other", 10)?,
            graph.commit_at(&snap_a, &[root.clone()], "msg", 11)?,
        ];
        for variant in &variants {
            assert_ne!(&base, variant);
        }

        // Same fields, same hash
        assert_eq!(base, graph.commit_at(&snap_a, &[root], "msg", 10)?);
        Ok(())
    }

    #[test]
    fn test_commit_rejects_missing_snapshot_or_parent() -> Result<()> {
        let fixture = Fixture::new()?;
        let graph = fixture.graph();
        let snap = fixture.snapshot("a")?;

        assert!(matches!(
            graph.commit("missing", &[], "msg"),
            Err(Error::NotFound {
                kind: ObjectKind::Snapshot,
                ..
            })
        ));
        assert!(matches!(
            graph.commit(&snap, &["missing".to_string()], "msg"),
            Err(Error::NotFound {
                kind: ObjectKind::Commit,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn test_ancestors_visits_reconverging_merge_once() -> Result<()> {
        let fixture = Fixture::new()?;
        let graph = fixture.graph();
        let snap = fixture.snapshot("x")?;

        //      root
        //     /    \
        //  left    right
        //     \    /
        //     merge
        let root = graph.commit_at(&snap, &[], "root", 1)?;
        let left = graph.commit_at(&snap, &[root.clone()], "left", 2)?;
        let right = graph.commit_at(&snap, &[root.clone()], "right", 3)?;
        let merge = graph.commit_at(&snap, &[left.clone(), right.clone()], "merge", 4)?;

        let ancestors = graph.ancestors(&merge, DEFAULT_HISTORY_DEPTH)?;
        let hashes: Vec<_> = ancestors.iter().map(|c| c.hash.clone()).collect();
        assert_eq!(hashes, vec![merge, left, root, right]);
        assert!(ancestors[0].is_merge());
        Ok(())
    }

    #[test]
    fn test_ancestors_respects_depth_bound() -> Result<()> {
        let fixture = Fixture::new()?;
        let graph = fixture.graph();
        let snap = fixture.snapshot("x")?;

        let mut head = graph.commit_at(&snap, &[], "c0", 0)?;
        for i in 1..30 {
            head = graph.commit_at(&snap, &[head], &format!("c{}", i), i)?;
        }

        assert_eq!(graph.ancestors(&head, 5)?.len(), 6);
        assert_eq!(graph.ancestors(&head, DEFAULT_HISTORY_DEPTH)?.len(), 21);
        assert_eq!(graph.ancestors(&head, 100)?.len(), 30);
        Ok(())
    }

    #[test]
    fn test_ancestors_follows_shortest_path_into_bound() -> Result<()> {
        let fixture = Fixture::new()?;
        let graph = fixture.graph();
        let snap = fixture.snapshot("x")?;

        // p3 <- p2 <- p1 <- r, and r is both the end of a long first-parent
        // chain and the direct second parent of the merge
        let p3 = graph.commit_at(&snap, &[], "p3", 0)?;
        let p2 = graph.commit_at(&snap, &[p3.clone()], "p2", 1)?;
        let p1 = graph.commit_at(&snap, &[p2.clone()], "p1", 2)?;
        let r = graph.commit_at(&snap, &[p1.clone()], "r", 3)?;
        let mut chain = r.clone();
        for i in 0..19 {
            chain = graph.commit_at(&snap, &[chain], &format!("chain {}", i), 10 + i)?;
        }
        let merge = graph.commit_at(&snap, &[chain, r.clone()], "merge", 100)?;

        let ancestors = graph.ancestors(&merge, DEFAULT_HISTORY_DEPTH)?;
        let hashes: HashSet<_> = ancestors.iter().map(|c| c.hash.clone()).collect();
        assert_eq!(hashes.len(), ancestors.len());
        assert!(hashes.contains(&r));
        assert!(hashes.contains(&p1));
        assert!(hashes.contains(&p2));
        assert!(hashes.contains(&p3));
        assert_eq!(ancestors.len(), 24);
        assert_eq!(ancestors[0].hash, merge);
        Ok(())
    }

    #[test]
    fn test_ancestors_of_unknown_commit_fails() -> Result<()> {
        let fixture = Fixture::new()?;
        assert!(fixture.graph().ancestors("nope", 10).is_err());
        Ok(())
    }

    #[test]
    fn test_is_ancestor() -> Result<()> {
        let fixture = Fixture::new()?;
        let graph = fixture.graph();
        let snap = fixture.snapshot("x")?;

        let root = graph.commit_at(&snap, &[], "root", 1)?;
        let side = graph.commit_at(&snap, &[], "side", 2)?;
        let child = graph.commit_at(&snap, &[root.clone()], "child", 3)?;
        let merge = graph.commit_at(&snap, &[child.clone(), side.clone()], "merge", 4)?;

        assert!(graph.is_ancestor(&root, &merge)?);
        assert!(graph.is_ancestor(&side, &merge)?);
        assert!(graph.is_ancestor(&merge, &merge)?);
        assert!(!graph.is_ancestor(&merge, &root)?);
        assert!(!graph.is_ancestor(&side, &child)?);
        Ok(())
    }
}
