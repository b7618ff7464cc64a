//! Best-effort uid to display-name resolution.
//!
//! Resolution goes through the [`NameResolver`] trait so the platform lookup
//! can be swapped for a stub in tests. [`UidNameCache`] remembers every name
//! that was ever learned and only asks the resolver about uids it has never
//! had an answer for.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error};

use crate::uid_stats::UidStatsMap;

/// Default location of the user database consulted by [`PasswdResolver`].
pub const PASSWD_PATH: &str = "/etc/passwd";

/// Failure of a whole resolution batch.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("name lookup unavailable: {0}")]
    Unavailable(String),

    #[error("resolver returned {got} names for {expected} uids")]
    LengthMismatch { expected: usize, got: usize },
}

/// Batch uid to name lookup.
///
/// Returns one entry per requested uid, in request order. An empty string
/// means that uid could not be resolved.
pub trait NameResolver: Send + Sync {
    fn resolve(&self, uids: &[u32]) -> Result<Vec<String>, ResolveError>;
}

/// Resolver that never knows any name. Every uid keeps its numeric name.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResolver;

impl NameResolver for NoopResolver {
    fn resolve(&self, uids: &[u32]) -> Result<Vec<String>, ResolveError> {
        Ok(vec![String::new(); uids.len()])
    }
}

/// Resolves uids against a passwd(5) style user database.
#[derive(Debug, Clone)]
pub struct PasswdResolver {
    path: PathBuf,
}

impl PasswdResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for PasswdResolver {
    fn default() -> Self {
        Self::new(PASSWD_PATH)
    }
}

/// Extracts `uid -> login` pairs from passwd content, skipping comments and
/// lines that do not have a numeric third field.
fn parse_passwd(content: &str) -> HashMap<u32, String> {
    content
        .lines()
        .filter(|l| !l.trim_start().starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split(':');
            let name = fields.next()?;
            let _password = fields.next()?;
            let uid = fields.next()?.parse().ok()?;
            (!name.is_empty()).then(|| (uid, name.to_string()))
        })
        .collect()
}

impl NameResolver for PasswdResolver {
    fn resolve(&self, uids: &[u32]) -> Result<Vec<String>, ResolveError> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            ResolveError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let users = parse_passwd(&content);

        Ok(uids
            .iter()
            .map(|uid| users.get(uid).cloned().unwrap_or_default())
            .collect())
    }
}

/// Outcome of one [`UidNameCache::apply`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NameRefresh {
    pub requested: usize,
    pub resolved: usize,
    pub failed: bool,
}

/// Permanently cached names learned from successful resolutions.
///
/// A uid the resolver answered for, even with an empty name, is not asked
/// about again. Uids from a failed batch stay unanswered and are retried.
#[derive(Debug, Default)]
pub struct UidNameCache {
    names: HashMap<u32, String>,
    answered: HashSet<u32>,
}

impl UidNameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uid: u32) -> Option<&str> {
        self.names.get(&uid).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names every uid in `snapshot`.
    ///
    /// Cached names are applied directly. Uids never answered for are sent
    /// to `resolver` in one batch; non-empty answers are cached and applied,
    /// empty ones keep their numeric fallback for good. If the batch fails,
    /// the same uids are requested again on the next call.
    pub fn apply(&mut self, snapshot: &mut UidStatsMap, resolver: &dyn NameResolver) -> NameRefresh {
        let mut unnamed: Vec<u32> = Vec::new();
        for (uid, entry) in snapshot.iter_mut() {
            match self.names.get(uid) {
                Some(name) => entry.name.clone_from(name),
                None if !self.answered.contains(uid) => unnamed.push(*uid),
                None => {}
            }
        }

        let mut refresh = NameRefresh {
            requested: unnamed.len(),
            ..Default::default()
        };
        if unnamed.is_empty() {
            return refresh;
        }
        unnamed.sort_unstable();

        let names = match resolver.resolve(&unnamed) {
            Ok(names) if names.len() == unnamed.len() => names,
            Ok(names) => {
                let e = ResolveError::LengthMismatch {
                    expected: unnamed.len(),
                    got: names.len(),
                };
                error!("uid name resolution failed: {}", e);
                refresh.failed = true;
                return refresh;
            }
            Err(e) => {
                error!("uid name resolution failed: {}", e);
                refresh.failed = true;
                return refresh;
            }
        };

        for (uid, name) in unnamed.into_iter().zip(names) {
            self.answered.insert(uid);
            if name.is_empty() {
                continue;
            }
            if let Some(entry) = snapshot.get_mut(&uid) {
                entry.name.clone_from(&name);
            }
            self.names.insert(uid, name);
            refresh.resolved += 1;
        }

        debug!(
            "Resolved {}/{} new uid names",
            refresh.resolved, refresh.requested
        );
        refresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uid_stats::UidSnapshot;
    use std::sync::Mutex;

    /// Records every batch it is asked about.
    struct RecordingResolver {
        known: HashMap<u32, String>,
        calls: Mutex<Vec<Vec<u32>>>,
    }

    impl RecordingResolver {
        fn new(known: &[(u32, &str)]) -> Self {
            Self {
                known: known.iter().map(|(u, n)| (*u, n.to_string())).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl NameResolver for RecordingResolver {
        fn resolve(&self, uids: &[u32]) -> Result<Vec<String>, ResolveError> {
            self.calls.lock().unwrap().push(uids.to_vec());
            Ok(uids
                .iter()
                .map(|u| self.known.get(u).cloned().unwrap_or_default())
                .collect())
        }
    }

    struct FailingResolver;

    impl NameResolver for FailingResolver {
        fn resolve(&self, _uids: &[u32]) -> Result<Vec<String>, ResolveError> {
            Err(ResolveError::Unavailable("service down".into()))
        }
    }

    fn snapshot_of(uids: &[u32]) -> UidStatsMap {
        uids.iter()
            .map(|&u| (u, UidSnapshot::new(u, Default::default())))
            .collect()
    }

    #[test]
    fn test_resolves_and_caches() {
        let resolver = RecordingResolver::new(&[(1000, "system"), (10001, "com.example")]);
        let mut cache = UidNameCache::new();

        let mut snap = snapshot_of(&[1000, 10001, 10002]);
        let refresh = cache.apply(&mut snap, &resolver);
        assert_eq!(refresh.requested, 3);
        assert_eq!(refresh.resolved, 2);
        assert_eq!(snap[&1000].name, "system");
        assert_eq!(snap[&10001].name, "com.example");
        assert_eq!(snap[&10002].name, "10002");

        // Second round: every uid was answered for, so nothing is asked.
        let mut snap = snapshot_of(&[1000, 10001, 10002]);
        let refresh = cache.apply(&mut snap, &resolver);
        assert_eq!(refresh.requested, 0);
        assert_eq!(resolver.calls.lock().unwrap().len(), 1);
        assert_eq!(snap[&1000].name, "system");
        assert_eq!(snap[&10002].name, "10002");
    }

    #[test]
    fn test_empty_answer_is_not_requested_again() {
        let resolver = RecordingResolver::new(&[]);
        let mut cache = UidNameCache::new();
        for _ in 0..5 {
            cache.apply(&mut snapshot_of(&[10002]), &resolver);
        }
        assert_eq!(*resolver.calls.lock().unwrap(), vec![vec![10002]]);

        // A uid seen for the first time is still looked up.
        cache.apply(&mut snapshot_of(&[10002, 10003]), &resolver);
        assert_eq!(resolver.calls.lock().unwrap()[1], vec![10003]);
    }

    #[test]
    fn test_no_lookup_when_all_named() {
        let resolver = RecordingResolver::new(&[(1000, "system")]);
        let mut cache = UidNameCache::new();
        cache.apply(&mut snapshot_of(&[1000]), &resolver);
        cache.apply(&mut snapshot_of(&[1000]), &resolver);
        assert_eq!(resolver.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_failure_keeps_numeric_names() {
        let mut cache = UidNameCache::new();
        let mut snap = snapshot_of(&[1000]);
        let refresh = cache.apply(&mut snap, &FailingResolver);
        assert!(refresh.failed);
        assert_eq!(snap[&1000].name, "1000");
        assert!(cache.is_empty());

        // The failed uid is asked about again once the resolver recovers.
        let resolver = RecordingResolver::new(&[(1000, "system")]);
        let mut snap = snapshot_of(&[1000]);
        let refresh = cache.apply(&mut snap, &resolver);
        assert_eq!(refresh.requested, 1);
        assert_eq!(snap[&1000].name, "system");
    }

    #[test]
    fn test_parse_passwd() {
        let content = "\
# comment
root:x:0:0:root:/root:/bin/bash
system:x:1000:1000::/data:/bin/false
broken:x:notanumber:0::/:/bin/false
";
        let users = parse_passwd(content);
        assert_eq!(users.len(), 2);
        assert_eq!(users[&0], "root");
        assert_eq!(users[&1000], "system");
    }

    #[test]
    fn test_passwd_resolver_from_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("passwd");
        std::fs::write(&path, "media:x:1013:1013::/:/bin/false\n").expect("write passwd");

        let resolver = PasswdResolver::new(&path);
        let names = resolver.resolve(&[1013, 4242]).expect("resolve");
        assert_eq!(names, vec!["media".to_string(), String::new()]);

        let missing = PasswdResolver::new(dir.path().join("nope"));
        assert!(missing.resolve(&[1]).is_err());
    }
}
