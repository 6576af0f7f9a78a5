//! Per-job scratch directories
//!
//! Every job writes into its own directory under `TEMP_FILES_DIR`. The
//! registry remembers them so finished artifacts can be served by file name
//! later, and deletes them once they are older than the retention window.
//! Failed and cancelled jobs discard their directory right away.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::core::error::AppResult;
use crate::core::validation::validate_file_name;

/// What a session directory holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Screenshots,
    Audio,
    Video,
}

impl SessionKind {
    pub fn dir_prefix(&self) -> &'static str {
        match self {
            SessionKind::Screenshots => "ytshots_",
            SessionKind::Audio => "ytaudio_",
            SessionKind::Video => "ytvideo_",
        }
    }
}

/// A live session directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub kind: SessionKind,
    pub dir: PathBuf,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    dir: PathBuf,
    created: Instant,
    finished_at: Option<Instant>,
}

/// Registry of session directories, cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    root: PathBuf,
    sessions: Arc<DashMap<Uuid, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates `<root>/<prefix><random>` and registers it as running.
    pub fn create(&self, kind: SessionKind) -> AppResult<Session> {
        std::fs::create_dir_all(&self.root)?;
        let dir = tempfile::Builder::new()
            .prefix(kind.dir_prefix())
            .tempdir_in(&self.root)?
            .keep();
        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            SessionEntry {
                dir: dir.clone(),
                created: Instant::now(),
                finished_at: None,
            },
        );
        log::debug!("Session {} created at {}", id, dir.display());
        Ok(Session { id, kind, dir })
    }

    /// Marks the session complete; its retention window starts now.
    pub fn finish(&self, id: Uuid) {
        if let Some(mut entry) = self.sessions.get_mut(&id) {
            entry.finished_at = Some(Instant::now());
        }
    }

    /// Unregisters the session and deletes its directory.
    pub fn discard(&self, id: Uuid) {
        if let Some((_, entry)) = self.sessions.remove(&id) {
            if let Err(e) = std::fs::remove_dir_all(&entry.dir) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Failed to remove session dir {}: {}", entry.dir.display(), e);
                }
            }
            log::debug!("Session {} discarded", id);
        }
    }

    pub fn dir(&self, id: Uuid) -> Option<PathBuf> {
        self.sessions.get(&id).map(|e| e.dir.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Looks a bare file name up in the live sessions, newest first.
    ///
    /// Names with path separators or parent references never match.
    pub fn find_file(&self, name: &str) -> Option<PathBuf> {
        let name = validate_file_name(name).ok()?;
        let mut dirs: Vec<(Instant, PathBuf)> = self
            .sessions
            .iter()
            .map(|e| (e.created, e.dir.clone()))
            .collect();
        dirs.sort_by(|a, b| b.0.cmp(&a.0));
        dirs.into_iter().map(|(_, dir)| dir.join(name)).find(|p| p.is_file())
    }

    /// Deletes sessions finished more than `ttl` ago. Running sessions are kept.
    pub fn sweep(&self, ttl: Duration) -> usize {
        let expired: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|e| e.finished_at.is_some_and(|t| t.elapsed() >= ttl))
            .map(|e| *e.key())
            .collect();
        for id in &expired {
            self.discard(*id);
        }
        expired.len()
    }

    /// Deletes every registered session.
    pub fn discard_all(&self) {
        let ids: Vec<Uuid> = self.sessions.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.discard(id);
        }
    }

    /// Runs [`Self::sweep`] every `every` on the current runtime.
    pub fn spawn_sweeper(&self, ttl: Duration, every: Duration) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        log::info!(
            "Session sweeper started (ttl {}s, runs every {}s)",
            ttl.as_secs(),
            every.as_secs()
        );
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let count = registry.sweep(ttl);
                if count > 0 {
                    log::info!("Session sweep: removed {} expired session(s)", count);
                }
            }
        })
    }
}
