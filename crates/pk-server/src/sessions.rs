//! Registry of live transcode sessions.
//!
//! Each transcode response body is wrapped by [`TranscodeRegistry::track`],
//! which registers the session and holds a guard inside the stream. The
//! entry disappears when the stream finishes or is dropped (client gone).

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::{Stream, StreamExt};
use serde::Serialize;
use uuid::Uuid;

/// Snapshot of one running transcode.
#[derive(Debug, Clone, Serialize)]
pub struct TranscodeSessionInfo {
    pub id: Uuid,
    /// Relative path of the source file.
    pub path: String,
    pub quality: String,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
}

/// Thread-safe set of active transcode sessions.
#[derive(Debug, Clone, Default)]
pub struct TranscodeRegistry {
    sessions: Arc<DashMap<Uuid, TranscodeSessionInfo>>,
}

impl TranscodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session; it stays listed until the guard is dropped.
    pub fn register(&self, path: String, quality: String, pid: Option<u32>) -> SessionGuard {
        let info = TranscodeSessionInfo {
            id: Uuid::new_v4(),
            path,
            quality,
            pid,
            started_at: Utc::now(),
        };
        let id = info.id;
        tracing::info!(
            session_id = %id,
            path = %info.path,
            quality = %info.quality,
            "Registered transcode session"
        );
        self.sessions.insert(id, info);
        SessionGuard {
            sessions: self.sessions.clone(),
            id,
        }
    }

    /// Tie a session's lifetime to `stream`.
    pub fn track<S>(
        &self,
        path: String,
        quality: String,
        pid: Option<u32>,
        stream: S,
    ) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    {
        let guard = self.register(path, quality, pid);
        async_stream::stream! {
            let _guard = guard;
            let mut stream = std::pin::pin!(stream);
            while let Some(item) = stream.next().await {
                yield item;
            }
        }
    }

    /// Active sessions, oldest first.
    pub fn list(&self) -> Vec<TranscodeSessionInfo> {
        let mut sessions: Vec<_> = self.sessions.iter().map(|e| e.value().clone()).collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Removes its session from the registry on drop.
#[derive(Debug)]
pub struct SessionGuard {
    sessions: Arc<DashMap<Uuid, TranscodeSessionInfo>>,
    id: Uuid,
}

impl SessionGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some((_, info)) = self.sessions.remove(&self.id) {
            tracing::info!(
                session_id = %self.id,
                path = %info.path,
                duration_secs = (Utc::now() - info.started_at).num_seconds(),
                "Ended transcode session"
            );
        }
    }
}
