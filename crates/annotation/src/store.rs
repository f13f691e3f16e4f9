use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use segmentation::PointSegmenter;
use tokio::sync::Mutex;
use tracing::debug;

use crate::session::AnnotationEngine;

/// Client-supplied session identity. Clients that never send one all share
/// the well-known default session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub const DEFAULT: &'static str = "default";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn default_session() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type SegmenterFactory = Box<dyn Fn() -> Box<dyn PointSegmenter> + Send + Sync>;

/// Owns every live annotation session.
///
/// Each session id maps to one [`AnnotationEngine`] behind its own async
/// mutex: exactly one mutating operation (reset, add_point, undo) runs per
/// session at a time, while distinct sessions proceed independently.
/// Engines are created lazily from the segmenter factory on first use.
pub struct SessionStore {
    factory: SegmenterFactory,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<AnnotationEngine>>>>,
}

impl SessionStore {
    pub fn new(factory: impl Fn() -> Box<dyn PointSegmenter> + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Look up the engine for `id`, creating it on first use.
    pub fn get_or_create(&self, id: &SessionId) -> Arc<Mutex<AnnotationEngine>> {
        if let Some(engine) = self.sessions.read().unwrap().get(id) {
            return Arc::clone(engine);
        }

        let mut sessions = self.sessions.write().unwrap();
        Arc::clone(sessions.entry(id.clone()).or_insert_with(|| {
            debug!(session = %id, "created session");
            Arc::new(Mutex::new(AnnotationEngine::new((self.factory)())))
        }))
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
