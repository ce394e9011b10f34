use std::sync::{Arc, PoisonError, RwLock};

/// Consistent view of the query text at one revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    pub revision: u64,
    pub text: Arc<str>,
}

/// Host document the engine reads its query from
pub trait QueryDocument: Send + Sync {
    fn snapshot(&self) -> DocumentSnapshot;
}

/// In-memory document; every `set_text` bumps the revision.
#[derive(Debug)]
pub struct SharedDocument {
    inner: RwLock<DocumentSnapshot>,
}

impl SharedDocument {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self {
            inner: RwLock::new(DocumentSnapshot {
                revision: 0,
                text: text.into(),
            }),
        }
    }

    /// Replace the text, returning the new revision
    pub fn set_text(&self, text: impl Into<Arc<str>>) -> u64 {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.revision += 1;
        guard.text = text.into();
        guard.revision
    }
}

impl QueryDocument for SharedDocument {
    fn snapshot(&self) -> DocumentSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
