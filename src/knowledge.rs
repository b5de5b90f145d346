//! Static knowledge base
//!
//! The whole file is read once at startup and embedded verbatim in every prompt.

use std::fmt;
use std::io;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

/// Text used when the knowledge base file does not exist.
pub const MISSING_KNOWLEDGE_BASE: &str = "No specific boiler information is available.";

/// Immutable knowledge base text, cheap to clone.
#[derive(Clone, PartialEq, Eq)]
pub struct KnowledgeBase(Arc<str>);

impl KnowledgeBase {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// Load from disk.
    ///
    /// A missing file is not an error: the bot keeps running with
    /// [`MISSING_KNOWLEDGE_BASE`] as its context. Any other I/O failure
    /// (permissions, invalid UTF-8) is returned.
    pub fn load(path: &Path) -> io::Result<Self> {
        info!("Loading knowledge base from: {}", path.display());
        match std::fs::read_to_string(path) {
            Ok(text) => {
                info!("Knowledge base loaded ({} bytes)", text.len());
                Ok(Self::new(text))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                error!(
                    "'{}' not found. Bot will lack specific context.",
                    path.display()
                );
                Ok(Self::new(MISSING_KNOWLEDGE_BASE))
            }
            Err(e) => Err(e),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for KnowledgeBase {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KnowledgeBase")
            .field(&format_args!("{} bytes", self.0.len()))
            .finish()
    }
}
