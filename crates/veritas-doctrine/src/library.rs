//! Doctrine library — books, codifications, and immutable snapshots.

use crate::invariant::{default_invariants, Invariant};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use veritas_core::{Contradiction, Error, Result};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Draft,
    Active,
    Superseded,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Book {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub chapters: Vec<String>,
    pub status: BookStatus,
}

impl Book {
    pub fn new(id: u32, title: &str, description: &str, chapters: &[&str], status: BookStatus) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            chapters: chapters.iter().map(|c| c.to_string()).collect(),
            status,
        }
    }
}

/// The standard canon.
pub fn standard_books() -> Vec<Book> {
    vec![
        Book::new(
            1,
            "The Book of Meaningful Thought",
            "Core doctrine and neuroethical basis.",
            &["Introduction", "Principles", "Applications"],
            BookStatus::Active,
        ),
        Book::new(
            2,
            "The Book of Gentle De-escalation",
            "Protocols for peaceful conflict reduction.",
            &["De-escalation Logic", "Case Studies"],
            BookStatus::Active,
        ),
        Book::new(
            3,
            "The Book of Emotional Sovereignty",
            "Protection and validation of emotional experiences.",
            &["Emotional Rights", "Sovereignty Principles", "Conflict Resolution"],
            BookStatus::Active,
        ),
        Book::new(
            4,
            "The Book of Judicial Restoration",
            "Restorative justice principles and healing-centered approaches.",
            &["Restoration Theory", "Healing Practices", "Community Integration"],
            BookStatus::Active,
        ),
        Book::new(
            5,
            "The Book of Temporal Wisdom",
            "Time-aware decision making and precedent analysis.",
            &["Temporal Logic", "Historical Context", "Future Impact"],
            BookStatus::Active,
        ),
        Book::new(
            6,
            "The Book of Cultural Frameworks",
            "Culturally situated repair and ritual.",
            &["Ritual Tiers", "Community Soil"],
            BookStatus::Draft,
        ),
    ]
}

struct SnapshotInner {
    version: String,
    books: Vec<Book>,
    invariants: Vec<Arc<dyn Invariant>>,
}

/// Immutable view of doctrine at one version. Enforcement against the same
/// snapshot is deterministic.
#[derive(Clone)]
pub struct DoctrineSnapshot {
    inner: Arc<SnapshotInner>,
}

impl DoctrineSnapshot {
    pub fn new(version: impl Into<String>, books: Vec<Book>, invariants: Vec<Arc<dyn Invariant>>) -> Self {
        Self {
            inner: Arc::new(SnapshotInner {
                version: version.into(),
                books,
                invariants,
            }),
        }
    }

    pub fn version(&self) -> &str {
        &self.inner.version
    }

    pub fn books(&self) -> &[Book] {
        &self.inner.books
    }

    pub fn book(&self, id: u32) -> Option<&Book> {
        self.inner.books.iter().find(|b| b.id == id)
    }

    pub fn is_active(&self, id: u32) -> bool {
        self.book(id).map(|b| b.status == BookStatus::Active).unwrap_or(false)
    }

    /// Invariants in evaluation order.
    pub fn invariants(&self) -> &[Arc<dyn Invariant>] {
        &self.inner.invariants
    }
}

impl std::fmt::Debug for DoctrineSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoctrineSnapshot")
            .field("version", &self.inner.version)
            .field("books", &self.inner.books.len())
            .field("invariants", &self.inner.invariants.len())
            .finish()
    }
}

/// Where the Mirror Clause gets its doctrine from.
#[async_trait::async_trait]
pub trait DoctrineSource: Send + Sync {
    /// Current doctrine. Failing here is structural, not a contradiction.
    async fn snapshot(&self) -> Result<DoctrineSnapshot>;

    /// Fold a reflected contradiction back into doctrine. Returns the codification.
    async fn reflect(&self, contradiction: &Contradiction) -> Result<String>;
}

struct LibraryState {
    books: Vec<Book>,
    codifications: Vec<String>,
    version: String,
}

/// In-process doctrine library.
pub struct DoctrineLibrary {
    state: RwLock<LibraryState>,
    invariants: Vec<Arc<dyn Invariant>>,
}

impl DoctrineLibrary {
    pub fn new(version: impl Into<String>, books: Vec<Book>, invariants: Vec<Arc<dyn Invariant>>) -> Self {
        Self {
            state: RwLock::new(LibraryState {
                books,
                codifications: Vec::new(),
                version: version.into(),
            }),
            invariants,
        }
    }

    /// The standard canon with the built-in invariants.
    pub fn standard() -> Self {
        Self::new("5.4.1", standard_books(), default_invariants())
    }

    pub async fn version(&self) -> String {
        self.state.read().await.version.clone()
    }

    pub async fn codifications(&self) -> Vec<String> {
        self.state.read().await.codifications.clone()
    }
}

#[async_trait::async_trait]
impl DoctrineSource for DoctrineLibrary {
    async fn snapshot(&self) -> Result<DoctrineSnapshot> {
        let state = self.state.read().await;
        Ok(DoctrineSnapshot::new(
            state.version.clone(),
            state.books.clone(),
            self.invariants.clone(),
        ))
    }

    async fn reflect(&self, contradiction: &Contradiction) -> Result<String> {
        let mut state = self.state.write().await;
        let codification = format!(
            "[{}] Resolved: {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            contradiction.summary
        );
        let next = bump_patch(&state.version)?;
        state.codifications.push(codification.clone());
        info!(from = %state.version, to = %next, "doctrine codified");
        state.version = next;
        Ok(codification)
    }
}

fn bump_patch(version: &str) -> Result<String> {
    let malformed = || Error::doctrine_unavailable(format!("malformed doctrine version '{}'", version));
    let (head, patch) = version.rsplit_once('.').ok_or_else(malformed)?;
    let patch: u32 = patch.parse().map_err(|_| malformed())?;
    Ok(format!("{}.{}", head, patch + 1))
}
