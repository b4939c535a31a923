//! Domain types shared by the store clients, the retrieval pipeline and ingestion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// Upper bound on `Passage::text`, counted in characters.
pub const MAX_PASSAGE_CHARS: usize = 500;
/// Length of the snippet carried by a `Citation`.
pub const CITATION_SNIPPET_CHARS: usize = 100;

/// Health of the shared vector-store connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Ready,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How a logical instance name becomes a concrete collection name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamingStrategy {
    Verbatim,
    /// `"<name>_<suffix>"`
    Suffix(String),
    /// `"<prefix>_<name>"`
    Prefix(String),
}

impl NamingStrategy {
    pub fn apply(&self, logical: &str) -> String {
        match self {
            Self::Verbatim => logical.to_string(),
            Self::Suffix(s) => format!("{logical}_{s}"),
            Self::Prefix(p) => format!("{p}_{logical}"),
        }
    }
}

impl Default for NamingStrategy {
    fn default() -> Self {
        Self::Suffix("vedas_knowledge_base".to_string())
    }
}

/// Merge order applied before deduplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankOrder {
    /// Stable sort by descending score, ties keep arrival order.
    #[default]
    Score,
    /// Keep the order in which collections returned their hits.
    Arrival,
}

/// Whether per-collection searches run concurrently or one after another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanoutMode {
    #[default]
    Concurrent,
    Sequential,
}

/// A configured collection after applying the naming strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRef {
    pub logical_name: String,
    pub resolved_name: String,
    pub exists: bool,
}

/// One point returned by a store search, before provenance is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub text: Option<String>,
    pub metadata: Option<Meta>,
}

/// A search hit tagged with the collection it came from.
///
/// `metadata` is always populated: the fan-out synthesizes a `source` entry
/// when the store returned none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    pub collection: String,
    pub id: String,
    pub score: f32,
    pub text: String,
    pub metadata: Meta,
}

/// A retrieved unit of context handed to the composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub metadata: Meta,
    pub source_collection: String,
    pub source_id: String,
    pub score: f32,
}

impl Passage {
    /// Builds a passage from a hit, truncating its text. Returns `None` for
    /// hits without text.
    pub fn from_hit(hit: RawHit) -> Option<Self> {
        if hit.text.is_empty() {
            return None;
        }
        Some(Self {
            text: truncate_chars(&hit.text, MAX_PASSAGE_CHARS).to_string(),
            metadata: hit.metadata,
            source_collection: hit.collection,
            source_id: hit.id,
            score: hit.score,
        })
    }

    pub fn source(&self) -> &str {
        self.metadata.get("source").map(String::as_str).unwrap_or("unknown")
    }
}

/// Deduplicated, bounded list of passages for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    passages: Vec<Passage>,
}

impl AggregatedResult {
    pub fn new(passages: Vec<Passage>) -> Self {
        Self { passages }
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Passage> {
        self.passages.iter()
    }

    pub fn into_passages(self) -> Vec<Passage> {
        self.passages
    }
}

/// Provenance record shown next to a generated answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub snippet: String,
}

impl From<&Passage> for Citation {
    fn from(p: &Passage) -> Self {
        Self {
            source: p.source().to_string(),
            snippet: truncate_chars(&p.text, CITATION_SNIPPET_CHARS).to_string(),
        }
    }
}

/// A chunk of a source document written to a collection during ingestion.
///
/// - `id`: `<file stem>:<chunk index>`
/// - `source`: path of the source document
/// - `content`: the text payload of the chunk
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub source: String,
    pub content: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// Returns the prefix of `s` holding at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
