mod chunking;
mod embedding;
mod tokenize;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;

pub use chunking::chunk_document;
pub use embedding::{EmbeddingModel, HashEmbeddingModel};
pub use tokenize::tokenize;

pub const CHUNK_SIZE: usize = 1200;
pub const CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOP_K: usize = 5;

const KEYWORD_WEIGHT: f32 = 0.65;
const VECTOR_WEIGHT: f32 = 0.35;

/// Looks up reference passages for a query, most relevant first.
pub trait ReferenceRetriever: Send + Sync {
    fn search(&self, query: &str, k: usize) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct ReferenceDoc {
    pub title: String,
    pub source_path: String,
    pub body: String,
}

#[derive(Debug, Clone)]
struct IndexedChunk {
    title: String,
    source_path: String,
    text: String,
    keywords: HashSet<String>,
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredPassage {
    pub title: String,
    pub source_path: String,
    pub score: f32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub docs_loaded: usize,
    pub chunks_loaded: usize,
    pub vector_enabled: bool,
}

/// In-memory passage index over a directory of reference documents.
#[derive(Clone)]
pub struct ReferenceIndex {
    docs: Vec<ReferenceDoc>,
    chunks: Vec<IndexedChunk>,
    embedder: Option<Arc<dyn EmbeddingModel>>,
}

impl ReferenceIndex {
    pub fn from_dir(
        path: impl AsRef<Path>,
        embedder: Option<Arc<dyn EmbeddingModel>>,
    ) -> Result<Self> {
        let root = path.as_ref();
        if !root.is_dir() {
            bail!("reference root is not a directory: {}", root.display());
        }

        let docs = load_docs(root)?;
        Ok(Self::from_docs(docs, embedder))
    }

    pub fn from_docs(docs: Vec<ReferenceDoc>, embedder: Option<Arc<dyn EmbeddingModel>>) -> Self {
        let mut chunks = Vec::new();

        for doc in &docs {
            for chunk in chunk_document(&doc.body, CHUNK_SIZE, CHUNK_OVERLAP) {
                let keywords = tokenize(&chunk).into_iter().collect::<HashSet<_>>();
                let embedding = embedder.as_ref().map(|model| model.embed(&chunk));

                chunks.push(IndexedChunk {
                    title: doc.title.clone(),
                    source_path: doc.source_path.clone(),
                    text: chunk,
                    keywords,
                    embedding,
                });
            }
        }

        Self {
            docs,
            chunks,
            embedder,
        }
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            docs_loaded: self.docs.len(),
            chunks_loaded: self.chunks.len(),
            vector_enabled: self.embedder.is_some(),
        }
    }

    pub fn search_scored(&self, query: &str, top_k: usize) -> Vec<ScoredPassage> {
        let query_tokens = tokenize(query).into_iter().collect::<HashSet<_>>();
        let query_embedding = self.embedder.as_ref().map(|model| model.embed(query));

        let mut scored = self
            .chunks
            .iter()
            .map(|chunk| {
                let keyword_score = keyword_score(&query_tokens, &chunk.keywords);
                let score = match (&query_embedding, &chunk.embedding) {
                    (Some(q), Some(c)) => {
                        let vector_score = embedding::cosine_similarity(q, c).max(0.0);
                        (KEYWORD_WEIGHT * keyword_score) + (VECTOR_WEIGHT * vector_score)
                    }
                    _ => keyword_score,
                };

                (score, chunk)
            })
            .filter(|(score, _)| *score > 0.0)
            .collect::<Vec<_>>();

        // Stable sort keeps load order for equal scores.
        scored.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .map(|(score, chunk)| ScoredPassage {
                title: chunk.title.clone(),
                source_path: chunk.source_path.clone(),
                score,
                text: chunk.text.clone(),
            })
            .collect()
    }
}

impl ReferenceRetriever for ReferenceIndex {
    fn search(&self, query: &str, k: usize) -> Result<Vec<String>> {
        Ok(self
            .search_scored(query, k)
            .into_iter()
            .map(|passage| passage.text)
            .collect())
    }
}

pub fn join_passages(passages: &[String]) -> String {
    passages.join("\n\n")
}

fn load_docs(root: &Path) -> Result<Vec<ReferenceDoc>> {
    let heading_regex = Regex::new(r"(?m)^#\s+(.+)$")?;

    let mut docs = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            matches!(
                entry.path().extension().and_then(|ext| ext.to_str()),
                Some("md") | Some("txt") | Some("json")
            )
        })
    {
        let path = entry.path();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading reference document: {}", path.display()))?;

        let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
        let body = if is_json {
            serde_json::from_str::<serde_json::Value>(&raw)
                .map(|value| json_to_search_text(&value))
                .unwrap_or(raw)
        } else {
            raw
        };

        if body.trim().is_empty() {
            continue;
        }

        let rel_path = path
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| path.to_string_lossy().to_string());

        let title = heading_regex
            .captures(&body)
            .and_then(|captures| {
                captures
                    .get(1)
                    .map(|value| value.as_str().trim().to_string())
            })
            .unwrap_or_else(|| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or("untitled")
                    .replace(['-', '_'], " ")
            });

        docs.push(ReferenceDoc {
            title,
            source_path: rel_path,
            body,
        });
    }

    Ok(docs)
}

// Objects become one paragraph per entry so a controls catalogue chunks per control.
fn json_to_search_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(v) => v.to_string(),
        serde_json::Value::Number(v) => v.to_string(),
        serde_json::Value::String(v) => v.clone(),
        serde_json::Value::Array(values) => values
            .iter()
            .map(json_to_search_text)
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{} {}", k, json_to_search_text(v)))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn keyword_score(query_tokens: &HashSet<String>, doc_tokens: &HashSet<String>) -> f32 {
    if query_tokens.is_empty() || doc_tokens.is_empty() {
        return 0.0;
    }

    let overlap = query_tokens
        .iter()
        .filter(|token| doc_tokens.contains(*token))
        .count() as f32;

    overlap / query_tokens.len() as f32
}
