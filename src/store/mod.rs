// Session vector store: orchestrates extraction, chunking, embedding and
// snapshot persistence on the build side, and brute-force cosine ranking
// on the query side.


use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::embeddings::EmbeddingProvider;
use crate::embeddings::chunking::{ChunkingConfig, chunk_text};
use crate::extractor::{extract_requirements, extract_spreadsheet};
use crate::{AnalyzerError, Result};

const SNAPSHOT_FILE: &str = "vector_db.json";

/// Which uploaded document a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Requirements,
    Defects,
    Testcases,
}

impl Source {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Requirements => "requirements",
            Source::Defects => "defects",
            Source::Testcases => "testcases",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "requirements" => Ok(Source::Requirements),
            "defects" => Ok(Source::Defects),
            "testcases" => Ok(Source::Testcases),
            other => Err(format!(
                "unknown source '{other}' (expected requirements, defects or testcases)"
            )),
        }
    }
}

/// Unit of storage and retrieval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Unique within the session: `{source}_{index}` over the combined
    /// build order
    pub id: String,
    pub source: Source,
    /// The original chunk text, unmodified
    pub text: String,
    /// Unit-length embedding (the all-zero degenerate case is stored as-is)
    pub vector: Vec<f32>,
}

/// Persisted per-session collection, replaced wholesale by each build
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub session_id: String,
    pub created_at: String,
    pub records: Vec<Record>,
}

/// One ranked search result
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub score: f32,
    pub record: Record,
}

/// The three uploaded document paths for a build
#[derive(Debug, Clone)]
pub struct BuildInput {
    pub requirements_path: PathBuf,
    pub defects_path: PathBuf,
    pub testcases_path: PathBuf,
}

/// Per-session vector store over an explicit storage root.
///
/// Each session owns one snapshot file under `<sessions_dir>/<session_id>`.
/// Builds for the same session are serialized by an in-process advisory
/// lock; the snapshot write itself is staged to a temp file and renamed
/// into place so readers never observe a partial snapshot.
pub struct SessionStore {
    sessions_dir: PathBuf,
    chunking: ChunkingConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    build_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionStore {
    #[inline]
    pub fn new(
        sessions_dir: PathBuf,
        chunking: ChunkingConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            sessions_dir,
            chunking,
            embedder,
            build_locks: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    #[inline]
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(session_id)
    }

    /// Build (or rebuild) the session's vector snapshot from the three
    /// uploaded documents. Returns the number of records stored.
    ///
    /// The session directory must already exist; a failed build leaves any
    /// prior snapshot untouched and queryable.
    #[inline]
    pub async fn build(&self, session_id: &str, input: &BuildInput) -> Result<usize> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let session_dir = self.session_dir(session_id);
        if !session_dir.is_dir() {
            return Err(AnalyzerError::UnknownSession(session_id.to_string()));
        }

        info!("Building vector snapshot for session {}", session_id);

        let requirements_text = extract_requirements(&input.requirements_path)?;
        let defects_text = extract_spreadsheet(&input.defects_path)?;
        let testcases_text = extract_spreadsheet(&input.testcases_path)?;

        // Build order fixes record ids: requirements, then defects, then
        // testcases. It has no effect on search.
        let mut tagged: Vec<(Source, String)> = Vec::new();
        for (source, text) in [
            (Source::Requirements, requirements_text),
            (Source::Defects, defects_text),
            (Source::Testcases, testcases_text),
        ] {
            for chunk in chunk_text(&text, &self.chunking) {
                tagged.push((source, chunk));
            }
        }

        if tagged.is_empty() {
            return Err(AnalyzerError::NoExtractableText);
        }

        debug!("Embedding {} chunks in one batch call", tagged.len());

        let texts: Vec<String> = tagged.iter().map(|(_, text)| text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        if vectors.len() != tagged.len() {
            return Err(AnalyzerError::EmbeddingResponseInvalid(format!(
                "requested {} embeddings, got {}",
                tagged.len(),
                vectors.len()
            )));
        }

        let records: Vec<Record> = tagged
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, ((source, text), vector))| Record {
                id: format!("{source}_{index}"),
                source,
                text,
                vector: normalize(vector),
            })
            .collect();

        let record_count = records.len();
        let snapshot = Snapshot {
            session_id: session_id.to_string(),
            created_at: Utc::now().to_rfc3339(),
            records,
        };

        self.write_snapshot(&session_dir, &snapshot).await?;

        info!(
            "Stored {} records for session {}",
            record_count, session_id
        );
        Ok(record_count)
    }

    /// Rank the session's records against a query by cosine similarity.
    ///
    /// An empty `allowed_sources` slice means no source filter. Results are
    /// sorted descending by score; ties keep insertion order (stable sort).
    #[inline]
    pub async fn search(
        &self,
        session_id: &str,
        query: &str,
        allowed_sources: &[Source],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let snapshot = self.load_snapshot(session_id).await?;

        let query_texts = [query.to_string()];
        let mut vectors = self.embedder.embed(&query_texts).await?;
        if vectors.len() != 1 {
            return Err(AnalyzerError::EmbeddingResponseInvalid(format!(
                "requested 1 query embedding, got {}",
                vectors.len()
            )));
        }
        let query_vector = normalize(vectors.remove(0));

        let mut hits: Vec<SearchHit> = snapshot
            .records
            .into_iter()
            .filter(|record| {
                allowed_sources.is_empty() || allowed_sources.contains(&record.source)
            })
            .map(|record| SearchHit {
                score: dot(&query_vector, &record.vector),
                record,
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);

        debug!(
            "Search in session {} returned {} hits (top_k {})",
            session_id,
            hits.len(),
            top_k
        );
        Ok(hits)
    }

    /// Load the persisted snapshot for a session
    pub async fn load_snapshot(&self, session_id: &str) -> Result<Snapshot> {
        let session_dir = self.session_dir(session_id);
        if !session_dir.is_dir() {
            return Err(AnalyzerError::UnknownSession(session_id.to_string()));
        }

        let path = session_dir.join(SNAPSHOT_FILE);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AnalyzerError::SnapshotMissing(session_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&raw).map_err(|e| {
            AnalyzerError::Other(anyhow::anyhow!(
                "corrupt snapshot for session {session_id}: {e}"
            ))
        })
    }

    /// Stage the snapshot to a temp file, then atomically rename it over
    /// any previous snapshot
    async fn write_snapshot(&self, session_dir: &Path, snapshot: &Snapshot) -> Result<()> {
        let final_path = session_dir.join(SNAPSHOT_FILE);
        let temp_path = session_dir.join(format!("{SNAPSHOT_FILE}.tmp"));

        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| AnalyzerError::Other(anyhow::anyhow!("failed to encode snapshot: {e}")))?;

        fs::write(&temp_path, &json).await?;
        fs::rename(&temp_path, &final_path).await?;

        debug!("Wrote snapshot to {}", final_path.display());
        Ok(())
    }

    fn session_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.build_locks.lock().expect("build lock map poisoned");
        locks
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }
}

/// Scale a vector to unit length. The norm is floored at 1 when it is
/// exactly 0, so an all-zero vector passes through unchanged rather than
/// dividing by zero.
#[inline]
pub fn normalize(vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();
    let norm = if norm == 0.0 { 1.0 } else { norm };
    vector
        .into_iter()
        .map(|x| (f64::from(x) / norm) as f32)
        .collect()
}

/// Dot product; equals cosine similarity for unit vectors
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
