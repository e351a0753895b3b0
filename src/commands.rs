use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::embeddings::GeminiClient;
use crate::store::{BuildInput, SessionStore, Source};

fn open_store(config: &Config) -> Result<SessionStore> {
    let client = GeminiClient::new(config)?;
    Ok(SessionStore::new(
        config.sessions_dir(),
        config.chunking.clone(),
        Arc::new(client),
    ))
}

/// Create a new analysis session directory and print its id.
///
/// Stands in for the upload layer, which normally creates the session when
/// files arrive.
#[inline]
pub async fn init_session(config: &Config) -> Result<String> {
    let session_id = Uuid::new_v4().to_string();
    let session_dir = config.sessions_dir().join(&session_id);

    tokio::fs::create_dir_all(&session_dir)
        .await
        .with_context(|| format!("Failed to create session directory: {}", session_dir.display()))?;

    info!("Created session {}", session_id);
    println!("Created session {}", style(&session_id).green());
    println!("Session directory: {}", session_dir.display());

    Ok(session_id)
}

/// Build (or rebuild) the vector snapshot for a session from the three
/// uploaded documents
#[inline]
pub async fn build_session(
    config: &Config,
    session_id: &str,
    requirements: PathBuf,
    defects: PathBuf,
    testcases: PathBuf,
) -> Result<()> {
    let store = open_store(config)?;
    let input = BuildInput {
        requirements_path: requirements,
        defects_path: defects,
        testcases_path: testcases,
    };

    let count = store.build(session_id, &input).await?;

    println!(
        "{} Indexed {} records for session {}",
        style("✓").green(),
        style(count).bold(),
        session_id
    );

    Ok(())
}

/// Run a similarity query against a session's snapshot and print the
/// ranked results
#[inline]
pub async fn search_session(
    config: &Config,
    session_id: &str,
    query: &str,
    sources: &[Source],
    top_k: usize,
) -> Result<()> {
    let store = open_store(config)?;
    let hits = store.search(session_id, query, sources, top_k).await?;

    if hits.is_empty() {
        println!("No matching records.");
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{:>3}. {} [{}] {}",
            rank + 1,
            style(format!("{:.4}", hit.score)).cyan(),
            hit.record.source,
            style(&hit.record.id).bold()
        );
        println!("     {}", preview(&hit.record.text, 160));
    }

    Ok(())
}

/// First `max_chars` characters of a chunk, with an ellipsis when truncated
fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_keeps_short_text() {
        assert_eq!(preview("short", 10), "short");
    }

    #[test]
    fn preview_truncates_on_character_boundaries() {
        let text = "é".repeat(20);
        let shortened = preview(&text, 5);
        assert_eq!(shortened.chars().count(), 6);
        assert!(shortened.ends_with('…'));
    }
}
