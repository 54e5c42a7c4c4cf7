//! Hybrid retriever over the document store

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::storage::DocumentDb;
use crate::types::RetrievedChunk;

/// Merge semantic and keyword hits by row id.
///
/// `final_score = w * semantic + (1 - w) * keyword`, where a row found by only
/// one side contributes only that side's weighted term. The reported `score`
/// stays the semantic score when the row has one. Output is sorted by
/// `final_score` descending; ties keep semantic-first insertion order.
pub fn hybrid_rerank(
    semantic: Vec<RetrievedChunk>,
    keyword: Vec<RetrievedChunk>,
    semantic_weight: f32,
) -> Vec<RetrievedChunk> {
    let mut merged: Vec<RetrievedChunk> = Vec::with_capacity(semantic.len() + keyword.len());
    let mut positions: HashMap<i64, usize> = HashMap::new();

    for mut hit in semantic {
        if positions.contains_key(&hit.id) {
            continue;
        }
        hit.final_score = hit.score * semantic_weight;
        positions.insert(hit.id, merged.len());
        merged.push(hit);
    }

    for mut hit in keyword {
        let weighted = hit.score * (1.0 - semantic_weight);
        match positions.get(&hit.id) {
            Some(&index) => merged[index].final_score += weighted,
            None => {
                hit.final_score = weighted;
                positions.insert(hit.id, merged.len());
                merged.push(hit);
            }
        }
    }

    merged.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
    merged
}

/// Combines embedding similarity with full-text relevance
pub struct HybridRetriever {
    db: DocumentDb,
    embedder: Arc<dyn EmbeddingProvider>,
    semantic_weight: f32,
    candidate_multiplier: usize,
}

impl HybridRetriever {
    /// Create a new retriever
    pub fn new(db: DocumentDb, embedder: Arc<dyn EmbeddingProvider>, config: &RetrievalConfig) -> Self {
        Self {
            db,
            embedder,
            semantic_weight: config.semantic_weight.clamp(0.0, 1.0),
            candidate_multiplier: config.candidate_multiplier.max(1),
        }
    }

    /// Top `top_k` chunks for `query`; embedding and database failures propagate
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed_query(query).await?;
        let candidates = top_k.saturating_mul(self.candidate_multiplier);

        let db = self.db.clone();
        let text = query.to_string();
        let (semantic, keyword) = tokio::task::spawn_blocking(move || {
            let semantic = db.semantic_search(&embedding, candidates)?;
            let keyword = db.keyword_search(&text, candidates)?;
            Ok::<_, Error>((semantic, keyword))
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        tracing::debug!(
            semantic = semantic.len(),
            keyword = keyword.len(),
            "Retrieved candidates"
        );

        let mut results = hybrid_rerank(semantic, keyword, self.semantic_weight);
        results.truncate(top_k);
        Ok(results)
    }
}
