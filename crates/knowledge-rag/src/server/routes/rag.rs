//! Upload, query and stats endpoints

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{
    Chunk, QueryRequest, QueryResponse, SourceDocument, StatsResponse, UploadResponse,
};

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Internal(format!("Task join error: {}", e))
}

/// Unsupported types stay a 400; everything else is a processing failure
fn processing_error(e: Error) -> Error {
    match e {
        Error::UnsupportedFileType(_) | Error::Processing(_) => e,
        other => Error::Processing(other.to_string()),
    }
}

/// POST /rag/upload - load, chunk, embed and store uploaded files
pub async fn upload_documents(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut multipart = multipart.map_err(|e| Error::Validation(e.body_text()))?;

    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some("files") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::BadRequest(format!("Failed to read {}: {}", filename, e)))?;

        files.push((filename, data.to_vec()));
    }

    if files.is_empty() {
        return Err(Error::Validation("Field required: files".to_string()));
    }

    tracing::info!(files = files.len(), "Upload received");

    let worker = state.clone();
    let (chunks, filenames) = tokio::task::spawn_blocking(move || -> Result<(Vec<Chunk>, Vec<String>)> {
        let mut chunks = Vec::new();
        let mut filenames = Vec::new();

        for (filename, data) in &files {
            let pages = worker.loader().load(filename, data)?;
            let file_chunks = worker.chunker().chunk_documents(&pages);
            tracing::debug!("{}: {} pages, {} chunks", filename, pages.len(), file_chunks.len());

            chunks.extend(file_chunks);
            filenames.push(filename.clone());
        }

        Ok((chunks, filenames))
    })
    .await
    .map_err(join_error)?
    .map_err(processing_error)?;

    if chunks.is_empty() {
        return Ok((StatusCode::CREATED, Json(UploadResponse::no_content())));
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = state
        .embedder()
        .embed_documents(&texts)
        .await
        .map_err(processing_error)?;

    let db = state.db().clone();
    let stored = tokio::task::spawn_blocking(move || db.insert_documents(&chunks, &embeddings))
        .await
        .map_err(join_error)?
        .map_err(processing_error)?;

    tracing::info!(
        documents_processed = filenames.len(),
        chunks_created = stored,
        "Upload processed"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse::processed(filenames.len(), stored, filenames)),
    ))
}

/// POST /rag/query - answer a question from the stored documents
pub async fn query(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>> {
    let Json(request) = payload.map_err(|e| Error::Validation(e.body_text()))?;

    if request.query.trim().is_empty() {
        tracing::warn!("Empty query received");
        return Err(Error::BadRequest("Query cannot be empty".to_string()));
    }

    let start = Instant::now();
    tracing::info!(query = %request.query, optimize = request.optimize_query, "Query received");

    match answer_query(&state, &request, start).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            tracing::error!(error = %e, query = %request.query, "Query failed");
            Err(e)
        }
    }
}

async fn answer_query(state: &AppState, request: &QueryRequest, start: Instant) -> Result<QueryResponse> {
    let mut final_query = request.query.clone();
    let mut optimized_query = None;

    if request.optimize_query {
        final_query = state.optimizer().optimize(&request.query).await;
        if final_query != request.query {
            optimized_query = Some(final_query.clone());
        }
    }

    let docs = state.retriever().retrieve(&final_query, request.top_k).await?;
    let doc_count = docs.len();

    // Generation sees the user's wording; retrieval used the rewritten query
    let result = state.generator().generate_answer(&request.query, docs).await;

    let snippet_chars = state.config().retrieval.snippet_chars;
    let sources: Vec<SourceDocument> = result
        .sources
        .iter()
        .map(|doc| SourceDocument::from_retrieved(doc, snippet_chars))
        .collect();

    tracing::info!(
        query = %request.query,
        optimized_query = ?optimized_query,
        tokens_used = result.tokens_used,
        doc_count,
        latency_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Query processed"
    );

    Ok(QueryResponse {
        query: request.query.clone(),
        optimized_query,
        answer: result.answer,
        sources,
        tokens_used: result.tokens_used,
    })
}

/// GET /rag/stats - corpus statistics
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let db = state.db().clone();
    let total_documents = tokio::task::spawn_blocking(move || db.count())
        .await
        .map_err(join_error)??;

    Ok(Json(StatsResponse {
        total_documents,
        embedding_model: state.embedder().model().to_string(),
        llm_model: Some(state.llm().model().to_string()),
    }))
}
