use futures::{StreamExt, TryStreamExt, stream};
use tracing::debug;

use crate::{
    error::{Result, Stage, SynopsisError},
    generate::TextGenerator,
    prompts::MAP_PROMPT,
    splitter::Chunks,
    types::{Chunk, PartialSummary},
};

/// Summarize one chunk. The ordinal of the result is the chunk's position in its split.
pub async fn map_chunk(generator: &dyn TextGenerator, chunk: &Chunk) -> Result<PartialSummary> {
    let prompt = MAP_PROMPT.render(&[("text", chunk.content())])?;
    let text = generator
        .generate(&prompt)
        .await
        .map_err(|e| SynopsisError::GenerationFailed {
            stage: Stage::Map,
            ordinal: chunk.ordinal,
            reason: e.to_string(),
        })?;
    debug!(ordinal = chunk.ordinal, chars = text.chars().count(), "Chunk summarized");
    Ok(PartialSummary::new(chunk.ordinal, text.trim()))
}

/// Summarize every chunk with at most `concurrency` calls in flight.
///
/// The first failure drops the remaining calls. Results come back in chunk order whatever
/// order the calls complete in.
pub async fn map_chunks(
    generator: &dyn TextGenerator,
    chunks: &Chunks,
    concurrency: usize,
) -> Result<Vec<PartialSummary>> {
    let mut summaries: Vec<PartialSummary> = stream::iter(chunks.iter())
        .map(|chunk| async move { map_chunk(generator, &chunk).await })
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await?;
    summaries.sort_by_key(|summary| summary.ordinal);
    Ok(summaries)
}
