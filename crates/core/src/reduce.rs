//! Folds partial summaries into one.
//!
//! Each round packs the current summaries, in order, into groups whose joined size fits the
//! input budget, folds every multi-member group with one generation call and carries singleton
//! groups through untouched. Rounds repeat until one summary is left. A round that does not
//! shrink the sequence fails with `ReductionStalled`.

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, info};

use crate::{
    error::{Result, Stage, SynopsisError},
    generate::TextGenerator,
    prompts::COMBINE_PROMPT,
    types::{Document, DocumentMetadata, PartialSummary},
};

/// Joins summaries inside a group.
pub const SUMMARY_SEPARATOR: &str = "\n\n";

/// Ordered run of summaries small enough for one reduce call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineGroup {
    pub members: Vec<PartialSummary>,
    size: usize,
}

impl CombineGroup {
    fn new(first: PartialSummary) -> Self {
        let size = first.text.chars().count();
        Self {
            members: vec![first],
            size,
        }
    }

    /// Characters of the joined member texts.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn joined(&self) -> String {
        self.members
            .iter()
            .map(|member| member.text.as_str())
            .collect::<Vec<_>>()
            .join(SUMMARY_SEPARATOR)
    }
}

/// Pack summaries greedily, in order, into groups whose joined size stays within `budget`.
/// A summary larger than `budget` forms a group of its own.
pub fn partition(summaries: Vec<PartialSummary>, budget: usize) -> Vec<CombineGroup> {
    let separator = SUMMARY_SEPARATOR.chars().count();
    let mut groups: Vec<CombineGroup> = Vec::new();

    for summary in summaries {
        let size = summary.text.chars().count();
        match groups.last_mut() {
            Some(group) if group.size + separator + size <= budget => {
                group.size += separator + size;
                group.members.push(summary);
            }
            _ => groups.push(CombineGroup::new(summary)),
        }
    }
    groups
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReduceOutcome {
    pub document: Document,
    pub rounds: usize,
}

pub struct Reducer<'a> {
    generator: &'a dyn TextGenerator,
    input_budget: usize,
    concurrency: usize,
}

impl<'a> Reducer<'a> {
    pub fn new(generator: &'a dyn TextGenerator, input_budget: usize, concurrency: usize) -> Self {
        Self {
            generator,
            input_budget,
            concurrency: concurrency.max(1),
        }
    }

    /// Reduce ordered summaries to one. The result carries the source document's metadata.
    pub async fn reduce(
        &self,
        summaries: Vec<PartialSummary>,
        source: &DocumentMetadata,
    ) -> Result<ReduceOutcome> {
        if summaries.is_empty() {
            return Err(SynopsisError::invalid_input(format!(
                "document {} produced nothing to reduce",
                source.id
            )));
        }

        let mut current = summaries;
        let mut rounds = 0;
        while current.len() > 1 {
            rounds += 1;
            let count = current.len();
            let groups = partition(current, self.input_budget);
            if groups.len() == count {
                return Err(SynopsisError::ReductionStalled {
                    round: rounds,
                    count,
                });
            }
            info!(round = rounds, summaries = count, groups = groups.len(), "Reduce round");
            current = self.fold_round(groups, &source.title).await?;
        }

        let text = current
            .pop()
            .map(|summary| summary.text)
            .unwrap_or_default();
        Ok(ReduceOutcome {
            document: Document::new(text, source.clone()),
            rounds,
        })
    }

    async fn fold_round(
        &self,
        groups: Vec<CombineGroup>,
        title: &str,
    ) -> Result<Vec<PartialSummary>> {
        stream::iter(groups.into_iter().enumerate())
            .map(|(ordinal, group)| self.fold_group(ordinal, group, title))
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    async fn fold_group(
        &self,
        ordinal: usize,
        mut group: CombineGroup,
        title: &str,
    ) -> Result<PartialSummary> {
        if group.len() == 1 {
            let mut single = group.members.remove(0);
            single.ordinal = ordinal;
            return Ok(single);
        }

        let joined = group.joined();
        let prompt = COMBINE_PROMPT.render(&[("title", title), ("text", &joined)])?;
        let text = self.generator.generate(&prompt).await.map_err(|e| {
            SynopsisError::GenerationFailed {
                stage: Stage::Reduce,
                ordinal,
                reason: e.to_string(),
            }
        })?;
        debug!(ordinal, members = group.len(), "Group folded");
        Ok(PartialSummary::new(ordinal, text.trim()))
    }
}
