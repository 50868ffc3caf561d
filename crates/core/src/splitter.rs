//! Recursive boundary-preferring splitter.
//!
//! Content is first cut into pieces no longer than `max_size - overlap`, trying paragraph breaks,
//! then line breaks, then sentence ends, then spaces, and finally single characters. Separators
//! stay attached to the piece they end, so the pieces tile the content exactly. Pieces are then
//! merged greedily into chunks; each following chunk starts `overlap` characters before the end
//! of the previous one, moved back to the start of the word it falls in when that still leaves
//! room for the next piece. The piece bound keeps that room available, so consecutive chunks
//! always share at least `overlap` characters.
//!
//! All offsets and sizes are in characters.

use std::ops::Range;

use crate::{
    error::{Result, SynopsisError},
    types::{Chunk, Document},
};

/// Separator levels in priority order. Any pattern of a level counts as a cut point.
const SEPARATORS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursiveSplitter {
    max_size: usize,
    overlap: usize,
}

impl RecursiveSplitter {
    pub fn new(max_size: usize, overlap: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(SynopsisError::invalid_config(
                "max_chunk_size",
                "must be greater than zero",
            ));
        }
        if overlap >= max_size {
            return Err(SynopsisError::invalid_config(
                "chunk_overlap",
                format!("overlap {overlap} must be smaller than max size {max_size}"),
            ));
        }
        Ok(Self { max_size, overlap })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Plan the chunks of `document`. Chunk documents are built on iteration.
    pub fn split(&self, document: &Document) -> Chunks {
        let text = document.content();
        let char_starts: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let len = char_starts.len() - 1;

        let spans = if len == 0 {
            Vec::new()
        } else if len <= self.max_size {
            vec![0..len]
        } else {
            let mut boundaries = Vec::new();
            self.cut(text, &char_starts, 0..len, 0, &mut boundaries);
            debug_assert!(boundaries.windows(2).all(|w| w[1] - w[0] <= self.piece_limit()));
            self.merge(text, &char_starts, &boundaries, len)
        };

        Chunks {
            source: document.clone(),
            char_starts,
            spans,
        }
    }

    /// Longest piece that still fits in a chunk together with the overlap before it.
    fn piece_limit(&self) -> usize {
        self.max_size - self.overlap
    }

    /// Push the end offsets of pieces covering `range`, each at most `piece_limit` long.
    fn cut(
        &self,
        text: &str,
        char_starts: &[usize],
        range: Range<usize>,
        level: usize,
        out: &mut Vec<usize>,
    ) {
        if range.len() <= self.piece_limit() {
            out.push(range.end);
            return;
        }
        let Some(patterns) = SEPARATORS.get(level) else {
            out.extend(range.start + 1..=range.end);
            return;
        };

        let base = char_starts[range.start];
        let slice = &text[base..char_starts[range.end]];
        let mut cuts: Vec<usize> = patterns
            .iter()
            .flat_map(|pattern| {
                slice
                    .match_indices(pattern)
                    .map(move |(at, matched)| base + at + matched.len())
            })
            .filter_map(|byte| char_starts.binary_search(&byte).ok())
            .filter(|&cut| cut < range.end)
            .collect();
        cuts.sort_unstable();
        cuts.dedup();

        if cuts.is_empty() {
            self.cut(text, char_starts, range, level + 1, out);
            return;
        }

        let mut start = range.start;
        for end in cuts.into_iter().chain(std::iter::once(range.end)) {
            if end - start <= self.piece_limit() {
                out.push(end);
            } else {
                self.cut(text, char_starts, start..end, level + 1, out);
            }
            start = end;
        }
    }

    fn merge(
        &self,
        text: &str,
        char_starts: &[usize],
        boundaries: &[usize],
        len: usize,
    ) -> Vec<Range<usize>> {
        let mut spans = Vec::new();
        let mut start = 0;

        loop {
            let limit = start + self.max_size;
            if limit >= len {
                spans.push(start..len);
                return spans;
            }
            let fits = boundaries.partition_point(|&b| b <= limit);
            let end = match fits.checked_sub(1).map(|i| boundaries[i]) {
                Some(b) if b > start => b,
                _ => limit,
            };
            spans.push(start..end);

            if self.overlap == 0 {
                start = end;
                continue;
            }

            // The next chunk must still reach past the following boundary.
            let following = boundaries
                .get(boundaries.partition_point(|&b| b <= end))
                .copied()
                .unwrap_or(len);
            let floor = following
                .saturating_sub(self.max_size)
                .max(start + 1);
            let target = end.saturating_sub(self.overlap).max(floor);
            start = (floor..=target)
                .rev()
                .find(|&at| follows_whitespace(text, char_starts, at))
                .unwrap_or(target);
        }
    }
}

fn follows_whitespace(text: &str, char_starts: &[usize], at: usize) -> bool {
    text[..char_starts[at]]
        .chars()
        .next_back()
        .is_some_and(char::is_whitespace)
}

/// Finite, restartable sequence of chunks over one document.
#[derive(Debug, Clone)]
pub struct Chunks {
    source: Document,
    char_starts: Vec<usize>,
    spans: Vec<Range<usize>>,
}

impl Chunks {
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn spans(&self) -> &[Range<usize>] {
        &self.spans
    }

    pub fn source(&self) -> &Document {
        &self.source
    }

    pub fn get(&self, ordinal: usize) -> Option<Chunk> {
        let span = self.spans.get(ordinal)?;
        let text = &self.source.content()[self.char_starts[span.start]..self.char_starts[span.end]];
        Some(Chunk {
            ordinal,
            start_offset: span.start,
            end_offset: span.end,
            document: Document::new(text, self.source.metadata.clone()),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Chunk> + '_ {
        (0..self.spans.len()).filter_map(move |ordinal| self.get(ordinal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentMetadata;

    fn doc(content: &str) -> Document {
        Document::new(
            content,
            DocumentMetadata {
                id: "wwdc2021-10176".to_string(),
                title: "Swift concurrency".to_string(),
                description: String::new(),
                source: "https://example.com".to_string(),
            },
        )
    }

    fn words(count: usize) -> String {
        const VOCAB: [&str; 8] = ["actor", "task", "await", "swift", "queue", "isolation", "data", "race"];
        let mut out = String::new();
        for i in 0..count {
            out.push_str(VOCAB[i % VOCAB.len()]);
            out.push(if i % 11 == 10 { '.' } else { ' ' });
            if i % 11 == 10 {
                out.push(' ');
            }
        }
        out
    }

    fn reassemble(chunks: &Chunks) -> String {
        let mut out = String::new();
        let mut covered = 0;
        for chunk in chunks.iter() {
            let skip = covered - chunk.start_offset;
            out.extend(chunk.content().chars().skip(skip));
            covered = chunk.end_offset;
        }
        out
    }

    #[test]
    fn rejects_overlap_not_below_max_size() {
        assert!(matches!(
            RecursiveSplitter::new(100, 100),
            Err(SynopsisError::InvalidConfiguration { .. })
        ));
        assert!(RecursiveSplitter::new(0, 0).is_err());
    }

    #[test]
    fn empty_content_yields_no_chunks() {
        let splitter = RecursiveSplitter::new(100, 10).unwrap();
        assert!(splitter.split(&doc("")).is_empty());
    }

    #[test]
    fn short_content_is_one_chunk() {
        let splitter = RecursiveSplitter::new(1024, 100).unwrap();
        let document = doc("[0]: Hello world. Second part.");
        let chunks = splitter.split(&document);
        let all: Vec<Chunk> = chunks.iter().collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content(), document.content());
        assert_eq!(all[0].document.metadata, document.metadata);
    }

    #[test]
    fn long_content_respects_size_and_overlap() {
        let content: String = words(600).chars().take(3000).collect();
        assert_eq!(content.chars().count(), 3000);

        let splitter = RecursiveSplitter::new(1000, 100).unwrap();
        let chunks = splitter.split(&doc(&content));
        let all: Vec<Chunk> = chunks.iter().collect();

        assert!(all.len() >= 3);
        for chunk in &all {
            assert!(chunk.content().chars().count() <= 1000);
            assert_eq!(chunk.content().chars().count(), chunk.char_len());
        }
        for pair in all.windows(2) {
            let shared = pair[0].end_offset - pair[1].start_offset;
            assert!(shared >= 90, "overlap {shared} too small");
            assert!(shared <= 111, "overlap {shared} too large");
        }
        assert_eq!(reassemble(&chunks), content);
    }

    #[test]
    fn long_sentence_after_short_one_keeps_overlap() {
        let sentence = format!("{}. ", "lorem ".repeat(158).trim_end());
        assert_eq!(sentence.chars().count(), 949);
        let content: String = format!("{}. {}{}", "a".repeat(500), sentence, words(600))
            .chars()
            .take(3000)
            .collect();

        let splitter = RecursiveSplitter::new(1000, 100).unwrap();
        let chunks = splitter.split(&doc(&content));

        assert!(chunks.len() >= 3);
        for span in chunks.spans() {
            assert!(span.len() <= 1000);
        }
        for pair in chunks.spans().windows(2) {
            let shared = pair[0].end - pair[1].start;
            assert!(shared >= 100, "overlap {shared} below configured 100");
        }
        assert_eq!(reassemble(&chunks), content);
    }

    #[test]
    fn overlap_holds_across_uneven_pieces() {
        let content = format!(
            "{}\n\n{}\n\n{}",
            "short one.",
            "x ".repeat(240).trim_end(),
            "tail ".repeat(30)
        );
        for (max_size, overlap) in [(300, 50), (500, 120), (120, 60)] {
            let chunks = RecursiveSplitter::new(max_size, overlap)
                .unwrap()
                .split(&doc(&content));
            for pair in chunks.spans().windows(2) {
                assert!(pair[0].end - pair[1].start >= overlap, "max={max_size}");
            }
            assert_eq!(reassemble(&chunks), content);
        }
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let first = "a".repeat(40);
        let second = "b".repeat(40);
        let content = format!("{first}\n\n{second}");
        let splitter = RecursiveSplitter::new(50, 5).unwrap();
        let all: Vec<Chunk> = splitter.split(&doc(&content)).iter().collect();
        assert_eq!(all[0].content(), format!("{first}\n\n"));
        assert!(all.last().unwrap().content().ends_with(&second));
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let content = "x".repeat(250);
        let splitter = RecursiveSplitter::new(100, 20).unwrap();
        let chunks = splitter.split(&doc(&content));
        assert_eq!(
            chunks.spans(),
            &[0..100, 80..180, 160..250]
        );
        assert_eq!(reassemble(&chunks), content);
    }

    #[test]
    fn multibyte_content_round_trips() {
        let content = "Café déjà vu, naïve façade. ".repeat(40);
        let splitter = RecursiveSplitter::new(120, 30).unwrap();
        let chunks = splitter.split(&doc(&content));
        assert!(chunks.len() > 1);
        for chunk in chunks.iter() {
            assert!(chunk.content().chars().count() <= 120);
        }
        assert_eq!(reassemble(&chunks), content);
    }

    #[test]
    fn round_trip_holds_across_parameters() {
        let content = words(900);
        for (max_size, overlap) in [(64, 1), (200, 50), (333, 100), (1000, 999), (50, 0)] {
            let splitter = RecursiveSplitter::new(max_size, overlap).unwrap();
            let chunks = splitter.split(&doc(&content));
            for chunk in chunks.iter() {
                assert!(chunk.char_len() <= max_size);
            }
            for pair in chunks.spans().windows(2) {
                assert!(pair[1].start > pair[0].start);
                assert!(pair[1].end > pair[0].end);
            }
            assert_eq!(reassemble(&chunks), content, "max={max_size} overlap={overlap}");
        }
    }

    #[test]
    fn iteration_is_restartable() {
        let content = words(400);
        let splitter = RecursiveSplitter::new(300, 30).unwrap();
        let chunks = splitter.split(&doc(&content));
        let first: Vec<Chunk> = chunks.iter().collect();
        let second: Vec<Chunk> = chunks.iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.iter().map(|c| c.ordinal).collect::<Vec<_>>(), (0..first.len()).collect::<Vec<_>>());
    }
}
