//! Turns a raw timestamped transcript into a single clean text blob.
//!
//! Lines are grouped into paragraphs: a paragraph is closed by a line whose text ends with a
//! blank line (`"\n\n"`). Each paragraph is emitted once, prefixed with the timestamp of its
//! first line as `[seconds]: `. A trailing run of lines that is never closed continues the
//! preceding paragraph instead of opening a new one, so its own first timestamp is not emitted
//! and summaries can only point at the start of that merged paragraph.

use crate::{
    error::{Result, SynopsisError},
    types::{ContentMetadata, Document, DocumentMetadata, TranscriptLine, TranscriptRecord},
};

/// Decorative characters captions use to bracket music and sound cues.
const DECORATIVE_MARKERS: [char; 4] = ['♪', '♫', '🎵', '🎶'];

const PARAGRAPH_BREAK: &str = "\n\n";

fn is_marker(c: char) -> bool {
    DECORATIVE_MARKERS.contains(&c)
}

/// Normalize a transcript and attach the catalog metadata.
pub fn normalize(record: &TranscriptRecord, content: &ContentMetadata) -> Result<Document> {
    if record.lines.is_empty() {
        return Err(SynopsisError::invalid_input(format!(
            "transcript {} has no lines",
            record.id
        )));
    }

    let mut lines: Vec<&TranscriptLine> = Vec::with_capacity(record.lines.len());
    for line in &record.lines {
        if !line.time.is_finite() || line.time < 0.0 {
            return Err(SynopsisError::invalid_input(format!(
                "transcript {} has invalid timestamp {}",
                record.id, line.time
            )));
        }
        if line.text.trim().is_empty() {
            return Err(SynopsisError::invalid_input(format!(
                "transcript {} has an empty line at {}",
                record.id, line.time
            )));
        }
        lines.push(line);
    }
    // stable: equal timestamps keep their catalog order
    lines.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut paragraphs: Vec<(f64, String)> = Vec::new();
    let mut open = false;
    for line in lines {
        let text = strip_markers(&line.text);
        let closes = text.ends_with(PARAGRAPH_BREAK);
        match paragraphs.last_mut() {
            Some((_, body)) if open => body.push_str(&text),
            _ => paragraphs.push((line.time, text)),
        }
        open = !closes;
    }
    if open && paragraphs.len() > 1 {
        if let Some((_, tail)) = paragraphs.pop() {
            if let Some((_, body)) = paragraphs.last_mut() {
                body.push_str(&tail);
            }
        }
    }

    let mut result = String::new();
    for (time, body) in &paragraphs {
        result.push_str(&format!("[{}]: {}", time, body));
    }

    let result = result.replace(PARAGRAPH_BREAK, " ");
    let result = collapse_spaces(&result).replace(" .", ".");

    Ok(Document::new(
        result.trim(),
        DocumentMetadata {
            id: record.id.clone(),
            title: content.title.clone(),
            description: normalize_description(&content.description),
            source: content.web_permalink.clone(),
        },
    ))
}

/// Remove a marker-delimited span (markers included) within each line, then any marker left
/// on its own. Spans never cross a line break.
fn strip_markers(text: &str) -> String {
    let mut out: String = text.split_inclusive('\n').map(strip_marker_span).collect();
    out.retain(|c| !is_marker(c));
    out
}

fn strip_marker_span(segment: &str) -> String {
    match (segment.find(is_marker), segment.rfind(is_marker)) {
        (Some(start), Some(last)) if start < last => {
            let end = last + segment[last..].chars().next().map_or(0, char::len_utf8);
            format!("{}{}", &segment[..start], &segment[end..])
        }
        _ => segment.to_string(),
    }
}

fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_space = false;
    for c in text.chars() {
        let space = c == ' ';
        if !(space && previous_space) {
            out.push(c);
        }
        previous_space = space;
    }
    out
}

/// ASCII quotes, single line, single spaces.
pub fn normalize_description(description: &str) -> String {
    let ascii: String = description
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect();
    collapse_spaces(&ascii).trim().to_string()
}
