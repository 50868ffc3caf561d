use crate::error::{Result, SynopsisError};

/// Prompt text with `{name}` placeholders.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub template: &'static str,
    pub variables: &'static [&'static str],
}

impl PromptTemplate {
    /// Fill every declared variable in one pass over the template. Values are inserted verbatim,
    /// so placeholder-like text inside a value is never expanded.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String> {
        let lookup = |name: &str| {
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| *value)
        };
        if let Some(missing) = self.variables.iter().find(|name| lookup(**name).is_none()) {
            return Err(SynopsisError::invalid_input(format!(
                "prompt variable {{{missing}}} is missing"
            )));
        }

        let mut rendered = String::with_capacity(self.template.len());
        let mut rest = self.template;
        while let Some(open) = rest.find('{') {
            rendered.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let value = after.find('}').and_then(|close| {
                let name = &after[..close];
                self.variables
                    .iter()
                    .any(|declared| *declared == name)
                    .then(|| lookup(name))
                    .flatten()
                    .map(|value| (close, value))
            });
            match value {
                Some((close, value)) => {
                    rendered.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    rendered.push('{');
                    rest = after;
                }
            }
        }
        rendered.push_str(rest);
        Ok(rendered)
    }
}

pub static MAP_PROMPT: PromptTemplate = PromptTemplate {
    template: r#"Your mission is to summarize a chunk of video subtitles into segments, with one sentence per segment that helps the reader understand its main point.
The format of the subtitles is "[timestamp in seconds]: subtitle".
Every segment must keep a reference to the timestamp it is based on.
For example, a segment that starts at second 31 is written as "[31]: summary".

The subtitles are given between the triple quotes below:
"""
{text}
"""

Your segment summaries:
"#,
    variables: &["text"],
};

pub static COMBINE_PROMPT: PromptTemplate = PromptTemplate {
    template: r#"Your mission is to write a concise summary of a video using its title and a list of segment summaries.
The format of the segment summaries is "[timestamp in seconds]: summary".
Keep the timestamp reference of every point you keep, in the same format.

The title of the video is: {title}
The segment summaries are given between the triple quotes below:
"""
{text}
"""

Your concise summary:
"#,
    variables: &["title", "text"],
};
