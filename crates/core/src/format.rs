use crate::pipeline::Summary;

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Rewrite `[123]` and `[12.5]` second markers as `[02:03]` and `[00:12]`.
/// Brackets holding anything else are left alone.
pub fn humanize_timestamps(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let marker = after
            .find(']')
            .map(|close| &after[..close])
            .filter(|inner| is_seconds(inner))
            .and_then(|inner| inner.parse::<f64>().ok().map(|secs| (inner.len(), secs)));

        match marker {
            Some((len, secs)) => {
                output.push_str(&format!("[{}]", format_timestamp(secs)));
                rest = &after[len + 1..];
            }
            None => {
                output.push('[');
                rest = after;
            }
        }
    }
    output.push_str(rest);
    output
}

fn is_seconds(inner: &str) -> bool {
    let mut parts = inner.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or("0");
    !whole.is_empty()
        && !fraction.is_empty()
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.chars().all(|c| c.is_ascii_digit())
}

pub fn format_summary_readable(summary: &Summary, humanize: bool) -> String {
    let metadata = &summary.document.metadata;
    let mut output = String::new();

    let title = if metadata.title.is_empty() {
        metadata.id.as_str()
    } else {
        metadata.title.as_str()
    };
    output.push_str(&format!("# {}\n\n", title));
    if !metadata.source.is_empty() {
        output.push_str(&format!("**Source:** {}\n\n", metadata.source));
    }
    if !metadata.description.is_empty() {
        output.push_str(&format!("> {}\n\n", metadata.description));
    }

    output.push_str("## Summary\n\n");
    if humanize {
        output.push_str(&humanize_timestamps(summary.text()));
    } else {
        output.push_str(summary.text());
    }
    output.push('\n');

    output
}
