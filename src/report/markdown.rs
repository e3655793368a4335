//! Markdown normalization and delta extraction for report content.
//!
//! Generated text frequently arrives wrapped in a code fence; canonical
//! report bodies are stored without one. Normalization strips a single
//! surrounding fence pair and is idempotent, so it is safe to apply on every
//! read and before every write.

/// Normalizes a report body for storage or interpretation.
///
/// Strips one leading fence opener (optionally typed, e.g. ```` ```markdown ````)
/// and one trailing closer when both are present, trims surrounding
/// whitespace, and guarantees a single trailing newline for non-empty bodies.
#[must_use]
pub fn normalize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let lines: Vec<&str> = trimmed.lines().collect();
    if lines.len() >= 2 && is_fence_opener(lines[0]) && lines[lines.len() - 1].trim() == "```" {
        let inner = lines[1..lines.len() - 1].join("\n");
        return with_trailing_newline(inner.trim());
    }

    with_trailing_newline(trimmed)
}

/// Extracts the revision delta from a revision stage's raw output.
///
/// Precedence: the inner content of a fenced `markdown` block, else the inner
/// content of any fenced block, else the full trimmed text. Everything before
/// the first heading line is discarded. Returns `None` when no heading exists
/// anywhere, in which case the caller must reject the iteration.
#[must_use]
pub fn extract_delta(raw: &str) -> Option<String> {
    let candidate = fenced_block(raw, Some("markdown"))
        .or_else(|| fenced_block(raw, None))
        .unwrap_or_else(|| raw.trim().to_string());

    let lines: Vec<&str> = candidate.lines().collect();
    let start = lines.iter().position(|l| is_heading(l))?;
    Some(lines[start..].join("\n").trim().to_string())
}

/// Appends a delta to a base body with exactly one separating blank line.
#[must_use]
pub fn merge_delta(base: &str, delta: &str) -> String {
    let base = base.trim_end();
    let delta = delta.trim();
    if base.is_empty() {
        return with_trailing_newline(delta);
    }
    format!("{base}\n\n{delta}\n")
}

fn is_heading(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

fn is_fence_opener(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("```") && !line[3..].contains('`')
}

fn with_trailing_newline(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("{text}\n")
    }
}

/// Returns the inner content of the first fenced block, optionally requiring
/// a specific language tag on the opener.
fn fenced_block(raw: &str, language: Option<&str>) -> Option<String> {
    let mut inner: Vec<&str> = Vec::new();
    let mut in_block = false;

    for line in raw.lines() {
        let trimmed = line.trim();
        if !in_block {
            if trimmed.starts_with("```") {
                let tag = trimmed[3..].trim();
                let matches = match language {
                    Some(lang) => tag.eq_ignore_ascii_case(lang),
                    None => true,
                };
                if matches {
                    in_block = true;
                }
            }
            continue;
        }
        if trimmed == "```" {
            return Some(inner.join("\n"));
        }
        inner.push(line);
    }

    // Opener without a closer is not a block.
    None
}
