//! Recovery of a JSON object from loosely formatted model output.
//!
//! Models asked for "strict JSON only" still wrap it in code fences or
//! chat around it. Everything here is pure string slicing; validation of the
//! recovered object happens in the caller.

/// Return the outermost `{ ... }` object in `output`, if there is one.
///
/// Markdown code fences are skipped, and anything before the first `{` or
/// after its matching `}` is dropped. Braces inside JSON strings are ignored
/// when matching.
pub fn extract_json_object(output: &str) -> Option<&str> {
    let body = strip_code_fence(output);
    let start = body.find('{')?;
    let end = matching_brace(&body[start..])?;
    Some(&body[start..start + end + 1])
}

fn strip_code_fence(output: &str) -> &str {
    let trimmed = output.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };
    // A fence after the object starts is part of the object's text
    if trimmed.find('{').is_some_and(|brace| brace < open) {
        return trimmed;
    }

    // Skip the info string (e.g. ```json) up to the end of the line
    let after_open = &trimmed[open + 3..];
    let content_start = after_open.find('\n').map(|p| p + 1).unwrap_or(0);
    let content = &after_open[content_start..];

    match content.find("```") {
        Some(close) => content[..close].trim(),
        None => content.trim(),
    }
}

/// Byte offset of the brace closing the one at offset 0
fn matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}
