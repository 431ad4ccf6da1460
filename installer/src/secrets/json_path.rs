// JSON path projection for secret bodies
//
// Supported subset: `$` root, `.name`, `['name']` / `["name"]`, `[index]`, `.*` / `[*]`.
// A path without the leading `$` is treated as relative to the root (`password` == `$.password`).

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsonPathError {
    #[error("unsupported JSON path syntax at offset {offset}: '{path}'")]
    Unsupported { path: String, offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

fn parse_segments(path: &str) -> Result<Vec<Segment>, JsonPathError> {
    let unsupported = |offset: usize| JsonPathError::Unsupported {
        path: path.to_string(),
        offset,
    };

    let trimmed = path.trim();
    let body = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let bytes = body.as_bytes();
    let mut segments = Vec::new();
    let mut i = 0;

    // Relative paths start with a bare key.
    if !body.is_empty() && bytes[0] != b'.' && bytes[0] != b'[' {
        let end = body.find(['.', '[']).unwrap_or(body.len());
        segments.push(Segment::Key(body[..end].to_string()));
        i = end;
    }

    while i < bytes.len() {
        match bytes[i] {
            b'.' => {
                if bytes.get(i + 1) == Some(&b'.') {
                    // Recursive descent is not supported.
                    return Err(unsupported(i));
                }
                let start = i + 1;
                let end = body[start..]
                    .find(['.', '['])
                    .map(|n| start + n)
                    .unwrap_or(body.len());
                let name = &body[start..end];
                if name.is_empty() {
                    return Err(unsupported(i));
                }
                segments.push(if name == "*" {
                    Segment::Wildcard
                } else {
                    Segment::Key(name.to_string())
                });
                i = end;
            }
            b'[' => {
                let close = body[i..].find(']').map(|n| i + n).ok_or_else(|| unsupported(i))?;
                let inner = body[i + 1..close].trim();
                let quoted = inner.len() >= 2
                    && ((inner.starts_with('\'') && inner.ends_with('\''))
                        || (inner.starts_with('"') && inner.ends_with('"')));
                if inner == "*" {
                    segments.push(Segment::Wildcard);
                } else if quoted {
                    segments.push(Segment::Key(inner[1..inner.len() - 1].to_string()));
                } else {
                    let index = inner.parse::<usize>().map_err(|_| unsupported(i))?;
                    segments.push(Segment::Index(index));
                }
                i = close + 1;
            }
            _ => return Err(unsupported(i)),
        }
    }

    Ok(segments)
}

/// First value matched by `path`, or `None` when nothing matches.
pub fn select_first(document: &Value, path: &str) -> Result<Option<Value>, JsonPathError> {
    let segments = parse_segments(path)?;
    let mut current: Vec<&Value> = vec![document];

    for segment in &segments {
        let mut next = Vec::new();
        for value in current {
            match (segment, value) {
                (Segment::Key(k), Value::Object(map)) => next.extend(map.get(k)),
                (Segment::Index(n), Value::Array(items)) => next.extend(items.get(*n)),
                (Segment::Wildcard, Value::Object(map)) => next.extend(map.values()),
                (Segment::Wildcard, Value::Array(items)) => next.extend(items.iter()),
                _ => {}
            }
        }
        if next.is_empty() {
            return Ok(None);
        }
        current = next;
    }

    Ok(current.first().map(|v| (*v).clone()))
}

/// Render a selected value the way it is substituted into SQL: strings raw, the rest as JSON.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
