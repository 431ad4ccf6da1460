// Logging utilities
// Structured logging with JSON and human-readable formats

use log::Level;
use serde_json::json;

/// Mask sensitive data in logs
pub fn mask_sensitive(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }

    let start: String = chars[..4].iter().collect();
    let end: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", start, end)
}

/// Replace every occurrence of each non-empty value in `sensitive` with `***`, longest first.
pub fn redact_values(text: &str, sensitive: &[String]) -> String {
    let mut values: Vec<&str> = sensitive
        .iter()
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .collect();
    values.sort_by_key(|v| std::cmp::Reverse(v.len()));
    values.dedup();

    values
        .into_iter()
        .fold(text.to_string(), |acc, value| acc.replace(value, "***"))
}

/// Mask a `postgres://` URL: user partially hidden, password replaced, host and database kept.
pub fn mask_connection_string(conn_str: &str) -> String {
    let s = conn_str.trim();
    if s.is_empty() {
        return String::new();
    }

    let lower = s.to_ascii_lowercase();
    if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
        // Unparseable URLs are masked completely rather than leaking anything.
        return mask_url_userinfo_password(s).unwrap_or_else(|| "***".to_string());
    }

    "***".to_string()
}

fn mask_url_userinfo_password(url: &str) -> Option<String> {
    let scheme_end = url.find("://")?;
    let scheme = &url[..scheme_end];
    let after_scheme = &url[scheme_end + 3..];

    // Passwords are percent-encoded, so the last '@' ends the userinfo.
    let (userinfo, rest) = match after_scheme.rsplit_once('@') {
        Some((u, r)) => (u, r),
        None => return Some(url.to_string()),
    };
    if userinfo.trim().is_empty() {
        return Some(url.to_string());
    }

    let (user, has_password) = match userinfo.split_once(':') {
        Some((u, _)) => (u, true),
        None => (userinfo, false),
    };

    let masked_user = if user.trim().is_empty() {
        user.to_string()
    } else {
        mask_sensitive(user)
    };

    Some(if has_password {
        format!("{scheme}://{masked_user}:***@{rest}")
    } else {
        format!("{scheme}://{masked_user}@{rest}")
    })
}

/// Parse phase and step from log message
/// Extracts [PHASE: ...] and [STEP: ...] patterns
pub fn parse_log_metadata(message: &str) -> (Option<String>, Option<String>, String) {
    let (phase, cleaned) = extract_tag(message, "[PHASE:");
    let (step, cleaned) = extract_tag(&cleaned, "[STEP:");
    (phase, step, cleaned)
}

fn extract_tag(message: &str, opener: &str) -> (Option<String>, String) {
    let Some(start) = message.find(opener) else {
        return (None, message.to_string());
    };
    let Some(len) = message[start..].find(']') else {
        return (None, message.to_string());
    };

    let value = message[start + opener.len()..start + len].trim().to_string();
    let cleaned = format!("{} {}", &message[..start], &message[start + len + 1..])
        .trim()
        .to_string();
    (Some(value), cleaned)
}

/// Format log entry as JSON for structured logging
pub fn format_json_log(
    timestamp: &str,
    level: Level,
    target: &str,
    message: &str,
    phase: Option<&str>,
    step: Option<&str>,
    run_id: Option<&str>,
) -> String {
    let mut log_entry = json!({
        "timestamp": timestamp,
        "level": level.as_str(),
        "target": target,
        "message": message,
    });

    if let Some(phase) = phase {
        log_entry["phase"] = json!(phase);
    }

    if let Some(step) = step {
        log_entry["step"] = json!(step);
    }

    if let Some(run_id) = run_id {
        log_entry["run_id"] = json!(run_id);
    }

    serde_json::to_string(&log_entry).unwrap_or_else(|_| "{}".to_string())
}

/// Format log entry as human-readable text
pub fn format_human_readable_log(
    timestamp: &str,
    level: Level,
    target: &str,
    message: &str,
    phase: Option<&str>,
    step: Option<&str>,
) -> String {
    let mut log_line = format!("[{}] [{}]", timestamp, level.as_str());

    if let Some(phase) = phase {
        log_line.push_str(&format!(" [PHASE: {}]", phase));
    }

    if let Some(step) = step {
        log_line.push_str(&format!(" [STEP: {}]", step));
    }

    log_line.push_str(&format!(" [{}] {}", target, message));
    log_line
}
