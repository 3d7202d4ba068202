/// Match a log line against a message. JSON lines compare the
/// `fields.message` value exactly; anything else falls back to a substring.
pub fn line_matches(line: &str, target: &str) -> bool {
    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(line)
        && let Some(msg) = parsed
            .get("fields")
            .and_then(|f| f.get("message"))
            .and_then(|m| m.as_str())
    {
        return msg == target;
    }
    line.contains(target)
}

pub fn buf_contains(buf: &str, target: &str) -> bool {
    buf.lines().any(|line| line_matches(line.trim(), target))
}

/// First JSON line whose message is `target`.
pub fn find_line(buf: &str, target: &str) -> Option<serde_json::Value> {
    buf.lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line.trim()).ok())
        .find(|parsed| {
            parsed
                .get("fields")
                .and_then(|f| f.get("message"))
                .and_then(|m| m.as_str())
                == Some(target)
        })
}
