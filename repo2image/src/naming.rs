use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};
use url::Url;

static LAST_SUFFIX: AtomicU64 = AtomicU64::new(0);

/// Lower-cases `name` and replaces everything outside `[a-z0-9-]` with `-`.
pub fn sanitize(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            _ => '-',
        })
        .collect()
}

/// The repository name from the last segment of the url path, without a
/// trailing `.git`.
pub fn repository_name(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or("");
    let stem = segment.strip_suffix(".git").unwrap_or(segment);

    // image reference components may not start with a separator
    let name = sanitize(stem);
    let name = name.trim_start_matches('-');
    if name.is_empty() {
        "repo".to_string()
    } else {
        name.to_string()
    }
}

/// Milliseconds since the epoch, bumped so that no two calls in this
/// process ever return the same value.
pub fn unique_suffix() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let mut last = LAST_SUFFIX.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_SUFFIX.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

/// A workspace and tag safe identifier for one build of `url`.
pub fn build_identifier(url: &Url) -> String {
    format!("{}-{}", repository_name(url), unique_suffix())
}
