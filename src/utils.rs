//! A collection of utility functions
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::errors::Error;

/// Formats a `SystemTime` into a RFC 3339 - Z format.
/// For example "2018-01-26T18:30:09.453Z"
pub fn format_system_time(time: SystemTime) -> String {
    let datetime: DateTime<Utc> = time.into();
    datetime.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Formats seconds + nanoseconds since the unix epoch into a RFC 3339 - Z
/// format. Out of range values format as the epoch.
pub fn format_unix_time(secs: i64, nsecs: i64) -> String {
    let nsecs = u32::try_from(nsecs).unwrap_or(0);
    let datetime = DateTime::<Utc>::from_timestamp(secs, nsecs).unwrap_or_default();
    datetime.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Builds a `SystemTime` from a RFC 3339 - Z formatted string.
/// For example "2018-01-26T18:30:09.453Z"
pub fn parse_system_time(s: &str) -> Result<SystemTime, Error> {
    let datetime = DateTime::parse_from_rfc3339(s)
        .map_err(|e| Error::InvalidArgument(format!("parse system time {s:?}: {e}")))?;
    Ok(SystemTime::from(datetime))
}

/// Strips trailing separators from a root path. A root made only of
/// separators stays `/`.
pub fn trim_root(root: &str) -> &str {
    let trimmed = root.trim_end_matches('/');
    if trimmed.is_empty() && !root.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Joins `name` onto `parent` with a `/`.
///
/// Nothing is cleaned or normalized: `"./a"` joined with `"b"` is `"./a/b"`.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Returns the last `/`-separated component of `path`.
pub fn base_name(path: &str) -> &str {
    let trimmed = trim_root(path);
    if trimmed == "/" {
        return trimmed;
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_keeps_leading_dot() {
        assert_eq!(join_path(".", "a.txt"), "./a.txt");
        assert_eq!(join_path("./sub", "b"), "./sub/b");
        assert_eq!(join_path("/", "etc"), "/etc");
        assert_eq!(join_path("a//b", "c"), "a//b/c");
    }

    #[test]
    fn trim_root_strips_trailing_slashes() {
        assert_eq!(trim_root("dir/"), "dir");
        assert_eq!(trim_root("dir//"), "dir");
        assert_eq!(trim_root("./"), ".");
        assert_eq!(trim_root("/"), "/");
        assert_eq!(trim_root("///"), "/");
        assert_eq!(trim_root(""), "");
    }

    #[test]
    fn base_name_of_paths() {
        assert_eq!(base_name("a/b/c.txt"), "c.txt");
        assert_eq!(base_name("c.txt"), "c.txt");
        assert_eq!(base_name("./sub/"), "sub");
        assert_eq!(base_name("."), ".");
        assert_eq!(base_name("/"), "/");
    }

    #[test]
    fn unix_time_formats_like_system_time() {
        let t = SystemTime::UNIX_EPOCH + std::time::Duration::from_millis(1_516_991_409_453);
        assert_eq!(format_system_time(t), "2018-01-26T18:30:09.453Z");
        assert_eq!(
            format_unix_time(1_516_991_409, 453_000_000),
            "2018-01-26T18:30:09.453Z"
        );
        assert_eq!(parse_system_time("2018-01-26T18:30:09.453Z").unwrap(), t);
    }
}
