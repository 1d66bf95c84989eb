//! POSIX-like path parsing (spec.md §4.4.3). Every path-taking Tree operation
//! parses its path through here first; a malformed path returns an
//! `InvalidPath` error and the caller logs a warning and returns `false`.

use util::{ErrorCode, SplashError, SplashResult};

/// Parses a path into its component list. The root path (`"/"`) parses to an
/// empty component list.
pub fn parse(path: &str) -> SplashResult<Vec<String>> {
    if !path.starts_with('/') {
        return Err(SplashError::new(ErrorCode::InvalidPath, format!("path must start with '/': {path}")));
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let mut components = Vec::new();
    for segment in trimmed[1..].split('/') {
        if segment.is_empty() {
            return Err(SplashError::new(ErrorCode::InvalidPath, format!("empty path component in: {path}")));
        }
        components.push(segment.to_string());
    }
    Ok(components)
}

pub fn join(components: &[String]) -> String {
    if components.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", components.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ordinary_paths() {
        assert_eq!(parse("/a/b/c").unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn strips_trailing_slash() {
        assert_eq!(parse("/a/b/").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn root_path_is_empty_components() {
        assert_eq!(parse("/").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn rejects_missing_leading_slash() {
        assert!(parse("a/b").is_err());
    }

    #[test]
    fn rejects_empty_components() {
        assert!(parse("/a//b").is_err());
    }

    #[test]
    fn join_round_trips_with_parse() {
        let components = parse("/a/b/c").unwrap();
        assert_eq!(join(&components), "/a/b/c");
    }
}
