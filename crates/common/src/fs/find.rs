use std::path::Path;

use regex::Regex;
use walkdir::WalkDir;

use super::entry::DirEntry;
use super::error::FsError;
use super::logical_path::LogicalPath;

/// Entries anywhere below `root` whose name matches the shell style glob
/// `pattern` (`*`, `?`, `[...]`, `[!...]`). Symlinks are not followed.
/// Each result carries its logical parent directory.
pub fn find(root: &Path, pattern: &str) -> Result<Vec<DirEntry>, FsError> {
    let matcher = glob_to_regex(pattern)?;

    let mut found = Vec::new();
    for item in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry during find");
                continue;
            }
        };
        let name = item.file_name().to_string_lossy();
        if !matcher.is_match(&name) {
            continue;
        }

        let Ok(relative) = item.path().strip_prefix(root) else {
            continue;
        };
        let logical = to_logical(relative);
        let parent = relative.parent().map(to_logical).unwrap_or_default();

        match LogicalPath::new(root, &logical).entry() {
            Ok(mut entry) => {
                entry.parent = Some(format!("/{parent}"));
                found.push(entry);
            }
            Err(e) => tracing::debug!(path = %logical, error = %e, "match vanished during find"),
        }
    }
    Ok(found)
}

fn to_logical(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn glob_to_regex(pattern: &str) -> Result<Regex, FsError> {
    let invalid = |reason: &str| FsError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };
    if pattern.is_empty() {
        return Err(invalid("empty pattern"));
    }

    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            '[' => {
                let mut class = String::from("[");
                if matches!(chars.peek(), Some('!') | Some('^')) {
                    chars.next();
                    class.push('^');
                }
                let mut closed = false;
                let mut first = true;
                while let Some(c) = chars.next() {
                    match c {
                        ']' if !first => {
                            closed = true;
                            break;
                        }
                        '\\' | '[' | ']' | '&' | '~' => {
                            class.push('\\');
                            class.push(c);
                        }
                        _ => class.push(c),
                    }
                    first = false;
                }
                if !closed {
                    return Err(invalid("unterminated character class"));
                }
                class.push(']');
                re.push_str(&class);
            }
            _ => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');

    Regex::new(&re).map_err(|e| invalid(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_glob_translation() {
        let re = glob_to_regex("*.py").unwrap();
        assert!(re.is_match("setup.py"));
        assert!(!re.is_match("setup.pyc"));

        let re = glob_to_regex("file?.[ch]").unwrap();
        assert!(re.is_match("file1.c"));
        assert!(re.is_match("fileA.h"));
        assert!(!re.is_match("file12.c"));

        let re = glob_to_regex("[!a]*").unwrap();
        assert!(re.is_match("bcd"));
        assert!(!re.is_match("abc"));

        let re = glob_to_regex("a+b(1).txt").unwrap();
        assert!(re.is_match("a+b(1).txt"));
    }

    #[test]
    fn test_invalid_patterns() {
        for pattern in ["", "[abc"] {
            let err = glob_to_regex(pattern).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidPattern);
        }
    }

    #[test]
    fn test_find_reports_parent() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("src/bin")).unwrap();
        fs::write(root.join("setup.py"), "").unwrap();
        fs::write(root.join("src/lib.py"), "").unwrap();
        fs::write(root.join("src/bin/main.py"), "").unwrap();
        fs::write(root.join("src/notes.md"), "").unwrap();

        let found = find(&root, "*.py").unwrap();
        let mut pairs: Vec<_> = found
            .iter()
            .map(|e| (e.parent.clone().unwrap(), e.name.clone()))
            .collect();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("/".to_string(), "setup.py".to_string()),
                ("/src".to_string(), "lib.py".to_string()),
                ("/src/bin".to_string(), "main.py".to_string()),
            ]
        );

        let dirs = find(&root, "bin").unwrap();
        assert_eq!(dirs.len(), 1);
        assert!(dirs[0].is_dir);
    }
}
