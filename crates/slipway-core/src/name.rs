//! Naming grammar for project and package names.
//!
//! The build service only accepts a restricted character set for project and
//! package names. Requests referring to names outside this grammar are
//! rejected before any backend lookup is attempted.

/// Names longer than this are rejected regardless of content.
const MAX_NAME_LEN: usize = 200;

/// Reserved package names that are valid despite the leading underscore.
const RESERVED_PACKAGE_NAMES: [&str; 4] = ["_product", "_pattern", "_project", "_patchinfo"];

/// Check whether `name` is a valid project name.
///
/// Project names start with an alphanumeric character and may contain
/// `-`, `+`, `_`, `.` and `:` afterwards. A name must not contain `::`
/// and must not end with `:`.
#[must_use]
pub fn valid_project_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN || name == "0" {
        return false;
    }
    if name.contains("::") || name.ends_with(':') {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '_' | '.' | ':'))
}

/// Check whether `name` is a valid package name.
///
/// Package names start with an alphanumeric character and may contain
/// `-`, `+`, `_` and `.` afterwards. The reserved names `_product`,
/// `_pattern`, `_project` and `_patchinfo` are allowed, as are
/// `_product:*` and `_patchinfo:*` container names.
#[must_use]
pub fn valid_package_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN || name == "0" {
        return false;
    }
    if RESERVED_PACKAGE_NAMES.contains(&name) {
        return true;
    }
    if let Some(rest) = name
        .strip_prefix("_product:")
        .or_else(|| name.strip_prefix("_patchinfo:"))
    {
        return valid_plain_package_name(rest);
    }
    valid_plain_package_name(name)
}

fn valid_plain_package_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_project_names() {
        assert!(valid_project_name("openSUSE:Factory"));
        assert!(valid_project_name("home:alice:branches:devel"));
        assert!(valid_project_name("My-Project_1.0+beta"));
    }

    #[test]
    fn test_invalid_project_names() {
        assert!(!valid_project_name(""));
        assert!(!valid_project_name("0"));
        assert!(!valid_project_name(":leading"));
        assert!(!valid_project_name("trailing:"));
        assert!(!valid_project_name("double::colon"));
        assert!(!valid_project_name("_underscore"));
        assert!(!valid_project_name("has space"));
        assert!(!valid_project_name(&"x".repeat(201)));
    }

    #[test]
    fn test_valid_package_names() {
        assert!(valid_package_name("gcc"));
        assert!(valid_package_name("lib-foo+bar.baz"));
        assert!(valid_package_name("_patchinfo"));
        assert!(valid_package_name("_product:sles-release"));
    }

    #[test]
    fn test_invalid_package_names() {
        assert!(!valid_package_name(""));
        assert!(!valid_package_name("0"));
        assert!(!valid_package_name("_private"));
        assert!(!valid_package_name(".hidden"));
        assert!(!valid_package_name("has:colon"));
        assert!(!valid_package_name("_product:"));
    }
}
