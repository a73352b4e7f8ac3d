//! `depends:` instruction grammar
//!
//! ```text
//! depends: <name> [<comparator> <version> ('and' <comparator> <version>)*] [<tag>...]
//! ```
//!
//! Constraint groups are consumed greedily from the left. The first token that
//! cannot continue the chain (unknown comparator, malformed version, missing
//! `and`) ends the constraints; it and everything after it become tags.

use super::PackageDependency;
use crate::version::VersionVertex;
use tracing::debug;

/// Descriptor keyword claimed by this parser
pub const KEYWORD: &str = "depends";

/// Separator between constraint groups
pub const AND: &str = "and";

/// Parse the content of a `depends:` instruction
///
/// Returns `None` for a line without a package name.
pub fn parse_dependency(line: &str) -> Option<PackageDependency> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (name, rest) = tokens.split_first()?;

    let (vertices, consumed) = parse_versions(rest);
    let tags = rest[consumed..].iter().map(|t| t.to_string()).collect();

    Some(PackageDependency {
        name: name.to_string(),
        version_vertices: if vertices.is_empty() {
            vec![VersionVertex::Any]
        } else {
            vertices
        },
        tags,
    })
}

/// Parse `comparator version ('and' comparator version)*` from the start of `args`
///
/// Returns the parsed vertices and the number of tokens they consumed.
pub fn parse_versions(args: &[&str]) -> (Vec<VersionVertex>, usize) {
    let mut vertices = Vec::new();
    let mut consumed = 0;

    loop {
        let mut pos = consumed;
        if !vertices.is_empty() {
            match args.get(pos) {
                Some(token) if token.eq_ignore_ascii_case(AND) => pos += 1,
                _ => break,
            }
        }

        let (Some(comparator), Some(version)) = (args.get(pos), args.get(pos + 1)) else {
            break;
        };

        match VersionVertex::parse(comparator, version) {
            Ok(vertex) => {
                vertices.push(vertex);
                consumed = pos + 2;
            }
            Err(e) => {
                debug!(
                    "Constraint '{} {}' not recognised ({}), treating remainder as tags",
                    comparator, version, e
                );
                break;
            }
        }
    }

    (vertices, consumed)
}

/// Serialize a dependency back into `depends:` content
///
/// `Any` vertices produce no text, so an unconstrained dependency is just its name.
pub fn write_dependency(dependency: &PackageDependency) -> String {
    let mut parts = vec![dependency.name.clone()];

    let constraints: Vec<String> = dependency
        .version_vertices
        .iter()
        .filter(|v| !matches!(v, VersionVertex::Any))
        .map(|v| v.to_string())
        .collect();
    if !constraints.is_empty() {
        parts.push(constraints.join(&format!(" {} ", AND)));
    }

    parts.extend(dependency.tags.iter().cloned());
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_name_only() {
        let dep = parse_dependency("mylib").unwrap();
        assert_eq!(dep.name, "mylib");
        assert_eq!(dep.version_vertices, vec![VersionVertex::Any]);
        assert!(dep.tags.is_empty());
    }

    #[test]
    fn test_parse_range() {
        let dep = parse_dependency("mylib >= 1.0 and < 2.0").unwrap();
        assert_eq!(
            dep.version_vertices,
            vec![
                VersionVertex::GreaterThanOrEqual(v("1.0")),
                VersionVertex::LessThan(v("2.0")),
            ]
        );
        assert!(dep.tags.is_empty());
    }

    #[test]
    fn test_and_is_case_insensitive() {
        let dep = parse_dependency("mylib > 1.0 AND < 3.0").unwrap();
        assert_eq!(dep.version_vertices.len(), 2);
    }

    #[test]
    fn test_tags_after_constraints() {
        let dep = parse_dependency("mylib = 1.2 content anchored").unwrap();
        assert_eq!(dep.version_vertices, vec![VersionVertex::Exact(v("1.2"))]);
        assert_eq!(dep.tags, vec!["content", "anchored"]);
    }

    #[test]
    fn test_tags_without_constraints() {
        let dep = parse_dependency("mylib content").unwrap();
        assert_eq!(dep.version_vertices, vec![VersionVertex::Any]);
        assert_eq!(dep.tags, vec!["content"]);
    }

    #[test]
    fn test_malformed_second_group_becomes_tags() {
        let dep = parse_dependency("mylib >= 1.0 and <= 2.0").unwrap();
        assert_eq!(
            dep.version_vertices,
            vec![VersionVertex::GreaterThanOrEqual(v("1.0"))]
        );
        assert_eq!(dep.tags, vec!["and", "<=", "2.0"]);
    }

    #[test]
    fn test_malformed_version_becomes_tags() {
        let dep = parse_dependency("mylib >= one").unwrap();
        assert_eq!(dep.version_vertices, vec![VersionVertex::Any]);
        assert_eq!(dep.tags, vec![">=", "one"]);
    }

    #[test]
    fn test_dangling_and() {
        let dep = parse_dependency("mylib > 1.0 and").unwrap();
        assert_eq!(dep.version_vertices, vec![VersionVertex::GreaterThan(v("1.0"))]);
        assert_eq!(dep.tags, vec!["and"]);
    }

    #[test]
    fn test_empty_line() {
        assert!(parse_dependency("   ").is_none());
    }

    #[test]
    fn test_write_dependency() {
        let dep = parse_dependency("mylib  >=   1.0 and < 2.0   nuget").unwrap();
        assert_eq!(write_dependency(&dep), "mylib >= 1.0 and < 2.0 nuget");

        let dep = parse_dependency("mylib").unwrap();
        assert_eq!(write_dependency(&dep), "mylib");
    }
}
