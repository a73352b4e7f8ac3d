//! Integration tests for dependency resolution

use wrap_pm::{
    DependencyResolver, FolderRepository, InMemoryRepository, PackageRepository, ResolveError,
    Version, WrapDescriptor,
};

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

#[test]
fn test_first_repository_with_a_match_wins() {
    let project = InMemoryRepository::new("project").with_package("mylib", "1.0");
    let system = InMemoryRepository::new("system").with_package("mylib", "3.0");
    let descriptor = WrapDescriptor::from_str("depends: mylib");

    let result = DependencyResolver::new().resolve(&descriptor, &[&project, &system]);

    let resolved = result.get("mylib").unwrap();
    assert_eq!(resolved.package.as_ref().unwrap().version, v("1.0"));
    assert_eq!(resolved.source.as_deref(), Some("project"));
}

#[test]
fn test_falls_through_when_first_repository_has_no_match() {
    let project = InMemoryRepository::new("project").with_package("mylib", "1.0");
    let system = InMemoryRepository::new("system")
        .with_package("mylib", "2.0")
        .with_package("mylib", "2.5");
    let descriptor = WrapDescriptor::from_str("depends: mylib >= 2.0");

    let result = DependencyResolver::new().resolve(&descriptor, &[&project, &system]);

    let resolved = result.get("mylib").unwrap();
    assert_eq!(resolved.package.as_ref().unwrap().version, v("2.5"));
    assert_eq!(resolved.source.as_deref(), Some("system"));
}

#[test]
fn test_result_preserves_descriptor_order() {
    let repo = InMemoryRepository::new("project")
        .with_package("zeta", "1.0")
        .with_package("alpha", "1.0")
        .with_package("mid", "1.0");
    let descriptor = WrapDescriptor::from_str("depends: zeta\ndepends: alpha\ndepends: mid");

    let result = DependencyResolver::new().resolve(&descriptor, &[&repo]);

    let names: Vec<&str> = result
        .dependencies
        .iter()
        .map(|d| d.requested.name.as_str())
        .collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
}

#[test]
fn test_resolution_is_deterministic() {
    let project = InMemoryRepository::new("project")
        .with_package("a", "1.0")
        .with_package("a", "1.1");
    let system = InMemoryRepository::new("system")
        .with_package("b", "2.0")
        .with_package("b", "2.1");
    let descriptor = WrapDescriptor::from_str("depends: a < 1.1\ndepends: b\ndepends: c");
    let resolver = DependencyResolver::new();

    let first = resolver.resolve(&descriptor, &[&project, &system]);
    let second = resolver.resolve(&descriptor, &[&project, &system]);

    assert_eq!(first, second);
}

#[test]
fn test_unresolved_names_the_dependency() {
    let repo = InMemoryRepository::new("project").with_package("mylib", "1.0");
    let descriptor = WrapDescriptor::from_str("depends: mylib > 1.0");

    let result = DependencyResolver::new().resolve(&descriptor, &[&repo]);

    assert!(!result.is_success());
    assert_eq!(
        result.errors,
        vec![ResolveError::DependencyUnresolved {
            name: "mylib".to_string(),
            constraint: "> 1.0".to_string(),
        }]
    );
    assert!(result.errors[0].to_string().contains("mylib"));
}

#[test]
fn test_no_repositories() {
    let descriptor = WrapDescriptor::from_str("depends: mylib");
    let result = DependencyResolver::new().resolve(&descriptor, &[]);

    assert_eq!(result.dependencies.len(), 1);
    assert_eq!(result.errors.len(), 1);
}

#[test]
fn test_best_match_uses_every_vertex() {
    let repo = InMemoryRepository::new("project")
        .with_package("mylib", "1.0")
        .with_package("mylib", "1.5")
        .with_package("mylib", "2.0");
    let descriptor = WrapDescriptor::from_str("depends: mylib > 1.0 and < 2.0");

    let package = DependencyResolver::new()
        .best_match(&descriptor.dependencies[0], &repo)
        .unwrap();
    assert_eq!(package.version, v("1.5"));
}

#[test]
fn test_transitive_follows_descriptors() {
    let repo = InMemoryRepository::new("system")
        .with_descriptor(
            "web",
            "1.0",
            WrapDescriptor::from_str("depends: http >= 2.0\ndepends: json"),
        )
        .with_descriptor("http", "2.1", WrapDescriptor::from_str("depends: json"))
        .with_package("json", "1.0");
    let descriptor = WrapDescriptor::from_str("depends: web");

    let result = DependencyResolver::new().resolve_transitive(&descriptor, &[&repo]);

    assert!(result.is_success());
    let names: Vec<&str> = result.packages().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["web", "http", "json"]);
}

#[test]
fn test_transitive_terminates_on_cycles() {
    let repo = InMemoryRepository::new("system")
        .with_descriptor("a", "1.0", WrapDescriptor::from_str("depends: b"))
        .with_descriptor("b", "1.0", WrapDescriptor::from_str("depends: A"));
    let descriptor = WrapDescriptor::from_str("depends: a");

    let result = DependencyResolver::new().resolve_transitive(&descriptor, &[&repo]);

    assert!(result.is_success());
    assert_eq!(result.dependencies.len(), 2);
}

#[test]
fn test_transitive_reports_missing_children() {
    let repo = InMemoryRepository::new("system")
        .with_descriptor("web", "1.0", WrapDescriptor::from_str("depends: missing"));
    let descriptor = WrapDescriptor::from_str("depends: web");

    let result = DependencyResolver::new().resolve_transitive(&descriptor, &[&repo]);

    assert_eq!(result.packages().count(), 1);
    assert!(matches!(
        &result.errors[..],
        [ResolveError::DependencyUnresolved { name, .. }] if name == "missing"
    ));
}

#[test]
fn test_repository_view_is_unchanged_by_resolution() {
    let repo = InMemoryRepository::new("project")
        .with_package("mylib", "1.0")
        .with_package("mylib", "2.0");
    let descriptor = WrapDescriptor::from_str("depends: mylib");

    DependencyResolver::new().resolve(&descriptor, &[&repo]);

    assert_eq!(repo.packages().len(), 2);
}

#[test]
fn test_transitive_unreadable_descriptor_is_an_error_not_a_failed_dependency() {
    let temp = tempfile::TempDir::new().unwrap();
    std::fs::write(temp.path().join("web-1.0.wrap"), b"not a zip").unwrap();
    let repository = FolderRepository::open("system", temp.path()).unwrap();

    let result = DependencyResolver::new()
        .resolve_transitive(&WrapDescriptor::from_str("depends: web"), &[&repository]);

    assert!(result.all_resolved());
    assert_eq!(result.dependencies.len(), 1);
    assert!(!result.is_success());
    assert_eq!(result.errors.len(), 1);
    assert!(matches!(
        &result.errors[0],
        ResolveError::DescriptorUnavailable { package, .. } if package == "web-1.0"
    ));
}
