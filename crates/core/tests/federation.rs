use sling_resolver_api::{Resource, ResourceResolver, Value, ValueMap};
use sling_resolver_core::providers::{ContentSnapshot, MemoryResourceProvider, ProviderStorage};
use sling_resolver_core::{ResolverError, SessionResolver};
use sling_resolver_plugin::{AUTH_PASSWORD, AUTH_USER, AuthType, AuthenticationInfo, ProviderHandle, ProviderInfo};
use std::collections::BTreeMap;
use std::sync::Arc;

fn tree(paths: &[(&str, &str)]) -> BTreeMap<String, ValueMap> {
    paths
        .iter()
        .map(|(path, owner)| (path.to_string(), ValueMap::new().with("owner", *owner)))
        .collect()
}

fn mount(info: ProviderInfo, provider: MemoryResourceProvider) -> Arc<ProviderHandle> {
    Arc::new(ProviderHandle::new(info, Arc::new(provider)))
}

fn open(handles: Vec<Arc<ProviderHandle>>) -> SessionResolver {
    open_as(handles, AuthenticationInfo::new())
}

fn open_as(handles: Vec<Arc<ProviderHandle>>, auth_info: AuthenticationInfo) -> SessionResolver {
    SessionResolver::new(Arc::new(ProviderStorage::new(handles)), auth_info).unwrap()
}

fn owner(resource: &Resource) -> Option<String> {
    resource.value_map().get_string("owner")
}

#[test]
fn test_longest_prefix_provider_serves() {
    let session = open(vec![
        mount(
            ProviderInfo::new("a", "/a"),
            MemoryResourceProvider::new("a").with_content(tree(&[("/a/b/c", "a")])),
        ),
        mount(
            ProviderInfo::new("ab", "/a/b"),
            MemoryResourceProvider::new("ab").with_content(tree(&[("/a/b/c", "ab")])),
        ),
    ]);
    let resource = session.get_resource("/a/b/c").unwrap();
    assert_eq!(owner(&resource).as_deref(), Some("ab"));
}

#[test]
fn test_synthetic_ancestors_of_mount_points() {
    let session = open(vec![mount(
        ProviderInfo::new("ab", "/a/b"),
        MemoryResourceProvider::new("ab").with_content(tree(&[("/a/b", "ab")])),
    )]);

    let a = session.get_resource("/a").unwrap();
    assert!(a.is_synthetic());
    assert!(a.properties().is_none());
    assert!(session.resolve_resource("/a", None).is_none());

    let children: Vec<Resource> = session.list_children(&a).collect();
    assert_eq!(children.len(), 1);
    assert_eq!(owner(&children[0]).as_deref(), Some("ab"));
}

#[test]
fn test_children_prefer_real_resources() {
    let session = open(vec![
        mount(
            ProviderInfo::new("root", "/"),
            MemoryResourceProvider::new("root").with_content(tree(&[("/", "root"), ("/apps", "root")])),
        ),
        mount(ProviderInfo::new("libs", "/libs/core"), MemoryResourceProvider::new("libs")),
    ]);
    let root = session.get_resource("/").unwrap();
    let children: Vec<Resource> = session.list_children(&root).collect();
    let paths: Vec<&str> = children.iter().map(Resource::path).collect();
    assert_eq!(paths, vec!["/apps", "/libs"]);
    assert!(!children[0].is_synthetic());
    assert!(children[1].is_synthetic());
}

#[test]
fn test_attribute_names_tolerate_login_failures() {
    let session = open(vec![
        mount(
            ProviderInfo::new("one", "/one").with_attributable(true),
            MemoryResourceProvider::new("one").with_attribute("one.attr", "1"),
        ),
        mount(
            ProviderInfo::new("locked", "/locked")
                .with_attributable(true)
                .with_auth_type(AuthType::Lazy),
            MemoryResourceProvider::new("locked")
                .with_credentials("admin", "admin")
                .with_attribute("locked.attr", "x"),
        ),
        mount(
            ProviderInfo::new("two", "/two").with_attributable(true),
            MemoryResourceProvider::new("two").with_attribute("two.attr", "2"),
        ),
    ]);

    let names = session.attribute_names();
    assert!(names.contains(&"one.attr".to_string()));
    assert!(names.contains(&"two.attr".to_string()));
    assert!(!names.contains(&"locked.attr".to_string()));
    assert_eq!(session.attribute("two.attr"), Some(Value::from("2")));
}

#[test]
fn test_required_login_failure_prevents_session() {
    let storage = Arc::new(ProviderStorage::new([mount(
        ProviderInfo::new("repo", "/").with_auth_type(AuthType::Required),
        MemoryResourceProvider::new("repo").with_credentials("admin", "admin"),
    )]));
    let wrong = AuthenticationInfo::from([
        (AUTH_USER.to_string(), "admin".to_string()),
        (AUTH_PASSWORD.to_string(), "guess".to_string()),
    ]);
    assert!(SessionResolver::new(storage, wrong).is_err());
}

#[test]
fn test_create_needs_modifiable_provider() {
    let session = open(vec![
        mount(ProviderInfo::new("ro", "/"), MemoryResourceProvider::new("ro")),
        mount(
            ProviderInfo::new("rw", "/content").with_modifiable(true),
            MemoryResourceProvider::new("rw").with_content(tree(&[("/content", "rw")])),
        ),
    ]);

    let err = session.create("/apps/x", ValueMap::new()).unwrap_err();
    assert!(matches!(err, ResolverError::Unsupported(_)));

    let created = session.create("/content/page", ValueMap::new().with("owner", "me")).unwrap();
    assert_eq!(created.path(), "/content/page");
    assert!(session.has_changes());
    session.commit().unwrap();
    assert!(!session.has_changes());

    let page = session.get_resource("/content/page").unwrap();
    session.delete(&page).unwrap();
    session.revert();
    assert!(session.get_resource("/content/page").is_some());

    let apps = Resource::real("/apps", ValueMap::new());
    assert!(matches!(session.delete(&apps), Err(ResolverError::Unsupported(_))));
}

#[test]
fn test_copy_and_move_within_one_provider() {
    let session = open(vec![
        mount(
            ProviderInfo::new("rw", "/content").with_modifiable(true),
            MemoryResourceProvider::new("rw").with_content(tree(&[
                ("/content", "rw"),
                ("/content/a", "rw"),
                ("/content/a/child", "rw"),
                ("/content/b", "rw"),
            ])),
        ),
        mount(
            ProviderInfo::new("other", "/other").with_modifiable(true),
            MemoryResourceProvider::new("other"),
        ),
    ]);

    assert!(session.copy("/content/a", "/content/b").unwrap());
    assert!(session.get_resource("/content/b/a/child").is_some());

    assert!(session.move_resource("/content/b/a", "/content").is_err());
    assert!(session.move_resource("/content/b", "/content/a").unwrap());
    assert!(session.get_resource("/content/a/b/a").is_some());
    assert!(session.get_resource("/content/b").is_none());

    // no single provider covers both paths
    assert!(!session.copy("/content/a", "/other").unwrap());
}

#[test]
fn test_copy_and_move_report_lazy_login_failure() {
    let session = open_as(
        vec![
            mount(
                ProviderInfo::new("one", "/one").with_attributable(true),
                MemoryResourceProvider::new("one").with_attribute("one.attr", "1"),
            ),
            mount(
                ProviderInfo::new("locked", "/locked")
                    .with_modifiable(true)
                    .with_auth_type(AuthType::Lazy),
                MemoryResourceProvider::new("locked")
                    .with_credentials("admin", "admin")
                    .with_content(tree(&[("/locked", "locked"), ("/locked/a", "locked")])),
            ),
        ],
        AuthenticationInfo::from([
            (AUTH_USER.to_string(), "alice".to_string()),
            (AUTH_PASSWORD.to_string(), "nope".to_string()),
        ]),
    );

    assert!(matches!(session.copy("/locked/a", "/locked/b"), Err(ResolverError::Login(_))));
    assert!(matches!(session.move_resource("/locked/a", "/locked/b"), Err(ResolverError::Login(_))));
    assert!(session.attribute_names().contains(&"one.attr".to_string()));
}

#[test]
fn test_queries_fan_out_by_language() {
    let session = open(vec![
        mount(
            ProviderInfo::new("one", "/one").with_queryable(true),
            MemoryResourceProvider::new("one")
                .with_content(tree(&[("/one/x", "one")])),
        ),
        mount(
            ProviderInfo::new("two", "/two").with_queryable(true),
            MemoryResourceProvider::new("two").with_content(tree(&[("/two/y", "two")])),
        ),
        mount(
            ProviderInfo::new("silent", "/silent"),
            MemoryResourceProvider::new("silent").with_content(tree(&[("/silent/z", "silent")])),
        ),
    ]);

    let found: Vec<String> = session
        .find_resources("owner", "property")
        .map(|r| r.path().to_string())
        .collect();
    assert_eq!(found, vec!["/one/x", "/two/y"]);
    assert_eq!(session.query_resources("owner", "property").count(), 2);
    assert_eq!(session.find_resources("owner", "sql").count(), 0);
    assert_eq!(session.supported_languages(), vec!["property"]);
}

#[test]
fn test_adapt_to_first_capable_provider() {
    let session = open(vec![mount(
        ProviderInfo::new("repo", "/").with_adaptable(true),
        MemoryResourceProvider::new("repo").with_content(tree(&[("/", "repo")])),
    )]);
    let snapshot: ContentSnapshot = session.adapt_to().unwrap();
    assert!(snapshot.0.contains_key("/"));
    assert!(session.adapt_to::<String>().is_none());
}

#[test]
fn test_logout_is_idempotent() {
    let session = open_as(
        vec![mount(
            ProviderInfo::new("repo", "/").with_auth_type(AuthType::Lazy),
            MemoryResourceProvider::new("repo").with_content(tree(&[("/", "repo")])),
        )],
        AuthenticationInfo::from([(AUTH_USER.to_string(), "alice".to_string())]),
    );
    assert!(session.get_resource("/").is_some());
    assert!(session.is_live());

    session.close();
    session.close();
    assert!(!session.is_live());
    assert!(session.combined().get_resource("/", None, None, true).is_none());
}
