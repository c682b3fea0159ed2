use crate::common::fixtures::{TestFs, mount};
use crate::common::mock_catalog::{MockIotCatalog, certificate_arn};
use iot_fuse::error::{FsError, RemoteError};
use iot_fuse::vfs::NodeType;

const CERT: &str = "abc123";

fn catalog() -> MockIotCatalog {
    MockIotCatalog::new()
        .with_thing("t1")
        .with_certificate(CERT)
        .with_policy("p1", r#"{"Version":"2012-10-17"}"#)
}

fn principal_path() -> String {
    format!("/things/t1/principals/{}", CERT)
}

fn attached_principals(env: &TestFs) -> Vec<String> {
    env.catalog
        .state()
        .principals
        .get("t1")
        .cloned()
        .unwrap_or_default()
}

#[test]
fn test_symlink_attaches_principal() {
    let env = mount(catalog());
    let target = format!("/certificates/{}", CERT);

    env.fs.symlink(&target, &principal_path()).unwrap();

    assert_eq!(env.catalog.get_call_count("attach_thing_principal"), 1);
    assert_eq!(attached_principals(&env), vec![certificate_arn(CERT)]);
    assert_eq!(env.names("/things/t1/principals"), vec![CERT]);
    assert_eq!(env.fs.getattr(&principal_path()).unwrap().kind, NodeType::Symlink);
    assert_eq!(
        env.fs.readlink(&principal_path()).unwrap(),
        "../../../certificates/abc123"
    );
}

#[test]
fn test_relative_symlink_target() {
    let env = mount(catalog());

    env.fs
        .symlink("../../../certificates/abc123", &principal_path())
        .unwrap();
    assert_eq!(attached_principals(&env), vec![certificate_arn(CERT)]);
}

#[test]
fn test_content_is_reachable_through_link() {
    let env = mount(catalog().with_principal("t1", CERT));

    assert_eq!(env.names("/things/t1/principals"), vec![CERT]);
    assert_eq!(env.read_all(&format!("{}/id", principal_path())), CERT);
    assert_eq!(
        env.fs.readdir(&principal_path()).unwrap().len(),
        env.fs.readdir(&format!("/certificates/{}", CERT)).unwrap().len()
    );
}

#[test]
fn test_failed_attach_leaves_no_link() {
    let env = mount(catalog());
    env.catalog.make_operation_fail_with(
        "attach_thing_principal",
        RemoteError::InvalidRequest("limit exceeded".to_string()),
    );

    let err = env
        .fs
        .symlink(&format!("/certificates/{}", CERT), &principal_path())
        .unwrap_err();

    assert_eq!(err.errno(), libc::EINVAL);
    assert!(env.names("/things/t1/principals").is_empty());
    assert_eq!(env.fs.getattr(&principal_path()), Err(FsError::NotFound));
}

#[test]
fn test_symlink_target_must_exist_and_match() {
    let env = mount(catalog());

    let missing = env
        .fs
        .symlink("/certificates/nope", &principal_path())
        .unwrap_err();
    assert_eq!(missing, FsError::NoSuchDevice);

    let wrong_kind = env.fs.symlink("/policies/p1", &principal_path()).unwrap_err();
    assert_eq!(wrong_kind.errno(), libc::ENODEV);

    assert_eq!(env.catalog.get_call_count("attach_thing_principal"), 0);
    assert!(env.names("/things/t1/principals").is_empty());
}

#[test]
fn test_symlink_over_existing_entry_is_rejected() {
    let env = mount(catalog().with_principal("t1", CERT));

    let err = env
        .fs
        .symlink(&format!("/certificates/{}", CERT), &principal_path())
        .unwrap_err();
    assert_eq!(err, FsError::AlreadyExists);
    assert_eq!(env.catalog.get_call_count("attach_thing_principal"), 0);
}

#[test]
fn test_symlink_outside_relationship_directory_is_ignored() {
    let env = mount(catalog());

    env.fs.symlink("/things/t1", "/topics/alias").unwrap();
    assert_eq!(env.fs.getattr("/topics/alias"), Err(FsError::NotFound));
}

#[test]
fn test_failed_detach_keeps_link() {
    let env = mount(catalog().with_principal("t1", CERT));
    assert_eq!(env.names("/things/t1/principals"), vec![CERT]);

    env.catalog.make_operation_fail("detach_thing_principal");
    assert_eq!(env.fs.unlink(&principal_path()), Err(FsError::Io));
    assert_eq!(env.names("/things/t1/principals"), vec![CERT]);
    assert_eq!(attached_principals(&env), vec![certificate_arn(CERT)]);

    env.catalog.clear_operation_failures();
    env.fs.unlink(&principal_path()).unwrap();
    assert!(env.names("/things/t1/principals").is_empty());
    assert!(attached_principals(&env).is_empty());
}

#[test]
fn test_certificate_policy_link() {
    let env = mount(catalog());
    let link = format!("/certificates/{}/policies/p1", CERT);

    env.fs.symlink("/policies/p1", &link).unwrap();
    assert_eq!(
        env.catalog.state().attached_policies.get(&certificate_arn(CERT)),
        Some(&vec!["p1".to_string()])
    );
    assert_eq!(env.fs.readlink(&link).unwrap(), "../../../policies/p1");
    assert_eq!(env.read_all(&format!("{}/document", link)), r#"{"Version":"2012-10-17"}"#);

    env.fs.unlink(&link).unwrap();
    assert_eq!(env.catalog.get_call_count("detach_policy"), 1);
    assert!(env.names(&format!("/certificates/{}/policies", CERT)).is_empty());
}

#[test]
fn test_default_version_link() {
    let env = mount(catalog().with_policy_version("p1", "2", r#"{"v":2}"#));
    let link = "/policies/p1/versions/default";

    assert_eq!(env.names("/policies/p1/versions"), vec!["1", "2", "default"]);
    assert_eq!(env.fs.readlink(link).unwrap(), "1");

    env.fs.unlink(link).unwrap();
    assert_eq!(env.catalog.get_call_count("set_default_policy_version"), 0);
    assert_eq!(env.names("/policies/p1/versions"), vec!["1", "2"]);

    env.fs.symlink("2", link).unwrap();
    assert_eq!(env.catalog.state().policies["p1"].default_version, "2");
    assert_eq!(env.fs.readlink(link).unwrap(), "2");
    assert_eq!(env.read_all(link), r#"{"v":2}"#);
}

#[test]
fn test_only_default_link_is_accepted_in_versions() {
    let env = mount(catalog().with_policy_version("p1", "2", "{}"));

    let err = env
        .fs
        .symlink("2", "/policies/p1/versions/latest")
        .unwrap_err();
    assert_eq!(err, FsError::NoSuchDevice);
    assert_eq!(env.catalog.get_call_count("set_default_policy_version"), 0);
}
