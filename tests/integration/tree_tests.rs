use crate::common::fixtures::mount;
use crate::common::mock_catalog::MockIotCatalog;
use iot_fuse::catalog::RuleAction;
use iot_fuse::error::FsError;
use iot_fuse::vfs::NodeType;
use std::sync::Arc;

#[test]
fn test_root_lists_fixed_collections() {
    let env = mount(MockIotCatalog::new());

    assert_eq!(
        env.names("/"),
        vec!["certificates", "endpoint", "policies", "rules", "things", "topics"]
    );
    assert_eq!(env.fs.getattr("/").unwrap().kind, NodeType::Directory);
    assert_eq!(env.fs.getattr("/things").unwrap().kind, NodeType::Directory);
}

#[test]
fn test_endpoint_is_read_only_document() {
    let env = mount(MockIotCatalog::new());
    let endpoint = env.catalog.state().endpoint;

    let attr = env.fs.getattr("/endpoint").unwrap();
    assert_eq!(attr.kind, NodeType::File);
    assert_eq!(attr.size, endpoint.len() as u64);
    assert_eq!(env.read_all("/endpoint"), endpoint);

    let err = env.fs.write("/endpoint", 0, b"x").unwrap_err();
    assert_eq!(err, FsError::PermissionDenied);
    assert_eq!(err.errno(), libc::EACCES);
}

#[test]
fn test_things_listing_follows_pages() {
    let mut catalog = MockIotCatalog::new();
    for i in 0..120 {
        catalog = catalog.with_thing(&format!("thing-{:03}", i));
    }
    let env = mount(catalog);

    let names = env.names("/things");
    assert_eq!(names.len(), 120);
    assert_eq!(names[0], "thing-000");
    assert_eq!(names[119], "thing-119");
    assert_eq!(env.catalog.get_call_count("list_things"), 3);
}

#[test]
fn test_thing_directory_layout() {
    let env = mount(MockIotCatalog::new().with_thing("t1"));

    assert_eq!(env.names("/things/t1"), vec!["principals", "state"]);
    assert_eq!(
        env.fs.getattr("/things/t1/principals").unwrap().kind,
        NodeType::Directory
    );
}

#[test]
fn test_path_depth_bound() {
    let env = mount(MockIotCatalog::new());

    let within = format!("/{}", ["topics/.."; 32].join("/"));
    assert_eq!(env.fs.getattr(&within).unwrap().kind, NodeType::Directory);

    let beyond = format!("{}/topics", within);
    assert_eq!(env.fs.getattr(&beyond), Err(FsError::NotFound));
}

#[test]
fn test_lookup_errors() {
    let env = mount(MockIotCatalog::new().with_thing("t1"));

    assert_eq!(env.fs.getattr("/missing"), Err(FsError::NotFound));
    assert_eq!(env.fs.getattr("/endpoint/child"), Err(FsError::NotADirectory));
    assert_eq!(env.fs.getattr("/things/t2/state"), Err(FsError::NotFound));
    assert_eq!(env.fs.getattr("relative/path"), Err(FsError::NotFound));
}

#[test]
fn test_reconcile_keeps_identity_of_surviving_children() {
    let env = mount(MockIotCatalog::new().with_thing("t1").with_thing("t2"));
    assert_eq!(env.names("/things"), vec!["t1", "t2"]);
    let t1 = env.fs.resolve("/things/t1", false).unwrap();

    env.catalog.remove_thing("t2");
    env.catalog.add_thing("t3");
    env.fs.resolve("/things", false).unwrap().invalidate();

    assert_eq!(env.names("/things"), vec!["t1", "t3"]);
    let t1_again = env.fs.resolve("/things/t1", false).unwrap();
    assert!(Arc::ptr_eq(&t1, &t1_again));
    assert_eq!(env.fs.getattr("/things/t2"), Err(FsError::NotFound));
}

#[test]
fn test_rule_layout_and_actions() {
    let actions = vec![
        RuleAction::new("s3").field("bucket", "first"),
        RuleAction::new("lambda").field("function-arn", "arn:lambda"),
        RuleAction::new("s3").field("bucket", "second"),
    ];
    let env = mount(MockIotCatalog::new().with_rule(
        "r1",
        "SELECT * FROM 'sensors/#'",
        actions,
    ));

    assert_eq!(env.names("/rules"), vec!["r1"]);
    assert_eq!(
        env.names("/rules/r1"),
        vec!["actions", "arn", "rule-pattern", "sql", "status"]
    );
    assert_eq!(env.read_all("/rules/r1/sql"), "SELECT * FROM 'sensors/#'");
    assert_eq!(env.read_all("/rules/r1/status"), "ACTIVE");
    assert_eq!(env.names("/rules/r1/actions"), vec!["lambda", "s3", "s3-2"]);
    assert_eq!(env.read_all("/rules/r1/actions/s3-2/bucket"), "second");
}
