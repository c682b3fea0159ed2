use crate::common::fixtures::{TEST_TOPIC, default_options, mount, mount_with};
use crate::common::mock_catalog::MockIotCatalog;
use iot_fuse::error::FsError;
use iot_fuse::vfs::TreeOptions;

const PUBLISH: &str = "/topics/sensors_temp/publish";
const MESSAGES: &str = "/topics/sensors_temp/messages";

#[test]
fn test_configured_topics_are_subscribed_and_listed() {
    let env = mount(MockIotCatalog::new());

    assert_eq!(env.transport.subscribed_topics(), vec![TEST_TOPIC.to_string()]);
    assert_eq!(env.names("/topics"), vec!["sensors_temp"]);
    assert_eq!(env.names("/topics/sensors_temp"), vec!["messages", "publish"]);
    assert!(env.names(MESSAGES).is_empty());
}

#[test]
fn test_release_publishes_exactly_once() {
    let env = mount(MockIotCatalog::new());

    env.write_all(PUBLISH, r#"{"temp":22}"#).unwrap();
    assert_eq!(
        env.transport.published(),
        vec![(TEST_TOPIC.to_string(), br#"{"temp":22}"#.to_vec())]
    );

    env.fs.open(PUBLISH).unwrap();
    env.fs.release(PUBLISH).unwrap();
    env.fs.open(PUBLISH).unwrap();
    env.fs.truncate(PUBLISH, 0).unwrap();
    env.fs.release(PUBLISH).unwrap();
    assert_eq!(env.transport.published().len(), 1);
}

#[test]
fn test_publish_buffer_keeps_last_payload() {
    let env = mount(MockIotCatalog::new());

    env.write_all(PUBLISH, "first").unwrap();
    assert_eq!(env.read_all(PUBLISH), "first");
    assert_eq!(env.fs.getattr(PUBLISH).unwrap().size, 5);
}

#[test]
fn test_failed_publish_is_not_retried() {
    let env = mount(MockIotCatalog::new());
    env.transport.make_publish_fail();

    assert_eq!(env.write_all(PUBLISH, "lost"), Err(FsError::Io));
    env.fs.open(PUBLISH).unwrap();
    assert_eq!(env.fs.release(PUBLISH), Ok(()));
    assert!(env.transport.published().is_empty());
}

#[test]
fn test_inbound_messages_appear_under_messages() {
    let env = mount(MockIotCatalog::new());

    assert!(env.transport.deliver(TEST_TOPIC, b"m1"));
    assert!(env.transport.deliver(TEST_TOPIC, b"m2"));

    assert_eq!(env.names(MESSAGES), vec!["000001", "000002"]);
    assert_eq!(env.read_all(&format!("{}/000002", MESSAGES)), "m2");
    assert_eq!(
        env.fs.write(&format!("{}/000001", MESSAGES), 0, b"x"),
        Err(FsError::PermissionDenied)
    );
}

#[test]
fn test_message_retention_evicts_oldest() {
    let options = TreeOptions {
        messages_retained: 2,
        ..default_options()
    };
    let env = mount_with(MockIotCatalog::new(), options);

    for payload in [b"a", b"b", b"c"] {
        env.transport.deliver(TEST_TOPIC, payload);
    }
    assert_eq!(env.names(MESSAGES), vec!["000002", "000003"]);
}

#[test]
fn test_received_message_can_be_removed() {
    let env = mount(MockIotCatalog::new());
    env.transport.deliver(TEST_TOPIC, b"m1");

    env.fs.unlink(&format!("{}/000001", MESSAGES)).unwrap();
    assert!(env.names(MESSAGES).is_empty());
}

#[test]
fn test_unsubscribed_topic_is_not_delivered() {
    let env = mount(MockIotCatalog::new());
    assert!(!env.transport.deliver("other/topic", b"x"));
}
