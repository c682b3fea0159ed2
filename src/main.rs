//! Mount the AWS IoT catalog as a FUSE filesystem

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use iot_fuse::catalog::aws_client::AwsIotCatalog;
use iot_fuse::config::Settings;
use iot_fuse::dispatcher::Dispatcher;
use iot_fuse::fuse::{IotFuse, mount};
use iot_fuse::transport::retained::RetainedMessageTransport;
use iot_fuse::vfs::{IotTree, Remote};
use log::{error, info};
use std::path::Path;
use std::sync::Arc;

fn validate_mountpoint(mountpoint: &str) -> Result<()> {
    let mount_path = Path::new(mountpoint);
    if !mount_path.exists() {
        return Err(anyhow::anyhow!("Mount point does not exist: {}", mountpoint));
    }
    if !mount_path.is_dir() {
        return Err(anyhow::anyhow!("Mount point is not a directory: {}", mountpoint));
    }
    Ok(())
}

fn unmount(mountpoint: &str) -> std::io::Result<std::process::Output> {
    std::process::Command::new("fusermount")
        .arg("-u")
        .arg(mountpoint)
        .output()
}

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("AWS IoT FUSE Filesystem")
        .version("1.0")
        .about("Mount the AWS IoT catalog as a FUSE filesystem")
        .arg(
            Arg::new("mountpoint")
                .short('m')
                .long("mountpoint")
                .value_name("PATH")
                .help("Mount point path")
                .required(true)
                .num_args(1),
        )
        .arg(
            Arg::new("region")
                .short('r')
                .long("region")
                .value_name("REGION")
                .help("AWS region, overrides the settings file")
                .num_args(1),
        )
        .arg(
            Arg::new("topic")
                .short('t')
                .long("topic")
                .value_name("TOPIC")
                .help("Topic to mirror under /topics, may be repeated")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Settings file path")
                .num_args(1),
        )
        .get_matches();

    let mountpoint = matches
        .get_one::<String>("mountpoint")
        .context("Missing mount point")?
        .clone();

    let mut settings = match matches.get_one::<String>("config") {
        Some(path) => Settings::load_from(Path::new(path)),
        None => Settings::load(),
    }
    .context("Failed to load settings")?;
    if let Some(region) = matches.get_one::<String>("region") {
        settings.region = Some(region.clone());
    }
    if let Some(topics) = matches.get_many::<String>("topic") {
        settings.topics.extend(topics.cloned());
    }

    info!("Starting AWS IoT FUSE filesystem");
    info!("Mount point: {}", mountpoint);
    info!("Topics: {:?}", settings.topics);

    // Clears stale mounts such as "Transport endpoint is not connected".
    let _ = unmount(&mountpoint);
    validate_mountpoint(&mountpoint)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    let (catalog, transport) = runtime.block_on(async {
        let catalog = AwsIotCatalog::connect(settings.region.clone())
            .await
            .context("Failed to connect to AWS IoT")?;
        let transport = RetainedMessageTransport::new(
            catalog.data_client(),
            settings.publish_retain,
            settings.poll_interval(),
        );
        Ok::<_, anyhow::Error>((catalog, transport))
    })?;

    let remote = Remote::new(
        Arc::new(catalog),
        Arc::new(transport),
        runtime.handle().clone(),
    );
    let tree = IotTree::new(remote, settings.tree_options());
    let dispatcher = Dispatcher::new(tree.root().clone()).with_mount_point(mountpoint.clone());

    let mountpoint_for_shutdown = mountpoint.clone();
    ctrlc::set_handler(move || {
        info!("Received interrupt signal, shutting down...");
        match unmount(&mountpoint_for_shutdown) {
            Ok(_) => info!("Filesystem unmounted successfully"),
            Err(e) => error!("Failed to unmount filesystem: {}", e),
        }
    })
    .context("Error setting Ctrl-C handler")?;

    mount(IotFuse::new(dispatcher), &mountpoint)?;
    info!("Filesystem unmounted, exiting");
    Ok(())
}
