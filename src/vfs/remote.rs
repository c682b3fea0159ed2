//! Bridge from synchronous filesystem calls to the async collaborators

use crate::catalog::IotCatalog;
use crate::error::{FsError, FsResult, RemoteError};
use crate::transport::MessageTransport;
use log::warn;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;

#[derive(Clone)]
pub struct Remote {
    catalog: Arc<dyn IotCatalog>,
    transport: Arc<dyn MessageTransport>,
    runtime: Handle,
}

impl Remote {
    pub fn new(
        catalog: Arc<dyn IotCatalog>,
        transport: Arc<dyn MessageTransport>,
        runtime: Handle,
    ) -> Self {
        Self {
            catalog,
            transport,
            runtime,
        }
    }

    pub fn catalog(&self) -> &dyn IotCatalog {
        self.catalog.as_ref()
    }

    pub fn transport(&self) -> &dyn MessageTransport {
        self.transport.as_ref()
    }

    /// Block the calling thread until `future` completes.
    ///
    /// Filesystem driver threads are outside the runtime and block on the
    /// stored handle. Runtime worker threads must belong to a multi-threaded
    /// runtime so they can step aside with `block_in_place`.
    pub fn run<F: Future>(&self, future: F) -> F::Output {
        match Handle::try_current() {
            Ok(handle) => tokio::task::block_in_place(|| handle.block_on(future)),
            Err(_) => self.runtime.block_on(future),
        }
    }

    /// Run a catalog call and translate its failure for the filesystem.
    pub fn call<T, F>(&self, operation: &str, future: F) -> FsResult<T>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        self.run(future).map_err(|err| {
            warn!("{} failed: {}", operation, err);
            FsError::from(err)
        })
    }
}
