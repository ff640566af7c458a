//! Test doubles for building clients over in-memory transports.

use super::*;
use camino::{Utf8Path, Utf8PathBuf};
use geohub_client::SharedTransport;
use geohub_core::test_support::RecordingSleeper;
use std::{cell::RefCell, sync::Arc};
use tempfile::TempDir;

/// Builds clients over a fixed transport and records the configs it saw.
pub(super) struct FakeClientBuilder {
    transport: SharedTransport,
    configs: RefCell<Vec<ClientConfig>>,
}

impl FakeClientBuilder {
    pub(super) fn new(transport: SharedTransport) -> Self {
        Self {
            transport,
            configs: RefCell::new(Vec::new()),
        }
    }

    pub(super) fn configs(&self) -> Vec<ClientConfig> {
        self.configs.borrow().clone()
    }
}

impl ClientBuilder for FakeClientBuilder {
    fn build(&self, config: ClientConfig) -> Result<HubClient, CliError> {
        let client = HubClient::with_transport(
            &config,
            Arc::clone(&self.transport),
            Arc::new(RecordingSleeper::default()),
        );
        self.configs.borrow_mut().push(config);
        Ok(client)
    }
}

/// Builder that must never be reached.
pub(super) struct UnreachableBuilder;

impl ClientBuilder for UnreachableBuilder {
    fn build(&self, _config: ClientConfig) -> Result<HubClient, CliError> {
        panic!("the command should fail before building a client");
    }
}

pub(super) fn workspace() -> (TempDir, Utf8PathBuf) {
    let tmp = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
    (tmp, root)
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    std::fs::write(path.as_std_path(), contents).expect("write fixture");
}
