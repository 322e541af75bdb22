//! SFTP implementation of the recording file server seam
//!
//! Authenticates with a password or a private key file per the
//! `recording_server` configuration and exposes stat + streamed reads to
//! the fetcher. All transport errors are folded into `std::io::Error` at
//! the seam boundary; the fetcher owns retry and timeout policy.

use crate::services::recording_fetcher::{RemoteFileServer, RemoteSession};
use async_trait::async_trait;
use callscribe_common::config::RecordingServerConfig;
use russh::client;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::StatusCode;
use std::io;
use std::sync::Arc;
use tokio::io::AsyncRead;

fn io_err(e: impl std::error::Error + Send + Sync + 'static) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

/// Accepts any server host key. The recording server lives on a private
/// network segment; host key pinning is handled at deployment level.
struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// SFTP-backed [`RemoteFileServer`]
pub struct SftpRecordingServer {
    config: RecordingServerConfig,
}

impl SftpRecordingServer {
    pub fn new(config: RecordingServerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RemoteFileServer for SftpRecordingServer {
    async fn connect(&self) -> io::Result<Box<dyn RemoteSession>> {
        let ssh_config = Arc::new(client::Config::default());
        let addr = (self.config.host.as_str(), self.config.port);

        let mut handle = client::connect(ssh_config, addr, ClientHandler)
            .await
            .map_err(io_err)?;

        let authenticated = if let Some(password) = &self.config.password {
            handle
                .authenticate_password(&self.config.username, password)
                .await
                .map_err(io_err)?
        } else if let Some(key_path) = &self.config.key_path {
            let key_pair = russh_keys::load_secret_key(key_path, None).map_err(io_err)?;
            handle
                .authenticate_publickey(&self.config.username, Arc::new(key_pair))
                .await
                .map_err(io_err)?
        } else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "recording server config has neither password nor key_path",
            ));
        };

        if !authenticated {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!(
                    "authentication rejected for {}@{}",
                    self.config.username, self.config.host
                ),
            ));
        }

        let channel = handle.channel_open_session().await.map_err(io_err)?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(io_err)?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(io_err)?;

        tracing::debug!(
            host = %self.config.host,
            user = %self.config.username,
            "SFTP session established"
        );

        Ok(Box::new(SftpRemoteSession { handle, sftp }))
    }
}

struct SftpRemoteSession {
    handle: client::Handle<ClientHandler>,
    sftp: SftpSession,
}

#[async_trait]
impl RemoteSession for SftpRemoteSession {
    async fn stat(&mut self, path: &str) -> io::Result<Option<u64>> {
        match self.sftp.metadata(path).await {
            Ok(attrs) => Ok(Some(attrs.size.unwrap_or(0))),
            Err(russh_sftp::client::error::Error::Status(status))
                if status.status_code == StatusCode::NoSuchFile =>
            {
                Ok(None)
            }
            Err(e) => Err(io_err(e)),
        }
    }

    async fn open_read(&mut self, path: &str) -> io::Result<Box<dyn AsyncRead + Send + Unpin>> {
        let file = self.sftp.open(path).await.map_err(io_err)?;
        Ok(Box::new(file))
    }

    async fn close(&mut self) -> io::Result<()> {
        self.sftp.close().await.map_err(io_err)?;
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(io_err)?;
        Ok(())
    }
}
