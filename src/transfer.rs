// src/transfer.rs

//! Secure artifact transfer
//!
//! This module provides:
//! - The `SecureTransfer` trait the reconciler is constructed against
//! - `ScpTransfer`, the production implementation over an ssh2 session
//!
//! A session lives only for the duration of one upload: it is opened right
//! before the copy and released on every exit path (explicit disconnect on
//! success, drop on failure).

use crate::error::{Error, Result};
use ssh2::{CheckResult, KnownHostFileKind, Session};
use std::fs::File;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Copies a local artifact to a path on the remote host
pub trait SecureTransfer {
    fn upload(&self, local: &Path, remote: &str) -> Result<()>;
}

impl<T: SecureTransfer + ?Sized> SecureTransfer for &T {
    fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        (**self).upload(local, remote)
    }
}

/// How to treat a host key that is not in the known-hosts file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// Accept and persist keys of previously unseen hosts, merged with any
    /// already-known keys. A changed key is still fatal.
    #[default]
    TrustOnFirstUse,
    /// Any host not present in the known-hosts file is fatal.
    Strict,
}

/// SSH connection parameters for one target host
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub timeout: Duration,
    pub host_key_policy: HostKeyPolicy,
}

/// SCP uploader over password-authenticated SSH
pub struct ScpTransfer {
    config: SshConfig,
}

impl ScpTransfer {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    fn connect(&self) -> Result<Session> {
        let cfg = &self.config;
        let addr = (cfg.host.as_str(), cfg.port)
            .to_socket_addrs()
            .map_err(|e| Error::Connection(format!("cannot resolve {}: {}", cfg.host, e)))?
            .next()
            .ok_or_else(|| Error::Connection(format!("no address found for {}", cfg.host)))?;

        debug!("connecting to {} (timeout {:?})", addr, cfg.timeout);
        let tcp = TcpStream::connect_timeout(&addr, cfg.timeout)
            .map_err(|e| Error::Connection(e.to_string()))?;

        let mut session =
            Session::new().map_err(|e| Error::Connection(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(cfg.timeout.as_millis() as u32);
        session
            .handshake()
            .map_err(|e| Error::Connection(e.to_string()))?;

        self.verify_host_key(&session)?;

        session
            .userauth_password(&cfg.user, &cfg.password)
            .map_err(|_| Error::Authentication)?;
        if !session.authenticated() {
            return Err(Error::Authentication);
        }

        Ok(session)
    }

    /// Check the server key against the user's known-hosts file
    ///
    /// Under `TrustOnFirstUse` an unseen host is trusted and its key appended
    /// to the file; a key that contradicts a stored one is fatal under both
    /// policies.
    fn verify_host_key(&self, session: &Session) -> Result<()> {
        let cfg = &self.config;
        let mut known = session
            .known_hosts()
            .map_err(|e| Error::HostKey(e.to_string()))?;

        let known_hosts_file = known_hosts_path();
        if let Some(path) = &known_hosts_file {
            if path.exists() {
                // Merge already-known keys; an unreadable file just means
                // nothing is known yet
                let _ = known.read_file(path, KnownHostFileKind::OpenSSH);
            }
        }

        let (key, key_type) = session
            .host_key()
            .ok_or_else(|| Error::HostKey("server did not present a host key".to_string()))?;

        match known.check_port(&cfg.host, cfg.port, key) {
            CheckResult::Match => Ok(()),
            CheckResult::Mismatch => Err(Error::HostKey(format!(
                "host key for {} does not match the known-hosts entry",
                cfg.host
            ))),
            CheckResult::NotFound | CheckResult::Failure => match cfg.host_key_policy {
                HostKeyPolicy::TrustOnFirstUse => {
                    info!("trusting new host key for {}", cfg.host);
                    known
                        .add(&cfg.host, key, "", key_type.into())
                        .map_err(|e| Error::HostKey(e.to_string()))?;
                    if let Some(path) = &known_hosts_file {
                        if let Err(e) = known.write_file(path, KnownHostFileKind::OpenSSH) {
                            warn!("could not persist host key to {}: {}", path.display(), e);
                        }
                    }
                    Ok(())
                }
                HostKeyPolicy::Strict => Err(Error::HostKey(format!(
                    "no known host key for {} and strict checking is enabled",
                    cfg.host
                ))),
            },
        }
    }
}

impl SecureTransfer for ScpTransfer {
    fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        let session = self.connect()?;

        let mut source = File::open(local).map_err(|e| {
            Error::Transfer(format!("cannot read local artifact {}: {}", local.display(), e))
        })?;
        let size = source
            .metadata()
            .map_err(|e| Error::Transfer(e.to_string()))?
            .len();

        info!(
            "uploading {} ({} bytes) to {}:{}",
            local.display(),
            size,
            self.config.host,
            remote
        );

        let mut channel = session
            .scp_send(Path::new(remote), 0o644, size, None)
            .map_err(|e| Error::Transfer(e.to_string()))?;
        io::copy(&mut source, &mut channel).map_err(|e| Error::Transfer(e.to_string()))?;
        channel.send_eof().map_err(|e| Error::Transfer(e.to_string()))?;
        channel.wait_eof().map_err(|e| Error::Transfer(e.to_string()))?;
        channel.close().map_err(|e| Error::Transfer(e.to_string()))?;
        channel.wait_close().map_err(|e| Error::Transfer(e.to_string()))?;

        // Dropping the session also closes it, but say goodbye properly on
        // the success path
        let _ = session.disconnect(None, "file transfer complete", None);
        Ok(())
    }
}

fn known_hosts_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| Path::new(&home).join(".ssh").join("known_hosts"))
}
