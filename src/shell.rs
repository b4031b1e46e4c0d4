//! Remote shell access to the gateway over SSH
//!
//! ssh2 is a blocking library, so every operation runs on the blocking
//! pool. Each operation opens a fresh session: the gateway reboots in the
//! middle of a run, so a held connection would only be something to lose.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use ssh2::Session;

use crate::error::CommissionError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// The three things the provisioner needs from the device's shell.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Probe whether sshd answers and accepts our credentials.
    /// Never errors: unreachable is simply `false`.
    async fn ping(&self) -> bool;

    /// Upload a local file to `remote` via SFTP.
    async fn put(&self, local: &Path, remote: &str) -> Result<(), CommissionError>;

    /// Run `command` under sudo; returns whether it exited 0. With `echo`,
    /// captured output is printed as it would appear on the device console.
    async fn sudo(&self, command: &str, echo: bool) -> Result<bool, CommissionError>;
}

#[derive(Clone)]
pub struct ConduitShell {
    address: String,
    port: u16,
    username: String,
    password: String,
}

impl ConduitShell {
    pub fn new(address: &str, port: u16, username: &str, password: &str) -> Self {
        Self {
            address: address.to_string(),
            port,
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn connect(&self) -> Result<Session, CommissionError> {
        let addr = format!("{}:{}", self.address, self.port);
        let socket_addr = addr.to_socket_addrs()?.next().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("cannot resolve {}", addr),
            )
        })?;

        let stream = TcpStream::connect_timeout(&socket_addr, CONNECT_TIMEOUT)?;
        let mut session = Session::new()?;
        session.set_tcp_stream(stream);
        session.handshake()?;
        session.userauth_password(&self.username, &self.password)?;
        Ok(session)
    }
}

#[async_trait]
impl RemoteShell for ConduitShell {
    async fn ping(&self) -> bool {
        let shell = self.clone();
        tokio::task::spawn_blocking(move || shell.connect().is_ok())
            .await
            .unwrap_or(false)
    }

    async fn put(&self, local: &Path, remote: &str) -> Result<(), CommissionError> {
        let shell = self.clone();
        let local: PathBuf = local.to_path_buf();
        let remote = remote.to_string();

        tokio::task::spawn_blocking(move || {
            let session = shell.connect()?;
            let sftp = session.sftp()?;
            let mut src = std::fs::File::open(&local)?;
            let mut dst = sftp.create(Path::new(&remote))?;
            std::io::copy(&mut src, &mut dst)?;
            Ok(())
        })
        .await
        .map_err(|e| CommissionError::Io(std::io::Error::other(e)))?
    }

    async fn sudo(&self, command: &str, echo: bool) -> Result<bool, CommissionError> {
        let shell = self.clone();
        let command = format!("sudo -S {}", command);

        tokio::task::spawn_blocking(move || {
            let session = shell.connect()?;
            let mut channel = session.channel_session()?;
            channel.exec(&command)?;

            // sudo -S reads the password from stdin
            channel.write_all(shell.password.as_bytes())?;
            channel.write_all(b"\n")?;
            channel.send_eof()?;

            let mut output = String::new();
            channel.read_to_string(&mut output)?;
            channel.wait_close()?;
            let status = channel.exit_status()?;

            if echo {
                for line in output.lines() {
                    println!("{}", line);
                }
            }

            Ok(status == 0)
        })
        .await
        .map_err(|e| CommissionError::Io(std::io::Error::other(e)))?
    }
}
