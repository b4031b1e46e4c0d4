//! The commissioning sequence
//!
//! Five ordered phases take a gateway from "unknown state" to
//! "ssh-enabled, firmware staged": ensure credentials, login + revert,
//! discover identity, reconcile ssh, stage firmware. The first failing
//! phase aborts the run. There is no rollback; phase 2 reverts to the
//! device's last saved state, which is what makes re-running after a
//! partial failure safe.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;

use crate::aep::ManagementApi;
use crate::config::Options;
use crate::error::CommissionError;
use crate::models::{CommissioningAnswer, ProductIdentity, SshSettings, SystemInfo};
use crate::shell::RemoteShell;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const REMOTE_IMAGE_PATH: &str = "/tmp/firmware.bin";
const UPGRADE_COMMAND: &str = "/usr/sbin/mlinux-firmware-upgrade /tmp/firmware.bin";

/// True when the ssh settings differ from the commissioning target:
/// enabled, LAN only, port 22.
pub fn ssh_needs_change(ssh: &SshSettings) -> bool {
    !(ssh.enabled && ssh.lan && !ssh.wan && ssh.port == 22)
}

/// Substitute the discovered product type into the image path pattern.
pub fn resolve_image_path(pattern: &str, product_type: &str) -> PathBuf {
    PathBuf::from(pattern.replace("{product_type}", product_type))
}

pub struct Provisioner<A, S> {
    api: A,
    shell: S,
    options: Options,
    identity: Option<ProductIdentity>,
}

impl<A: ManagementApi, S: RemoteShell> Provisioner<A, S> {
    pub fn new(api: A, shell: S, options: Options) -> Self {
        Self {
            api,
            shell,
            options,
            identity: None,
        }
    }

    /// Give the collaborators back, mainly so tests can inspect them.
    pub fn into_parts(self) -> (A, S) {
        (self.api, self.shell)
    }

    /// Run the whole sequence. The firmware upgrade is launched, not
    /// awaited; success means "upgrade started", not "upgrade done".
    pub async fn run(&mut self) -> Result<(), CommissionError> {
        if !self.options.skip_password {
            self.ensure_credentials().await?;
        }
        self.login_and_revert().await?;
        self.discover_identity().await?;
        self.reconcile_ssh().await?;
        self.stage_firmware().await
    }

    /// Phase 1: set the admin username and password through the pre-login
    /// commissioning handshake, unless the device already refuses the
    /// endpoint (then it is already commissioned and there is nothing to do).
    async fn ensure_credentials(&mut self) -> Result<(), CommissionError> {
        let commissioning = match self.api.get_commissioning().await {
            Ok(state) => state,
            Err(err) => {
                tracing::info!(
                    "commissioning endpoint unavailable ({}), assuming credentials are set",
                    err
                );
                return Ok(());
            }
        };

        if self.options.noop {
            tracing::info!("dry run: not setting username and password");
            return Ok(());
        }

        let username = self.options.username.clone();
        let password = self.options.password.clone();
        let mut aas_id = commissioning.aas_id.unwrap_or_default();

        // set the username, set the password, then confirm the password
        for answer_value in ["", password.as_str(), password.as_str()] {
            let answer = CommissioningAnswer {
                username: username.clone(),
                aas_id: aas_id.clone(),
                aas_answer: answer_value.to_string(),
            };

            let state = self.api.set_commissioning(&answer).await.map_err(|err| {
                tracing::warn!("set commissioning failed: {}", err);
                err
            })?;

            // the challenge id must ride through every round
            if let Some(id) = state.aas_id {
                aas_id = id;
            }

            match state.aas_type.as_deref() {
                Some("error") => {
                    let msg = state.aas_msg.unwrap_or_default();
                    tracing::error!("commissioning error: {}", msg);
                    return Err(CommissionError::Protocol(format!(
                        "commissioning error: {}",
                        msg
                    )));
                }
                Some("info") => {
                    tracing::warn!("{}", state.aas_msg.unwrap_or_default());
                }
                _ => {}
            }
        }

        tracing::info!("username and password successfully set");
        Ok(())
    }

    /// Phase 2: authenticate, then drop any uncommitted configuration so
    /// the run starts from the device's last saved state.
    async fn login_and_revert(&mut self) -> Result<(), CommissionError> {
        self.api.login().await?;

        self.api.revert().await.map_err(|err| {
            tracing::error!("revert failed: {}", err);
            err
        })?;
        Ok(())
    }

    /// Phase 3: read the device's product identity and hold it against the
    /// operator's expectations. A mismatch here is the last line of defense
    /// against flashing the wrong image onto the wrong hardware class.
    async fn discover_identity(&mut self) -> Result<(), CommissionError> {
        let doc = self.api.system().await.map_err(|err| {
            tracing::error!("could not read system object: {}", err);
            err
        })?;

        let system: SystemInfo = serde_json::from_value(doc)
            .map_err(|err| CommissionError::Protocol(format!("malformed system object: {}", err)))?;

        let product_id = system.product_id.ok_or_else(|| {
            tracing::error!("no productId in system object");
            CommissionError::Protocol("system object has no productId".into())
        })?;

        let identity = ProductIdentity::from_product_id(&product_id);
        tracing::info!(
            "Conduit ID: {}; Conduit type: {}",
            identity.product_id,
            identity.product_type
        );

        if let Some(expected) = &self.options.product_type {
            if expected.to_lowercase() != identity.product_type {
                tracing::error!(
                    "product type doesn't match: {} != {}",
                    expected,
                    identity.product_type
                );
                return Err(CommissionError::IdentityMismatch {
                    kind: "type",
                    expected: expected.clone(),
                    actual: identity.product_type,
                });
            }
        }

        if let Some(expected) = &self.options.product_id {
            if expected.to_lowercase() != identity.product_id {
                tracing::error!(
                    "product id doesn't match: {} != {}",
                    expected,
                    identity.product_id
                );
                return Err(CommissionError::IdentityMismatch {
                    kind: "id",
                    expected: expected.clone(),
                    actual: identity.product_id,
                });
            }
        }

        self.identity = Some(identity);
        Ok(())
    }

    /// Phase 4: bring the ssh settings to the target policy. A compliant
    /// device is left alone unless --force; an actual change is followed by
    /// save + restart, then a wait for ssh to *disappear*, which is the only
    /// signal the device gives that the reboot has really started.
    async fn reconcile_ssh(&mut self) -> Result<(), CommissionError> {
        let mut doc = self.api.remote_access().await.map_err(|err| {
            tracing::error!("could not read remoteAccess object: {}", err);
            err
        })?;

        tracing::debug!("remoteAccess: {}", doc);

        let ssh: SshSettings = match doc.get("ssh") {
            Some(ssh_doc) => serde_json::from_value(ssh_doc.clone()).map_err(|err| {
                CommissionError::Protocol(format!("malformed remoteAccess.ssh: {}", err))
            })?,
            None => {
                return Err(CommissionError::Protocol(
                    "remoteAccess has no ssh object".into(),
                ))
            }
        };

        let mut change_needed = ssh_needs_change(&ssh);
        if !change_needed {
            tracing::info!("ssh already enabled");
            if self.options.force {
                change_needed = true;
            }
        }

        if !change_needed {
            return Ok(());
        }

        // write the target settings back into the document; sibling keys
        // under ssh and remoteAccess stay untouched
        let ssh_doc = &mut doc["ssh"];
        ssh_doc["enabled"] = Value::Bool(true);
        ssh_doc["lan"] = Value::Bool(true);
        ssh_doc["wan"] = Value::Bool(false);
        ssh_doc["port"] = Value::from(22);

        if self.options.noop {
            tracing::info!("skipping update of remoteAccess");
            return Ok(());
        }

        self.api.set_remote_access(&doc).await.map_err(|err| {
            tracing::error!("failed to set ssh in remoteAccess: {}", err);
            err
        })?;

        self.api.save().await.map_err(|err| {
            tracing::error!("failed to save state: {}", err);
            err
        })?;

        self.api.restart().await.map_err(|err| {
            tracing::error!("failed to trigger a reboot: {}", err);
            err
        })?;

        // wait for ping to fail, confirming the reboot has actually started
        let mut pings = 1u32;
        while self.shell.ping().await {
            tokio::time::sleep(POLL_INTERVAL).await;
            pings += 1;
        }
        tracing::info!("ssh unavailable on ping {}", pings);

        Ok(())
    }

    /// Phase 5: wait out the reboot, copy the image over, launch the
    /// upgrade. Launch only; the gateway flashes and reboots on its own.
    async fn stage_firmware(&mut self) -> Result<(), CommissionError> {
        if !self.check_ssh().await {
            if self.options.noop {
                tracing::info!("dry run: gateway not reachable over ssh, stopping here");
                return Ok(());
            }
            tracing::info!(
                "gateway is rebooting; waiting for ssh to come back (normally two to three minutes)"
            );
            self.await_ssh_available().await?;
        }

        self.copy_image().await?;
        self.apply_image().await
    }

    async fn check_ssh(&self) -> bool {
        if self.shell.ping().await {
            tracing::info!("ssh to {} is working", self.options.address);
            true
        } else {
            tracing::info!("ssh to {} is not working", self.options.address);
            false
        }
    }

    /// Poll once per second until ssh answers or the reboot budget runs out.
    async fn await_ssh_available(&self) -> Result<(), CommissionError> {
        let begin = tokio::time::Instant::now();
        while begin.elapsed() < self.options.reboot_time {
            print!(".");
            let _ = std::io::Write::flush(&mut std::io::stdout());
            if self.shell.ping().await {
                println!();
                tracing::info!("ssh available after {:?}", begin.elapsed());
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        println!();
        Err(CommissionError::RebootTimeout(self.options.reboot_time))
    }

    fn image_path(&self) -> PathBuf {
        let product_type = self
            .identity
            .as_ref()
            .map(|i| i.product_type.as_str())
            .unwrap_or_default();
        resolve_image_path(&self.options.image_pattern, product_type)
    }

    async fn copy_image(&self) -> Result<(), CommissionError> {
        let image = self.image_path();
        if !image.exists() {
            tracing::error!("image file not found: {}", image.display());
            return Err(CommissionError::ImageNotFound(image));
        }

        if self.options.noop {
            tracing::info!(
                "dry run: would upload {} to {}",
                image.display(),
                REMOTE_IMAGE_PATH
            );
            return Ok(());
        }

        tracing::info!("put image file: {}", image.display());
        self.shell.put(&image, REMOTE_IMAGE_PATH).await.map_err(|err| {
            tracing::error!("failed to put image file: {}", err);
            err
        })
    }

    async fn apply_image(&self) -> Result<(), CommissionError> {
        if self.options.noop {
            tracing::info!("dry run: would launch the firmware upgrade");
            return Ok(());
        }

        tracing::info!("launching the firmware upgrade");
        if self.shell.sudo(UPGRADE_COMMAND, true).await? {
            Ok(())
        } else {
            Err(CommissionError::CommandFailed(UPGRADE_COMMAND.into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ssh(enabled: bool, lan: bool, wan: bool, port: u16) -> SshSettings {
        serde_json::from_value(json!({
            "enabled": enabled, "lan": lan, "wan": wan, "port": port
        }))
        .unwrap()
    }

    #[test]
    fn compliant_settings_need_no_change() {
        assert!(!ssh_needs_change(&ssh(true, true, false, 22)));
    }

    #[test]
    fn every_deviation_needs_change() {
        assert!(ssh_needs_change(&ssh(false, true, false, 22)));
        assert!(ssh_needs_change(&ssh(true, false, false, 22)));
        assert!(ssh_needs_change(&ssh(true, true, true, 22)));
        assert!(ssh_needs_change(&ssh(true, true, false, 2222)));
        assert!(ssh_needs_change(&ssh(false, false, true, 8022)));
    }

    #[test]
    fn image_path_substitutes_product_type() {
        assert_eq!(
            resolve_image_path("/images/ttni-base-image-{product_type}-upgrade.bin", "mtcdt"),
            PathBuf::from("/images/ttni-base-image-mtcdt-upgrade.bin")
        );
    }

    #[test]
    fn image_path_without_placeholder_is_verbatim() {
        assert_eq!(
            resolve_image_path("/tmp/firmware.bin", "mtcdt"),
            PathBuf::from("/tmp/firmware.bin")
        );
    }
}
