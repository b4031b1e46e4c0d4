//! conduit-commission - set up ssh and stage firmware on a Conduit AEP gateway
//!
//! Sets the admin credentials through the pre-login commissioning API,
//! enables ssh (rebooting the gateway), waits out the reboot, copies the
//! firmware image over and launches the upgrade. The upgrade itself is
//! launched, not awaited.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use conduit_commission::aep::AepClient;
use conduit_commission::config::{FileConfig, Options};
use conduit_commission::http::HttpClient;
use conduit_commission::provision::Provisioner;
use conduit_commission::shell::ConduitShell;

#[derive(Parser, Debug)]
#[command(name = "conduit-commission")]
#[command(about = "Set up ssh and stage firmware on a Conduit AEP gateway", long_about = None)]
struct Args {
    /// IP address of the conduit being commissioned
    #[arg(short = 'A', long)]
    address: Option<String>,

    /// Username to use to connect
    #[arg(short = 'U', long)]
    username: Option<String>,

    /// Password to use to connect; there is no default
    #[arg(short = 'P', long)]
    password: String,

    /// Forcibly update the ssh settings and reboot, even if already set
    #[arg(short, long)]
    force: bool,

    /// Don't make changes, just report what would be done
    #[arg(short = 'n', long, alias = "dry-run")]
    noop: bool,

    /// Assume username and password are already set
    #[arg(short = 'S', long)]
    skip_password: bool,

    /// Expected product type, normally mtcdt or mtcap; abort on mismatch
    #[arg(long)]
    product_type: Option<String>,

    /// Expected full product id, normally mtcdt-l4n1-247a or similar; abort on mismatch
    #[arg(long)]
    product_id: Option<String>,

    /// Path to the image to stage; use {product_type} to insert the discovered type
    #[arg(long = "image")]
    image: Option<String>,

    /// How long to wait for reboots, in seconds
    #[arg(long)]
    reboot_time: Option<u64>,

    /// Print verbose messages
    #[arg(short, long)]
    verbose: bool,

    /// Print debugging messages
    #[arg(short, long)]
    debug: bool,

    /// Config file path (default: config.toml)
    #[arg(short, long)]
    config: Option<String>,
}

fn resolve_options(args: Args, cfg: FileConfig) -> Options {
    let log_level = if args.debug {
        "debug".to_string()
    } else if args.verbose {
        "info".to_string()
    } else {
        cfg.logging.level
    };

    Options {
        address: args.address.unwrap_or(cfg.gateway.address),
        username: args.username.unwrap_or(cfg.gateway.username),
        password: args.password,
        force: args.force,
        noop: args.noop,
        skip_password: args.skip_password,
        product_type: args.product_type,
        product_id: args.product_id,
        image_pattern: args.image.unwrap_or(cfg.gateway.image),
        reboot_time: Duration::from_secs(args.reboot_time.unwrap_or(cfg.gateway.reboot_time)),
        ssh_port: cfg.gateway.ssh_port,
        http: cfg.http,
        log_level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::parse_from([&["conduit-commission"], argv].concat())
    }

    #[test]
    fn cli_flags_beat_config_file_values() {
        let cfg: FileConfig = toml::from_str(
            r#"
            [gateway]
            address = "10.0.0.9"
            reboot_time = 120
            "#,
        )
        .unwrap();
        let opts = resolve_options(
            args(&["-P", "pw", "-A", "192.168.5.5", "--reboot-time", "60"]),
            cfg,
        );
        assert_eq!(opts.address, "192.168.5.5");
        assert_eq!(opts.reboot_time, Duration::from_secs(60));
    }

    #[test]
    fn config_file_values_beat_builtin_defaults() {
        let cfg: FileConfig = toml::from_str(
            r#"
            [gateway]
            address = "10.0.0.9"
            "#,
        )
        .unwrap();
        let opts = resolve_options(args(&["-P", "pw"]), cfg);
        assert_eq!(opts.address, "10.0.0.9");
        assert_eq!(opts.username, "mtadm");
        assert_eq!(opts.reboot_time, Duration::from_secs(300));
    }

    #[test]
    fn verbosity_flags_pick_the_log_level() {
        let opts = resolve_options(args(&["-P", "pw", "-d"]), FileConfig::default());
        assert_eq!(opts.log_level, "debug");
        let opts = resolve_options(args(&["-P", "pw", "-v"]), FileConfig::default());
        assert_eq!(opts.log_level, "info");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = FileConfig::load(args.config.as_deref())?;
    let options = resolve_options(args, cfg);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&options.log_level)),
        )
        .init();

    tracing::info!("conduit-commission v{}", env!("CARGO_PKG_VERSION"));

    let http = HttpClient::new(
        Duration::from_secs(options.http.timeout),
        Duration::from_secs(options.http.connect_timeout),
    )?;
    let api = AepClient::new(http, &options.address, &options.username, &options.password);
    let shell = ConduitShell::new(
        &options.address,
        options.ssh_port,
        &options.username,
        &options.password,
    );

    let mut provisioner = Provisioner::new(api, shell, options);
    provisioner.run().await.context("commissioning failed")?;

    tracing::info!("commissioning complete");
    Ok(())
}
