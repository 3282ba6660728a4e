// src/main.rs

use clap::Parser;
use nfvpkg::api::HttpManagementClient;
use nfvpkg::reconcile::{DesiredState, PackageSpec, Reconciler};
use nfvpkg::report::Report;
use nfvpkg::transfer::{HostKeyPolicy, ScpTransfer, SshConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// NFVIS exposes its management SSH on a non-default port
const DEFAULT_SSH_PORT: u16 = 22222;

#[derive(Parser)]
#[command(name = "nfvpkg")]
#[command(author, version, about = "Idempotent VM image package reconciliation for Cisco NFVIS hosts", long_about = None)]
struct Cli {
    /// NFVIS host to reconcile
    #[arg(long)]
    host: String,

    /// Management API and SSH user
    #[arg(long)]
    user: String,

    /// Password for the user (can also be set via NFVPKG_PASSWORD)
    #[arg(long, env = "NFVPKG_PASSWORD", hide_env_values = true)]
    password: String,

    /// Image name to reconcile
    #[arg(long)]
    name: String,

    /// Local artifact path, required when state is 'present'
    #[arg(long)]
    file: Option<PathBuf>,

    /// Desired state of the image ('present' or 'absent')
    #[arg(long, default_value = "present")]
    state: DesiredState,

    /// Upload directory on the host
    #[arg(long, default_value = "/data/intdatastore/uploads")]
    dest: String,

    /// SSH port used for the artifact upload
    #[arg(long, default_value_t = DEFAULT_SSH_PORT)]
    ssh_port: u16,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Report what would change without touching the host
    #[arg(long)]
    check: bool,

    /// Refuse hosts whose key is not already in known_hosts
    /// (default is trust-on-first-use)
    #[arg(long)]
    strict_host_key: bool,

    /// Skip TLS certificate verification for the management API
    /// (NFVIS hosts commonly present self-signed certificates)
    #[arg(long)]
    insecure: bool,
}

fn run(cli: Cli) -> nfvpkg::Result<Report> {
    let timeout = Duration::from_secs(cli.timeout);

    let api =
        HttpManagementClient::new(&cli.host, &cli.user, &cli.password, timeout, cli.insecure)?;
    let transfer = ScpTransfer::new(SshConfig {
        host: cli.host.clone(),
        port: cli.ssh_port,
        user: cli.user.clone(),
        password: cli.password.clone(),
        timeout,
        host_key_policy: if cli.strict_host_key {
            HostKeyPolicy::Strict
        } else {
            HostKeyPolicy::TrustOnFirstUse
        },
    });

    let spec = PackageSpec {
        name: cli.name,
        state: cli.state,
        file: cli.file,
        dest: cli.dest,
    };

    info!(
        "reconciling image '{}' toward state '{}' on {}{}",
        spec.name,
        spec.state,
        cli.host,
        if cli.check { " (check mode)" } else { "" }
    );

    let reconciler = Reconciler::new(api, transfer, cli.check);
    reconciler.run(&spec).map(Report::success)
}

fn main() {
    // Logs go to stderr; stdout is reserved for the JSON report
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(report) => report.print(),
        Err(err) => {
            Report::failure(&err).print();
            std::process::exit(1);
        }
    }
}
