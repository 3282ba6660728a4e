// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("nfvpkg")
        .version(env!("CARGO_PKG_VERSION"))
        .author("nfvpkg Contributors")
        .about("Idempotent VM image package reconciliation for Cisco NFVIS hosts")
        .arg(
            Arg::new("host")
                .long("host")
                .required(true)
                .value_name("HOST")
                .help("NFVIS host to reconcile"),
        )
        .arg(
            Arg::new("user")
                .long("user")
                .required(true)
                .value_name("USER")
                .help("Management API and SSH user"),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .required(true)
                .value_name("PASSWORD")
                .help("Password for the user (can also be set via NFVPKG_PASSWORD)"),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .required(true)
                .value_name("NAME")
                .help("Image name to reconcile"),
        )
        .arg(
            Arg::new("file")
                .long("file")
                .value_name("PATH")
                .help("Local artifact path, required when state is 'present'"),
        )
        .arg(
            Arg::new("state")
                .long("state")
                .value_parser(["present", "absent"])
                .default_value("present")
                .help("Desired state of the image"),
        )
        .arg(
            Arg::new("dest")
                .long("dest")
                .default_value("/data/intdatastore/uploads")
                .help("Upload directory on the host"),
        )
        .arg(
            Arg::new("ssh_port")
                .long("ssh-port")
                .default_value("22222")
                .help("SSH port used for the artifact upload"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .default_value("30")
                .help("Connect timeout in seconds"),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .action(ArgAction::SetTrue)
                .help("Report what would change without touching the host"),
        )
        .arg(
            Arg::new("strict_host_key")
                .long("strict-host-key")
                .action(ArgAction::SetTrue)
                .help("Refuse hosts whose key is not already in known_hosts"),
        )
        .arg(
            Arg::new("insecure")
                .long("insecure")
                .action(ArgAction::SetTrue)
                .help("Skip TLS certificate verification for the management API"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("nfvpkg.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
