//! Command-line interface (`clap` derive), kept close to the teacher's `cmdline.rs` `Run`
//! subcommand shape, with a `--config` path added for §4.8.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[clap(name = "parley-relay", version)]
pub struct Opts {
    #[clap(subcommand)]
    pub subcommand: SubCommand,
}

#[derive(Debug, Parser)]
pub enum SubCommand {
    Run(Run),
}

#[derive(Debug, Parser)]
pub struct Run {
    /// TOML config file; missing fields fall back to documented defaults.
    #[clap(long, default_value = "config/parley.toml")]
    pub config: PathBuf,

    #[clap(long, default_value = "config/cert.pem")]
    pub cert_path: PathBuf,

    #[clap(long, default_value = "config/key.pem")]
    pub key_path: PathBuf,

    #[clap(long, default_value = "0.0.0.0:8443")]
    pub listen_addr: std::net::SocketAddr,

    /// Overrides `transportOptions.listenIps[0].ip` from the config file, if set.
    #[clap(long)]
    pub rtc_ip: Option<IpAddr>,

    /// Overrides `transportOptions.listenIps[0].announcedIp` from the config file, if set.
    #[clap(long)]
    pub rtc_announce_ip: Option<IpAddr>,
}
