use crate::server::http::ConnectionLimits;
use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use std::net::{IpAddr, SocketAddr};

/// Runtime configuration for the `restq-server` binary.
///
/// All values are parsed from CLI arguments or environment variables, with
/// defaults suitable for running locally.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "restq-server",
    version,
    about = "An HTTP server for in-memory named queues with long-polling dequeues"
)]
pub struct CliArgs {
    /// Port to run the REST API on.
    ///
    /// Environment variable: `PORT`
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Interface to bind.
    ///
    /// Environment variable: `HOST`
    #[arg(long, env = "HOST", default_value_t = String::from("0.0.0.0"))]
    pub host: String,

    /// Seconds in-flight requests are given to finish once shutdown begins.
    ///
    /// Waiting consumers are answered with `503` as soon as shutdown starts;
    /// this only bounds how long the server waits for responses to be written
    /// before exiting anyway.
    ///
    /// Environment variable: `SHUTDOWN_GRACE_SECS`
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    /// Seconds a client has to send a request's headers.
    ///
    /// Environment variable: `READ_TIMEOUT_SECS`
    #[arg(long, env = "READ_TIMEOUT_SECS", default_value_t = 10)]
    pub read_timeout_secs: u64,

    /// Seconds a keep-alive connection may stay idle between requests.
    ///
    /// Environment variable: `IDLE_TIMEOUT_SECS`
    #[arg(long, env = "IDLE_TIMEOUT_SECS", default_value_t = 10)]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub shutdown_grace: Duration,
    pub limits: ConnectionLimits,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let ip: IpAddr = args
            .host
            .parse()
            .with_context(|| format!("HOST ({}) is not a valid IP address", args.host))?;

        if args.shutdown_grace_secs == 0 {
            bail!("SHUTDOWN_GRACE_SECS must be greater than 0");
        }
        if args.read_timeout_secs == 0 {
            bail!("READ_TIMEOUT_SECS must be greater than 0");
        }
        if args.idle_timeout_secs == 0 {
            bail!("IDLE_TIMEOUT_SECS must be greater than 0");
        }

        Ok(Self {
            addr: SocketAddr::new(ip, args.port),
            shutdown_grace: Duration::from_secs(args.shutdown_grace_secs),
            limits: ConnectionLimits {
                read_timeout: Duration::from_secs(args.read_timeout_secs),
                idle_timeout: Duration::from_secs(args.idle_timeout_secs),
            },
        })
    }
}
