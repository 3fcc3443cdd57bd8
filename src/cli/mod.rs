//! Command-line interface.

pub mod quota;
pub mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Quota-limited, cached chat gateway.
#[derive(Parser, Debug)]
#[command(name = "chatgate", version, about)]
pub struct Cli {
    /// Config file (default: ~/.chatgate/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server (default when no command is given)
    Serve {
        /// Address to bind, overrides config
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on, overrides config
        #[arg(long)]
        port: Option<u16>,
    },
    /// Inspect or reset per-device quota counters
    Quota {
        #[command(subcommand)]
        action: QuotaSubcommand,
    },
}

/// Quota subcommands.
#[derive(Subcommand, Debug)]
pub enum QuotaSubcommand {
    /// Show today's usage for one device, or for all devices
    Status {
        /// Device id to show
        device_id: Option<String>,
    },
    /// Clear counters for one device, or for all devices
    Reset {
        /// Device id to reset
        device_id: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_command() {
        let cli = Cli::try_parse_from(["chatgate"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli =
            Cli::try_parse_from(["chatgate", "serve", "--bind", "127.0.0.1", "--port", "8080"])
                .unwrap();
        match cli.command {
            Some(Commands::Serve { bind, port }) => {
                assert_eq!(bind.as_deref(), Some("127.0.0.1"));
                assert_eq!(port, Some(8080));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_quota_reset_device() {
        let cli = Cli::try_parse_from([
            "chatgate",
            "--config",
            "/tmp/c.json",
            "quota",
            "reset",
            "abc",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json")));
        match cli.command {
            Some(Commands::Quota {
                action: QuotaSubcommand::Reset { device_id },
            }) => assert_eq!(device_id.as_deref(), Some("abc")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        assert!(Cli::try_parse_from(["chatgate", "serve", "--port", "notaport"]).is_err());
    }
}
