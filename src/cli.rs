use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "taskfetch")]
#[command(about = "Durable batch URL downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API and the background dispatcher
    Server(ServerArgs),
    /// Reset tasks interrupted by a crash, then exit
    Recover(RecoverArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (overrides server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Path to the TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct RecoverArgs {
    /// Path to the TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_flags() {
        let cli = Cli::parse_from([
            "taskfetch",
            "server",
            "--address",
            "127.0.0.1:9000",
            "--config",
            "x.toml",
        ]);
        match cli.command {
            Commands::Server(args) => {
                assert_eq!(args.address, Some("127.0.0.1:9000".parse().unwrap()));
                assert_eq!(args.config, Some(PathBuf::from("x.toml")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_recover() {
        let cli = Cli::parse_from(["taskfetch", "recover"]);
        assert!(matches!(cli.command, Commands::Recover(RecoverArgs { config: None })));
    }
}
