use clap::{Parser, Subcommand};

/// Registration-token issuance service
#[derive(Parser)]
#[command(name = "regtokend", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the issuance HTTP service
    Serve {
        /// Port to bind (defaults to the configured REGTOKEN_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect issued tokens
    Tokens {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// List issued tokens, newest first
    List {
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        /// Zero-padded 2-digit month (e.g. "03")
        #[arg(long)]
        month: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_without_port_flag_defers_to_config() {
        let cli = Cli::try_parse_from(["regtokend", "serve"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Serve { port: None })
        ));
    }

    #[test]
    fn serve_port_flag_overrides() {
        let cli = Cli::try_parse_from(["regtokend", "serve", "--port", "9190"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Serve { port: Some(9190) })
        ));
    }
}
