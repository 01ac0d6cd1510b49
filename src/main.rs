use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use docmind::commands::{
    ask, ingest, list_documents, reset_collection, serve, show_stats, show_status,
};
use docmind::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "docmind")]
#[command(about = "Ask questions about your PDF documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Address to bind (overrides the configured host)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides the configured port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Configure model providers and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Ingest a PDF file into the collection
    Ingest {
        /// Path to the PDF
        path: PathBuf,
    },
    /// Ask a question about the ingested documents
    Ask {
        /// The question to answer
        question: String,
        /// Chat model to answer with: "openai" or "ollama"
        #[arg(long)]
        model: Option<String>,
    },
    /// Show collection statistics
    Stats,
    /// List a sample of stored chunks
    Documents {
        /// Maximum number of chunks to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Delete every stored document
    Reset {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Show models, backend reachability and host status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            serve(host, port).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ingest { path } => {
            ingest(&path).await?;
        }
        Commands::Ask { question, model } => {
            ask(&question, model.as_deref()).await?;
        }
        Commands::Stats => {
            show_stats().await?;
        }
        Commands::Documents { limit } => {
            list_documents(limit).await?;
        }
        Commands::Reset { yes } => {
            reset_collection(yes).await?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn serve_command_defaults() {
        let cli = Cli::try_parse_from(["docmind", "serve"]).expect("serve should parse");

        if let Commands::Serve { host, port } = cli.command {
            assert_eq!(host, None);
            assert_eq!(port, None);
        } else {
            panic!("expected serve command");
        }
    }

    #[test]
    fn serve_command_overrides() {
        let cli = Cli::try_parse_from(["docmind", "serve", "--host", "0.0.0.0", "--port", "9000"])
            .expect("serve should parse");

        if let Commands::Serve { host, port } = cli.command {
            assert_eq!(host.as_deref(), Some("0.0.0.0"));
            assert_eq!(port, Some(9000));
        } else {
            panic!("expected serve command");
        }
    }

    #[test]
    fn ingest_requires_path() {
        let cli = Cli::try_parse_from(["docmind", "ingest"]);
        assert!(cli.is_err());

        let cli = Cli::try_parse_from(["docmind", "ingest", "Contract.pdf"])
            .expect("ingest should parse");
        if let Commands::Ingest { path } = cli.command {
            assert_eq!(path, PathBuf::from("Contract.pdf"));
        } else {
            panic!("expected ingest command");
        }
    }

    #[test]
    fn ask_with_model() {
        let cli = Cli::try_parse_from([
            "docmind",
            "ask",
            "What are the payment terms?",
            "--model",
            "ollama",
        ])
        .expect("ask should parse");

        if let Commands::Ask { question, model } = cli.command {
            assert_eq!(question, "What are the payment terms?");
            assert_eq!(model.as_deref(), Some("ollama"));
        } else {
            panic!("expected ask command");
        }
    }

    #[test]
    fn documents_default_limit() {
        let cli = Cli::try_parse_from(["docmind", "documents"]).expect("documents should parse");

        if let Commands::Documents { limit } = cli.command {
            assert_eq!(limit, 20);
        } else {
            panic!("expected documents command");
        }
    }

    #[test]
    fn reset_yes_flag() {
        let cli = Cli::try_parse_from(["docmind", "reset", "-y"]).expect("reset should parse");
        assert!(matches!(cli.command, Commands::Reset { yes: true }));
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["docmind", "config", "--show"]).expect("config should parse");
        assert!(matches!(cli.command, Commands::Config { show: true }));
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["docmind", "upload"]);

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        } else {
            panic!("unknown subcommand should fail");
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["docmind", "--help"]);

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        } else {
            panic!("--help should short-circuit");
        }
    }
}
