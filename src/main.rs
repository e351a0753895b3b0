use std::path::PathBuf;

use clap::{Parser, Subcommand};
use qa_analyzer::commands::{build_session, init_session, search_session};
use qa_analyzer::config::Config;
use qa_analyzer::store::Source;

#[derive(Parser)]
#[command(name = "qa-analyzer")]
#[command(about = "Index QA artifacts per session and run similarity searches over them")]
#[command(version)]
struct Cli {
    /// Storage root holding config.toml and the sessions directory
    #[arg(long, default_value = "data", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new analysis session
    Init,
    /// Build the vector snapshot for a session from the three uploaded documents
    Build {
        /// Session id returned by `init` (or created by the upload layer)
        #[arg(long)]
        session: String,
        /// Requirements document (.docx or .pdf)
        #[arg(long)]
        requirements: PathBuf,
        /// Defects spreadsheet
        #[arg(long)]
        defects: PathBuf,
        /// Test-cases spreadsheet
        #[arg(long)]
        testcases: PathBuf,
    },
    /// Run a similarity query against a session's snapshot
    Search {
        /// Session id
        #[arg(long)]
        session: String,
        /// Query text
        query: String,
        /// Restrict results to these sources; may be repeated. No flag means all sources.
        #[arg(long = "source")]
        sources: Vec<Source>,
        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.data_dir)?;

    match cli.command {
        Commands::Init => {
            init_session(&config).await?;
        }
        Commands::Build {
            session,
            requirements,
            defects,
            testcases,
        } => {
            build_session(&config, &session, requirements, defects, testcases).await?;
        }
        Commands::Search {
            session,
            query,
            sources,
            top_k,
        } => {
            search_session(&config, &session, &query, &sources, top_k).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn init_command() {
        let cli = Cli::try_parse_from(["qa-analyzer", "init"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Init));
        }
    }

    #[test]
    fn build_command_requires_all_paths() {
        let cli = Cli::try_parse_from([
            "qa-analyzer",
            "build",
            "--session",
            "abc",
            "--requirements",
            "req.docx",
            "--defects",
            "defects.xlsx",
            "--testcases",
            "testcases.xlsx",
        ]);
        assert!(cli.is_ok());

        let cli = Cli::try_parse_from(["qa-analyzer", "build", "--session", "abc"]);
        assert!(cli.is_err());
    }

    #[test]
    fn search_command_with_sources() {
        let cli = Cli::try_parse_from([
            "qa-analyzer",
            "search",
            "--session",
            "abc",
            "login flow",
            "--source",
            "testcases",
            "--source",
            "requirements",
            "--top-k",
            "5",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search {
                sources, top_k, query, ..
            } = parsed.command
            {
                assert_eq!(query, "login flow");
                assert_eq!(sources, vec![Source::Testcases, Source::Requirements]);
                assert_eq!(top_k, 5);
            }
        }
    }

    #[test]
    fn invalid_source_is_rejected() {
        let cli = Cli::try_parse_from([
            "qa-analyzer",
            "search",
            "--session",
            "abc",
            "login flow",
            "--source",
            "features",
        ]);
        assert!(cli.is_err());
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["qa-analyzer", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["qa-analyzer", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
