use clap::{Parser, Subcommand};
use jsm_connector::client::{DEFAULT_ISSUE_TYPE, DEFAULT_SEARCH_RESULTS};
use jsm_connector::*;
use log::{error, info};
use serde_json::Value;
use std::process;

#[derive(Parser)]
#[command(name = "jsm-connector")]
#[command(about = "Fetch Jira Service Management tickets as documents for indexing", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit every ticket as a JSON document per line
    Load {
        /// Page size (overrides config)
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Emit tickets updated within a time window
    Poll {
        /// Lower bound, seconds since the Unix epoch (UTC)
        #[arg(long)]
        start: Option<f64>,

        /// Upper bound, seconds since the Unix epoch (UTC)
        #[arg(long)]
        end: Option<f64>,

        /// Page size (overrides config)
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Direct issue operations
    Issue {
        #[command(subcommand)]
        action: IssueAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum IssueAction {
    /// Fetch a single issue
    Get { issue_id: String },

    /// Create an issue in the configured project
    Create {
        summary: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long, default_value = DEFAULT_ISSUE_TYPE)]
        issue_type: String,
    },

    /// Add a comment to an issue
    Comment { issue_id: String, body: String },

    /// Run a raw JQL search
    Search {
        jql: String,

        #[arg(long, default_value_t = DEFAULT_SEARCH_RESULTS)]
        max_results: usize,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Create a template configuration file
    Init,

    /// Display current configuration
    Show,

    /// Validate configuration file
    Validate,
}

fn main() {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Load { batch_size } => run_poll(None, None, batch_size),
        Commands::Poll {
            start,
            end,
            batch_size,
        } => run_poll(start, end, batch_size),
        Commands::Issue { action } => run_issue(action),
        Commands::Config { action } => match action {
            ConfigAction::Init => run_config_init(),
            ConfigAction::Show => run_config_show(),
            ConfigAction::Validate => run_config_validate(),
        },
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}

fn run_poll(
    start: Option<SecondsSinceUnixEpoch>,
    end: Option<SecondsSinceUnixEpoch>,
    batch_size: Option<usize>,
) -> Result<()> {
    let config = Config::load()?;

    let mut connector =
        JiraServiceManagementConnector::new(batch_size.unwrap_or(config.connector.batch_size));
    connector.load_credentials(&config.credentials())?;

    let batches = if start.is_none() && end.is_none() {
        connector.load_from_state()?
    } else {
        connector.poll_source(start, end)?
    };

    let mut total = 0;
    for batch in batches {
        let batch = batch?;
        total += batch.len();
        for document in &batch {
            println!("{}", serde_json::to_string(document)?);
        }
    }

    info!("Emitted {} document(s)", total);
    Ok(())
}

fn run_issue(action: IssueAction) -> Result<()> {
    let config = Config::load()?;
    let client = JiraServiceManagementClient::new(
        &config.jira.base_url,
        &config.jira.api_token,
        config.jira.project_key.as_deref().unwrap_or_default(),
    )?;

    let response = match action {
        IssueAction::Get { issue_id } => client.get_issue(&issue_id)?,
        IssueAction::Create {
            summary,
            description,
            issue_type,
        } => {
            if config.jira.project_key.is_none() {
                return Err(ConnectorError::Config(
                    "jira.project_key must be set to create issues".to_string(),
                ));
            }
            client.create_issue(&summary, &description, &issue_type)?
        }
        IssueAction::Comment { issue_id, body } => client.create_comment(&issue_id, &body)?,
        IssueAction::Search { jql, max_results } => client.search_issues(&jql, max_results)?,
    };

    print_json(&response)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_config_init() -> Result<()> {
    let config_path = Config::create_template()?;
    println!("✓ Configuration file created at: {}", config_path.display());
    println!("\nPlease edit the file and add your Jira credentials:");
    println!("  - API token: https://id.atlassian.com/manage-profile/security/api-tokens");
    Ok(())
}

fn run_config_show() -> Result<()> {
    let config = Config::load()?;
    println!("\nCurrent Configuration");
    println!("====================\n");
    config.display();
    Ok(())
}

fn run_config_validate() -> Result<()> {
    let _config = Config::load()?;
    println!("✓ Configuration is valid");
    println!("  Config file: {}", Config::config_path()?.display());
    Ok(())
}
