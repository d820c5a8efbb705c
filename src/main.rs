use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use codelift::config::{self, Config};
use codelift::github::{self, AuthInstructions, DeviceFlowCallbacks, GitHubClient, RepoRef};
use codelift::history::HistoryStore;
use codelift::logging;
use codelift::source;
use codelift::suggest::llm::OpenRouterClient;
use codelift::suggest::{
    AnalysisRequest, AnalysisResponse, EnhancementResponse, Suggester, Suggestions,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "codelift",
    about = "Modernize legacy HTML/CSS/JS with AI suggestions",
    version
)]
struct Cli {
    /// Show debug logs on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Suggest components, styles and a project layout for legacy code
    Analyze(AnalyzeArgs),
    /// Rewrite one file following an instruction
    Enhance {
        file: PathBuf,
        /// What to change, e.g. "Add a dark mode toggle"
        #[arg(short, long)]
        instruction: String,
        /// Replace the file with the enhanced version
        #[arg(short, long)]
        write: bool,
        /// Print the JSON response instead of the code
        #[arg(long)]
        json: bool,
    },
    /// Previously analyzed snippets
    #[command(subcommand)]
    History(HistoryCommand),
    /// Browse and update GitHub repositories
    #[command(subcommand)]
    Github(GithubCommand),
    /// Store the OpenRouter API key
    Setup,
    /// Show configuration
    Config,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Files or directories to analyze; `-` or nothing reads stdin
    inputs: Vec<PathBuf>,
    #[command(flatten)]
    output: OutputArgs,
    /// Do not record the input in history
    #[arg(long)]
    no_history: bool,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Print the JSON response
    #[arg(long)]
    json: bool,
    /// Write the generated project files into this directory
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,
    /// Enhance one generated project file before it is shown or written
    #[arg(long, value_name = "PATH", requires = "instruction")]
    refine: Option<String>,
    /// Instruction for --refine
    #[arg(long, value_name = "TEXT")]
    instruction: Option<String>,
}

#[derive(Subcommand, Debug)]
enum HistoryCommand {
    /// List snippets, newest first
    List,
    /// Print one snippet
    Show { number: usize },
    /// Analyze a snippet again
    Analyze {
        number: usize,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Delete one snippet
    Delete { number: usize },
    /// Delete every snippet
    Clear,
}

#[derive(Subcommand, Debug)]
enum GithubCommand {
    /// Authenticate with GitHub (device flow)
    Login,
    /// Forget the stored GitHub token
    Logout,
    /// List your repositories
    Repos,
    /// List a directory
    Ls {
        #[arg(default_value = "")]
        path: String,
        /// owner/repo; defaults to the GitHub remote of the current repository
        #[arg(short, long)]
        repo: Option<String>,
    },
    /// Print or download a file
    Get {
        path: String,
        #[arg(short, long)]
        repo: Option<String>,
        /// Save to this file instead of printing
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Commit a local file to the repository
    Push {
        /// Destination path in the repository
        path: String,
        #[arg(short, long)]
        repo: Option<String>,
        /// Local file to upload
        #[arg(short, long)]
        file: PathBuf,
        /// Commit message
        #[arg(short, long)]
        message: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<ExitCode> {
    let config = Config::load();
    match command {
        Command::Analyze(args) => {
            let blob = source::load_inputs(&args.inputs)?;
            if !args.no_history && config.record_history && !blob.trim().is_empty() {
                record_history(&config, &blob);
            }
            analyze(&config, &blob, &args.output).await
        }
        Command::Enhance {
            file,
            instruction,
            write,
            json,
        } => enhance(&config, &file, &instruction, write, json).await,
        Command::History(cmd) => history(&config, cmd).await,
        Command::Github(cmd) => github_command(&config, cmd).await,
        Command::Setup => {
            config::setup_api_key_interactive()?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Config => {
            show_config(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn suggester(config: &Config) -> Result<Suggester> {
    let client = OpenRouterClient::from_config(config)?;
    Ok(Suggester::new(Arc::new(client)))
}

fn record_history(config: &Config, blob: &str) {
    let result = HistoryStore::open(config.history_limit).and_then(|store| store.record(blob));
    if let Err(err) = result {
        tracing::warn!("Could not record history: {:#}", err);
    }
}

async fn analyze(config: &Config, blob: &str, output: &OutputArgs) -> Result<ExitCode> {
    // Blank input is rejected before a client (and its API key) is needed.
    let result = match AnalysisRequest::new(blob) {
        Ok(_) => {
            let suggester = suggester(config)?;
            let mut result = suggester.analyze(blob).await;
            if let (Ok(suggestions), Some(path)) = (&mut result, &output.refine) {
                let instruction = output.instruction.as_deref().unwrap_or_default();
                match suggester
                    .enhance_file(&mut suggestions.project, path, instruction)
                    .await
                {
                    Ok(_) => eprintln!("Enhanced {}", path),
                    Err(err) => eprintln!("warning: could not enhance {}: {}", path, err),
                }
            }
            result
        }
        Err(err) => Err(err),
    };

    if let Ok(suggestions) = &result {
        if suggestions.is_degraded() {
            let missing: Vec<_> = suggestions.degraded.iter().map(|b| b.label()).collect();
            eprintln!(
                "warning: {} unavailable, showing partial results",
                missing.join(" and ")
            );
        }
        if let Some(usage) = &suggestions.usage {
            tracing::debug!(
                tokens = usage.total_tokens,
                cost = usage.cost(),
                "analysis usage"
            );
        }
        if let Some(dir) = &output.out {
            let written = suggestions.project.write_to(dir)?;
            eprintln!("Wrote {} file(s) to {}", written.len(), dir.display());
        }
    }

    let failed = result.is_err();
    if output.json {
        let response = AnalysisResponse::from(result);
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        match result {
            Ok(suggestions) => print_suggestions(&suggestions),
            Err(err) => eprintln!("Error: {}", err),
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_section(title: &str, body: &str) {
    println!("── {} ──", title);
    if body.trim().is_empty() {
        println!("(none)");
    } else {
        println!("{}", body.trim_end());
    }
    println!();
}

fn print_suggestions(suggestions: &Suggestions) {
    print_section("Components", &suggestions.components);
    print_section("Styles", &suggestions.styles);
    print_section(
        &format!("Project ({} files)", suggestions.project.len()),
        &suggestions.project.tree(),
    );
}

async fn enhance(
    config: &Config,
    file: &Path,
    instruction: &str,
    write: bool,
    json: bool,
) -> Result<ExitCode> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let result = suggester(config)?.enhance(&content, instruction).await;

    if write {
        if let Ok(enhancement) = &result {
            std::fs::write(file, &enhancement.enhanced_code)
                .with_context(|| format!("Failed to write {}", file.display()))?;
            eprintln!("Updated {}", file.display());
        }
    }

    let failed = result.is_err();
    if json {
        let response = EnhancementResponse::from(result);
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        match result {
            Ok(enhancement) if !write => println!("{}", enhancement.enhanced_code),
            Ok(_) => {}
            Err(err) => eprintln!("Error: {}", err),
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// History numbers shown to users start at 1.
fn history_index(number: usize) -> Result<usize> {
    number
        .checked_sub(1)
        .context("History numbers start at 1 (see 'codelift history list')")
}

async fn history(config: &Config, cmd: HistoryCommand) -> Result<ExitCode> {
    let store = HistoryStore::open(config.history_limit)?;
    match cmd {
        HistoryCommand::List => {
            let entries = store.list()?;
            if entries.is_empty() {
                println!("No history yet.");
            }
            for (i, entry) in entries.iter().enumerate() {
                println!(
                    "{:>3}  {}  {}",
                    i + 1,
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.preview()
                );
            }
        }
        HistoryCommand::Show { number } => {
            let entry = store
                .get(history_index(number)?)?
                .with_context(|| format!("No history entry #{}", number))?;
            println!("{}", entry.source);
        }
        HistoryCommand::Analyze { number, output } => {
            let entry = store
                .get(history_index(number)?)?
                .with_context(|| format!("No history entry #{}", number))?;
            return analyze(config, &entry.source, &output).await;
        }
        HistoryCommand::Delete { number } => {
            let removed = store
                .remove(history_index(number)?)?
                .with_context(|| format!("No history entry #{}", number))?;
            println!("Deleted: {}", removed.preview());
        }
        HistoryCommand::Clear => {
            let count = store.clear()?;
            println!("Cleared {} entr{}.", count, if count == 1 { "y" } else { "ies" });
        }
    }
    Ok(ExitCode::SUCCESS)
}

struct CliAuth;

impl DeviceFlowCallbacks for CliAuth {
    fn show_instructions(&mut self, instructions: &AuthInstructions) {
        println!();
        println!("  Open {} and enter the code:", instructions.verification_uri);
        println!();
        println!("      {}", instructions.user_code);
        println!();
        println!("  Waiting for authorization...");
    }

    fn poll_status(&mut self) -> bool {
        true
    }

    fn on_success(&mut self, username: &str) {
        println!("  + Signed in as {}", username);
    }

    fn on_error(&mut self, error: &str) {
        tracing::debug!("device flow failed: {}", error);
    }
}

fn resolve_repo(repo: Option<&str>) -> Result<RepoRef> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    RepoRef::resolve(repo, &cwd)
}

async fn github_command(config: &Config, cmd: GithubCommand) -> Result<ExitCode> {
    match cmd {
        GithubCommand::Login => {
            github::run_device_flow(config, &mut CliAuth).await?;
            return Ok(ExitCode::SUCCESS);
        }
        GithubCommand::Logout => {
            github::logout()?;
            println!("GitHub token removed.");
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let client = GitHubClient::from_config(config)?;
    match cmd {
        GithubCommand::Repos => {
            for repo in client.list_repos().await? {
                println!("{}", repo.full_name);
            }
        }
        GithubCommand::Ls { path, repo } => {
            let repo = resolve_repo(repo.as_deref())?;
            for entry in client.list_dir(&repo.owner, &repo.repo, &path).await? {
                if entry.is_dir() {
                    println!("{}/", entry.path);
                } else {
                    println!("{}  ({} bytes)", entry.path, entry.size);
                }
            }
        }
        GithubCommand::Get { path, repo, output } => {
            let repo = resolve_repo(repo.as_deref())?;
            let file = client.get_file(&repo.owner, &repo.repo, &path).await?;
            match output {
                Some(dest) => {
                    std::fs::write(&dest, &file.content)
                        .with_context(|| format!("Failed to write {}", dest.display()))?;
                    eprintln!("Saved {} to {}", file.path, dest.display());
                }
                None => print!("{}", file.content),
            }
        }
        GithubCommand::Push {
            path,
            repo,
            file,
            message,
        } => {
            let repo = resolve_repo(repo.as_deref())?;
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let sha = client
                .update_file(&repo.owner, &repo.repo, &path, &content, &message)
                .await?;
            println!(
                "Committed {} to {} ({})",
                path,
                repo,
                sha.get(..7).unwrap_or(sha.as_str())
            );
        }
        GithubCommand::Login | GithubCommand::Logout => {}
    }
    Ok(ExitCode::SUCCESS)
}

fn show_config(config: &Config) {
    println!("Config file:   {}", Config::config_location());
    println!(
        "Model:         {}",
        config.model_override().as_deref().unwrap_or("(built-in tiers)")
    );
    println!("API base:      {}", config.api_base_url());
    println!("Timeout:       {}s", config.request_timeout_secs());
    println!("Max retries:   {}", config.max_retries());
    println!("GitHub API:    {}", config.github_api_base_url());
    println!("History limit: {}", config.history_limit);
    println!(
        "API key:       {}",
        if config.has_api_key() {
            "configured"
        } else {
            "missing (run 'codelift setup')"
        }
    );
    println!(
        "GitHub:        {}",
        if github::is_authenticated() {
            "authenticated"
        } else {
            "not authenticated"
        }
    );
}
