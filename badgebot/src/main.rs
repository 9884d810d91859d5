//! Command-line interface for the badgebot binary.
//!
//! The CLI parses app URLs, previews badge insertion on local READMEs,
//! surveys app lists for the badge, runs the fork and pull request phase,
//! and discovers app repositories of an account.

use std::{
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    process,
};

use badgebot::{
    AppRecord, BadgeEdit, BatchDriver, BotConfig, ConfirmationGate, CoordinateParser, Error, GitHubHost,
    LimitClass, Orchestrator, RateLimitedGateway, RepositoryCache, RepositoryHost, RunOptions, Selection,
    SystemCommandRunner, debug_apps, discover_app_files, filter_apps, find_user_by_email, insert_badge, load_apps,
    load_config, render_summary, write_report,
};
use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "badgebot=info";

/// Command line interface for adding app badges to repository READMEs.
#[derive(Debug, Parser,)]
#[command(name = "badgebot", version, about = "Add hosted-app badges to repository READMEs")]
struct Cli
{
    /// Access token of the account that forks and opens pull requests.
    #[arg(long = "token", env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    token: Option<String,>,

    /// Path to the YAML bot configuration.
    #[arg(long = "config", value_name = "PATH", global = true)]
    config: Option<PathBuf,>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand,)]
enum Command
{
    /// Print the repository coordinate of an app or repository-file URL.
    Parse(ParseArgs,),
    /// Print a local README with the badge inserted.
    Insert(InsertArgs,),
    /// Check every app of a list for the badge without changing anything.
    Survey(BatchArgs,),
    /// Survey a list, then fork, commit and open pull requests.
    Run(BatchArgs,),
    /// List repositories of an account that contain app entry points.
    Discover(DiscoverArgs,),
}

#[derive(Debug, Args,)]
struct ParseArgs
{
    #[arg(value_name = "URL")]
    url: String,
}

#[derive(Debug, Args,)]
struct InsertArgs
{
    /// README file to read.
    #[arg(long = "readme", value_name = "PATH")]
    readme: PathBuf,

    /// App the badge links to.
    #[arg(long = "app-url", value_name = "URL")]
    app_url: String,
}

#[derive(Debug, Args, Default,)]
struct BatchArgs
{
    /// YAML or JSON app list.
    #[arg(long = "input", value_name = "PATH", required_unless_present = "debug_repos")]
    input: Option<PathBuf,>,

    /// Use the built-in debug repository list instead of `--input`.
    #[arg(long = "debug-repos", action = ArgAction::SetTrue, conflicts_with = "input")]
    debug_repos: bool,

    /// First list index to process.
    #[arg(long = "start", value_name = "INDEX", default_value_t = 0)]
    start: usize,

    /// List index to stop before; the whole list when omitted.
    #[arg(long = "end", value_name = "INDEX")]
    end: Option<usize,>,

    /// Keep only apps whose URL contains this text.
    #[arg(long = "filter", value_name = "TEXT")]
    filter: Option<String,>,

    /// Log the resolution of every app.
    #[arg(long = "auto-expand", action = ArgAction::SetTrue)]
    auto_expand: bool,

    /// Include README text in the summary.
    #[arg(long = "show-readmes", action = ArgAction::SetTrue)]
    show_readmes: bool,

    /// Open pull requests after committing to forks.
    #[arg(long = "send-pull-requests", action = ArgAction::SetTrue)]
    send_pull_requests: bool,

    /// Clone every fork into the forks directory.
    #[arg(long = "clone-forks", action = ArgAction::SetTrue)]
    clone_forks: bool,

    /// Fork without asking for confirmation.
    #[arg(long = "yes", short = 'y', action = ArgAction::SetTrue)]
    yes: bool,

    /// First index, among apps missing the badge, to fork.
    #[arg(long = "fork-start", value_name = "INDEX")]
    fork_start: Option<usize,>,

    /// Index, among apps missing the badge, to stop forking before.
    #[arg(long = "fork-end", value_name = "INDEX")]
    fork_end: Option<usize,>,

    /// Write the batch report as JSON to this file.
    #[arg(long = "report", value_name = "PATH")]
    report: Option<PathBuf,>,
}

#[derive(Debug, Args,)]
#[command(group(ArgGroup::new("account").required(true).args(["login", "email"])))]
struct DiscoverArgs
{
    /// Account login to search.
    #[arg(long = "login", value_name = "LOGIN")]
    login: Option<String,>,

    /// Public e-mail address resolved to a login first.
    #[arg(long = "email", value_name = "EMAIL")]
    email: Option<String,>,
}

/// Asks on stdin before the fork phase starts.
struct StdinGate;

impl ConfirmationGate for StdinGate
{
    fn confirm(&self, prompt: &str,) -> bool
    {
        eprint!("{prompt} [y/N] ");
        if io::stderr().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer,) {
            Ok(_,) => is_affirmative(&answer,),
            Err(_,) => false,
        }
    }
}

fn is_affirmative(answer: &str,) -> bool
{
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Entry point that reports errors and sets the appropriate exit status.
#[tokio::main]
async fn main()
{
    init_tracing();

    if let Err(error,) = run().await {
        eprintln!("{}", error.to_display_string());
        process::exit(1,);
    }
}

fn init_tracing()
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER,),);
    tracing_subscriber::fmt().with_env_filter(filter,).with_writer(io::stderr,).init();
}

/// Executes the CLI using parsed arguments.
///
/// # Errors
///
/// Propagates configuration, input and startup failures. Failures of
/// individual apps are part of the printed summary instead.
async fn run() -> Result<(), Error,>
{
    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref(),)?;

    match cli.command {
        Command::Parse(args,) => run_parse(&args, &config, &mut io::stdout().lock(),),
        Command::Insert(args,) => run_insert(&args, &config, &mut io::stdout().lock(),),
        Command::Survey(args,) => run_batch(args, config, cli.token.as_deref(), false,).await,
        Command::Run(args,) => run_batch(args, config, cli.token.as_deref(), true,).await,
        Command::Discover(args,) => run_discover(args, &config, cli.token.as_deref(),).await,
    }
}

fn resolve_config(path: Option<&Path,>,) -> Result<BotConfig, Error,>
{
    match path {
        Some(path,) => load_config(path,),
        None => Ok(BotConfig::default(),),
    }
}

fn run_parse<W: Write,>(args: &ParseArgs, config: &BotConfig, writer: &mut W,) -> Result<(), Error,>
{
    let parser = CoordinateParser::new(config.urls.clone(),)?;
    let coordinate = parser
        .parse(&args.url,)?
        .ok_or_else(|| Error::validation(format!("'{}' matches no known URL form", args.url),),)?;

    serde_json::to_writer_pretty(&mut *writer, &coordinate,)?;
    Ok(writeln!(writer)?,)
}

fn run_insert<W: Write,>(args: &InsertArgs, config: &BotConfig, writer: &mut W,) -> Result<(), Error,>
{
    let text = fs::read_to_string(&args.readme,).map_err(|source| badgebot::io_error(&args.readme, source,),)?;

    let output = match insert_badge(&text, &args.app_url, &config.badge,) {
        BadgeEdit::Updated(updated,) => updated,
        BadgeEdit::Unchanged => {
            info!("{} already carries the badge", args.readme.display());
            text
        }
    };

    Ok(writer.write_all(output.as_bytes(),)?,)
}

/// Reads, narrows and slices the app list named by `args`.
fn load_candidates(args: &BatchArgs,) -> Result<Vec<AppRecord,>, Error,>
{
    let apps = match (&args.input, args.debug_repos,) {
        (_, true,) => debug_apps(),
        (Some(path,), false,) => load_apps(path,)?,
        (None, false,) => return Err(Error::validation("missing required --input <PATH> argument",),),
    };

    let apps = match args.filter.as_deref() {
        Some(needle,) => filter_apps(apps, needle,),
        None => apps,
    };

    let selection = Selection::new(args.start, args.end.unwrap_or(apps.len(),),);
    Ok(selection.apply(&apps,)?.to_vec(),)
}

fn run_options(args: &BatchArgs,) -> RunOptions
{
    let fork_selection = match (args.fork_start, args.fork_end,) {
        (None, None,) => None,
        (start, end,) => Some(Selection::new(start.unwrap_or(0,), end.unwrap_or(usize::MAX,),),),
    };

    RunOptions {
        auto_expand: args.auto_expand,
        auto_process: args.yes,
        show_readmes: args.show_readmes,
        send_pull_requests: args.send_pull_requests,
        clone_forks: args.clone_forks,
        fork_selection,
    }
}

/// Builds the gateway and checks the token before anything else runs.
async fn connect(token: Option<&str,>, config: &BotConfig,) -> Result<RateLimitedGateway<GitHubHost,>, Error,>
{
    let token = token.ok_or_else(|| Error::validation("missing --token or GITHUB_TOKEN",),)?;
    let gateway = RateLimitedGateway::new(GitHubHost::new(token,)?, config.max_wait(),);
    let login = gateway.call(LimitClass::Core, "authenticated user", |host| host.authenticated_login(),).await?;
    info!("Authenticated as {}", login);
    Ok(gateway,)
}

async fn run_batch(args: BatchArgs, config: BotConfig, token: Option<&str,>, mutate: bool,) -> Result<(), Error,>
{
    let candidates = load_candidates(&args,)?;
    let gateway = connect(token, &config,).await?;
    info!("Processing {} apps", candidates.len());

    let mut driver = BatchDriver::new(
        RepositoryCache::new(gateway, config.cache_ttl(),),
        CoordinateParser::new(config.urls.clone(),)?,
        Orchestrator::new(config.texts.clone(), config.badge.clone(), config.readiness(), config.forks_dir.clone(),),
        SystemCommandRunner::new(config.exit_timeout(),),
        run_options(&args,),
    );

    let report = if mutate {
        driver.run_batch(&candidates, &StdinGate,).await?
    } else {
        driver.survey(&candidates,).await
    };

    print!("{}", render_summary(&report,));
    if let Some(path,) = &args.report {
        write_report(path, &report,)?;
        info!("Report written to {}", path.display());
    }

    Ok((),)
}

async fn run_discover(args: DiscoverArgs, config: &BotConfig, token: Option<&str,>,) -> Result<(), Error,>
{
    let gateway = connect(token, config,).await?;

    let login = match (args.login, args.email,) {
        (Some(login,), _,) => login,
        (None, Some(email,),) => match find_user_by_email(&gateway, &email,).await? {
            Some(login,) => login,
            None => return Err(Error::not_found(format!("account with e-mail {email}"),),),
        },
        (None, None,) => return Err(Error::validation("missing --login or --email",),),
    };

    let repositories = discover_app_files(&gateway, &login,).await?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, &repositories,)?;
    Ok(writeln!(handle)?,)
}
