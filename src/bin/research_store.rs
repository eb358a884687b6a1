use std::fs;
use std::io::Read;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::IntoDiagnostic;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use research_store::app::Research;
use research_store::arxiv::{ArxivHttpClient, PaperSource};
use research_store::config::{ConfigLoader, ResolvedConfig};
use research_store::domain::{FdaCategory, Record, Source};
use research_store::error::ResearchError;
use research_store::openfda::{FdaQuery, FdaSource, OpenFdaHttpClient};
use research_store::output::{JsonOutput, OutputMode, SearchResult, TextOutput, TopicsResult};
use research_store::tools::{self, ToolCall};

#[derive(Parser)]
#[command(name = "research-store")]
#[command(about = "Fetch arXiv papers and openFDA records into topic-partitioned JSON stores")]
#[command(version, author)]
struct Cli {
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Config file (defaults to ./research-store.json when present).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Search and read arXiv paper topics")]
    Papers(PapersArgs),
    #[command(about = "Search and read openFDA topics")]
    Fda(FdaArgs),
    #[command(about = "Read a resource such as papers://folders or fda://drugs")]
    Read { uri: String },
    #[command(about = "Run a tool call given as JSON ({\"name\": ..., \"arguments\": {...}}); '-' reads stdin")]
    Call { request: String },
    #[command(about = "List the available tools")]
    Tools,
    #[command(about = "Print a search prompt template")]
    Prompt(PromptArgs),
}

#[derive(Args)]
struct PapersArgs {
    #[command(subcommand)]
    command: PapersCommand,
}

#[derive(Subcommand)]
enum PapersCommand {
    #[command(about = "Search arXiv and store the results under the topic")]
    Search {
        topic: String,
        #[arg(long)]
        max_results: Option<usize>,
    },
    #[command(about = "Show the stored papers of a topic")]
    Read { topic: String },
    #[command(about = "List stored topics")]
    Topics,
    #[command(about = "Show a stored paper by arXiv id")]
    Info { paper_id: String },
}

#[derive(Args)]
struct FdaArgs {
    #[command(subcommand)]
    command: FdaCommand,
}

#[derive(Subcommand)]
enum FdaCommand {
    #[command(about = "Fetch recent entries for a category and store them")]
    Search {
        category: FdaCategory,
        #[arg(long)]
        max_results: Option<usize>,
        #[arg(long)]
        query: Option<String>,
    },
    #[command(about = "Show the stored entries of a topic")]
    Read { topic: String },
    #[command(about = "List stored topics")]
    Topics,
    #[command(about = "Store FDA documents from a JSON array file under a topic")]
    Save {
        topic: String,
        #[arg(long)]
        file: String,
    },
}

#[derive(Args)]
struct PromptArgs {
    kind: PromptKind,
    topic: String,
    #[arg(long)]
    count: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PromptKind {
    Papers,
    Fda,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<ResearchError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ResearchError) -> u8 {
    match error {
        ResearchError::InvalidTopic(_)
        | ResearchError::InvalidCategory(_)
        | ResearchError::InvalidMaxResults { .. }
        | ResearchError::InvalidDocument(_)
        | ResearchError::UnknownResource(_)
        | ResearchError::UnknownTool(_)
        | ResearchError::InvalidArguments { .. }
        | ResearchError::ConfigRead(_)
        | ResearchError::ConfigParse(_) => 2,
        err if err.is_upstream() => 3,
        ResearchError::CorruptStore { .. } => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Papers(args) => run_papers(args.command, &config, output_mode),
        Commands::Fda(args) => run_fda(args.command, &config, output_mode),
        Commands::Read { uri } => {
            let research = Research::new(&config, NopPapers, NopFda);
            let text = tools::read_resource(&research, &uri)?;
            print_text_or_json(output_mode, &text)
        }
        Commands::Call { request } => {
            let research = online(&config)?;
            let call = parse_tool_call(&request)?;
            let result = tools::call_tool(&research, &call)?;
            JsonOutput::print_json(&result).into_diagnostic()
        }
        Commands::Tools => {
            JsonOutput::print_json(&tools::tool_descriptions(config.default_max_results))
                .into_diagnostic()
        }
        Commands::Prompt(args) => {
            let text = match args.kind {
                PromptKind::Papers => research_store::prompts::paper_search_prompt(
                    &args.topic,
                    args.count.unwrap_or(config.default_max_results),
                ),
                PromptKind::Fda => research_store::prompts::fda_search_prompt(
                    &args.topic,
                    args.count.unwrap_or(config.default_max_results),
                ),
            };
            print_text_or_json(output_mode, &text)
        }
    }
}

fn run_papers(
    command: PapersCommand,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match command {
        PapersCommand::Search { topic, max_results } => {
            let research = online(config)?;
            let ids = research
                .search_papers(&topic, max_results.unwrap_or(config.default_max_results))?;
            print_search(
                output_mode,
                SearchResult {
                    source: Source::Papers,
                    topic,
                    ids,
                },
            )
        }
        PapersCommand::Read { topic } => {
            let research = Research::new(config, NopPapers, NopFda);
            let read = research.read_papers(&topic);
            match output_mode {
                OutputMode::Json => JsonOutput::print_read(&read).into_diagnostic(),
                OutputMode::Text => {
                    TextOutput::print_markdown(&read.render(Source::Papers)).into_diagnostic()
                }
            }
        }
        PapersCommand::Topics => run_topics(Source::Papers, config, output_mode),
        PapersCommand::Info { paper_id } => {
            let research = Research::new(config, NopPapers, NopFda);
            let value = match research.extract_info(&paper_id)? {
                Some(paper) => paper,
                None => Value::String(format!(
                    "There's no saved information related to paper {paper_id}."
                )),
            };
            JsonOutput::print_json(&value).into_diagnostic()
        }
    }
}

fn run_fda(
    command: FdaCommand,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match command {
        FdaCommand::Search {
            category,
            max_results,
            query,
        } => {
            let research = online(config)?;
            let mut fda_query = FdaQuery::new(max_results.unwrap_or(config.default_max_results));
            if let Some(text) = query {
                fda_query = fda_query.with_query(text);
            }
            let ids = research.search_fda(category, fda_query)?;
            print_search(
                output_mode,
                SearchResult {
                    source: Source::Fda,
                    topic: category.to_string(),
                    ids,
                },
            )
        }
        FdaCommand::Read { topic } => {
            let research = Research::new(config, NopPapers, NopFda);
            let read = research.read_fda(&topic);
            match output_mode {
                OutputMode::Json => JsonOutput::print_read(&read).into_diagnostic(),
                OutputMode::Text => {
                    TextOutput::print_markdown(&read.render(Source::Fda)).into_diagnostic()
                }
            }
        }
        FdaCommand::Topics => run_topics(Source::Fda, config, output_mode),
        FdaCommand::Save { topic, file } => {
            let content = fs::read_to_string(&file)
                .map_err(|err| ResearchError::Filesystem(format!("read {file}: {err}")))?;
            let documents: Vec<Value> = serde_json::from_str(&content)
                .map_err(|err| ResearchError::InvalidDocument(err.to_string()))?;
            let research = Research::new(config, NopPapers, NopFda);
            let ids = research.save_fda_data(&topic, documents)?;
            print_search(
                output_mode,
                SearchResult {
                    source: Source::Fda,
                    topic,
                    ids,
                },
            )
        }
    }
}

fn run_topics(
    source: Source,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let research = Research::new(config, NopPapers, NopFda);
    let topics = research.list_topics(source)?;
    match output_mode {
        OutputMode::Json => {
            JsonOutput::print_topics(&TopicsResult { source, topics }).into_diagnostic()
        }
        OutputMode::Text => TextOutput::print_markdown(&research_store::render::topics_markdown(
            source, &topics,
        ))
        .into_diagnostic(),
    }
}

fn online(
    config: &ResolvedConfig,
) -> miette::Result<Research<ArxivHttpClient, OpenFdaHttpClient>> {
    let arxiv = ArxivHttpClient::new(config.request_timeout)?;
    let openfda = OpenFdaHttpClient::new(config.request_timeout)?;
    Ok(Research::new(config, arxiv, openfda))
}

fn parse_tool_call(request: &str) -> miette::Result<ToolCall> {
    let raw = if request == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .into_diagnostic()?;
        buffer
    } else {
        request.to_string()
    };
    let call = serde_json::from_str(&raw).map_err(|err| ResearchError::InvalidArguments {
        tool: "call".to_string(),
        message: err.to_string(),
    })?;
    Ok(call)
}

fn print_search(output_mode: OutputMode, result: SearchResult) -> miette::Result<()> {
    match output_mode {
        OutputMode::Json => JsonOutput::print_search(&result).into_diagnostic(),
        OutputMode::Text => TextOutput::print_search(&result).into_diagnostic(),
    }
}

fn print_text_or_json(output_mode: OutputMode, text: &str) -> miette::Result<()> {
    match output_mode {
        OutputMode::Json => JsonOutput::print_json(text).into_diagnostic(),
        OutputMode::Text => TextOutput::print_markdown(text).into_diagnostic(),
    }
}

struct NopPapers;
struct NopFda;

impl PaperSource for NopPapers {
    fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<Record>, ResearchError> {
        Err(ResearchError::ArxivHttp(
            "arXiv client not configured".to_string(),
        ))
    }
}

impl FdaSource for NopFda {
    fn search(
        &self,
        _category: FdaCategory,
        _query: &FdaQuery,
    ) -> Result<Vec<Record>, ResearchError> {
        Err(ResearchError::OpenFdaHttp(
            "openFDA client not configured".to_string(),
        ))
    }
}
