use anyhow::{Context, bail};
use clap::Parser;
use php_reflection::reflection::summary::ClassSummary;
use php_reflection::reflection::{
    ChainLocator, ClassMapLocator, EngineConfig, HostEnvironment, Psr4Locator,
    ReflectionEngine, ReflectionFile,
};
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Parser)]
#[command(name = "php-reflect")]
#[command(about = "Reflect PHP classes without loading them", long_about = None)]
struct Cli {
    /// Directory to scan for class declarations (repeatable)
    #[arg(long = "dir", value_name = "DIR")]
    dirs: Vec<PathBuf>,

    /// PSR-4 mapping such as `App\=src` (repeatable)
    #[arg(long = "psr4", value_name = "PREFIX=DIR")]
    psr4: Vec<String>,

    /// Reflect every class declared in this file
    #[arg(long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Keep at most this many parsed files in memory
    #[arg(long, value_name = "N")]
    max_cached_files: Option<usize>,

    /// Print JSON instead of declarations
    #[arg(long)]
    json: bool,

    /// Do not register the core classes and constants
    #[arg(long)]
    no_builtins: bool,

    /// Keep going past recoverable syntax errors
    #[arg(long)]
    lenient: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    /// Fully-qualified class names
    #[arg(name = "CLASS")]
    classes: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.classes.is_empty() && cli.file.is_none() {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    }

    let engine = create_engine(&cli)?;
    let mut summaries = Vec::new();

    if let Some(path) = &cli.file {
        let file = ReflectionFile::new(engine.clone(), path)
            .with_context(|| format!("failed to reflect {}", path.display()))?;
        for namespace in file.file_namespaces().values() {
            for class in namespace.classes().values() {
                summaries.push(ClassSummary::from_class(&**class)?);
            }
        }
    }

    for name in &cli.classes {
        let class = engine
            .reflect_class(name)
            .with_context(|| format!("failed to reflect {name}"))?;
        summaries.push(ClassSummary::from_class(class.as_ref())?);
    }

    tracing::debug!(
        classes = summaries.len(),
        cached_files = engine.cached_file_count(),
        "reflection finished"
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for (i, summary) in summaries.iter().enumerate() {
            if i > 0 {
                println!();
            }
            print!("{summary}");
        }
    }

    Ok(())
}

fn create_engine(cli: &Cli) -> anyhow::Result<Rc<ReflectionEngine>> {
    let mut locator = ChainLocator::new();

    if !cli.psr4.is_empty() {
        let mut psr4 = Psr4Locator::new();
        for mapping in &cli.psr4 {
            let Some((prefix, dir)) = mapping.split_once('=') else {
                bail!("invalid PSR-4 mapping `{mapping}`, expected PREFIX=DIR");
            };
            psr4.add(prefix, dir);
        }
        locator.push(psr4);
    }

    if !cli.dirs.is_empty() {
        let map = ClassMapLocator::scan(&cli.dirs).context("failed to scan class directories")?;
        tracing::debug!(classes = map.len(), "indexed class map");
        locator.push(map);
    }

    let host = if cli.no_builtins {
        HostEnvironment::new()
    } else {
        HostEnvironment::with_core_builtins()
    };

    let config = EngineConfig {
        max_cached_files: cli.max_cached_files,
        strict_parsing: !cli.lenient,
    };

    Ok(ReflectionEngine::builder()
        .with_locator(locator)
        .with_host(host)
        .with_config(config)
        .build())
}

fn init_logging(verbose: bool) {
    use std::io::IsTerminal;
    use tracing_subscriber::{EnvFilter, fmt};

    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let use_ansi = std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();

    let subscriber = fmt::fmt()
        .with_env_filter(filter)
        .with_ansi(use_ansi)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
