use futures::executor::block_on;
use retouch::share::{
    DirStore, KeyValueStore, MemoryStore, ShareRequest, ShortId, ShortLinks, decode_inline,
    parse_share_url,
};
use retouch::{
    DiagramEngine, EngineError, PrerenderedEngine, RetouchConfig, Session, StageDelays,
    StatusLevel, SystemClock, ThreadPause,
};
use std::io::{Read, Write};
use std::process::Stdio;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use url::Url;

const DEFAULT_ENGINE_CMD: &str = "mmdc -i - -o - -e svg";
const DEFAULT_BASE_URL: &str = "http://localhost/";

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Json(serde_json::Error),
    Config(retouch::ConfigError),
    Share(retouch::ShareError),
    Storage(retouch::StorageError),
    Url(url::ParseError),
    /// The session reported a failure through its status line.
    Status(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::Config(err) => write!(f, "{err}"),
            CliError::Share(err) => write!(f, "{err}"),
            CliError::Storage(err) => write!(f, "{err}"),
            CliError::Url(err) => write!(f, "invalid URL: {err}"),
            CliError::Status(msg) => write!(f, "{msg}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<retouch::ConfigError> for CliError {
    fn from(value: retouch::ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<retouch::ShareError> for CliError {
    fn from(value: retouch::ShareError) -> Self {
        Self::Share(value)
    }
}

impl From<retouch::StorageError> for CliError {
    fn from(value: retouch::StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<url::ParseError> for CliError {
    fn from(value: url::ParseError) -> Self {
        Self::Url(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Command {
    #[default]
    Render,
    Share,
    Decode,
    Links,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    positionals: Vec<String>,
    engine_cmd: Option<String>,
    svg: Option<String>,
    share_url: Option<String>,
    config: Option<String>,
    store: Option<String>,
    base_url: Option<String>,
    short: bool,
    no_delay: bool,
    pretty: bool,
    out: Option<String>,
}

fn usage() -> &'static str {
    "retouch\n\
\n\
USAGE:\n\
  retouch [render] [--engine-cmd <cmd>] [--svg <path>] [--share-url <url>] [--store <dir>] [--config <path>] [--no-delay] [--out <path>] [<path>|-]\n\
  retouch share [--short --store <dir>] [--base-url <url>] [--config <path>] [<path>|-]\n\
  retouch decode [--pretty] <url|data>\n\
  retouch links list|purge|delete <id> --store <dir> [--config <path>] [--pretty]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - render pipes the source through the engine command (default: `mmdc -i - -o - -e svg`)\n\
    unless --svg names an already rendered diagram, then replays recorded edits.\n\
  - --share-url loads source, participants and edits from a share link instead of <path>;\n\
    `?id=` links are looked up in --store.\n\
  - share prints a link carrying the snapshot inline, or a short link with --short.\n\
  - Set RETOUCH_LOG (e.g. `RETOUCH_LOG=debug`) for diagnostics on stderr.\n\
"
}

fn value(it: &mut std::slice::Iter<'_, String>) -> Result<String, CliError> {
    it.next().cloned().ok_or(CliError::Usage(usage()))
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();
    let mut command_seen = false;

    let mut it = argv[1.min(argv.len())..].iter();
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "render" | "share" | "decode" | "links" if !command_seen && args.positionals.is_empty() => {
                command_seen = true;
                args.command = match a.as_str() {
                    "share" => Command::Share,
                    "decode" => Command::Decode,
                    "links" => Command::Links,
                    _ => Command::Render,
                };
            }
            "--engine-cmd" => args.engine_cmd = Some(value(&mut it)?),
            "--svg" => args.svg = Some(value(&mut it)?),
            "--share-url" => args.share_url = Some(value(&mut it)?),
            "--config" => args.config = Some(value(&mut it)?),
            "--store" => args.store = Some(value(&mut it)?),
            "--base-url" => args.base_url = Some(value(&mut it)?),
            "--out" => args.out = Some(value(&mut it)?),
            "--short" => args.short = true,
            "--no-delay" => args.no_delay = true,
            "--pretty" => args.pretty = true,
            "-" => args.positionals.push(a.clone()),
            other if other.starts_with('-') => return Err(CliError::Usage(usage())),
            positional => args.positionals.push(positional.to_string()),
        }
    }

    let max_positionals = match args.command {
        Command::Render | Command::Share | Command::Decode => 1,
        Command::Links => 2,
    };
    if args.positionals.len() > max_positionals {
        return Err(CliError::Usage(usage()));
    }
    if args.short && args.store.is_none() {
        return Err(CliError::Usage(usage()));
    }
    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_text(text: &str, out: Option<&str>) -> Result<(), CliError> {
    match out {
        None => {
            print!("{text}");
            Ok(())
        }
        Some(path) => {
            std::fs::write(path, text)?;
            Ok(())
        }
    }
}

fn write_json(value: &impl serde::Serialize, pretty: bool) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    if pretty {
        serde_json::to_writer_pretty(&mut stdout, value)?;
    } else {
        serde_json::to_writer(&mut stdout, value)?;
    }
    writeln!(stdout)?;
    Ok(())
}

fn load_config(args: &Args) -> Result<RetouchConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => RetouchConfig::load(std::path::Path::new(path))?,
        None => RetouchConfig::default(),
    };
    if args.no_delay {
        config.delays = StageDelays::zero();
    }
    Ok(config)
}

fn open_store(args: &Args) -> Box<dyn KeyValueStore> {
    match &args.store {
        Some(dir) => Box::new(DirStore::new(dir)),
        None => Box::new(MemoryStore::new()),
    }
}

/// Runs an external command as the diagram engine: source on stdin, SVG on stdout. A non-zero
/// exit reports the command's stderr as the engine message.
#[derive(Debug, Clone)]
struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    fn parse(cmd: &str) -> Result<Self, CliError> {
        let mut words = cmd.split_whitespace().map(str::to_string);
        let program = words.next().ok_or(CliError::Usage(usage()))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    fn run(&self, diagram_id: &str, source: &str) -> Result<String, EngineError> {
        let mut child = std::process::Command::new(&self.program)
            .args(&self.args)
            .env("RETOUCH_DIAGRAM_ID", diagram_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| EngineError::new(format!("could not start `{}`: {err}", self.program)))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(source.as_bytes())
                .map_err(|err| EngineError::new(format!("could not write to engine: {err}")))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|err| EngineError::new(format!("engine did not finish: {err}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(EngineError::new(if stderr.is_empty() {
                format!("engine exited with {}", output.status)
            } else {
                stderr
            }));
        }
        String::from_utf8(output.stdout)
            .map_err(|_| EngineError::new("engine output is not UTF-8"))
    }
}

enum Engine {
    Command(CommandEngine),
    Prerendered(PrerenderedEngine),
}

impl DiagramEngine for Engine {
    async fn render(&self, diagram_id: &str, source: &str) -> Result<String, EngineError> {
        match self {
            Engine::Command(cmd) => {
                tracing::debug!(program = %cmd.program, diagram_id, "running engine command");
                cmd.run(diagram_id, source)
            }
            Engine::Prerendered(engine) => engine.render(diagram_id, source).await,
        }
    }
}

fn run_render(args: Args) -> Result<(), CliError> {
    let config = load_config(&args)?;
    let engine = match &args.svg {
        Some(path) => Engine::Prerendered(PrerenderedEngine::new(std::fs::read_to_string(path)?)),
        None => Engine::Command(CommandEngine::parse(
            args.engine_cmd.as_deref().unwrap_or(DEFAULT_ENGINE_CMD),
        )?),
    };
    let mut session = Session::new(
        config,
        engine,
        ThreadPause,
        open_store(&args),
        Box::new(SystemClock),
    );

    match &args.share_url {
        Some(raw) => {
            if !args.positionals.is_empty() {
                return Err(CliError::Usage(usage()));
            }
            let url = Url::parse(raw)?;
            session.startup(Some(&url));
            if session.status().level == StatusLevel::Error {
                return Err(CliError::Status(session.status().message.clone()));
            }
        }
        None => {
            let source = read_input(args.positionals.first().map(String::as_str))?;
            session.set_source(&source);
        }
    }

    if block_on(session.render()).is_err() {
        return Err(CliError::Status(session.status().message.clone()));
    }
    if let Some(outcome) = session.last_render() {
        let total = outcome.replay.total();
        tracing::info!(
            diagram_id = %outcome.diagram_id,
            applied = total.applied,
            skipped = total.skipped,
            "render finished"
        );
    }
    let svg = session.svg().unwrap_or_default();
    write_text(&svg, args.out.as_deref())
}

fn run_share(args: Args) -> Result<(), CliError> {
    let config = load_config(&args)?;
    let base = Url::parse(args.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;
    let source = read_input(args.positionals.first().map(String::as_str))?;
    let mut session = Session::new(
        config,
        PrerenderedEngine::new(String::new()),
        ThreadPause,
        open_store(&args),
        Box::new(SystemClock),
    );
    session.set_source(&source);
    let url = if args.short {
        session.share_short_link(&base, &mut rand::thread_rng())
    } else {
        session.share_inline(&base)
    };
    let url = url.map_err(|_| CliError::Status(session.status().message.clone()))?;
    println!("{url}");
    Ok(())
}

fn run_decode(args: Args) -> Result<(), CliError> {
    let Some(raw) = args.positionals.first() else {
        return Err(CliError::Usage(usage()));
    };
    let data = match Url::parse(raw) {
        Ok(url) => match parse_share_url(&url) {
            Some(ShareRequest::Inline(data)) => data,
            Some(ShareRequest::ShortId(_)) | None => {
                return Err(CliError::Status(
                    "URL carries no inline share data".to_string(),
                ));
            }
        },
        Err(_) => raw.clone(),
    };
    let snapshot = decode_inline(&data)?;
    write_json(&snapshot, args.pretty)
}

fn run_links(args: Args) -> Result<(), CliError> {
    let Some(dir) = &args.store else {
        return Err(CliError::Usage(usage()));
    };
    let config = load_config(&args)?;
    let links = ShortLinks::new(config.share_retention_days);
    let mut store = DirStore::new(dir);
    match args.positionals.first().map(String::as_str) {
        Some("list") | None => write_json(&links.list(&store)?, args.pretty),
        Some("purge") => {
            let removed = links.purge_expired(&mut store, chrono::Utc::now())?;
            println!("{removed}");
            Ok(())
        }
        Some("delete") => {
            let Some(raw) = args.positionals.get(1) else {
                return Err(CliError::Usage(usage()));
            };
            let id = ShortId::parse(raw)?;
            if !links.delete(&mut store, &id)? {
                return Err(CliError::Share(retouch::ShareError::NotFound));
            }
            Ok(())
        }
        Some(_) => Err(CliError::Usage(usage())),
    }
}

fn run(args: Args) -> Result<(), CliError> {
    match args.command {
        Command::Render => run_render(args),
        Command::Share => run_share(args),
        Command::Decode => run_decode(args),
        Command::Links => run_links(args),
    }
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var("RETOUCH_LOG")
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    init_logging();

    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(args) {
        match err {
            CliError::Usage(msg) => {
                eprintln!("{msg}");
                std::process::exit(2);
            }
            err => {
                eprintln!("{err}");
                std::process::exit(1);
            }
        }
    }
}
