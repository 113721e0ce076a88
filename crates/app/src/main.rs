use std::fmt;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use quiz_core::model::{CertId, Question, TopicFilter, TopicId};
use services::{AppConfig, CatalogService, GuideService, QuizSession, SupplementFetcher};
use storage::{CachedStore, open_store};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- run  [--config <path>] [--data <path>] [--cert <name>]");
    eprintln!("  cargo run -p app -- list [--config <path>] [--data <path>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --config config.json");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_CONFIG, QUIZ_DATA_PATH");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    List,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}

struct Args {
    config_path: String,
    data_path: Option<String>,
    cert: Option<String>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut config_path = std::env::var("QUIZ_CONFIG")
            .ok()
            .unwrap_or_else(|| "config.json".into());
        let mut data_path = std::env::var("QUIZ_DATA_PATH").ok();
        let mut cert = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => config_path = require_value(args, "--config")?,
                "--data" => data_path = Some(require_value(args, "--data")?),
                "--cert" => cert = Some(require_value(args, "--cert")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            config_path,
            data_path,
            cert,
        })
    }
}

struct QuizApp {
    catalog: CatalogService,
    guide: GuideService,
    supplement: SupplementFetcher,
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: run the quiz when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Run,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Run,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let mut config = AppConfig::load(&parsed.config_path)?;
    if let Some(data_path) = parsed.data_path {
        config.data_path = data_path;
    }

    let store = open_store(&config.data_path, config.container_name.as_deref())?;
    let store = Arc::new(CachedStore::new(store));

    // Remote backends pay their round trips up front; the local one is
    // cheap enough to load lazily.
    if config.data_path.starts_with("http://") || config.data_path.starts_with("https://") {
        println!("Warming the bank cache, this can take a moment...");
        if let Err(err) = store.warm().await {
            eprintln!("warning: cache warm-up failed ({err}); loading on demand instead");
        }
    }

    let app = QuizApp {
        catalog: CatalogService::new(store, config.default_ai_agent_url.clone()),
        guide: GuideService::new(config.guide_path.clone()),
        supplement: SupplementFetcher::new(config.supplement_hosts.clone()),
    };

    match cmd {
        Command::List => {
            let certs = app.catalog.certifications().await;
            if certs.is_empty() {
                eprintln!("no certifications found; check data_path in {}", parsed.config_path);
            }
            for cert in certs {
                println!("{cert}");
            }
            Ok(())
        }
        Command::Run => run_quiz(&app, parsed.cert.map(CertId::new)).await,
    }
}

async fn run_quiz(
    app: &QuizApp,
    preselected: Option<CertId>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let Some(cert) = (match &preselected {
            Some(cert) => Some(cert.clone()),
            None => choose_certification(app).await,
        }) else {
            return Ok(());
        };

        let cert_config = app.catalog.cert_config(&cert).await;
        let mut session = app.catalog.start_session(&cert).await?;
        if session.bank().is_empty() {
            eprintln!("warning: no questions available for {cert}");
        }
        print_topics(&session);

        let finished = quiz_loop(app, &mut session, cert_config.ai_agent_url.as_deref()).await;
        // A preselected certification has nothing to go back to.
        if finished || preselected.is_some() {
            return Ok(());
        }
    }
}

async fn choose_certification(app: &QuizApp) -> Option<CertId> {
    let certs = app.catalog.certifications().await;
    if certs.is_empty() {
        eprintln!("no certifications found; check the data_path configuration");
        return None;
    }

    println!("Certifications:");
    for (index, cert) in certs.iter().enumerate() {
        println!("  {}) {cert}", index + 1);
    }

    loop {
        let line = prompt("Select a certification (number or name, empty to quit): ")?;
        if line.is_empty() {
            return None;
        }
        if let Ok(index) = line.parse::<usize>()
            && index >= 1
            && index <= certs.len()
        {
            return Some(certs[index - 1].clone());
        }
        if let Some(cert) = certs.iter().find(|c| c.as_str() == line) {
            return Some(cert.clone());
        }
        eprintln!("no such certification: {line}");
    }
}

fn print_topics(session: &QuizSession) {
    let topics = session.topic_choices();
    if topics.is_empty() {
        return;
    }
    let rendered: Vec<String> = topics.iter().map(ToString::to_string).collect();
    println!(
        "Topics: {} (use /topic <id> to filter, /all for everything)",
        rendered.join(", ")
    );
}

/// Returns true when the user quit outright, false to go back to the
/// certification picker.
async fn quiz_loop(app: &QuizApp, session: &mut QuizSession, agent_url: Option<&str>) -> bool {
    loop {
        let question = match session.next_question().cloned() {
            Some(question) => question,
            None => {
                println!("No questions to show under the current filter.");
                let Some(line) = prompt("Command (/topic <id>, /all, /cert, /quit): ") else {
                    return true;
                };
                match handle_command(&line, session, app).await {
                    LoopAction::Quit => return true,
                    LoopAction::SwitchCert => return false,
                    LoopAction::Continue => continue,
                }
            }
        };

        show_question(app, session, &question).await;

        let Some(line) = prompt("Your answer: ") else {
            return true;
        };

        if line.starts_with('/') {
            match handle_command(&line, session, app).await {
                LoopAction::Quit => return true,
                LoopAction::SwitchCert => return false,
                LoopAction::Continue => continue,
            }
        }

        let correct = session.check_answer(&line, &question);
        session.record_answer(correct);
        if correct {
            println!("Correct!");
        } else {
            println!("Wrong. The correct answer was {}", question.correct_answer());
        }
        if !question.explanation().is_empty() {
            println!("Explanation: {}", question.explanation());
        }
        if let Some(link) = question.reference_link() {
            println!("Question link: {link}");
        }
        if let Some(url) = agent_url {
            println!("Still unsure? Ask the AI agent: {url}");
        }
        let score = session.score();
        println!(
            "Score: {}/{} ({:.2}%)\n",
            score.correct(),
            score.total(),
            score.percentage()
        );
    }
}

async fn show_question(app: &QuizApp, session: &QuizSession, question: &Question) {
    println!(
        "── Topic {} · question {} · {} available ──",
        question.topic(),
        question.number(),
        session.available_count()
    );

    // Prefer the linked discussion when the capability is enabled;
    // fall back to the stored screenshot.
    if app.supplement.enabled()
        && let Some(link) = question.reference_link()
        && let Some(fragment) = app.supplement.fetch(link).await
    {
        let path = write_artifact(session.cert(), question, "html", fragment.as_bytes());
        match path {
            Some(path) => {
                println!("Discussion content saved to {}", path.display());
                return;
            }
            None => eprintln!("warning: could not save discussion content"),
        }
    }

    match app.catalog.question_image(session.cert(), question).await {
        Some(bytes) => {
            let ext = image_extension(&bytes);
            match write_artifact(session.cert(), question, ext, &bytes) {
                Some(path) => println!("Question image saved to {}", path.display()),
                None => eprintln!("warning: could not save the question image"),
            }
        }
        None => println!("No image found for this question."),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopAction {
    Continue,
    SwitchCert,
    Quit,
}

async fn handle_command(line: &str, session: &mut QuizSession, app: &QuizApp) -> LoopAction {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("/quit" | "/q") => LoopAction::Quit,
        Some("/cert") => LoopAction::SwitchCert,
        // Skip without recording an answer.
        Some("/next" | "/n") => LoopAction::Continue,
        Some("/all") => {
            session.set_filter(TopicFilter::All);
            println!("Filter: all ({} available)", session.available_count());
            LoopAction::Continue
        }
        Some("/topic") => {
            match parts.next().and_then(|raw| raw.parse::<TopicId>().ok()) {
                Some(topic) => {
                    session.set_filter(TopicFilter::Topic(topic));
                    println!(
                        "Filter: topic {topic} ({} available)",
                        session.available_count()
                    );
                }
                None => eprintln!("usage: /topic <id>"),
            }
            LoopAction::Continue
        }
        Some("/score") => {
            let score = session.score();
            let elapsed = chrono::Utc::now().signed_duration_since(session.started_at());
            println!(
                "Score: {}/{} ({:.2}%) after {} min",
                score.correct(),
                score.total(),
                score.percentage(),
                elapsed.num_minutes()
            );
            LoopAction::Continue
        }
        Some("/guide") => {
            if app.guide.enabled() {
                match app.guide.render().await {
                    Ok(html) => println!("{html}"),
                    Err(err) => eprintln!("warning: guide unavailable ({err})"),
                }
            } else {
                eprintln!("no guide_path configured");
            }
            LoopAction::Continue
        }
        _ => {
            eprintln!("commands: /topic <id>, /all, /next, /score, /guide, /cert, /quit");
            LoopAction::Continue
        }
    }
}

fn prompt(label: &str) -> Option<String> {
    print!("{label}");
    std::io::stdout().flush().ok()?;
    let mut line = String::new();
    let read = std::io::stdin().lock().read_line(&mut line).ok()?;
    if read == 0 {
        return None;
    }
    Some(line.trim().to_string())
}

fn artifact_dir() -> PathBuf {
    std::env::temp_dir().join("certquiz")
}

fn write_artifact(cert: &CertId, question: &Question, ext: &str, bytes: &[u8]) -> Option<PathBuf> {
    let dir = artifact_dir();
    std::fs::create_dir_all(&dir).ok()?;
    let path = dir.join(format!(
        "{}_{}_{}.{ext}",
        cert.as_str(),
        question.topic(),
        question.number()
    ));
    std::fs::write(&path, bytes).ok()?;
    Some(path)
}

fn image_extension(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "png"
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        "jpg"
    } else if bytes.starts_with(b"GIF8") {
        "gif"
    } else {
        "bin"
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
