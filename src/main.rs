use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use typed::keyboard::KeyboardLayout;
use typed::model::Script;
use typed::text::{Markup, Snapshot};
use typed::{Delay, SentenceOptions, Typed, TypedConfig};

#[derive(Debug, Args, Clone)]
struct EngineArgs {
    /// Optional RNG seed (for debugging)
    #[arg(long)]
    seed: Option<u64>,

    /// Keyboard locale used for simulated typos (built in: en, de)
    #[arg(long)]
    locale: Option<String>,

    /// Keyboard layout JSON (`{"lower": [...], "upper": [...]}`) registered under --locale
    #[arg(long, value_name = "PATH", requires = "locale")]
    keyboard: Option<PathBuf>,

    /// Typo rate multiplier. Set to 0 for flawless typing.
    #[arg(long)]
    error_multiplier: Option<f64>,

    #[arg(long, value_name = "MS")]
    per_letter_min: Option<u64>,

    #[arg(long, value_name = "MS")]
    per_letter_max: Option<u64>,

    /// Never mistype punctuation or whitespace
    #[arg(long)]
    no_special_char_errors: bool,

    /// Fast-forward automatically after this many milliseconds
    #[arg(long, value_name = "MS")]
    fast_forward_after: Option<u64>,
}

#[derive(Debug, Parser)]
#[command(name = "typed")]
#[command(about = "Animate text in the terminal as if a person were typing it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Type out a text file
    Type {
        /// Input text file, or '-' for stdin
        #[arg(long, value_name = "PATH")]
        input: PathBuf,

        /// Style tag applied to the whole text
        #[arg(long)]
        style: Option<String>,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Play a typing script (JSON)
    Play {
        /// Script file
        #[arg(long, value_name = "PATH")]
        script: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

fn read_input(path: &PathBuf) -> Result<String> {
    if path.as_os_str() == std::ffi::OsStr::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }

    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn apply_engine_args(config: &mut TypedConfig, args: &EngineArgs) {
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(locale) = &args.locale {
        config.typing.locale = Some(locale.clone());
    }
    if let Some(multiplier) = args.error_multiplier {
        config.typing.error_multiplier = Some(multiplier);
    }
    if args.no_special_char_errors {
        config.typing.no_special_char_errors = Some(true);
    }
    match (args.per_letter_min, args.per_letter_max) {
        (Some(min), Some(max)) => config.typing.per_letter_delay = Some(Delay::range(min, max)),
        (Some(ms), None) | (None, Some(ms)) => config.typing.per_letter_delay = Some(Delay::Fixed(ms)),
        (None, None) => {}
    }
}

fn load_keyboard(path: &PathBuf) -> Result<KeyboardLayout> {
    let json =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).context("failed to parse keyboard layout JSON")
}

/// ANSI bold cyan for any style tag.
fn terminal_markup() -> Markup {
    Markup::new(|_style, text| format!("\x1b[1;36m{text}\x1b[0m"))
}

/// Redraw everything from the saved cursor position on each snapshot.
fn terminal_sink(parts: Vec<String>) -> impl Fn(&Snapshot) + Send + Sync + 'static {
    move |snapshot: &Snapshot| {
        let text = match snapshot {
            Snapshot::Plain(text) => text.clone(),
            Snapshot::Parts(map) => parts
                .iter()
                .filter_map(|part| map.get(part).cloned())
                .collect::<Vec<_>>()
                .join("\n"),
        };
        let mut out = io::stdout().lock();
        let _ = write!(out, "\x1b[u\x1b[J{text}");
        let _ = out.flush();
    }
}

fn build_engine(config: TypedConfig, args: &EngineArgs) -> Result<Typed> {
    let parts = config.named_parts.clone();
    let mut builder = Typed::builder()
        .config(config)
        .markup(terminal_markup())
        .sink(terminal_sink(parts));
    if let (Some(locale), Some(path)) = (&args.locale, &args.keyboard) {
        builder = builder.keyboard(locale.clone(), load_keyboard(path)?);
    }
    builder.build().context("invalid typing configuration")
}

/// Run `typed` to completion. The first Ctrl+C fast-forwards; the second resets and aborts.
async fn animate(typed: &Typed, fast_forward_after: Option<u64>) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<()>();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("failed to install Ctrl+C handler")?;

    let control = async {
        let mut deadline = fast_forward_after
            .map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms));
        let mut presses = 0usize;
        loop {
            let timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                () = timer => {
                    typed.fast_forward();
                    deadline = None;
                }
                pressed = rx.recv() => {
                    if pressed.is_none() {
                        std::future::pending::<()>().await;
                    }
                    presses += 1;
                    if presses == 1 {
                        typed.fast_forward();
                    } else {
                        typed.reset(true).await;
                        return;
                    }
                }
            }
        }
    };

    print!("\x1b[s");
    io::stdout().flush().ok();

    let result = tokio::select! {
        result = typed.run() => result.context("typing failed"),
        () = control => Err(anyhow!("aborted")),
    };
    println!();
    result
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;

    match cli.command {
        Command::Type {
            input,
            style,
            engine,
        } => {
            let text = read_input(&input)?;
            let mut config = TypedConfig::default();
            apply_engine_args(&mut config, &engine);
            let typed = build_engine(config, &engine)?;

            let options = SentenceOptions {
                style,
                ..Default::default()
            };
            typed.type_text(&text, options)?;

            eprintln!("Typing {} characters...", text.chars().count());
            runtime.block_on(animate(&typed, engine.fast_forward_after))?;
        }
        Command::Play { script, engine } => {
            let json = fs::read_to_string(&script)
                .with_context(|| format!("failed to read {}", script.display()))?;
            let script = Script::from_json(&json).context("failed to parse script JSON")?;

            let mut config = script.config.clone();
            apply_engine_args(&mut config, &engine);
            let typed = build_engine(config, &engine)?;
            script.enqueue(&typed)?;

            eprintln!(
                "Playing: {} instructions, {:.1}s of pauses",
                script.instructions.len(),
                (script.total_wait_ms() as f64) / 1000.0
            );
            runtime.block_on(animate(&typed, engine.fast_forward_after))?;
        }
    }

    Ok(())
}
