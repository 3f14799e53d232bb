//! Stream a markdown file through the renderer and print the result.
//!
//! Usage:
//!   md-render-demo [FILE] [--options opts.json] [--speed N] [--strategy S] [--plain]
//!
//! Reads stdin when no file is given. Prints the final HTML followed by the
//! JSON report.

use std::collections::BTreeSet;
use std::io::Read;

use md_chunk::ChunkingStrategy;
use md_math::{MathRenderer, TexSourceEngine};
use md_render::{HtmlSurface, StreamEvent, StreamOptions, StreamingOrchestrator};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

struct Args {
    input: Option<String>,
    options: Option<String>,
    speed: Option<u32>,
    strategy: Option<ChunkingStrategy>,
    plain: bool,
}

impl Args {
    // parse arguments, return set of unrecognized args
    fn parse(args: &[String]) -> (Self, BTreeSet<String>) {
        let mut unrecognized = BTreeSet::new();
        let mut res = Args {
            input: None,
            options: None,
            speed: None,
            strategy: None,
            plain: false,
        };

        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];

            if arg == "--options" {
                i += 1;
                res.options = args.get(i).cloned();
            } else if arg == "--speed" {
                i += 1;
                match args.get(i).map(|s| s.parse::<u32>()) {
                    Some(Ok(speed)) => res.speed = Some(speed),
                    _ => warn!("--speed needs a number"),
                }
            } else if arg == "--strategy" {
                i += 1;
                match args.get(i).map(|s| s.parse::<ChunkingStrategy>()) {
                    Some(Ok(strategy)) => res.strategy = Some(strategy),
                    Some(Err(err)) => warn!("{err}"),
                    None => warn!("--strategy argument missing"),
                }
            } else if arg == "--plain" {
                res.plain = true;
            } else if res.input.is_none() && !arg.starts_with("--") {
                res.input = Some(arg.clone());
            } else {
                unrecognized.insert(arg.clone());
            }

            i += 1;
        }

        (res, unrecognized)
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("md_render=info,md_math=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(path: Option<&str>) -> std::io::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    setup_logging();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let (args, unrecognized) = Args::parse(&argv);
    if !unrecognized.is_empty() {
        warn!("ignoring unrecognized args: {:?}", unrecognized);
    }

    let mut options = match &args.options {
        Some(path) => match StreamOptions::load(path) {
            Ok(options) => options,
            Err(err) => {
                eprintln!("Error: could not load options from '{path}': {err}");
                std::process::exit(1);
            }
        },
        None => StreamOptions::default(),
    };
    if let Some(speed) = args.speed {
        options.streaming_speed = speed;
    }
    if args.strategy.is_some() {
        options.chunking_strategy = args.strategy;
    }
    if args.plain {
        options.enable_progressive_rendering = false;
    }

    let content = match read_input(args.input.as_deref()) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("Error: could not read input: {err}");
            std::process::exit(1);
        }
    };

    let math = MathRenderer::new(TexSourceEngine::with_default_macros());
    let mut orchestrator = StreamingOrchestrator::new(math);
    let events = orchestrator.subscribe();
    let mut surface = HtmlSurface::new();

    let report = match orchestrator
        .stream_content(&content, &mut surface, &options)
        .await
    {
        Ok(report) => report,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };

    for event in events.drain() {
        if let StreamEvent::ChunkProgress { current, total, kind, .. } = event {
            info!("chunk {current}/{total} ({kind})");
        }
    }

    println!("{}", surface.html());
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("Error: could not serialize report: {err}");
            std::process::exit(1);
        }
    }
}
