use clap::Parser;
mod cli;
mod provider;
mod render;

use std::sync::Arc;
use std::time::Duration;

use genflow_core::config::LoggingConfig;
use genflow_core::{
    load_default, Callbacks, GenError, MediaParams, MediaType, NoticeLevel, Orchestrator,
    ProviderAdapter, TaskStatus, TelemetrySink, TracingSink,
};
use provider::{HttpProvider, MockProvider};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, GenError> {
    let args = cli::Args::parse();
    let cfg = load_default().map_err(|e| GenError::Config(e.to_string()))?;
    init_tracing(&cfg.logging).map_err(GenError::Config)?;

    match args.command {
        cli::Commands::Config => {
            let toml =
                toml::to_string_pretty(&cfg).map_err(|e| GenError::Config(e.to_string()))?;
            print!("{toml}");
            Ok(0)
        }
        cli::Commands::Generate(gen_args) => run_generate(gen_args, &cfg).await,
    }
}

async fn run_generate(
    args: cli::GenerateArgs,
    cfg: &genflow_core::GenConfig,
) -> Result<i32, GenError> {
    let media_type: MediaType = args
        .media
        .parse()
        .map_err(GenError::InvalidRequest)?;
    let media = media_params(&args, media_type);

    let adapter: Arc<dyn ProviderAdapter> = if args.mock {
        Arc::new(MockProvider::default())
    } else {
        Arc::new(HttpProvider::new(&cfg.provider)?)
    };

    let sink: Arc<dyn TelemetrySink> =
        match genflow_core::start_jsonl_sink(&cfg.telemetry).await? {
            Some(jsonl) => Arc::new(jsonl),
            None => Arc::new(TracingSink),
        };

    let orch = Arc::new(Orchestrator::new(adapter, cfg, sink));

    let render_progress = !args.quiet && atty::is(atty::Stream::Stderr);
    let renderer = render::spawn_renderer(orch.store(), render_progress);

    // Ctrl-C cancels the in-flight generation instead of killing the process.
    {
        let orch = orch.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                orch.cancel_generation().await;
            }
        });
    }

    let callbacks = Callbacks {
        on_notice: Some(Arc::new(|level, msg| {
            let prefix = match level {
                NoticeLevel::Info => "•",
                NoticeLevel::Success => "✅",
                NoticeLevel::Warning => "⚠️",
                NoticeLevel::Error => "❌",
            };
            eprintln!("{prefix} {msg}");
        })),
        ..Callbacks::default()
    };

    let request = genflow_core::GenerateRequest {
        prompt: args.prompt,
        model: args.model,
        media,
        reference_url: args.reference_url,
    };

    let url = orch.generate(request, &callbacks).await;
    let status = orch
        .store()
        .current_task()
        .await
        .map(|t| t.status);

    // Let the renderer catch the terminal event before shutdown clears it.
    let _ = tokio::time::timeout(Duration::from_millis(500), renderer).await;
    orch.shutdown().await;

    if let Some(url) = url {
        println!("{url}");
        return Ok(0);
    }

    // 2: rejected before a task was created (validation or busy)
    // 30: provider failure or open circuit
    // 40: canceled
    // 50: internal/uncategorized
    Ok(match status {
        None => 2,
        Some(TaskStatus::Canceled) => 40,
        Some(TaskStatus::Failed) => 30,
        _ => 50,
    })
}

fn media_params(args: &cli::GenerateArgs, media_type: MediaType) -> MediaParams {
    match media_type {
        MediaType::Image => MediaParams::Image {
            aspect_ratio: args.aspect_ratio.clone(),
            style: args.style.clone(),
        },
        MediaType::Video => MediaParams::Video {
            duration_secs: args.duration_secs,
            resolution: args.resolution.clone(),
        },
        MediaType::Audio => MediaParams::Audio {
            duration_secs: args.duration_secs,
            voice: args.voice.clone(),
        },
    }
}

fn exit_code_for_error(e: &GenError) -> i32 {
    // 0: success
    // 2: invalid request
    // 11: config error
    // 30: provider failure or open circuit
    // 50: internal/uncategorized
    match e {
        GenError::InvalidRequest(_) => 2,
        GenError::Config(_) => 11,
        GenError::Provider(_) | GenError::CircuitOpen { .. } => 30,
        _ => 50,
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("genflow"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("genflow.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
