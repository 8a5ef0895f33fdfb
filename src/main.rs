use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dtform::api::http::{api_status, format_api_error};
use dtform::api::ApiClient;
use dtform::codec;
use dtform::config::Config;
use dtform::download::{escape, DownloadConfig, Downloader};
use dtform::provider::Provider;
use dtform::resource::{until_cancelled, DeleteContext, Registry, RetryPolicy};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Manage and download monitoring environment configuration as Terraform HCL
#[derive(Parser, Debug)]
#[command(name = "dtform", version = dtform::VERSION, about, long_about = None)]
struct Args {
    /// Environment URL, e.g. https://abc123.live.example.com
    #[arg(long, global = true, env = "DYNATRACE_ENV_URL")]
    env_url: Option<String>,

    /// API token
    #[arg(long, global = true, env = "DYNATRACE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Log level for debugging
    #[arg(long, global = true, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// Log sanitized request and response bodies
    #[arg(long, global = true, env = "DYNATRACE_HTTP_VERBOSE")]
    http_verbose: bool,

    /// Give up retrying a delete after this many seconds
    #[arg(long, global = true)]
    delete_deadline: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download remote configuration into .tf files
    Download {
        /// Folder to write into
        #[arg(long, env = "DYNATRACE_TARGET_FOLDER")]
        target: Option<PathBuf>,

        /// Prefix every resource with a comment holding its remote ID
        #[arg(long)]
        commented_id: bool,

        /// Only download these resource types (comma separated)
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
    },
    /// List the supported resource types
    Kinds,
    /// Print one remote object as HCL
    Show { res_type: String, id: String },
    /// Create every resource block of an HCL file
    Create { file: PathBuf },
    /// Update a remote object from the matching resource block of an HCL file
    Update {
        res_type: String,
        id: String,
        file: PathBuf,
    },
    /// Delete a remote object
    Delete { res_type: String, id: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("dtform started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("dtform").join("dtform.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".dtform").join("dtform.log");
    }
    PathBuf::from("dtform.log")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        tracing::error!("{:#}", err);
        eprintln!("Error: {:#}", err);
        if api_status(&err).is_some() {
            eprintln!("{}", format_api_error(&err));
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load();
    let registry = Registry::embedded()?;

    // Listing types needs neither credentials nor network
    if let Command::Kinds = args.command {
        for (type_name, folder) in Provider::catalog(&registry) {
            println!("{:<40} {}", type_name, folder);
        }
        return Ok(());
    }

    let env_url = config
        .effective_env_url(args.env_url.as_deref())
        .context("No environment URL configured. Set DYNATRACE_ENV_URL or use --env-url")?;
    let Some(api_token) = args.api_token.as_deref() else {
        bail!("No API token configured. Set DYNATRACE_API_TOKEN or use --api-token");
    };

    let client = ApiClient::new(&env_url, api_token, args.http_verbose)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted");
            ctrl_c.cancel();
        }
    });

    let mut retry = RetryPolicy::default();
    if let Some(secs) = args.delete_deadline {
        retry = retry.with_deadline(Duration::from_secs(secs));
    }
    let provider = Provider::new(
        &client,
        &registry,
        DeleteContext {
            retry,
            cancel: cancel.clone(),
        },
    );

    // Delete stops its own retry loop on cancellation
    let interruptible = !matches!(args.command, Command::Delete { .. });
    let work = execute(args.command, &provider, &mut config, &env_url);
    if interruptible {
        until_cancelled(&cancel, work).await
    } else {
        work.await
    }
}

async fn execute(
    command: Command,
    provider: &Provider,
    config: &mut Config,
    env_url: &str,
) -> Result<()> {
    match command {
        Command::Download {
            target,
            commented_id,
            only,
        } => {
            let target_folder = config.effective_target_folder(target.as_deref());
            let downloader = Downloader::new(
                provider,
                DownloadConfig {
                    target_folder: target_folder.clone(),
                    commented_id,
                },
            );
            let summary = downloader.run(&only).await?;

            for (res_type, count) in &summary.written {
                println!("{:<40} {}", res_type, count);
            }
            if summary.requires_attention > 0 {
                println!(
                    "{} resource(s) require attention, see {}",
                    summary.requires_attention,
                    target_folder
                        .join(dtform::download::REQUIRES_ATTENTION_FOLDER)
                        .display()
                );
            }

            if let Err(e) = config.remember_download(env_url, &target_folder) {
                tracing::warn!("could not save config: {:#}", e);
            }
        }
        Command::Show { res_type, id } => {
            let registration = provider
                .resource(&res_type)
                .with_context(|| format!("Unknown resource type: {}", res_type))?;
            let mut data = provider.import(&res_type, &id)?;
            registration.handler.read(&mut data).await.into_result()?;

            let label = escape(data.get_str("name").unwrap_or(id.as_str()));
            let redacted = registration.schema.redacted(&data);
            print!("{}", codec::to_hcl_string(&redacted, &res_type, &label)?);
        }
        Command::Create { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            for mut parsed in codec::parse_resources(&text)? {
                let handler = provider.handler(&parsed.res_type)?;
                handler.create(&mut parsed.data).await.into_result()?;
                println!(
                    "{}.{} = {}",
                    parsed.res_type,
                    parsed.label,
                    parsed.data.id().unwrap_or_default()
                );
            }
        }
        Command::Update { res_type, id, file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let mut parsed = codec::parse_resources(&text)?
                .into_iter()
                .find(|r| r.res_type == res_type)
                .with_context(|| format!("{} has no {} resource", file.display(), res_type))?;

            parsed.data.set_id(id);
            provider
                .handler(&res_type)?
                .update(&mut parsed.data)
                .await
                .into_result()?;
            println!("updated {}.{}", res_type, parsed.label);
        }
        Command::Kinds => {
            for type_name in provider.type_names() {
                println!("{:<40} {}", type_name, provider.handler(type_name)?.folder());
            }
        }
        Command::Delete { res_type, id } => {
            let handler = provider.handler(&res_type)?;
            let mut data = provider.import(&res_type, &id)?;

            // State drives kind-specific cleanup, but a failed read must not block the delete
            let read = handler.read(&mut data).await;
            if read.has_error() {
                tracing::warn!("deleting {} {} without state: {:?}", res_type, id, read);
            }

            handler.delete(&mut data).await.into_result()?;
            println!("deleted {} {}", res_type, id);
        }
    }

    Ok(())
}
