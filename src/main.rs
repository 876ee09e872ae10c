use clap::{Parser, Subcommand};
use packwright_lib::config::Config;
use packwright_lib::modpack::{self, CompletionTask, ImportRequest, SelectionSet};
use packwright_lib::progress::LogProgress;
use packwright_lib::task::{TaskContext, TaskExecutor};
use packwright_lib::{cancellation, logging, LauncherError, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "packwright", version, about = "Install and complete CurseForge modpacks")]
struct Cli {
    /// TOML config file
    #[arg(long, env = "PACKWRIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Launcher home directory (overrides config and PACKWRIGHT_HOME)
    #[arg(long)]
    home: Option<PathBuf>,

    /// Debug output on the console
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve and download whatever an installed modpack is missing
    Complete {
        /// Version directory name
        version: String,
    },
    /// Install a modpack archive as a new version and complete it
    Import {
        archive: PathBuf,
        /// Version name to create
        #[arg(long)]
        name: String,
        /// Manifest entry path to leave out (repeatable)
        #[arg(long = "skip", value_name = "PATH")]
        skip: Vec<String>,
        /// Copy archives without a manifest as-is instead of failing
        #[arg(long)]
        copy_as_is: bool,
    },
    /// Show what a modpack archive contains
    Inspect { archive: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            report(&e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(home) = cli.home {
        config.base_dir = Some(home);
    }

    logging::init_logging(&config.paths().logs_dir(), cli.verbose);

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            exit_code(&e)
        }
    }
}

async fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Complete { version } => {
            let env = packwright_lib::completion_env(config)?;
            let task = CompletionTask::load(&env, &version)?;
            execute(task, config).await
        }
        Command::Import {
            archive,
            name,
            skip,
            copy_as_is,
        } => {
            let env = packwright_lib::completion_env(config)?;
            let selection = if skip.is_empty() {
                None
            } else {
                let parsed = modpack::read_modpack_archive(&archive).await;
                parsed
                    .ok()
                    .map(|a| SelectionSet::all_of(&a.manifest).without(skip.iter().map(String::as_str)))
            };
            let request = ImportRequest {
                archive: archive.clone(),
                name: name.clone(),
                selection,
            };

            match modpack::install_modpack(&env, request).await {
                Ok(task) => execute(task, config).await,
                Err(LauncherError::ManuallyCreatedArchive(_)) if copy_as_is => {
                    let copied = modpack::install_manual_archive(&env, &archive, &name).await?;
                    println!("Copied {} file(s) into version '{}'", copied, name);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        Command::Inspect { archive } => {
            let pack = modpack::read_modpack_archive(&archive).await?;
            let manifest = &pack.manifest;
            println!("{} {}", manifest.name, manifest.version);
            if let Some(author) = &manifest.author {
                println!("  author:    {}", author);
            }
            println!("  minecraft: {}", manifest.minecraft.version);
            for loader in &manifest.minecraft.mod_loaders {
                println!(
                    "  loader:    {}{}",
                    loader.id,
                    if loader.primary { " (primary)" } else { "" }
                );
            }
            println!(
                "  files:     {} ({} without metadata)",
                manifest.files.len(),
                manifest.unresolved_count()
            );
            println!("  overrides: {} file(s) in {}", pack.override_count, manifest.overrides_prefix());
            for entry in &manifest.files {
                println!(
                    "    {:<24} {}{}",
                    entry.path,
                    entry.file_name.as_deref().unwrap_or("-"),
                    if entry.required { "" } else { " (optional)" }
                );
            }
            Ok(())
        }
    }
}

async fn execute(task: CompletionTask, config: &Config) -> Result<()> {
    let operation = cancellation::register(&format!("complete-{}", uuid::Uuid::new_v4().simple()));

    let interrupt = tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling running operations");
            cancellation::cancel_all();
        }
    });

    let ctx = TaskContext::new(operation.id(), operation.token(), Arc::new(LogProgress));
    let result = TaskExecutor::new(ctx, config.concurrency.downloads)
        .run(Box::new(task))
        .await;

    interrupt.abort();
    result
}

fn report(error: &LauncherError) {
    let info = error.to_error_info();
    eprintln!("error: {}", info.message);
    if let Some(details) = &info.details {
        eprintln!("  {}", details);
    }
    if let Some(hint) = &info.recovery_hint {
        eprintln!("hint: {}", hint);
    }
    if matches!(error, LauncherError::ManuallyCreatedArchive(_)) {
        eprintln!("hint: pass --copy-as-is to install it anyway");
    }
}

fn exit_code(error: &LauncherError) -> ExitCode {
    match error {
        LauncherError::ResourceGone(_) => ExitCode::from(3),
        e if e.is_completion_failure() => ExitCode::from(2),
        LauncherError::OperationCancelled => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    }
}
