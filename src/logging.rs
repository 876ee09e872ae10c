use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

/// Инициализация fern логгера: отдельный файл на сессию плюс stdout.
/// Возвращает путь к файлу лога сессии.
pub fn init_logging(logs_dir: &Path, verbose: bool) -> PathBuf {
    let _ = fs::create_dir_all(logs_dir);

    // Один файл на запуск - не нужно фильтровать по маркерам сессии
    let session_id = Local::now().timestamp();
    let log_file = logs_dir.join(format!("packwright_{}.log", session_id));

    let base = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .level_for("hyper", log::LevelFilter::Warn)
        .level_for("hyper_util", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Warn)
        .level_for("rustls", log::LevelFilter::Warn);

    let file_output: fern::Output = match fern::log_file(&log_file) {
        Ok(file) => file.into(),
        Err(_) => fern::Output::writer(Box::new(std::io::sink()), "\n"),
    };

    // В консоль info (debug с -v), в файл всегда debug
    let console = fern::Dispatch::new()
        .level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .chain(std::io::stdout());

    let logger = base.chain(console).chain(file_output);

    if let Err(e) = logger.apply() {
        eprintln!("Failed to initialize logger: {}", e);
    }

    log::info!("=== packwright {} started ===", env!("CARGO_PKG_VERSION"));
    log::info!("Session ID: {}", session_id);
    log::debug!("Log file: {:?}", log_file);

    log_file
}
