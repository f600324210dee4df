use anyhow::Result;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Maps a configured level name onto a filter; unknown names mean `info`.
pub fn parse_level(log_level: &str) -> log::LevelFilter {
    match log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

/// Installs the global logger: a fresh `{app_name}_<timestamp>.log` in
/// `log_dir`, plus stdout when `console` is set.
pub fn setup_logging(log_dir: &Path, log_level: &str, app_name: &str, console: bool) -> Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    // Clean up old log files, keeping only the most recent one
    cleanup_old_logs(log_dir)?;

    let log_file_name = format!("{}_{}.log", app_name, chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"));
    let log_path = log_dir.join(log_file_name);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(parse_level(log_level))
        // HTTP stack internals stay at warn.
        .level_for("hyper_util", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Warn);

    if console {
        dispatch = dispatch.chain(std::io::stdout());
    }
    dispatch.chain(fern::log_file(log_path)?).apply()?;

    Ok(())
}

/// Deletes every `.log` file in `log_dir` except the newest one.
pub fn cleanup_old_logs(log_dir: &Path) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "log"))
        .map(|e| {
            let modified = e
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, e.path())
        })
        .collect();

    // Sort by modification time, newest first
    entries.sort_by_key(|(modified, _)| std::cmp::Reverse(*modified));

    for (_, path) in entries.iter().skip(1) {
        if let Err(e) = fs::remove_file(path) {
            eprintln!("Failed to delete old log file {:?}: {}", path, e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn only_newest_log_survives() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.log"), "old").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        fs::write(dir.path().join("b.log"), "new").unwrap();
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        cleanup_old_logs(dir.path()).unwrap();

        assert!(!dir.path().join("a.log").exists());
        assert!(dir.path().join("b.log").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn level_names() {
        assert_eq!(parse_level("DEBUG"), log::LevelFilter::Debug);
        assert_eq!(parse_level("trace"), log::LevelFilter::Trace);
        assert_eq!(parse_level("whatever"), log::LevelFilter::Info);
    }
}
