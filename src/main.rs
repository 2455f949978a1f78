use colored::*;
use crossbeam::channel;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use chrono::Local;
use upload_monitor::{Monitor, MonitorConfig, Notification, NotificationKind, Scrollback};

struct Args {
    watch_dir: Option<PathBuf>,
    config_file: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let program = args.next().unwrap_or_else(|| "upload-monitor".to_string());
    let usage = format!("Usage: {} [watch_dir] [--config <config.json>]", program);

    let mut parsed = Args { watch_dir: None, config_file: None };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                let path = args.next().ok_or_else(|| usage.clone())?;
                parsed.config_file = Some(PathBuf::from(path));
            }
            "-h" | "--help" => return Err(usage),
            _ if parsed.watch_dir.is_none() && !arg.starts_with('-') => {
                parsed.watch_dir = Some(PathBuf::from(&arg));
            }
            _ => return Err(usage),
        }
    }
    Ok(parsed)
}

fn print_line(notification: &Notification, line: &str) {
    let line = match notification.kind {
        NotificationKind::Info => line.normal(),
        NotificationKind::Processing => line.cyan(),
        NotificationKind::Success => line.green(),
        NotificationKind::Warning => line.yellow(),
        NotificationKind::Error => line.red(),
    };
    println!("{}", line);
}

// Binary entry point - thin wrapper around Monitor
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = match parse_args(std::env::args()) {
        Ok(args) => args,
        Err(usage) => {
            eprintln!("{} {}", "❌".red(), usage);
            std::process::exit(2);
        }
    };

    let config = match &args.config_file {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::from_env()?,
    };
    let watch_dir = match args.watch_dir {
        Some(dir) => dir,
        None => config.resolve_watch_dir()?,
    };

    println!("{}", "=".repeat(80).blue());
    println!("🚀 {} - File Upload Monitor", "UPLOAD".bold().green());
    println!("{}", "=".repeat(80).blue());
    println!("📁 Folder:   {}", watch_dir.display().to_string().cyan());
    println!("🌐 Endpoint: {}", config.endpoint.cyan());
    println!("🕐 Started at: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("{}", "=".repeat(80).blue());

    let runtime = tokio::runtime::Runtime::new()?;
    let mut scrollback = Scrollback::new(config.scrollback_lines);
    let (monitor, notifications) = Monitor::new(config, runtime.handle().clone())?;
    let monitor = Arc::new(monitor);

    // Set up Ctrl-C handler
    let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
    let ctrlc_monitor = Arc::clone(&monitor);
    ctrlc::set_handler(move || {
        println!("{} Received shutdown signal, stopping...", "🛑".red());
        ctrlc_monitor.stop();
        let _ = shutdown_tx.try_send(());
    })?;

    if let Err(e) = monitor.start(&watch_dir) {
        for notification in notifications.try_iter() {
            let line = scrollback.push(&notification).to_string();
            print_line(&notification, &line);
        }
        return Err(e.into());
    }

    loop {
        channel::select! {
            recv(notifications) -> msg => match msg {
                Ok(notification) => {
                    let line = scrollback.push(&notification).to_string();
                    print_line(&notification, &line);
                }
                Err(_) => break,
            },
            recv(shutdown_rx) -> _ => break,
            default(Duration::from_millis(500)) => {
                if !monitor.is_running() {
                    break;
                }
            }
        }
    }

    monitor.stop();
    // Let uploads that are already running finish and report.
    runtime.shutdown_timeout(Duration::from_secs(2));
    for notification in notifications.try_iter() {
        let line = scrollback.push(&notification).to_string();
        print_line(&notification, &line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_folder_and_config() {
        let parsed = args(&["upload-monitor", "/data/in", "--config", "cfg.json"]).unwrap();
        assert_eq!(parsed.watch_dir, Some(PathBuf::from("/data/in")));
        assert_eq!(parsed.config_file, Some(PathBuf::from("cfg.json")));

        let parsed = args(&["upload-monitor"]).unwrap();
        assert!(parsed.watch_dir.is_none() && parsed.config_file.is_none());
    }

    #[test]
    fn rejects_unknown_flags_and_extra_folders() {
        assert!(args(&["upload-monitor", "--verbose"]).is_err());
        assert!(args(&["upload-monitor", "/a", "/b"]).is_err());
        assert!(args(&["upload-monitor", "--config"]).is_err());
    }
}
