//! Draft inspector entry point (native).

#[cfg(feature = "native")]
mod cli {
    use layers_app::{DEFAULT_PREVIEW_SIZE, ShortcutRegistry, inspector};
    use layers_core::storage::FileStorage;
    use layers_core::{Clock, DraftConfig, SystemClock};
    use std::path::{Path, PathBuf};

    const USAGE: &str = "Usage: layers-drafts [--dir PATH] [--config FILE] <command>

Commands:
  list                 List stored drafts, newest first
  show KEY             Print a draft as JSON
  purge                Delete expired drafts
  preview KEY OUT.png  Render a draft to a PNG file
  shortcuts            Print the editor's keyboard shortcuts";

    struct Args {
        dir: Option<PathBuf>,
        config: Option<PathBuf>,
        command: Vec<String>,
    }

    fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
        let mut parsed = Args {
            dir: None,
            config: None,
            command: Vec::new(),
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--dir" => parsed.dir = Some(args.next().ok_or("--dir needs a path")?.into()),
                "--config" => parsed.config = Some(args.next().ok_or("--config needs a path")?.into()),
                "-h" | "--help" => return Err(USAGE.to_string()),
                _ => parsed.command.push(arg),
            }
        }
        Ok(parsed)
    }

    fn load_config(path: Option<&PathBuf>) -> Result<DraftConfig, String> {
        let Some(path) = path else {
            return Ok(DraftConfig::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        serde_json::from_str(&text).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
    }

    async fn execute(args: Args) -> Result<(), String> {
        let config = load_config(args.config.as_ref())?;
        let storage = match args.dir {
            Some(dir) => FileStorage::new(dir),
            None => FileStorage::default_location(),
        }
        .map_err(|e| e.to_string())?;
        log::debug!("Using drafts in {}", storage.base_path().display());
        let now = SystemClock.epoch_millis();

        let command: Vec<&str> = args.command.iter().map(String::as_str).collect();
        match command.as_slice() {
            ["list"] => {
                let lines = inspector::list(&storage, now).await;
                if lines.is_empty() {
                    println!("No drafts.");
                }
                for line in lines {
                    println!("{}", line);
                }
            }
            ["show", key] => {
                let json = inspector::show(&storage, key).await.map_err(|e| e.to_string())?;
                println!("{}", json);
            }
            ["purge"] => {
                for key in inspector::purge(&storage, now, config.max_age_ms).await {
                    println!("Deleted {}", key);
                }
            }
            ["preview", key, out] => {
                let (width, height) =
                    inspector::export_preview(&storage, key, Path::new(out), DEFAULT_PREVIEW_SIZE)
                        .await
                        .map_err(|e| e.to_string())?;
                println!("Wrote {}x{} preview to {}", width, height, out);
            }
            ["shortcuts"] => ShortcutRegistry::print_all(),
            _ => return Err(USAGE.to_string()),
        }
        Ok(())
    }

    pub fn run() -> Result<(), String> {
        let args = parse_args(std::env::args().skip(1))?;
        pollster::block_on(execute(args))
    }
}

#[cfg(feature = "native")]
fn main() {
    env_logger::init();
    log::info!("Starting layers-drafts");

    if let Err(message) = cli::run() {
        eprintln!("{}", message);
        std::process::exit(2);
    }
}

#[cfg(not(feature = "native"))]
fn main() {
    eprintln!("Native feature not enabled. Use `cargo run --features native`");
}
