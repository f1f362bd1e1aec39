//! Basic asset loading.
//!
//! This example shows:
//! - Creating an asset manager driven by a host-ticked executor
//! - Registering built-in and custom loaders
//! - Observing statuses, callbacks and events
//! - Reading files from disk through a `FileReader`

use std::io::Write;
use std::sync::Arc;

use async_executor::Executor;
use surreal_assets::*;

/// A key=value settings file.
#[derive(Debug)]
struct Settings {
    entries: Vec<(String, String)>,
}

impl Asset for Settings {
    fn type_name() -> &'static str {
        "Settings"
    }

    fn estimated_size(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

/// Parses settings on top of the text loader.
struct SettingsLoader;

impl AssetLoader for SettingsLoader {
    type Asset = Settings;

    fn load(&self, ctx: LoadContext) -> LoadFuture<Settings> {
        Box::pin(async move {
            let text = ctx.load_data::<String>(ctx.path().clone()).await?;
            let entries = text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(|line| match line.split_once('=') {
                    Some((key, value)) => Ok((key.trim().to_string(), value.trim().to_string())),
                    None => Err(AssetError::loader(ctx.path(), format!("expected key=value, got `{}`", line))),
                })
                .collect::<AssetResult<Vec<_>>>()?;
            Ok(Settings { entries })
        })
    }
}

fn tick(executor: &Executor<'static>) {
    while executor.try_tick() {}
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    surreal_core::logging::init();

    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("config"))?;
    let mut file = std::fs::File::create(dir.path().join("config/game.cfg"))?;
    writeln!(file, "# game settings")?;
    writeln!(file, "title = Surreal Demo")?;
    writeln!(file, "max_players = 4")?;
    std::fs::write(dir.path().join("config/broken.cfg"), "this line has no separator")?;

    let executor = Arc::new(Executor::new());
    let reader: Arc<dyn BytesReader> = Arc::new(FileReader::new(dir.path()));
    let manager = AssetManager::builder(executor.clone(), Arc::new(ImmediateDispatcher))
        .loader(TextLoader::new(reader.clone()))
        .loader(BytesLoader::new(reader))
        .loader(SettingsLoader)
        .build();

    println!("Registered loaders: {:?}", manager.loader_type_names());

    let settings = manager.load::<Settings>("config/game.cfg")?;
    let broken = manager.load::<Settings>("config/broken.cfg")?;
    let raw = manager.load::<Vec<u8>>("config/game.cfg")?;
    println!("Before tick: {:?} / {:?}", settings.status(), broken.status());

    settings.on_ready(|| println!("  callback: game.cfg settled"));

    tick(&executor);

    for (key, value) in &settings.data()?.entries {
        println!("  {} = {}", key, value);
    }
    println!("Raw bytes: {}", raw.data()?.len());

    if let Some(error) = broken.error() {
        println!("broken.cfg failed: {}", error);
    }

    match manager.load::<u32>("numbers/1") {
        Err(error) => println!("Expected error: {}", error),
        Ok(_) => println!("Unexpected loader for u32"),
    }

    println!("Assets cached: {}, ~{} bytes", manager.len(), manager.estimated_size());

    for event in manager.drain_events() {
        println!("  event: {:?}", event);
    }

    drop(broken);
    println!("After dropping broken.cfg: {} cached", manager.len());

    Ok(())
}
