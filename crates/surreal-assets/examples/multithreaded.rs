//! Multithreaded asset loading.
//!
//! This example demonstrates:
//! - Loading on a background task pool
//! - Requesting the same asset from several threads at once
//! - Sharing handles across threads
//! - Awaiting handles, and callbacks delivered back to the main thread

use std::sync::Arc;
use std::sync::mpsc::channel;
use std::thread;
use std::time::{Duration, Instant};

use surreal_assets::*;
use surreal_core::TaskPool;

/// A game configuration asset.
#[derive(Debug, Clone)]
struct GameConfig {
    name: String,
    max_entities: u32,
}

impl Asset for GameConfig {
    fn type_name() -> &'static str {
        "GameConfig"
    }
}

/// Parses a simple key=value format, taking a while to do so.
struct GameConfigLoader {
    reader: Arc<dyn BytesReader>,
}

impl AssetLoader for GameConfigLoader {
    type Asset = GameConfig;

    fn load(&self, ctx: LoadContext) -> LoadFuture<GameConfig> {
        let reader = self.reader.clone();
        Box::pin(async move {
            let bytes = reader.read_bytes(ctx.path()).await?;
            let text = std::str::from_utf8(&bytes)
                .map_err(|e| AssetError::loader(ctx.path(), format!("Invalid UTF-8: {}", e)))?;

            // Simulate an expensive decode.
            thread::sleep(Duration::from_millis(20));

            let mut config = GameConfig {
                name: String::from("Unknown"),
                max_entities: 1000,
            };
            for (key, value) in text.lines().filter_map(|line| line.split_once('=')) {
                match key.trim() {
                    "name" => config.name = value.trim().to_string(),
                    "max_entities" => {
                        config.max_entities = value.trim().parse().map_err(|_| {
                            AssetError::loader(ctx.path(), format!("bad max_entities `{}`", value.trim()))
                        })?
                    }
                    _ => {}
                }
            }
            Ok(config)
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    surreal_core::logging::init();

    let reader = MemoryReader::new()
        .with("configs/arena.cfg", "name = Arena\nmax_entities = 256")
        .with("configs/forest.cfg", "name = Forest\nmax_entities = 4096")
        .with("configs/broken.cfg", "name = Broken\nmax_entities = lots");

    // Callbacks registered with `on_ready` come back to this thread.
    let main_thread = Arc::new(QueuedDispatcher::new());
    let pool = Arc::new(TaskPool::new(4)?);
    let manager = Arc::new(AssetManager::new(pool, main_thread.clone()));
    manager.add_loader(GameConfigLoader {
        reader: Arc::new(reader),
    });

    println!("Requesting arena.cfg from 8 threads...");
    let workers: Vec<_> = (0..8)
        .map(|i| {
            let manager = manager.clone();
            thread::spawn(move || -> AssetResult<Handle<GameConfig>> {
                let handle = manager.load::<GameConfig>("configs/arena.cfg")?;
                println!("  thread {} got {:?}", i, handle.id());
                Ok(handle)
            })
        })
        .collect();

    let mut handles = Vec::new();
    for worker in workers {
        match worker.join() {
            Ok(result) => handles.push(result?),
            Err(_) => return Err("worker thread panicked".into()),
        }
    }
    println!("Entries after concurrent requests: {}", manager.len());
    println!("References to arena.cfg: {}", handles[0].ref_count());

    let (tx, rx) = channel();
    let forest = manager.load::<GameConfig>("configs/forest.cfg")?;
    let notify = tx.clone();
    forest.on_ready(move || {
        let _ = notify.send("forest.cfg");
    });
    let broken = manager.load::<GameConfig>("configs/broken.cfg")?;
    broken.on_ready(move || {
        let _ = tx.send("broken.cfg");
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut settled = 0;
    while settled < 2 && Instant::now() < deadline {
        main_thread.run_pending();
        while let Ok(name) = rx.try_recv() {
            println!("  settled on {:?}: {}", thread::current().name(), name);
            settled += 1;
        }
        thread::sleep(Duration::from_millis(5));
    }

    let arena = pollster::block_on(handles[0].clone().into_future())?;
    let config = arena.data()?;
    println!("{}: up to {} entities", config.name, config.max_entities);
    println!("{}: {:?}", forest.path(), forest.try_data().map(|c| c.max_entities));

    match pollster::block_on(broken.ready()) {
        Ok(_) => println!("broken.cfg unexpectedly loaded"),
        Err(error) => println!("broken.cfg: {}", error),
    }

    Ok(())
}
