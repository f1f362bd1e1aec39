//! Asset hot-reloading.
//!
//! Watches a scratch asset directory, rewrites a file a few times and shows
//! the manager picking each change up while handles keep serving the last
//! good version.
//!
//! Run with `cargo run --example hot_reload_demo --features hot-reload`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_executor::Executor;
use surreal_assets::*;

fn tick(executor: &Executor<'static>) {
    while executor.try_tick() {}
}

/// Tick until `handle` reaches `version` or the deadline passes.
fn wait_for_version(
    executor: &Executor<'static>,
    manager: &AssetManager,
    watcher: &mut AssetWatcher,
    handle: &Handle<String>,
    version: u32,
) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        let started = manager.process_hot_reload(watcher);
        if started > 0 {
            tracing::info!("Started {} reload(s)", started);
        }
        tick(executor);
        if handle.version() >= version {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    surreal_core::logging::init();

    let dir = tempfile::tempdir()?;
    let file = dir.path().join("greeting.txt");
    std::fs::write(&file, "hello, version one")?;

    let executor = Arc::new(Executor::new());
    let manager = AssetManager::builder(executor.clone(), Arc::new(ImmediateDispatcher))
        .loader(TextLoader::new(Arc::new(FileReader::new(dir.path()))))
        .build();
    let mut watcher = AssetWatcher::new(dir.path())?;

    let greeting = manager.load::<String>("greeting.txt")?;
    tick(&executor);
    println!("v{}: {}", greeting.version(), greeting.data()?);

    for (round, text) in ["hello, version two", "hello, version three"].iter().enumerate() {
        std::fs::write(&file, text)?;
        let expected = round as u32 + 2;
        if wait_for_version(&executor, &manager, &mut watcher, &greeting, expected) {
            println!("v{}: {}", greeting.version(), greeting.data()?);
        } else {
            println!("No change observed for round {}", round + 1);
        }
    }

    // A file that can no longer be decoded keeps the last good version.
    std::fs::write(&file, [0xff, 0xfe, 0xfd])?;
    let before = greeting.version();
    wait_for_version(&executor, &manager, &mut watcher, &greeting, before + 1);
    println!("After invalid write: v{} still serving `{}`", greeting.version(), greeting.data()?);

    for event in manager.drain_events() {
        println!("  event: {:?}", event);
    }

    Ok(())
}
