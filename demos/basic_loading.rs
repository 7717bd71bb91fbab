//! Basic loading example for archetype_cache
//!
//! Populates a cache from a directory (default `assets/`) and prints what it
//! found.

use archetype_cache::{DirectoryListing, MockBackend, Populator, ResourceCache, Texture};

fn main() -> anyhow::Result<()> {
    let root = std::env::args().nth(1).unwrap_or_else(|| "assets".to_string());

    // Mock devices; no real hardware needed
    let cache = ResourceCache::new(MockBackend::new());

    println!("archetype_cache v{}", archetype_cache::VERSION);

    let populator = Populator::new(&cache)?;
    let report = populator.populate_files(&DirectoryListing::new(&root))?;
    println!(
        "Populated from {}: {} decoded, {} uploaded, {} skipped, {} failed",
        root, report.decoded, report.uploaded, report.skipped, report.failed
    );

    let mut names = cache.names();
    names.sort();
    for name in &names {
        let handle = cache.get_any(name);
        println!(
            "  {:<40} {:<16} {:?}",
            name,
            handle.kind().unwrap_or("?"),
            handle.state()
        );
    }

    let wide = cache.find_all::<Texture>(|_, texture| texture.width() >= 256);
    println!("{} textures at least 256px wide", wide.len());

    cache.unload_all();
    println!("Basic loading example complete!");
    Ok(())
}
