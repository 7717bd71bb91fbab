//! Integration tests for two-phase bulk population

use std::io::Cursor;
use std::path::Path;

use archetype_cache::{
    AudioTrack, CacheConfig, ComputeShader, DirectoryListing, EmbeddedBinaries, FileListing,
    Font, MemoryListing, MockBackend, PopulateReport, Populator, ResourceCache, ResourceState,
    Shader, SourceFile, Texture,
};

const FAKE_TTF: &[u8] = b"\x00\x01\x00\x00\x00\x0a\x00\x80";

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::new();
    image::RgbaImage::new(width, height)
        .write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
        .unwrap();
    data
}

fn wav(frames: usize) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            writer.write_sample(i as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn write_tree(root: &Path) {
    std::fs::create_dir_all(root.join("textures")).unwrap();
    std::fs::create_dir_all(root.join("shaders")).unwrap();
    std::fs::create_dir_all(root.join("audio")).unwrap();
    std::fs::create_dir_all(root.join("fonts")).unwrap();

    for i in 0..6 {
        std::fs::write(root.join(format!("textures/tile{i}.png")), png(4, 4)).unwrap();
    }
    std::fs::write(root.join("audio/step.wav"), wav(64)).unwrap();
    std::fs::write(root.join("shaders/sprite.vert"), "void main() {}").unwrap();
    std::fs::write(root.join("shaders/sprite.frag"), "void main() {}").unwrap();
    std::fs::write(root.join("shaders/cull.comp"), "void main() {}").unwrap();
    std::fs::write(root.join("fonts/ui.ttf"), FAKE_TTF).unwrap();
    std::fs::write(root.join("README.md"), "not an asset").unwrap();
}

#[test]
fn test_populate_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path());

    let cache = ResourceCache::new(MockBackend::new());
    let listing = DirectoryListing::new(dir.path());
    let report = Populator::new(&cache)
        .unwrap()
        .populate_files(&listing)
        .unwrap();

    assert_eq!(
        report,
        PopulateReport {
            decoded: 11,
            uploaded: 11,
            skipped: 1,
            failed: 0
        }
    );
    assert!(cache.get::<Texture>("textures/tile3.png").is_loaded());
    assert!(cache.get::<AudioTrack>("audio/step.wav").is_loaded());
    assert!(cache.get::<Shader>("shaders/sprite.frag").is_loaded());
    assert!(cache.get::<ComputeShader>("shaders/cull.comp").is_loaded());
    assert!(cache.get::<Font>("fonts/ui.ttf@16").is_loaded());
    assert!(!cache.is_binary("textures/tile0.png"));
}

#[test]
fn test_devices_stay_on_calling_thread() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path());

    let cache = ResourceCache::with_config(
        MockBackend::single_threaded(),
        CacheConfig::default().with_decode_threads(4),
    );
    let report = Populator::new(&cache)
        .unwrap()
        .populate_files(&DirectoryListing::new(dir.path()))
        .unwrap();

    // A device call from a decode worker would fail with WrongThread
    assert_eq!(report.failed, 0);
    assert_eq!(cache.backend().gpu.live_textures(), 7);
    assert_eq!(cache.backend().gpu.live_shaders(), 3);
    assert_eq!(cache.backend().gpu.live_buffers(), 1);
    assert_eq!(cache.backend().audio.live_buffers(), 1);
}

#[test]
fn test_rescan_only_populates_new_files() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path());

    let cache = ResourceCache::new(MockBackend::new());
    let listing = DirectoryListing::new(dir.path());
    let populator = Populator::new(&cache).unwrap();
    populator.populate_files(&listing).unwrap();

    std::fs::write(dir.path().join("textures/extra.png"), png(2, 2)).unwrap();
    let report = populator.populate_files(&listing).unwrap();

    assert_eq!(report.decoded, 1);
    assert_eq!(report.skipped, 12);
    assert_eq!(cache.len(), 12);
}

#[test]
fn test_file_resource_back_reference() {
    let mut listing = MemoryListing::new();
    let file = listing.push("hero.png", png(2, 2));

    let cache = ResourceCache::new(MockBackend::new());
    Populator::new(&cache)
        .unwrap()
        .populate_files(&listing)
        .unwrap();

    let texture = file.resource::<Texture>();
    assert_eq!(texture, cache.get::<Texture>("hero.png"));
    assert_eq!(cache.get_by_source::<Texture>(&file), texture);
    assert!(file.resource::<Shader>().is_null());

    cache.unload("hero.png");
    assert!(!file.has_resource());
}

static PACK: &[(&str, &[u8])] = &[
    ("ui/cursor.frag", b"void main() {}"),
    ("ui/blur.comp", b"void main() {}"),
    ("ui/readme.txt", b"skip me"),
];

#[test]
fn test_populate_embedded_binaries() {
    let cache = ResourceCache::new(MockBackend::new());
    let binaries = EmbeddedBinaries::new(PACK);
    let populator = Populator::new(&cache).unwrap();

    let report = populator.populate_binaries(&binaries).unwrap();
    assert_eq!(report.uploaded, 2);
    assert_eq!(report.skipped, 1);
    assert!(cache.is_binary("ui/cursor.frag"));
    assert!(cache.get::<Shader>("ui/cursor.frag").is_loaded());

    let again = populator.populate_binaries(&binaries).unwrap();
    assert_eq!(again.skipped, 3);
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_reload_changed_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("wall.png"), png(2, 2)).unwrap();

    let cache = ResourceCache::new(MockBackend::new());
    let listing = DirectoryListing::new(dir.path());
    Populator::new(&cache)
        .unwrap()
        .populate_files(&listing)
        .unwrap();

    let files = listing.files().unwrap();
    let file: &SourceFile = &files[0];
    let wall = cache.get::<Texture>("wall.png");
    assert_eq!(wall.read(|t| t.width()), Some(2));

    // Unchanged contents are not reloaded
    assert_eq!(cache.reload_file(file).unwrap(), 0);

    std::fs::write(dir.path().join("wall.png"), png(8, 8)).unwrap();
    assert_eq!(cache.reload_file(file).unwrap(), 1);
    assert_eq!(wall.read(|t| t.width()), Some(8));
    assert_eq!(wall.state(), Some(ResourceState::Loaded));
}
