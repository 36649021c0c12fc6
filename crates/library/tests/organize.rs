use datum_library::organize::{Action, Counts, OrganizeEvent, organize, run};
use datum_library::plan::content_hash;
use datum_library::sink::MemorySink;
use datum_library::{Context, DirectoryRule, Options, Resolver, RuleSet, Strategy};
use datum_metadata::mock::MockMetadata;
use datum_metadata::{MetadataRecord, tags};
use datum_storage::backend::{LocalBackend, MockBackend};
use datum_storage::{BackendHandle, Entry, StorageBackend, Walk};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::macros::datetime;

const TARGET: &str = "2023/2023-05-01/20230501_125123.jpg";

fn jpeg(date: &str) -> MetadataRecord {
    MetadataRecord::new().with(tags::FILE_TYPE, "JPEG").with(tags::DATE_TIME_ORIGINAL, date)
}

fn options() -> Options {
    Options { recursive: true, ..Options::default() }
}

fn context(metadata: MockMetadata, options: Options) -> (Context, Arc<MemorySink>) {
    let rules = RuleSet::new(DirectoryRule::new(Strategy::Metadata, "%Y/%Y-%m-%d", "%Y%m%d_%H%M%S").unwrap());
    let sink = Arc::new(MemorySink::new());
    let ctx = Context::new(rules, options, Resolver::new(Arc::new(metadata))).with_sink(sink.clone());
    (ctx, sink)
}

async fn organize_mock(backend: &Arc<MockBackend>, metadata: MockMetadata, options: Options) -> (Counts, Vec<String>) {
    let (ctx, sink) = context(metadata, options);
    let handle: BackendHandle = backend.clone();
    let stats = run(&handle, Path::new(""), &ctx).await.unwrap();
    (stats.counts(), sink.messages())
}

async fn files(backend: &dyn StorageBackend) -> Vec<PathBuf> {
    let entries = backend.list(&Walk::new().recursive(true)).await.unwrap();
    let mut files: Vec<_> = entries
        .into_iter()
        .filter_map(|entry| match entry {
            Entry::File(info) => Some(info.path),
            Entry::Directory(_) => None,
        })
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn test_end_to_end() {
    let backend = Arc::new(MockBackend::with_files([
        ("in/a.jpg", *b"AAAA"),
        ("in/b.gif", *b"GIF8"),
        ("in/c.jpg", *b"AAAA"),
        ("in/d.jpg", *b"DDDD"),
    ]));
    let metadata = MockMetadata::new()
        .with("in/a.jpg", jpeg("2023:05:01 12:51:23"))
        .with("in/c.jpg", jpeg("2023:05:01 12:51:23"))
        .with("in/d.jpg", jpeg("2023:05:01 12:51:23"));

    let (counts, messages) = organize_mock(&backend, metadata, options()).await;

    assert_eq!(counts, Counts {
        discovered: 4,
        renamed: 1,
        deleted: 1,
        invalid: 1,
        duplicate: 1,
        ..Counts::default()
    });
    let duplicate = format!("duplicates/20230501_125123_{}.jpg", content_hash(b"DDDD"));
    assert_eq!(backend.paths().await, vec![PathBuf::from(TARGET), PathBuf::from(&duplicate), PathBuf::from("invalid/b.gif")]);
    assert_eq!(backend.read(Path::new(TARGET)).await.unwrap(), b"AAAA");
    assert_eq!(backend.read(Path::new(&duplicate)).await.unwrap(), b"DDDD");

    assert!(messages.contains(&format!("RENAME in/a.jpg -> {TARGET}")));
    assert!(messages.contains(&format!("DELETE in/c.jpg (identical to {TARGET})")));
    assert!(messages.iter().any(|m| m.starts_with(&format!("DUPLICATE in/d.jpg -> {duplicate}"))));
    assert!(messages.iter().any(|m| m.starts_with("INVALID in/b.gif -> invalid/b.gif")));
    assert!(messages.iter().any(|m| m.starts_with("UNRESOLVED in/b.gif")));
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let backend = Arc::new(MockBackend::with_files([("camera/IMG_0001.jpg", *b"AAAA"), ("camera/IMG_0002.jpg", *b"BBBB")]));
    let duplicate = format!("duplicates/20230501_125123_{}.jpg", content_hash(b"BBBB"));
    let metadata = || {
        MockMetadata::new()
            .with("camera/IMG_0001.jpg", jpeg("2023:05:01 12:51:23"))
            .with("camera/IMG_0002.jpg", jpeg("2023:05:01 12:51:23"))
            .with(TARGET, jpeg("2023:05:01 12:51:23"))
            .with(duplicate.as_str(), jpeg("2023:05:01 12:51:23"))
    };

    let (first, _) = organize_mock(&backend, metadata(), options()).await;
    assert_eq!((first.renamed, first.duplicate), (1, 1));
    let tree = backend.paths().await;

    let (second, messages) = organize_mock(&backend, metadata(), options()).await;
    assert_eq!(second, Counts { discovered: 1, skipped: 1, ..Counts::default() });
    assert_eq!(messages, vec![format!("SKIP {TARGET}: already in place")]);
    assert_eq!(backend.paths().await, tree);
}

#[tokio::test]
async fn test_every_file_is_counted_once() {
    let backend = Arc::new(MockBackend::with_files([
        ("in/ambiguous.jpg", *b"1"),
        ("in/broken.jpg", *b"2"),
        ("in/movie.avi", *b"3"),
        ("in/ok.jpg", *b"4"),
        ("in/same.jpg", *b"4"),
        ("in/nested/other.jpg", *b"5"),
    ]));
    let metadata = MockMetadata::new()
        .with("in/ambiguous.jpg", jpeg("2020:01:01 00:00:00"))
        .with("in/ambiguous.jpg", jpeg("2021:01:01 00:00:00"))
        .failing("in/broken.jpg")
        .with("in/movie.avi", MetadataRecord::new().with(tags::FILE_TYPE, "AVI"))
        .with("in/ok.jpg", jpeg("2023:05:01 12:51:23"))
        .with("in/same.jpg", jpeg("2023:05:01 12:51:23"))
        .with("in/nested/other.jpg", jpeg("2019:12:31 23:59:59"));

    let (counts, messages) = organize_mock(&backend, metadata, Options { concurrency: 4, ..options() }).await;

    assert_eq!(counts.discovered, 6);
    assert_eq!(counts.files(), counts.discovered);
    assert_eq!(counts.errored, 1);
    assert_eq!(counts.invalid, 2);
    assert_eq!(counts.renamed + counts.deleted, 3);
    assert!(backend.exists(Path::new("in/broken.jpg")).await.unwrap());
    assert!(messages.iter().any(|m| m.starts_with("ERROR in/broken.jpg")));
    assert!(backend.exists(Path::new("invalid/movie.avi")).await.unwrap());
    assert!(backend.exists(Path::new("invalid/ambiguous.jpg")).await.unwrap());
    assert!(backend.exists(Path::new("2019/2019-12-31/20191231_235959.jpg")).await.unwrap());
}

#[tokio::test]
async fn test_collisions_resolve_in_path_order() {
    let backend = Arc::new(MockBackend::with_files([("in/y.jpg", *b"YYYY"), ("in/x.jpg", *b"XXXX")]));
    let metadata = MockMetadata::new()
        .with("in/x.jpg", jpeg("2023:05:01 12:51:23"))
        .with("in/y.jpg", jpeg("2023:05:01 12:51:23"));

    let (counts, _) = organize_mock(&backend, metadata, options()).await;

    assert_eq!((counts.renamed, counts.duplicate), (1, 1));
    assert_eq!(backend.read(Path::new(TARGET)).await.unwrap(), b"XXXX");
    let duplicate = format!("duplicates/20230501_125123_{}.jpg", content_hash(b"YYYY"));
    assert_eq!(backend.read(Path::new(&duplicate)).await.unwrap(), b"YYYY");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_collisions_lose_nothing() {
    let names: Vec<String> = (0..16).map(|i| format!("in/{i:02}.jpg")).collect();
    let backend = Arc::new(MockBackend::with_files(names.iter().map(|name| (name.as_str(), name.as_bytes().to_vec()))));
    let metadata =
        names.iter().fold(MockMetadata::new(), |metadata, name| metadata.with(name.as_str(), jpeg("2023:05:01 12:51:23")));

    let (counts, _) = organize_mock(&backend, metadata, Options { concurrency: 8, ..options() }).await;

    assert_eq!(counts, Counts { discovered: 16, renamed: 1, duplicate: 15, ..Counts::default() });
    let mut contents = Vec::new();
    for path in backend.paths().await {
        contents.push(backend.read(&path).await.unwrap());
    }
    contents.sort();
    let mut expected: Vec<Vec<u8>> = names.iter().map(|name| name.as_bytes().to_vec()).collect();
    expected.sort();
    assert_eq!(contents, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_files_concurrently() {
    let names: Vec<String> = (0..50).map(|i| format!("in/{i:02}.jpg")).collect();
    let backend = Arc::new(MockBackend::with_files(names.iter().map(|name| (name.as_str(), name.as_bytes().to_vec()))));
    let metadata = names.iter().enumerate().fold(MockMetadata::new(), |metadata, (i, name)| {
        metadata.with(name.as_str(), jpeg(&format!("2023:05:01 12:{:02}:00", i)))
    });

    let (counts, messages) = organize_mock(&backend, metadata, Options { concurrency: 8, ..options() }).await;

    assert_eq!(counts, Counts { discovered: 50, renamed: 50, ..Counts::default() });
    assert_eq!(messages.len(), 50);
    assert!(backend.exists(Path::new("2023/2023-05-01/20230501_124900.jpg")).await.unwrap());
}

#[tokio::test]
async fn test_subsecond_precision_in_names() {
    let backend = Arc::new(MockBackend::with_files([("burst/1.jpg", *b"1"), ("burst/2.jpg", *b"2")]));
    let record = |subsec: &str| {
        MetadataRecord::new()
            .with(tags::FILE_TYPE, "JPEG")
            .with(tags::DATE_TIME_ORIGINAL, "2023:05:01 12:51:23")
            .with(tags::SUBSEC_DATE_TIME_ORIGINAL, subsec)
    };
    let metadata = MockMetadata::new()
        .with("burst/1.jpg", record("2023:05:01 12:51:23.042"))
        .with("burst/2.jpg", record("2023:05:01 12:51:23.917"));
    let rules = RuleSet::new(DirectoryRule::default());
    let sink = Arc::new(MemorySink::new());
    let ctx = Context::new(rules, options(), Resolver::new(Arc::new(metadata))).with_sink(sink);
    let handle: BackendHandle = backend.clone();

    let stats = run(&handle, Path::new("burst"), &ctx).await.unwrap();

    assert_eq!(stats.counts().renamed, 2);
    assert_eq!(backend.paths().await, vec![
        PathBuf::from("2023/2023-05-01/20230501_125123_042.jpg"),
        PathBuf::from("2023/2023-05-01/20230501_125123_917.jpg"),
    ]);
}

#[tokio::test]
async fn test_unresolved_files_are_never_deleted() {
    let backend = Arc::new(MockBackend::with_files([("in/a.gif", *b"GIF8"), ("invalid/b.gif", *b"GIF9")]));
    let gif = || MetadataRecord::new().with(tags::FILE_TYPE, "GIF");
    let metadata = MockMetadata::new().with("in/a.gif", gif()).with("invalid/b.gif", gif());

    let (counts, _) = organize_mock(&backend, metadata, options()).await;
    assert_eq!(counts, Counts { discovered: 1, invalid: 1, ..Counts::default() });
    assert_eq!(backend.read(Path::new("invalid/a.gif")).await.unwrap(), b"GIF8");

    // Pointing the run at `invalid` itself leaves the files where they are.
    let metadata = MockMetadata::new().with("invalid/a.gif", gif()).with("invalid/b.gif", gif());
    let (ctx, sink) = context(metadata, options());
    let handle: BackendHandle = backend.clone();
    let stats = run(&handle, Path::new("invalid"), &ctx).await.unwrap();
    assert_eq!(stats.counts(), Counts { discovered: 2, invalid: 2, ..Counts::default() });
    assert_eq!(backend.paths().await, vec![PathBuf::from("invalid/a.gif"), PathBuf::from("invalid/b.gif")]);
    assert!(sink.messages().iter().any(|m| m.starts_with("INVALID invalid/a.gif: unsupported file type")));
}

#[tokio::test]
async fn test_unresolved_name_clashes_keep_both_files() {
    let backend = Arc::new(MockBackend::with_files([("a/x.gif", *b"FIRST"), ("b/x.gif", *b"SECND")]));
    let gif = || MetadataRecord::new().with(tags::FILE_TYPE, "GIF");
    let metadata = MockMetadata::new().with("a/x.gif", gif()).with("b/x.gif", gif());

    let (counts, messages) = organize_mock(&backend, metadata, options()).await;
    assert_eq!(counts, Counts { discovered: 2, invalid: 1, errored: 1, ..Counts::default() });
    assert_eq!(backend.paths().await, vec![PathBuf::from("b/x.gif"), PathBuf::from("invalid/x.gif")]);
    assert_eq!(backend.read(Path::new("invalid/x.gif")).await.unwrap(), b"FIRST");
    assert_eq!(backend.read(Path::new("b/x.gif")).await.unwrap(), b"SECND");
    assert!(messages.contains(&"ERROR b/x.gif -> invalid/x.gif: file already exists: invalid/x.gif".to_string()));

    // A later run does not overwrite what an earlier one left in `invalid`.
    let metadata = MockMetadata::new().with("b/x.gif", gif());
    let (counts, _) = organize_mock(&backend, metadata, options()).await;
    assert_eq!(counts, Counts { discovered: 1, errored: 1, ..Counts::default() });
    assert_eq!(backend.read(Path::new("invalid/x.gif")).await.unwrap(), b"FIRST");
    assert_eq!(backend.read(Path::new("b/x.gif")).await.unwrap(), b"SECND");
}

#[tokio::test]
async fn test_delete_names_the_duplicate_it_matched() {
    let duplicate = format!("duplicates/20230501_125123_{}.jpg", content_hash(b"AAAA"));
    let backend =
        Arc::new(MockBackend::with_files([("in/a.jpg", *b"AAAA"), (TARGET, *b"BBBB"), (duplicate.as_str(), *b"AAAA")]));
    let metadata = MockMetadata::new().with("in/a.jpg", jpeg("2023:05:01 12:51:23")).with(TARGET, jpeg("2023:05:01 12:51:23"));

    let (counts, messages) = organize_mock(&backend, metadata, options()).await;
    assert_eq!(counts, Counts { discovered: 2, deleted: 1, skipped: 1, ..Counts::default() });
    assert!(messages.contains(&format!("DELETE in/a.jpg (identical to {duplicate})")));
    assert_eq!(backend.paths().await, vec![PathBuf::from(TARGET), PathBuf::from(&duplicate)]);
}

#[tokio::test]
async fn test_fallback_to_file_time() {
    let backend =
        Arc::new(MockBackend::with_files([("in/a.jpg", *b"A")]).with_file_modified("in/b.gif", *b"B", datetime!(2020-02-03 04:05:06 UTC)));
    let metadata = MockMetadata::new().with("in/a.jpg", jpeg("2023:05:01 12:51:23"));

    let (counts, _) =
        organize_mock(&backend, metadata, Options { treat_unresolved_as_file_time: true, ..options() }).await;

    assert_eq!(counts, Counts { discovered: 2, renamed: 2, ..Counts::default() });
    assert!(backend.exists(Path::new("2020/2020-02-03/20200203_040506.gif")).await.unwrap());
}

#[tokio::test]
async fn test_rename_in_place_without_subdirectories() {
    let backend = Arc::new(MockBackend::with_files([("in/a.jpg", *b"A"), ("top.jpg", *b"T")]));
    let metadata =
        MockMetadata::new().with("in/a.jpg", jpeg("2023:05:01 12:51:23")).with("top.jpg", jpeg("2024:01:02 03:04:05"));

    let (counts, _) =
        organize_mock(&backend, metadata, Options { create_subdirectories: false, ..options() }).await;

    assert_eq!(counts.renamed, 2);
    assert_eq!(backend.paths().await, vec![PathBuf::from("20240102_030405.jpg"), PathBuf::from("in/20230501_125123.jpg")]);
}

#[tokio::test]
async fn test_empty_directories_are_pruned() {
    let backend = Arc::new(
        MockBackend::with_files([("in/sub/deeper/a.jpg", *b"A"), ("in/stuck/b.jpg", *b"B")]).with_dir("in/empty"),
    );
    let metadata = MockMetadata::new().with("in/sub/deeper/a.jpg", jpeg("2023:05:01 12:51:23")).failing("in/stuck/b.jpg");

    let (counts, messages) =
        organize_mock(&backend, metadata, Options { delete_empty_directories: true, ..options() }).await;

    assert_eq!(counts.removed_directories, 3);
    assert!(messages.contains(&"RMDIR in/sub/deeper".to_string()));
    assert!(messages.contains(&"RMDIR in/sub".to_string()));
    assert!(messages.contains(&"RMDIR in/empty".to_string()));
    assert!(backend.is_dir(Path::new("in")).await.unwrap());
    assert!(backend.exists(Path::new("in/stuck/b.jpg")).await.unwrap());
    let position = |line: &str| messages.iter().position(|m| m == line).unwrap();
    assert!(position("RMDIR in/sub/deeper") < position("RMDIR in/sub"));
}

#[tokio::test]
async fn test_event_order() {
    let backend: BackendHandle = Arc::new(MockBackend::with_files([("in/a.jpg", *b"A")]).with_dir("in/old"));
    let metadata = MockMetadata::new().with("in/a.jpg", jpeg("2023:05:01 12:51:23"));
    let (ctx, _) = context(metadata, Options { delete_empty_directories: true, ..options() });

    let events: Vec<_> = organize(&backend, Path::new(""), &ctx).map(Result::unwrap).collect().await;

    assert_eq!(events.len(), 6);
    assert!(matches!(events[0], OrganizeEvent::Started));
    assert!(matches!(events[1], OrganizeEvent::DiscoveryComplete(1)));
    assert!(matches!(&events[2], OrganizeEvent::Organized(Action::Renamed { to, .. }) if to == Path::new(TARGET)));
    assert!(matches!(&events[3], OrganizeEvent::Pruned(dir) if dir == Path::new("in/old")));
    assert!(matches!(&events[4], OrganizeEvent::Pruned(dir) if dir == Path::new("in")));
    assert!(matches!(&events[5], OrganizeEvent::Complete(stats) if stats.counts().removed_directories == 2));
}

#[tokio::test]
async fn test_bad_roots_are_fatal() {
    let backend: BackendHandle = Arc::new(MockBackend::with_files([("in/a.jpg", *b"A")]));
    let (ctx, _) = context(MockMetadata::new(), options());

    for root in ["../elsewhere", "/absolute", "missing"] {
        let events: Vec<_> = organize(&backend, Path::new(root), &ctx).collect().await;
        assert_eq!(events.len(), 2, "root {root}");
        assert!(matches!(events[0], Ok(OrganizeEvent::Started)));
        assert!(events[1].is_err());
        assert!(run(&backend, Path::new(root), &ctx).await.is_err());
    }
}

/// A small tree below a fresh temporary directory.
fn local_tree() -> (tempfile::TempDir, BackendHandle) {
    let dir = tempfile::tempdir().unwrap();
    for (path, data) in [
        ("in/a.jpg", "AAAA"),
        ("in/c.jpg", "AAAA"),
        ("in/d.jpg", "DDDD"),
        ("in/sub/e.gif", "GIF8"),
        ("2023/2023-05-01/20230501_125123.jpg", "AAAA"),
    ] {
        let path = dir.path().join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }
    let backend: BackendHandle = Arc::new(LocalBackend::new("local", dir.path()).unwrap());
    (dir, backend)
}

fn local_metadata() -> MockMetadata {
    MockMetadata::new()
        .with("in/a.jpg", jpeg("2023:05:01 12:51:23"))
        .with("in/c.jpg", jpeg("2023:05:01 12:51:23"))
        .with("in/d.jpg", jpeg("2023:05:01 12:51:23"))
        .with("2023/2023-05-01/20230501_125123.jpg", jpeg("2023:05:01 12:51:23"))
}

#[tokio::test]
async fn test_simulate_matches_following_real_run() {
    let options = Options { delete_empty_directories: true, ..options() };
    let (_dir, backend) = local_tree();
    let before = files(backend.as_ref()).await;

    let (ctx, simulated_sink) = context(local_metadata(), Options { simulate: true, ..options.clone() });
    let simulated = run(&backend, Path::new(""), &ctx).await.unwrap();
    assert_eq!(files(backend.as_ref()).await, before);
    assert!(backend.is_dir(Path::new("in/sub")).await.unwrap());

    let (ctx, real_sink) = context(local_metadata(), options);
    let real = run(&backend, Path::new(""), &ctx).await.unwrap();

    assert_eq!(simulated.counts(), real.counts());
    assert_eq!(simulated_sink.messages(), real_sink.messages());
    assert_eq!(real.counts(), Counts {
        discovered: 5,
        skipped: 1,
        deleted: 2,
        duplicate: 1,
        invalid: 1,
        removed_directories: 2,
        ..Counts::default()
    });
    assert_ne!(files(backend.as_ref()).await, before);
    assert!(!backend.is_dir(Path::new("in")).await.unwrap());
}
