/*!
 * End-to-end discovery scenarios for flatdump
 */

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;
use tempfile::{Builder, TempDir};

use crate::concat::Concatenator;
use crate::discovery::{discover, DiscoveryError, DiscoveryOptions};
use crate::error::FlatdumpError;
use crate::tokens::TokenCounter;
use crate::types::{Discovery, EntryKind, EntrySource, ExclusionReason, Level};
use crate::walker::root_display;
use crate::writer::XmlWriter;

// Temporary roots must not look hidden
fn tempdir() -> io::Result<TempDir> {
    Builder::new().prefix("flatdump").tempdir()
}

// Helper function to create a small project tree
fn setup_project() -> io::Result<TempDir> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path();

    fs::create_dir_all(root.join("src").join("pkg"))?;
    fs::create_dir(root.join("__pycache__"))?;
    fs::create_dir(root.join(".git"))?;

    let mut app = File::create(root.join("src").join("app.py"))?;
    writeln!(app, "def main():\n    return 0")?;
    fs::write(root.join("src").join("test_app.py"), "def test_main():\n    pass\n")?;
    fs::write(root.join("src").join("pkg").join("util.py"), "X = 1\n")?;
    fs::write(root.join("README.md"), "# Project\n")?;
    fs::write(root.join("setup.py"), "print('setup')\n")?;
    fs::write(root.join("__pycache__").join("mod.pyc"), [0u8, 13, 13, 10])?;
    fs::write(root.join(".git").join("config"), "[core]\n")?;
    fs::write(root.join(".env"), "SECRET=1\n")?;
    fs::write(root.join("payload.txt"), b"abc\0def")?;

    Ok(temp_dir)
}

fn run(opts: DiscoveryOptions) -> io::Result<Discovery> {
    Ok(discover(opts).map_err(FlatdumpError::from)?)
}

fn options(root: &Path) -> DiscoveryOptions {
    DiscoveryOptions {
        roots: vec![root.to_path_buf()],
        ..Default::default()
    }
}

/// Display paths with the root's own name stripped
fn relative_displays(discovery: &Discovery, root: &Path) -> Vec<String> {
    let root_name = root_display(&fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf()));
    discovery
        .entries
        .iter()
        .map(|entry| {
            let rel = entry
                .display_path
                .strip_prefix(&root_name)
                .unwrap_or(&entry.display_path);
            let mut text = rel.to_string_lossy().replace('\\', "/");
            if entry.is_dir() {
                text.push('/');
            }
            text
        })
        .collect()
}

fn has_file(discovery: &Discovery, name: &str) -> bool {
    discovery
        .files()
        .any(|entry| entry.absolute_path.file_name().map_or(false, |n| n == name))
}

#[test]
fn test_discovery_is_deterministic() -> io::Result<()> {
    let temp_dir = setup_project()?;
    let mut opts = options(temp_dir.path());
    opts.include_all = true;
    opts.glob_patterns = vec!["*.md".to_string()];

    let first = run(opts.clone())?;
    let second = run(opts)?;
    assert_eq!(first.entries, second.entries);
    Ok(())
}

#[test]
fn test_no_duplicate_paths() -> io::Result<()> {
    let temp_dir = setup_project()?;
    let root = temp_dir.path();
    let mut opts = options(root);
    opts.roots.push(root.join("src"));
    opts.include_extensions = vec!["py".to_string()];
    opts.glob_patterns = vec!["**/*.py".to_string()];
    opts.explicit_files = vec![PathBuf::from("src/app.py"), PathBuf::from("setup.py")];

    let discovery = run(opts)?;
    let mut seen = HashSet::new();
    for entry in &discovery.entries {
        assert!(
            seen.insert(entry.absolute_path.clone()),
            "duplicate entry for {}",
            entry.absolute_path.display()
        );
    }
    assert!(has_file(&discovery, "util.py"));
    Ok(())
}

#[test]
fn test_exclude_pattern_beats_extension() -> io::Result<()> {
    let temp_dir = setup_project()?;
    let mut opts = options(temp_dir.path());
    opts.include_extensions = vec!["py".to_string()];
    opts.exclude_patterns = vec!["*test*".to_string()];

    let discovery = run(opts)?;
    assert!(has_file(&discovery, "app.py"));
    assert!(!has_file(&discovery, "test_app.py"));
    assert!(discovery.diagnostics.exclusions().iter().any(|ex| {
        ex.path.ends_with("test_app.py")
            && ex.reason == ExclusionReason::ExcludePattern("*test*".to_string())
    }));
    Ok(())
}

#[test]
fn test_ignored_directory_is_pruned() -> io::Result<()> {
    let temp_dir = setup_project()?;
    let mut opts = options(temp_dir.path());
    opts.include_all = true;
    opts.include_binary = true;
    opts.ignore_dirs = vec![PathBuf::from("__pycache__")];

    let discovery = run(opts)?;
    assert!(!has_file(&discovery, "mod.pyc"));
    assert!(discovery
        .entries
        .iter()
        .all(|entry| !entry.display_path.ends_with("__pycache__")));
    Ok(())
}

#[test]
fn test_hidden_file_gating() -> io::Result<()> {
    let temp_dir = setup_project()?;
    let mut opts = options(temp_dir.path());
    opts.include_all = true;

    let hidden_off = run(opts.clone())?;
    assert!(!has_file(&hidden_off, ".env"));
    assert!(!has_file(&hidden_off, "config"));

    opts.include_hidden = true;
    let hidden_on = run(opts)?;
    assert!(has_file(&hidden_on, ".env"));
    assert!(has_file(&hidden_on, "config"));
    Ok(())
}

#[test]
fn test_binary_file_gating() -> io::Result<()> {
    let temp_dir = setup_project()?;
    let mut opts = options(temp_dir.path());
    opts.include_all = true;

    let without = run(opts.clone())?;
    assert!(!has_file(&without, "payload.txt"));
    assert!(without
        .diagnostics
        .exclusions()
        .iter()
        .any(|ex| ex.path.ends_with("payload.txt") && ex.reason == ExclusionReason::Binary));

    opts.include_binary = true;
    let with = run(opts)?;
    assert!(has_file(&with, "payload.txt"));
    Ok(())
}

#[test]
fn test_explicit_file_bypasses_filters() -> io::Result<()> {
    let temp_dir = setup_project()?;
    let root = temp_dir.path();
    fs::write(root.join("notes.cfg"), "key = value\n")?;

    let mut opts = options(root);
    opts.include_extensions = vec!["py".to_string()];
    opts.exclude_patterns = vec!["*.cfg".to_string()];
    opts.explicit_files = vec![PathBuf::from("notes.cfg")];

    let discovery = run(opts)?;
    let notes = discovery
        .files()
        .find(|entry| entry.absolute_path.ends_with("notes.cfg"))
        .expect("explicit file present");
    assert_eq!(notes.source, EntrySource::Explicit);
    assert_eq!(notes.display_path, PathBuf::from("notes.cfg"));
    assert!(has_file(&discovery, "app.py"));
    Ok(())
}

#[test]
fn test_missing_explicit_file_is_reported() -> io::Result<()> {
    let temp_dir = setup_project()?;
    let mut opts = options(temp_dir.path());
    opts.include_extensions = vec!["md".to_string()];
    opts.explicit_files = vec![PathBuf::from("missing.txt")];

    let discovery = run(opts)?;
    assert_eq!(discovery.file_count(), 1);
    assert!(discovery.diagnostics.at_least(Level::Warning).any(|d| {
        d.message.contains("missing.txt")
            || d.path.as_deref().map_or(false, |p| p.ends_with("missing.txt"))
    }));
    Ok(())
}

#[test]
fn test_max_depth_limits_walk() -> io::Result<()> {
    let temp_dir = setup_project()?;
    let mut opts = options(temp_dir.path());
    opts.include_extensions = vec!["py".to_string(), "md".to_string()];
    opts.max_depth = Some(1);

    let discovery = run(opts)?;
    assert!(discovery.entries.iter().all(|entry| entry.depth <= 2));
    assert_eq!(discovery.dir_count(), 1);
    assert_eq!(
        relative_displays(&discovery, temp_dir.path()),
        vec!["/", "README.md", "setup.py"]
    );
    Ok(())
}

#[test]
fn test_only_explicit_files_skips_scanning() -> io::Result<()> {
    let temp_dir = setup_project()?;
    let mut opts = options(temp_dir.path());
    opts.explicit_files = vec![PathBuf::from("src/app.py"), PathBuf::from("README.md")];
    assert!(opts.only_explicit_files());

    let discovery = run(opts)?;
    assert_eq!(discovery.dir_count(), 0);
    let displays: Vec<String> = discovery.entries.iter().map(|e| e.display()).collect();
    assert_eq!(displays, vec!["src/app.py", "README.md"]);
    assert!(discovery
        .entries
        .iter()
        .all(|entry| entry.source == EntrySource::Explicit));
    Ok(())
}

#[test]
fn test_directories_precede_their_files() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path();
    for dir in ["b", "a"] {
        fs::create_dir(root.join(dir))?;
        fs::write(root.join(dir).join("x.py"), "pass\n")?;
    }

    let mut opts = options(root);
    opts.include_extensions = vec!["py".to_string()];

    let discovery = run(opts)?;
    assert_eq!(
        relative_displays(&discovery, root),
        vec!["/", "a/", "a/x.py", "b/", "b/x.py"]
    );
    let kinds: Vec<EntryKind> = discovery.entries.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EntryKind::Directory,
            EntryKind::Directory,
            EntryKind::File,
            EntryKind::Directory,
            EntryKind::File,
        ]
    );
    Ok(())
}

#[test]
fn test_no_valid_roots() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let file = temp_dir.path().join("plain.txt");
    fs::write(&file, "not a directory")?;

    let opts = DiscoveryOptions {
        roots: vec![temp_dir.path().join("missing"), file],
        include_all: true,
        ..Default::default()
    };

    match discover(opts) {
        Err(DiscoveryError::NoValidRoots { count, diagnostics }) => {
            assert_eq!(count, 2);
            assert_eq!(diagnostics.at_least(Level::Error).count(), 2);
        }
        Ok(discovery) => panic!("expected failure, got {} entries", discovery.entries.len()),
    }
    Ok(())
}

#[test]
fn test_ignored_root_is_still_valid() -> io::Result<()> {
    let temp_dir = setup_project()?;
    let root = temp_dir.path();

    let opts = DiscoveryOptions {
        roots: vec![root.join("src")],
        include_all: true,
        ignore_dirs: vec![root.join("src")],
        base_dir: Some(root.to_path_buf()),
        ..Default::default()
    };

    let discovery = run(opts)?;
    assert!(discovery.entries.is_empty());
    Ok(())
}

#[test]
fn test_hidden_root_is_skipped() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path().join(".dotfiles");
    fs::create_dir(&root)?;
    fs::write(root.join("a.txt"), "a\n")?;

    let mut opts = options(&root);
    opts.include_all = true;
    opts.glob_patterns = vec!["*.txt".to_string()];

    let discovery = run(opts.clone())?;
    assert!(discovery.entries.is_empty());

    opts.include_hidden = true;
    let discovery = run(opts)?;
    assert!(has_file(&discovery, "a.txt"));
    Ok(())
}

#[test]
fn test_glob_reaches_into_hidden_directories() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path();
    fs::create_dir(root.join(".venv"))?;
    fs::write(root.join(".venv").join("lib.py"), "X = 1\n")?;
    fs::write(root.join("app.py"), "Y = 2\n")?;

    let mut opts = options(root);
    opts.glob_patterns = vec!["*.py".to_string()];
    opts.include_patterns = opts.glob_patterns.clone();

    let discovery = run(opts)?;
    let lib = discovery
        .files()
        .find(|entry| entry.absolute_path.ends_with(".venv/lib.py"))
        .expect("glob match inside hidden directory");
    assert_eq!(lib.source, EntrySource::Glob);
    assert!(has_file(&discovery, "app.py"));
    assert!(!discovery
        .entries
        .iter()
        .any(|entry| entry.is_dir() && entry.display_path.ends_with(".venv")));
    Ok(())
}

#[test]
fn test_glob_and_walk_results_merge() -> io::Result<()> {
    let temp_dir = setup_project()?;
    let mut opts = options(temp_dir.path());
    opts.include_extensions = vec!["py".to_string()];
    opts.glob_patterns = vec!["*.md".to_string(), "*.py".to_string()];
    opts.include_patterns = opts.glob_patterns.clone();

    let discovery = run(opts)?;
    let readme: Vec<_> = discovery
        .files()
        .filter(|entry| entry.absolute_path.ends_with("README.md"))
        .collect();
    assert_eq!(readme.len(), 1);

    let app = discovery
        .files()
        .find(|entry| entry.absolute_path.ends_with("app.py"))
        .expect("app.py present");
    assert_eq!(app.source, EntrySource::Walk);
    Ok(())
}

#[test]
fn test_invalid_pattern_is_dropped() -> io::Result<()> {
    let temp_dir = setup_project()?;
    let mut opts = options(temp_dir.path());
    opts.include_extensions = vec!["md".to_string()];
    opts.exclude_patterns = vec!["[".to_string()];

    let discovery = run(opts)?;
    assert!(has_file(&discovery, "README.md"));
    assert!(discovery
        .diagnostics
        .messages()
        .iter()
        .any(|d| d.message.starts_with("Invalid exclude pattern '['")));
    Ok(())
}

// Discovery result rendered as XML must be well-formed
#[test]
fn test_xml_validity() -> io::Result<()> {
    let temp_dir = setup_project()?;
    let mut opts = options(temp_dir.path());
    opts.include_all = true;
    opts.include_binary = true;

    let discovery = run(opts)?;
    let counter = TokenCounter::heuristic();
    let concatenator = Concatenator::new(&counter, false);

    let output_file = temp_dir.path().join("output.xml");
    let stats = XmlWriter::new(&concatenator).write(&discovery.entries, File::create(&output_file)?)?;
    assert_eq!(stats.files_processed + stats.files_skipped, discovery.file_count());

    let file_content = fs::read_to_string(&output_file)?;
    let mut reader = Reader::from_str(&file_content);

    let mut depth = 0;
    let mut files = 0;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(start)) => {
                if start.name().as_ref() == b"file" {
                    files += 1;
                }
                depth += 1;
            }
            Ok(Event::End(_)) => depth -= 1,
            Ok(Event::Eof) => break,
            Err(e) => panic!("Error parsing XML: {}", e),
            _ => (),
        }
        buf.clear();
    }

    assert_eq!(depth, 0, "XML structure is not well-balanced");
    assert_eq!(files, discovery.file_count());

    Ok(())
}
