//! Shared-instance behaviour under parallel callers

use fsdouble::{
    DirectoryOps, EnumerateOptions, FileOps, FileSystem, FileType, MemoryFileSystem,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_parallel_writers_lose_nothing() {
    let fs = MemoryFileSystem::builder().dir("/out").build().unwrap();

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let fs = fs.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    let path = PathBuf::from(format!("/out/w{}-{}.txt", worker, i));
                    fs.write(&path, format!("{}:{}", worker, i).as_bytes())
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let entries: Vec<_> = fs
        .enumerate(Path::new("/out"), &EnumerateOptions::default())
        .unwrap()
        .collect();
    assert_eq!(entries.len(), 400);
    assert_eq!(
        fs.read_to_string(Path::new("/out/w3-17.txt")).unwrap(),
        "3:17"
    );
}

#[test]
fn test_parallel_appends_to_one_file() {
    let fs = MemoryFileSystem::builder().file("/log.txt", "").build().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let fs = fs.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    fs.append(Path::new("/log.txt"), b"x").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(fs.read(Path::new("/log.txt")).unwrap().len(), 400);
}

#[test]
fn test_readers_never_see_half_moved_tree() {
    let mut builder = MemoryFileSystem::builder();
    for i in 0..50 {
        builder = builder.file(format!("/left/f{}.txt", i), "x");
    }
    let fs = Arc::new(builder.build().unwrap());
    let stop = Arc::new(AtomicBool::new(false));

    let reader = {
        let fs = fs.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            let options = EnumerateOptions::default().recursive(true);
            while !stop.load(Ordering::SeqCst) {
                let entries: Vec<_> = fs
                    .enumerate(Path::new("/"), &options)
                    .unwrap()
                    .collect();
                let files = entries
                    .iter()
                    .filter(|e| e.file_type == FileType::File)
                    .count();
                assert_eq!(files, 50, "saw a partially moved tree");
            }
        })
    };

    let dyn_fs: &dyn FileSystem = &*fs;
    for round in 0..100 {
        let (from, to) = if round % 2 == 0 {
            ("/left", "/right")
        } else {
            ("/right", "/left")
        };
        dyn_fs.move_dir(Path::new(from), Path::new(to)).unwrap();
    }
    stop.store(true, Ordering::SeqCst);
    reader.join().unwrap();

    assert!(fs.is_dir(Path::new("/left")));
    assert_eq!(fs.read_dir(Path::new("/left")).unwrap().len(), 50);
}

#[test]
fn test_create_dir_race_has_one_winner() {
    let fs = MemoryFileSystem::new();

    let results: Vec<_> = (0..8)
        .map(|_| {
            let fs = fs.clone();
            thread::spawn(move || fs.create_dir(Path::new("/contested")))
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(fs.is_dir(Path::new("/contested")));
}
