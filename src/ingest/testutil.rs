//! Shared fixtures for ingest tests: unique scratch paths under the system
//! temp dir so concurrent test threads never collide.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

static SEQ: AtomicU64 = AtomicU64::new(0);

fn unique(name: &str) -> PathBuf {
    let n = SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("covid-compare-{}-{n}-{name}", std::process::id()))
}

pub fn write_csv(name: &str, contents: &str) -> PathBuf {
    let path = unique(name);
    fs::write(&path, contents).expect("write csv fixture");
    path
}

pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = unique(name);
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}
