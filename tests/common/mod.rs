#![allow(dead_code)]

use camino::Utf8Path;
use spicerack::{IdSet, KTuple, SpiceRack};
use tempfile::TempDir;

/// One fake kernel file: basename, covered NAIF IDs, and coverage window in seconds TDB
/// (`None` = all time).
pub type FileSpec<'a> = (&'a str, &'a [i32], Option<(f64, f64)>);

/// Build a rack over a temp directory of stand-in kernel files, seeding each record's
/// coverage from a catalog tuple so no toolkit is needed. Furnish/unload trace events
/// show up under `cargo test -- --nocapture`.
pub fn rack_with_files(files: &[FileSpec<'_>]) -> (SpiceRack, TempDir) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    let tmp = tempfile::tempdir().expect("temp dir");
    let dir = Utf8Path::from_path(tmp.path()).expect("utf-8 temp dir");

    let mut rack = SpiceRack::new();
    for &(name, ids, window) in files {
        let path = dir.join(name);
        std::fs::write(&path, format!("stand-in for {name}\n")).expect("write stand-in");

        rack.set_info(&KTuple {
            basename: name.to_string(),
            start_time: window.map(|w| w.0),
            end_time: window.map(|w| w.1),
            naif_ids: ids.iter().copied().collect::<IdSet>(),
            release_date: String::new(),
        })
        .expect("seed record");
        rack.bind_path(&path).expect("bind stand-in");
    }
    (rack, tmp)
}

/// Handles for a list of basenames already known to the rack, in the given order.
pub fn handles(rack: &SpiceRack, names: &[&str]) -> Vec<spicerack::BasenameId> {
    names
        .iter()
        .map(|name| rack.lookup(name).expect("known basename"))
        .collect()
}
