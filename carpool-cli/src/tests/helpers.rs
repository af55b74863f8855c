//! Test helpers for seeding SQLite datastores and building command lines.

use camino::Utf8PathBuf;
use carpool_core::test_support::{OptInBuilder, base_coord, offset_north};
use carpool_core::{OptIn, SqliteRideStore};
use geo::Coord;
use tempfile::TempDir;

/// A datastore file in a private temporary directory.
pub(super) struct SeededDatabase {
    _dir: TempDir,
    path: Utf8PathBuf,
}

impl SeededDatabase {
    pub(super) fn with_opt_ins(opt_ins: &[OptIn]) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        let path = root.join("carpool.db");
        let store = SqliteRideStore::open(&path).expect("create datastore");
        for opt_in in opt_ins {
            store.upsert_opt_in(opt_in).expect("seed opt-in");
        }
        Self { _dir: dir, path }
    }

    pub(super) fn path(&self) -> &Utf8PathBuf {
        &self.path
    }

    /// A fresh handle on the same file, for inspecting what a command wrote.
    pub(super) fn store(&self) -> SqliteRideStore {
        SqliteRideStore::open(&self.path).expect("reopen datastore")
    }
}

pub(super) fn destination() -> Coord<f64> {
    offset_north(base_coord(), 5.0)
}

/// A rider and a four-seat driver 1.5 km apart whose windows share 20 minutes.
pub(super) fn rider_and_driver() -> Vec<OptIn> {
    vec![
        OptInBuilder::rider(1, 1).window("08:00", "08:30").build(),
        OptInBuilder::driver(2, 2, 4)
            .window("08:10", "08:40")
            .km_north(1.5)
            .build(),
    ]
}

/// Destination flags pointing at [`destination`].
pub(super) fn destination_flags() -> Vec<String> {
    let destination = destination();
    vec![
        format!("--{}", crate::ARG_DESTINATION_LNG),
        destination.x.to_string(),
        format!("--{}", crate::ARG_DESTINATION_LAT),
        destination.y.to_string(),
    ]
}
