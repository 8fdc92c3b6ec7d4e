// Snapshot tests
// Point-in-time reads that later writes cannot disturb.

use kvlite::{Db, Error, Options, ReadOptions, StorageIterator, WriteOptions};

fn open(dir: &tempfile::TempDir) -> Db {
    Db::open(dir.path(), Options::new().create_if_missing(true)).unwrap()
}

// =============================================================================
// Test 1: A write after the snapshot is invisible through it
// =============================================================================
#[test]
fn snapshot_hides_later_put() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);
    let w = WriteOptions::default();

    db.put(&w, "K1", "VAL").unwrap();
    let snap = db.get_snapshot().unwrap();
    db.put(&w, "K3", "V3").unwrap();

    assert_eq!(db.get(&ReadOptions::at(&snap), "K3").unwrap(), None);
    assert_eq!(db.get(&ReadOptions::default(), "K3").unwrap(), Some(b"V3".to_vec()));
    assert_eq!(db.get(&ReadOptions::at(&snap), "K1").unwrap(), Some(b"VAL".to_vec()));
}

// =============================================================================
// Test 2: Overwrites and deletes after the snapshot do not change it
// =============================================================================
#[test]
fn snapshot_sees_old_values() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);
    let w = WriteOptions::default();

    db.put(&w, "a", "1").unwrap();
    db.put(&w, "b", "1").unwrap();
    let snap = db.get_snapshot().unwrap();
    db.put(&w, "a", "2").unwrap();
    db.delete(&w, "b").unwrap();

    let at = ReadOptions::at(&snap);
    assert_eq!(db.get(&at, "a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(&at, "b").unwrap(), Some(b"1".to_vec()));

    let latest = ReadOptions::default();
    assert_eq!(db.get(&latest, "a").unwrap(), Some(b"2".to_vec()));
    assert_eq!(db.get(&latest, "b").unwrap(), None);
}

// =============================================================================
// Test 3: Snapshot iteration omits later keys
// =============================================================================
#[test]
fn snapshot_iteration_omits_later_keys() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);
    let w = WriteOptions::default();

    db.put(&w, "K2", "VAL").unwrap();
    let snap = db.get_snapshot().unwrap();
    db.put(&w, "K3", "V3").unwrap();

    let mut it = db.iter(&ReadOptions::at(&snap)).unwrap();
    it.seek_to_first().unwrap();
    let mut keys = Vec::new();
    while it.is_valid() {
        keys.push(it.key().to_vec());
        it.next().unwrap();
    }
    assert_eq!(keys, vec![b"K2".to_vec()]);
}

// =============================================================================
// Test 4: Snapshot survives memtable retention
// =============================================================================
#[test]
fn snapshot_survives_compaction() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);
    let w = WriteOptions::default();

    for i in 0..50 {
        db.put(&w, "hot", format!("v{i}")).unwrap();
    }
    let snap = db.get_snapshot().unwrap();
    for i in 50..100 {
        db.put(&w, "hot", format!("v{i}")).unwrap();
    }
    db.delete(&w, "hot").unwrap();

    db.compact().unwrap();
    assert_eq!(db.stats().compactions, 1);
    assert_eq!(db.get(&ReadOptions::at(&snap), "hot").unwrap(), Some(b"v49".to_vec()));
    assert_eq!(db.get(&ReadOptions::default(), "hot").unwrap(), None);
    // Only the snapshot's version and the tombstone over it are left.
    assert_eq!(db.stats().memtable_entries, 2);

    db.release_snapshot(&snap).unwrap();
    db.compact().unwrap();
    assert_eq!(db.stats().memtable_entries, 0);
}

// =============================================================================
// Test 5: Double release is InvalidSnapshot, and reads through it fail
// =============================================================================
#[test]
fn double_release_is_invalid_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);

    let snap = db.get_snapshot().unwrap();
    assert_eq!(db.stats().live_snapshots, 1);
    db.release_snapshot(&snap).unwrap();
    assert_eq!(db.stats().live_snapshots, 0);

    assert!(matches!(db.release_snapshot(&snap), Err(Error::InvalidSnapshot)));
    assert!(matches!(
        db.get(&ReadOptions::at(&snap), "k"),
        Err(Error::InvalidSnapshot)
    ));
    assert!(matches!(
        db.iter(&ReadOptions::at(&snap)),
        Err(Error::InvalidSnapshot)
    ));
}

// =============================================================================
// Test 6: A snapshot from another handle is rejected
// =============================================================================
#[test]
fn foreign_snapshot_is_invalid() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let a = open(&dir_a);
    let b = open(&dir_b);

    let snap = a.get_snapshot().unwrap();
    assert!(matches!(b.get(&ReadOptions::at(&snap), "k"), Err(Error::InvalidSnapshot)));
    assert!(matches!(b.release_snapshot(&snap), Err(Error::InvalidSnapshot)));
}

// =============================================================================
// Test 7: Dropping a snapshot releases it
// =============================================================================
#[test]
fn drop_releases_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);
    {
        let _snap = db.get_snapshot().unwrap();
        assert_eq!(db.stats().live_snapshots, 1);
        assert_eq!(db.stats().oldest_snapshot, Some(0));
    }
    assert_eq!(db.stats().live_snapshots, 0);
    assert_eq!(db.stats().oldest_snapshot, None);
}

// =============================================================================
// Test 8: Snapshot sequence is the last committed sequence
// =============================================================================
#[test]
fn snapshot_captures_last_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);
    assert_eq!(db.get_snapshot().unwrap().sequence(), 0);

    db.put(&WriteOptions::default(), "a", "1").unwrap();
    db.put(&WriteOptions::default(), "b", "2").unwrap();
    assert_eq!(db.get_snapshot().unwrap().sequence(), 2);
}
