// Engine handle tests
// Open options, point reads and writes, reopen, close and the directory lock.

use kvlite::{Db, Error, Options, ReadOptions, WriteOptions};

fn create() -> Options {
    Options::new().create_if_missing(true)
}

// =============================================================================
// Test 1: Put, get, delete
// =============================================================================
#[test]
fn put_get_delete() {
    let dir = tempfile::tempdir().unwrap();
    let db = Db::open(dir.path(), create()).unwrap();
    let (w, r) = (WriteOptions::default(), ReadOptions::default());

    db.put(&w, "K1", "VAL").unwrap();
    assert_eq!(db.get(&r, "K1").unwrap(), Some(b"VAL".to_vec()));

    db.put(&w, "K1", "VAL2").unwrap();
    assert_eq!(db.get(&r, "K1").unwrap(), Some(b"VAL2".to_vec()));

    db.delete(&w, "K1").unwrap();
    assert_eq!(db.get(&r, "K1").unwrap(), None);

    // Deleting an absent key is fine.
    db.delete(&w, "never").unwrap();
    assert_eq!(db.get(&r, "never").unwrap(), None);
}

// =============================================================================
// Test 2: Missing store without create_if_missing is NotFound
// =============================================================================
#[test]
fn open_missing_without_create_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent");
    assert!(matches!(Db::open(&path, Options::new()), Err(Error::NotFound(_))));
    assert!(!path.exists());

    // An existing but empty directory is not a store either.
    assert!(matches!(Db::open(dir.path(), Options::new()), Err(Error::NotFound(_))));
}

// =============================================================================
// Test 3: error_if_exists refuses an existing store
// =============================================================================
#[test]
fn error_if_exists_rejects_existing_store() {
    let dir = tempfile::tempdir().unwrap();
    drop(Db::open(dir.path(), create()).unwrap());

    let result = Db::open(dir.path(), create().error_if_exists(true));
    assert!(matches!(result, Err(Error::InvalidArgument(_))));

    // A fresh directory is fine with both flags.
    let fresh = dir.path().join("fresh");
    Db::open(&fresh, create().error_if_exists(true)).unwrap();
}

// =============================================================================
// Test 4: Malformed options are InvalidArgument
// =============================================================================
#[test]
fn zero_write_buffer_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let result = Db::open(dir.path(), create().write_buffer_size(0));
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

// =============================================================================
// Test 5: Data survives close and reopen
// =============================================================================
#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = Db::open(dir.path(), create()).unwrap();
        db.put(&WriteOptions::sync(), "durable", "data").unwrap();
        db.put(&WriteOptions::default(), "buffered", "too").unwrap();
        db.delete(&WriteOptions::default(), "durable").unwrap();
        db.put(&WriteOptions::default(), "durable", "again").unwrap();
    }

    let db = Db::open(dir.path(), Options::new()).unwrap();
    let r = ReadOptions::default();
    assert_eq!(db.get(&r, "durable").unwrap(), Some(b"again".to_vec()));
    assert_eq!(db.get(&r, "buffered").unwrap(), Some(b"too".to_vec()));
    assert_eq!(db.stats().last_sequence, 4);
}

// =============================================================================
// Test 6: Sequence numbers keep increasing across reopen
// =============================================================================
#[test]
fn sequence_continues_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = Db::open(dir.path(), create()).unwrap();
        db.put(&WriteOptions::default(), "a", "1").unwrap();
        db.put(&WriteOptions::default(), "b", "2").unwrap();
    }
    let db = Db::open(dir.path(), Options::new()).unwrap();
    let before = db.stats().last_sequence;
    db.put(&WriteOptions::default(), "c", "3").unwrap();
    assert_eq!(db.stats().last_sequence, before + 1);
}

// =============================================================================
// Test 7: Second open on a live store is AlreadyLocked; succeeds after drop
// =============================================================================
#[test]
fn second_open_is_already_locked() {
    let dir = tempfile::tempdir().unwrap();
    let first = Db::open(dir.path(), create()).unwrap();

    let second = Db::open(dir.path(), create());
    assert!(matches!(second, Err(Error::AlreadyLocked(_))));

    drop(first);
    let reopened = Db::open(dir.path(), create()).unwrap();
    reopened.put(&WriteOptions::default(), "k", "v").unwrap();
}

// =============================================================================
// Test 8: Explicit close releases the lock and fails later calls
// =============================================================================
#[test]
fn use_after_close_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = Db::open(dir.path(), create()).unwrap();
    db.put(&WriteOptions::default(), "k", "v").unwrap();
    db.close().unwrap();
    db.close().unwrap();

    let r = ReadOptions::default();
    assert!(matches!(db.get(&r, "k"), Err(Error::UseAfterClose)));
    assert!(matches!(
        db.put(&WriteOptions::default(), "k", "v2"),
        Err(Error::UseAfterClose)
    ));
    assert!(matches!(db.get_snapshot(), Err(Error::UseAfterClose)));
    assert!(matches!(db.iter(&r), Err(Error::UseAfterClose)));

    // The lock is free even though the handle still exists.
    let other = Db::open(dir.path(), Options::new()).unwrap();
    assert_eq!(other.get(&r, "k").unwrap(), Some(b"v".to_vec()));
}

// =============================================================================
// Test 9: Empty keys and values are ordinary data
// =============================================================================
#[test]
fn empty_key_and_value() {
    let dir = tempfile::tempdir().unwrap();
    let db = Db::open(dir.path(), create()).unwrap();
    let r = ReadOptions::default();

    db.put(&WriteOptions::default(), "", "empty-key").unwrap();
    db.put(&WriteOptions::default(), "empty-value", "").unwrap();

    assert_eq!(db.get(&r, "").unwrap(), Some(b"empty-key".to_vec()));
    assert_eq!(db.get(&r, "empty-value").unwrap(), Some(Vec::new()));
}

// =============================================================================
// Test 10: Returned values are owned copies
// =============================================================================
#[test]
fn get_returns_owned_copy() {
    let dir = tempfile::tempdir().unwrap();
    let db = Db::open(dir.path(), create()).unwrap();
    db.put(&WriteOptions::default(), "k", "first").unwrap();

    let held = db.get(&ReadOptions::default(), "k").unwrap().unwrap();
    db.put(&WriteOptions::default(), "k", "second").unwrap();
    db.compact().unwrap();
    drop(db);

    // Still readable: the caller owns it.
    assert_eq!(held, b"first");
}

// =============================================================================
// Test 11: A kernel lock held elsewhere blocks open until released
// =============================================================================
#[cfg(unix)]
#[test]
fn foreign_flock_blocks_open() {
    use std::os::unix::io::AsRawFd;

    let dir = tempfile::tempdir().unwrap();
    Db::open(dir.path(), create()).unwrap().close().unwrap();

    // flock locks belong to the open file description, so this fd
    // conflicts with the engine's own even inside one process.
    let holder = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(dir.path().join("LOCK"))
        .unwrap();
    let rc = unsafe { libc::flock(holder.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    assert_eq!(rc, 0);

    assert!(matches!(
        Db::open(dir.path(), Options::new()),
        Err(Error::AlreadyLocked(_))
    ));

    drop(holder);
    let db = Db::open(dir.path(), Options::new()).unwrap();
    db.put(&WriteOptions::default(), "k", "v").unwrap();
}
