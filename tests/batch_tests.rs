// WriteBatch tests
// Atomic commit of ordered groups of puts and deletes.

use kvlite::{Db, Error, Options, ReadOptions, WriteBatch, WriteOptions};

fn open(dir: &tempfile::TempDir) -> Db {
    Db::open(dir.path(), Options::new().create_if_missing(true)).unwrap()
}

// =============================================================================
// Test 1: Delete K1 + put K2 applies both
// =============================================================================
#[test]
fn batch_applies_all_ops() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);
    let r = ReadOptions::default();

    db.put(&WriteOptions::default(), "K1", "VAL").unwrap();
    let mut batch = WriteBatch::new();
    batch.delete("K1").put("K2", "VAL");
    db.write(&WriteOptions::sync(), &batch).unwrap();

    assert_eq!(db.get(&r, "K1").unwrap(), None);
    assert_eq!(db.get(&r, "K2").unwrap(), Some(b"VAL".to_vec()));
}

// =============================================================================
// Test 2: Later ops in a batch win over earlier ones on the same key
// =============================================================================
#[test]
fn later_op_wins_within_batch() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);
    let r = ReadOptions::default();

    let mut batch = WriteBatch::new();
    batch.put("k", "1").put("k", "2").delete("gone").put("gone", "back");
    db.write(&WriteOptions::default(), &batch).unwrap();

    let mut batch = WriteBatch::new();
    batch.put("x", "1").delete("x");
    db.write(&WriteOptions::default(), &batch).unwrap();

    assert_eq!(db.get(&r, "k").unwrap(), Some(b"2".to_vec()));
    assert_eq!(db.get(&r, "gone").unwrap(), Some(b"back".to_vec()));
    assert_eq!(db.get(&r, "x").unwrap(), None);
}

// =============================================================================
// Test 3: A batch consumes one sequence number per op
// =============================================================================
#[test]
fn sequences_are_contiguous() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);

    db.put(&WriteOptions::default(), "a", "1").unwrap();
    let mut batch = WriteBatch::new();
    batch.put("b", "1").put("c", "1").delete("a");
    db.write(&WriteOptions::default(), &batch).unwrap();
    assert_eq!(db.stats().last_sequence, 4);

    // An empty batch commits nothing.
    db.write(&WriteOptions::default(), &WriteBatch::new()).unwrap();
    assert_eq!(db.stats().last_sequence, 4);
}

// =============================================================================
// Test 4: A batch survives reopen as a unit
// =============================================================================
#[test]
fn batch_durable_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = open(&dir);
        let mut batch = WriteBatch::new();
        for i in 0..10 {
            batch.put(format!("key{i}"), format!("val{i}"));
        }
        batch.delete("key3");
        db.write(&WriteOptions::sync(), &batch).unwrap();
    }

    let db = open(&dir);
    let r = ReadOptions::default();
    assert_eq!(db.get(&r, "key0").unwrap(), Some(b"val0".to_vec()));
    assert_eq!(db.get(&r, "key3").unwrap(), None);
    assert_eq!(db.get(&r, "key9").unwrap(), Some(b"val9".to_vec()));
    assert_eq!(db.stats().last_sequence, 11);
}

// =============================================================================
// Test 5: Append and clear
// =============================================================================
#[test]
fn append_and_clear() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir);

    let mut first = WriteBatch::new();
    first.put("a", "1");
    let mut second = WriteBatch::new();
    second.put("b", "2").delete("a");
    first.append(&second);
    assert_eq!(first.len(), 3);

    db.write(&WriteOptions::default(), &first).unwrap();
    let r = ReadOptions::default();
    assert_eq!(db.get(&r, "a").unwrap(), None);
    assert_eq!(db.get(&r, "b").unwrap(), Some(b"2".to_vec()));

    first.clear();
    assert!(first.is_empty());
    assert_eq!(first.approximate_size(), WriteBatch::new().approximate_size());
}

// =============================================================================
// Test 6: An oversized batch is refused before it reaches the log
// =============================================================================
#[test]
fn oversized_batch_rejected() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = Db::open(
            dir.path(),
            Options::new().create_if_missing(true).max_batch_size(64),
        )
        .unwrap();
        db.put(&WriteOptions::default(), "small", "v").unwrap();

        let mut batch = WriteBatch::new();
        batch.put("big", vec![0u8; 100]);
        assert!(batch.approximate_size() > 64);
        assert!(matches!(
            db.write(&WriteOptions::sync(), &batch),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(db.stats().last_sequence, 1);
        assert_eq!(db.get(&ReadOptions::default(), "big").unwrap(), None);
    }

    let db = Db::open(dir.path(), Options::new()).unwrap();
    assert_eq!(db.stats().last_sequence, 1);
    assert_eq!(
        db.get(&ReadOptions::default(), "small").unwrap(),
        Some(b"v".to_vec())
    );
}

// =============================================================================
// Test 7: The batch limit cannot exceed what the log can hold
// =============================================================================
#[test]
fn max_batch_size_bounded_by_record_limit() {
    let dir = tempfile::tempdir().unwrap();
    let too_big = Options::new()
        .create_if_missing(true)
        .max_batch_size(kvlite::wal::MAX_PAYLOAD + 1);
    assert!(matches!(
        Db::open(dir.path(), too_big),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        Db::open(dir.path(), Options::new().create_if_missing(true).max_batch_size(0)),
        Err(Error::InvalidArgument(_))
    ));
}
