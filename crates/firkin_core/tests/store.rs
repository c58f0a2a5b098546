//! End-to-end tests for the store: persistence, rotation, recovery,
//! TTL expiry, corruption detection, compaction, and concurrent reads.

use firkin_core::{Config, FileId, Store, StoreError};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn test_key(i: u32) -> Vec<u8> {
    format!("firkin-test-key:{i:09}").into_bytes()
}

fn test_value(i: u32) -> Vec<u8> {
    format!("firkin-test-value-{i}").into_bytes()
}

/// Lists the segment file ids present in a data directory.
fn segment_fids_on_disk(dir: &Path) -> Vec<u32> {
    let mut fids: Vec<u32> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter_map(|name| {
            name.strip_prefix("wal_")?
                .strip_suffix(".log")?
                .parse()
                .ok()
        })
        .collect();
    fids.sort_unstable();
    fids
}

/// Total bytes across all segment files in a data directory.
fn segment_bytes_on_disk(dir: &Path) -> u64 {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap())
        .filter(|e| e.file_name().to_string_lossy().starts_with("wal_"))
        .map(|e| e.metadata().unwrap().len())
        .sum()
}

#[test]
fn fresh_store_in_empty_directory() {
    let temp = tempfile::tempdir().unwrap();
    let store = Store::open(Config::new().data_dir(temp.path())).unwrap();

    store.put(b"a", b"1").unwrap();
    store.put(b"b", b"2").unwrap();

    assert_eq!(store.get(b"a").unwrap(), b"1");
    assert_eq!(store.get(b"b").unwrap(), b"2");
    assert!(matches!(store.get(b"c"), Err(StoreError::KeyNotFound)));

    assert_eq!(segment_fids_on_disk(temp.path()), vec![0]);
}

#[test]
fn values_survive_reopen() {
    let temp = tempfile::tempdir().unwrap();

    {
        let store = Store::open(Config::new().data_dir(temp.path())).unwrap();
        store.put(b"persist", b"me").unwrap();
        store.close().unwrap();
    }

    let store = Store::open(Config::new().data_dir(temp.path())).unwrap();
    assert_eq!(store.get(b"persist").unwrap(), b"me");
}

#[test]
fn deletes_survive_reopen() {
    let temp = tempfile::tempdir().unwrap();

    {
        let store = Store::open(Config::new().data_dir(temp.path())).unwrap();
        store.put(b"k", b"v").unwrap();
        store.delete(b"k").unwrap();
        store.close().unwrap();
    }

    let store = Store::open(Config::new().data_dir(temp.path())).unwrap();
    assert!(matches!(store.get(b"k"), Err(StoreError::KeyNotFound)));
}

#[test]
fn rotation_spreads_records_across_segments() {
    let temp = tempfile::tempdir().unwrap();
    let config = Config::new().data_dir(temp.path()).segment_max_bytes(128);
    let store = Store::open(config).unwrap();

    for i in 0..20 {
        store.put(&test_key(i), b"abc").unwrap();
    }

    assert!(
        segment_fids_on_disk(temp.path()).len() >= 3,
        "expected at least 3 segment files"
    );

    for i in 0..20 {
        assert_eq!(store.get(&test_key(i)).unwrap(), b"abc");
    }
}

#[test]
fn recovery_across_rotated_segments() {
    let temp = tempfile::tempdir().unwrap();
    let config = Config::new().data_dir(temp.path()).segment_max_bytes(128);

    {
        let store = Store::open(config.clone()).unwrap();
        for i in 0..20 {
            store.put(&test_key(i), &test_value(i)).unwrap();
        }
        store.close().unwrap();
    }

    let store = Store::open(config).unwrap();
    for i in 0..20 {
        assert_eq!(store.get(&test_key(i)).unwrap(), test_value(i));
    }

    // The active segment is the highest-numbered one on disk.
    let fids = segment_fids_on_disk(temp.path());
    assert_eq!(store.active_fid(), FileId::new(*fids.last().unwrap()));
}

#[test]
fn overwrites_pick_latest_after_reopen() {
    let temp = tempfile::tempdir().unwrap();
    let config = Config::new().data_dir(temp.path()).segment_max_bytes(256);

    {
        let store = Store::open(config.clone()).unwrap();
        for round in 0..5 {
            for i in 0..10 {
                store.put(&test_key(i), &test_value(round)).unwrap();
            }
        }
        store.close().unwrap();
    }

    let store = Store::open(config).unwrap();
    for i in 0..10 {
        assert_eq!(store.get(&test_key(i)).unwrap(), test_value(4));
    }
}

#[test]
fn ttl_expiry_is_elided_on_replay_without_rewriting() {
    let temp = tempfile::tempdir().unwrap();
    let config = Config::new().data_dir(temp.path());

    {
        let store = Store::open(config.clone()).unwrap();
        store
            .put_with_ttl(b"x", b"y", Duration::from_secs(1))
            .unwrap();
        thread::sleep(Duration::from_secs(2));

        match store.get(b"x") {
            Err(StoreError::KeyExpired) | Err(StoreError::KeyNotFound) => {}
            other => panic!("expected expiry, got {other:?}"),
        }
        store.close().unwrap();
    }

    let size_before = segment_bytes_on_disk(temp.path());

    let store = Store::open(config).unwrap();
    assert!(matches!(store.get(b"x"), Err(StoreError::KeyNotFound)));

    // Expiry is in-memory elision, not a rewrite.
    assert_eq!(segment_bytes_on_disk(temp.path()), size_before);
}

#[test]
fn flipped_byte_fails_recovery_at_record_offset() {
    let temp = tempfile::tempdir().unwrap();
    let config = Config::new().data_dir(temp.path());

    {
        let store = Store::open(config.clone()).unwrap();
        store.put(b"a", b"1").unwrap();
        store.put(b"b", b"2").unwrap();
        store.close().unwrap();
    }

    // Both records are 19 bytes (13-byte header + 1 + 1 + 4-byte CRC);
    // flip a value byte inside the second one.
    let segment_path = temp.path().join("wal_00000.log");
    let mut bytes = fs::read(&segment_path).unwrap();
    assert_eq!(bytes.len(), 38);
    bytes[19 + 14] ^= 0x01;
    fs::write(&segment_path, &bytes).unwrap();

    match Store::open(config) {
        Err(StoreError::CorruptSegment { fid, offset, .. }) => {
            assert_eq!(fid, FileId::new(0));
            assert_eq!(offset, 19);
        }
        other => panic!("expected CorruptSegment, got {other:?}"),
    }
}

#[test]
fn foreign_file_aborts_recovery() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("notes.txt"), b"not a segment").unwrap();

    let result = Store::open(Config::new().data_dir(temp.path()));
    assert!(matches!(result, Err(StoreError::UnrecognizedFiles { .. })));
}

#[test]
fn second_open_is_locked_out() {
    let temp = tempfile::tempdir().unwrap();
    let config = Config::new().data_dir(temp.path());

    let _store = Store::open(config.clone()).unwrap();
    assert!(matches!(
        Store::open(config),
        Err(StoreError::DatabaseLocked)
    ));
}

#[test]
fn fold_visits_keys_in_ascending_order() {
    let temp = tempfile::tempdir().unwrap();
    let store = Store::open(Config::new().data_dir(temp.path())).unwrap();

    // Insert out of order.
    for i in [7u32, 2, 9, 0, 4, 1, 8, 3, 6, 5] {
        store.put(&test_key(i), &test_value(i)).unwrap();
    }

    let mut seen: Vec<Vec<u8>> = Vec::new();
    store
        .fold(|key, _| {
            seen.push(key.to_vec());
            true
        })
        .unwrap();

    assert_eq!(seen.len(), 10);
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "keys out of order");
}

#[test]
fn compaction_reclaims_space_and_keeps_survivors() {
    let temp = tempfile::tempdir().unwrap();
    let config = Config::new().data_dir(temp.path()).segment_max_bytes(4096);
    let store = Store::open(config).unwrap();

    for round in 0..5 {
        for i in 0..100 {
            store.put(&test_key(i), &test_value(round)).unwrap();
        }
    }
    for i in 0..20 {
        store.delete(&test_key(i)).unwrap();
    }

    let fid_before = store.active_fid();
    let size_before = segment_bytes_on_disk(temp.path());

    store.flush().unwrap();

    for i in 0..20 {
        assert!(matches!(
            store.get(&test_key(i)),
            Err(StoreError::KeyNotFound)
        ));
    }
    for i in 20..100 {
        assert_eq!(store.get(&test_key(i)).unwrap(), test_value(4));
    }

    // Every pre-compaction segment is gone.
    let fids = segment_fids_on_disk(temp.path());
    assert!(
        fids.iter().all(|&fid| fid > fid_before.as_u32()),
        "stale segment files remain: {fids:?}"
    );

    // On-disk size is dominated by the 80 live records.
    let live_bytes: u64 = (20..100)
        .map(|i| 17 + test_key(i).len() as u64 + test_value(4).len() as u64)
        .sum();
    let size_after = segment_bytes_on_disk(temp.path());
    assert!(size_after < size_before / 2);
    assert!(
        size_after <= live_bytes + live_bytes / 5,
        "compacted store too large: {size_after} vs {live_bytes} live"
    );
}

#[test]
fn compaction_preserves_ttl_stamps() {
    let temp = tempfile::tempdir().unwrap();
    let store = Store::open(Config::new().data_dir(temp.path())).unwrap();

    store.put(b"forever", b"v").unwrap();
    store
        .put_with_ttl(b"brief", b"v", Duration::from_secs(1))
        .unwrap();
    store
        .put_with_ttl(b"lasting", b"v", Duration::from_secs(3600))
        .unwrap();

    thread::sleep(Duration::from_secs(2));
    store.flush().unwrap();

    // The lapsed record was dropped, not resurrected as immortal.
    assert!(matches!(store.get(b"brief"), Err(StoreError::KeyNotFound)));
    // Live records keep reading back after the rewrite.
    assert_eq!(store.get(b"forever").unwrap(), b"v");
    assert_eq!(store.get(b"lasting").unwrap(), b"v");
}

#[test]
fn concurrent_readers_never_miss() {
    let temp = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(Config::new().data_dir(temp.path())).unwrap());

    store.put(b"shared", b"stable-value").unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for _ in 0..500 {
                let value = store.get(b"shared").expect("reader observed a miss");
                assert_eq!(value, b"stable-value");
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn concurrent_writers_and_readers() {
    let temp = tempfile::tempdir().unwrap();
    let config = Config::new().data_dir(temp.path()).segment_max_bytes(512);
    let store = Arc::new(Store::open(config).unwrap());

    let mut handles = Vec::new();
    for w in 0..2u32 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                store.put(&test_key(w * 1000 + i), &test_value(i)).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for w in 0..2u32 {
        for i in 0..100 {
            assert_eq!(store.get(&test_key(w * 1000 + i)).unwrap(), test_value(i));
        }
    }
}
