use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use kolom::{
    MergeOutcome, Table, TableConfig,
    types::error::DatabaseError,
    utils::mock::sample_table,
};

#[test]
fn test_parallel_inserts_get_unique_rids() {
    let table = Arc::new(Table::with_config("parallel", 2, 0, TableConfig::manual()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                (0..500)
                    .map(|i| table.insert(&[worker * 1_000 + i, i]).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut rids: Vec<u64> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    rids.sort_unstable();
    rids.dedup();

    assert_eq!(rids.len(), 2_000);
    assert_eq!(table.len(), 2_000);
    for worker in 0..4 {
        assert_eq!(table.select(0, worker * 1_000 + 499).unwrap().len(), 1);
    }
}

#[test]
fn test_racing_inserts_of_one_key_admit_one() {
    let table = Arc::new(Table::with_config("race", 2, 0, TableConfig::manual()).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let table = Arc::clone(&table);
            thread::spawn(move || table.insert(&[42, worker]))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    let admitted = results.iter().filter(|result| result.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|result| matches!(result, Err(DatabaseError::DuplicateKey { .. })))
        .count();

    assert_eq!(admitted, 1);
    assert_eq!(rejected, 7);
    assert_eq!(table.len(), 1);
}

#[test]
fn test_readers_see_whole_updates() {
    let (table, rids) = sample_table(3, 50, TableConfig::manual()).unwrap();
    let table = Arc::new(table);
    let target = rids[10];
    let stop = Arc::new(AtomicBool::new(false));

    // every update writes the same value into columns 1 and 2
    let writer = {
        let table = Arc::clone(&table);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            for value in 0..2_000 {
                table.update(target, &[None, Some(value), Some(value)]).unwrap();
            }
            stop.store(true, Ordering::Release);
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let table = Arc::clone(&table);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    let values = table.read(target, &[1, 2]).unwrap();
                    let (first, second) = (values[&1], values[&2]);
                    // the inserted row holds 111 and 112
                    if first != 111 {
                        assert_eq!(first, second, "torn read");
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(table.read(target, &[1, 2]).unwrap()[&2], 1_999);
}

#[test]
fn test_merge_races_with_writers() {
    let (table, rids) = sample_table(2, 300, TableConfig::manual()).unwrap();
    let table = Arc::new(table);
    let stop = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = (0..3)
        .map(|worker| {
            let table = Arc::clone(&table);
            let rids = rids.clone();
            thread::spawn(move || {
                for round in 0..200i64 {
                    for (i, rid) in rids.iter().enumerate().skip(worker).step_by(3) {
                        let key = i as i64 + 1;
                        table.update(*rid, &[None, Some(key * 1_000 + round)]).unwrap();
                    }
                }
            })
        })
        .collect();

    let merger = {
        let table = Arc::clone(&table);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                match table.merge_range(0).unwrap() {
                    MergeOutcome::Merged { records, .. } => {
                        assert_eq!(records, 300);
                    }
                    MergeOutcome::Conflict { .. } | MergeOutcome::Skipped { .. } => {}
                    MergeOutcome::Cancelled { .. } => panic!("nothing cancels this merge"),
                }
            }
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    stop.store(true, Ordering::Release);
    merger.join().unwrap();

    for (i, rid) in rids.iter().enumerate() {
        let key = i as i64 + 1;
        assert_eq!(
            table.read_record(*rid).unwrap().columns,
            vec![key, key * 1_000 + 199]
        );
    }

    // with no writers left a merge always commits
    table.update(rids[0], &[None, Some(-1)]).unwrap();
    assert!(table.merge_range(0).unwrap().is_merged());
    assert_eq!(table.read_record(rids[0]).unwrap().columns, vec![1, -1]);
    assert_eq!(table.read_record(rids[1]).unwrap().columns, vec![2, 2_199]);
}

#[test]
fn test_background_merge_with_concurrent_readers() {
    let config = TableConfig::new().with_merge_threshold_pages(1);
    let (table, rids) = sample_table(2, 100, config).unwrap();
    let table = Arc::new(table);

    let writer = {
        let table = Arc::clone(&table);
        let rids = rids.clone();
        thread::spawn(move || {
            for round in 0..30i64 {
                for rid in &rids {
                    table.update(*rid, &[None, Some(round)]).unwrap();
                }
            }
        })
    };

    let reader = {
        let table = Arc::clone(&table);
        let rids = rids.clone();
        thread::spawn(move || {
            for _ in 0..20 {
                for (i, rid) in rids.iter().enumerate() {
                    let record = table.read_record(*rid).unwrap();
                    assert_eq!(record.key, i as i64 + 1);
                }
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();

    for (i, rid) in rids.iter().enumerate() {
        let record = table.read_record(*rid).unwrap();
        assert_eq!(record.columns, vec![i as i64 + 1, 29]);
    }
}
