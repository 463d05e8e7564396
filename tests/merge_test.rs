use std::{
    sync::atomic::AtomicBool,
    thread,
    time::{Duration, Instant},
};

use kolom::{
    MergeOutcome, MergePolicy, MergeTrigger, Table, TableConfig,
    types::{PAGE_CAPACITY, error::DatabaseError},
    utils::mock::{sample_row, sample_table},
};

fn key_rid(table: &Table, key: i64) -> u64 {
    table
        .index()
        .locate(table.key(), key)
        .into_iter()
        .next()
        .expect("key should be indexed")
}

#[test]
fn test_merge_scenario_keys_1_to_20() {
    let (table, _) = sample_table(2, 20, TableConfig::manual()).unwrap();
    let rid = key_rid(&table, 5);

    table.update(rid, &[None, Some(999)]).unwrap();
    assert_eq!(table.read(rid, &[1]).unwrap()[&1], 999);
    table.update(rid, &[None, Some(1000)]).unwrap();
    assert_eq!(table.read(rid, &[1]).unwrap()[&1], 1000);
    assert_eq!(table.version_depth(rid).unwrap(), 2);

    let outcome = table.merge_range(0).unwrap();
    assert_eq!(
        outcome,
        MergeOutcome::Merged {
            range: 0,
            records: 20,
            reclaimed: 2
        }
    );

    assert_eq!(table.read(rid, &[1]).unwrap()[&1], 1000);
    assert_eq!(table.version_depth(rid).unwrap(), 0);
    let stats = table.range_stats();
    assert_eq!(stats[0].tail_records, 0);
    assert_eq!(stats[0].total_tail_pages, 0);
}

#[test]
fn test_merge_preserves_every_row() {
    let (table, rids) = sample_table(4, 700, TableConfig::manual()).unwrap();
    for (i, rid) in rids.iter().enumerate().step_by(3) {
        let i = i as i64;
        table.update(*rid, &[None, Some(i), None, None]).unwrap();
        table.update(*rid, &[None, None, Some(-i), None]).unwrap();
        if i % 2 == 0 {
            table.update(*rid, &[None, Some(i * 7), None, Some(i)]).unwrap();
        }
    }

    let before: Vec<_> = rids
        .iter()
        .map(|rid| table.read_record(*rid).unwrap())
        .collect();

    let outcomes = table.merge_all().unwrap();
    assert!(outcomes.iter().all(MergeOutcome::is_merged));

    for (rid, expected) in rids.iter().zip(&before) {
        assert_eq!(&table.read_record(*rid).unwrap(), expected);
        assert_eq!(table.version_depth(*rid).unwrap(), 0);
    }

    // updates after a merge chain off the new base
    table.update(rids[1], &[None, None, None, Some(123)]).unwrap();
    let mut expected = before[1].columns.clone();
    expected[3] = 123;
    assert_eq!(table.read_record(rids[1]).unwrap().columns, expected);
}

#[test]
fn test_merge_reclaims_deleted_rows() {
    let (table, rids) = sample_table(2, 10, TableConfig::manual()).unwrap();
    table.update(rids[2], &[None, Some(0)]).unwrap();
    table.delete(rids[2]).unwrap();
    table.delete(rids[5]).unwrap();

    let outcome = table.merge_range(0).unwrap();
    assert_eq!(
        outcome,
        MergeOutcome::Merged {
            range: 0,
            records: 8,
            reclaimed: 3
        }
    );
    assert_eq!(table.range_stats()[0].base_records, 8);
    assert!(matches!(
        table.read(rids[2], &[0]),
        Err(DatabaseError::RecordNotFound { .. })
    ));
    for (i, rid) in rids.iter().enumerate() {
        if i == 2 || i == 5 {
            continue;
        }
        assert_eq!(
            table.read_record(*rid).unwrap().columns,
            sample_row(i as i64 + 1, 2)
        );
    }
    assert_eq!(table.select_range(0, 1, 10).unwrap().len(), 8);
}

#[test]
fn test_merge_without_changes_is_skipped() {
    let (table, _) = sample_table(2, 5, TableConfig::manual()).unwrap();
    assert_eq!(
        table.merge_range(0).unwrap(),
        MergeOutcome::Skipped { range: 0 }
    );
    assert!(table.merge_range(4).is_err());
}

#[test]
fn test_cancelled_merge_applies_nothing() {
    let (table, rids) = sample_table(2, 5, TableConfig::manual()).unwrap();
    table.update(rids[0], &[None, Some(77)]).unwrap();

    let cancel = AtomicBool::new(true);
    let outcome = table.merge_range_cancellable(0, &cancel).unwrap();

    assert_eq!(outcome, MergeOutcome::Cancelled { range: 0 });
    assert_eq!(table.version_depth(rids[0]).unwrap(), 1);
    assert_eq!(table.range_stats()[0].tail_records, 1);
    assert_eq!(table.read(rids[0], &[1]).unwrap()[&1], 77);

    // a later merge still goes through
    assert!(table.merge_range(0).unwrap().is_merged());
    assert_eq!(table.read(rids[0], &[1]).unwrap()[&1], 77);
}

#[test]
fn test_merge_keeps_other_ranges_untouched() {
    let config = TableConfig::manual().with_max_base_pages(1);
    let (table, rids) = sample_table(2, PAGE_CAPACITY as i64 + 4, config).unwrap();
    let far = rids[PAGE_CAPACITY + 1];
    table.update(rids[0], &[None, Some(1)]).unwrap();
    table.update(far, &[None, Some(2)]).unwrap();

    assert!(table.merge_range(0).unwrap().is_merged());

    assert_eq!(table.version_depth(rids[0]).unwrap(), 0);
    assert_eq!(table.version_depth(far).unwrap(), 1);
    assert_eq!(table.read(far, &[1]).unwrap()[&1], 2);
}

#[test]
fn test_background_merge_triggers_on_threshold() {
    let config = TableConfig::new()
        .with_merge_policy(MergePolicy::Background)
        .with_merge_trigger(MergeTrigger::ColumnTailPages)
        .with_merge_threshold_pages(1);
    let (table, rids) = sample_table(2, 4, config).unwrap();
    let rid = rids[0];

    // two tail pages per column crosses a one-page threshold
    for value in 0..(PAGE_CAPACITY as i64 + 1) {
        table.update(rid, &[None, Some(value)]).unwrap();
    }
    let last = PAGE_CAPACITY as i64;

    let deadline = Instant::now() + Duration::from_secs(10);
    while table.version_depth(rid).unwrap() != 0 {
        assert!(Instant::now() < deadline, "background merge never ran");
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(table.read(rid, &[1]).unwrap()[&1], last);
    assert_eq!(table.read_record(rids[3]).unwrap().columns, sample_row(4, 2));
}
