use shardstash::testing::{
    assert_groups_contiguous, assert_rows_unordered_equal, generated_rows, mock_csv_file,
    read_csv_output, read_headerless_output, row, sample_sales, TempDirPath,
};
use shardstash::compress::{compress_stream, CompressStage};
use shardstash::io::csv::decode_rows;
use shardstash::{
    decompress, parse_query, Algorithm, DirGroupStore, Error, Group, GroupStore, Grouping,
    Header, KeyColumns, MemoryGroupStore, Namespace, OutputOrder, Query, Row, Runner, Tag,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

fn rows_where(rows: &[Row], column: usize, value: &str) -> Vec<Row> {
    rows.iter().filter(|r| r[column] == value).cloned().collect()
}

#[test]
fn sales_round_trip_for_every_algorithm() -> anyhow::Result<()> {
    let (header, rows) = sample_sales();
    let input = mock_csv_file(&header, &rows)?;
    let out_dir = TempDirPath::new()?;

    for alg in Algorithm::ALL {
        let store = MemoryGroupStore::new(Namespace::new("sales", alg.name())?);
        let runner = Runner::new(alg).with_workers(3);

        let report = runner.compress_file(input.path(), &keys(&["region", "year"]), &store)?;
        assert_eq!(report.groups, 5);
        assert_eq!(report.rows, rows.len() as u64);
        assert_eq!(store.len(), 5);

        let out = out_dir.file_path(&format!("east_{alg}.csv"));
        let report = runner.decompress_to_file(&parse_query(&["region=east"])?, &store, &out)?;
        assert_eq!(report.groups, 2);
        assert_eq!(report.rows, 3);

        let (written_header, written) = read_csv_output(&out)?;
        assert_eq!(written_header, header);
        assert_rows_unordered_equal(written, rows_where(&rows, 1, "east"));
    }
    Ok(())
}

#[test]
fn east_rows_come_back_in_source_order() -> anyhow::Result<()> {
    let header = row(&["id", "region", "amount"]);
    let rows = vec![
        row(&["1", "east", "10"]),
        row(&["2", "west", "20"]),
        row(&["3", "east", "30"]),
    ];
    let input = mock_csv_file(&header, &rows)?;
    let out_dir = TempDirPath::new()?;

    for alg in Algorithm::ALL {
        let store = MemoryGroupStore::new(Namespace::new("scenario", alg.name())?);
        let runner = Runner::new(alg);
        assert_eq!(runner.compress_file(input.path(), &keys(&["region"]), &store)?.groups, 2);

        let out = out_dir.file_path(&format!("scenario_{alg}.csv"));
        runner.decompress_to_file(&parse_query(&["region=east"])?, &store, &out)?;
        let (written_header, written) = read_csv_output(&out)?;
        assert_eq!(written_header, header);
        assert_eq!(written, vec![rows[0].clone(), rows[2].clone()]);
    }
    Ok(())
}

#[test]
fn full_query_restores_every_row_once() -> anyhow::Result<()> {
    let (header, rows) = generated_rows(2_000, 13);
    let input = mock_csv_file(&header, &rows)?;
    let out_dir = TempDirPath::new()?;
    let store = MemoryGroupStore::new(Namespace::new("load", "generated")?);
    let runner = Runner::new(Algorithm::Gzip).with_workers(4);

    runner.compress_file(input.path(), &keys(&["tag"]), &store)?;
    assert_eq!(store.len(), 13);

    // a query without terms matches every stored group
    let out = out_dir.file_path("all.csv");
    let report = runner.decompress_to_file(&Query::default(), &store, &out)?;
    assert_eq!(report.groups, 13);

    let (_, written) = read_csv_output(&out)?;
    assert_groups_contiguous(&written, |r| r[1].clone());
    assert_rows_unordered_equal(written, rows);
    Ok(())
}

#[test]
fn bounded_mode_stores_capped_groups() -> anyhow::Result<()> {
    let (header, rows) = generated_rows(100, 3);
    let input = mock_csv_file(&header, &rows)?;
    let out_dir = TempDirPath::new()?;
    let store = MemoryGroupStore::new(Namespace::new("load", "bounded")?);
    let runner = Runner::new(Algorithm::Xz)
        .with_workers(2)
        .with_grouping(Grouping::Bounded { cap: 10 });

    let report = runner.compress_file(input.path(), &keys(&["tag"]), &store)?;
    assert_eq!(report.mode, "bounded(10)");
    assert_eq!(report.rows, 100);
    // t0 has 34 rows, t1 and t2 have 33: four documents each
    assert_eq!(report.groups, 12);
    assert_eq!(store.len(), 12);

    let out = out_dir.file_path("t1.csv");
    let report = runner.decompress_to_file(&parse_query(&["tag=t1"])?, &store, &out)?;
    assert_eq!(report.groups, 4);
    let (_, written) = read_csv_output(&out)?;
    assert_rows_unordered_equal(written, rows_where(&rows, 1, "t1"));
    Ok(())
}

/// Yields one single-row group per tick and notes the first tick at which
/// the store already holds a document.
struct SlowGroups {
    store: MemoryGroupStore,
    produced: usize,
    total: usize,
    first_write_seen_at: Arc<Mutex<Option<usize>>>,
}

impl Iterator for SlowGroups {
    type Item = shardstash::Result<Group>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.produced == self.total {
            return None;
        }
        std::thread::sleep(Duration::from_millis(5));
        if !self.store.is_empty() {
            self.first_write_seen_at
                .lock()
                .unwrap()
                .get_or_insert(self.produced);
        }
        let i = self.produced;
        self.produced += 1;
        let tag = format!("t{i}");
        Some(Ok(Group {
            tag: Tag::new([tag.clone()]),
            rows: vec![row(&[i.to_string().as_str(), tag.as_str()])],
        }))
    }
}

#[test]
fn streaming_compression_stores_before_the_source_is_exhausted() -> anyhow::Result<()> {
    let header = Header::new(["seq", "tag"])?;
    let key_columns = KeyColumns::resolve(&header, &keys(&["tag"]))?;
    let store = MemoryGroupStore::new(Namespace::new("load", "streaming")?);
    let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build()?;
    let first_write_seen_at = Arc::new(Mutex::new(None));
    let total = 40;

    let groups = SlowGroups {
        store: store.clone(),
        produced: 0,
        total,
        first_write_seen_at: Arc::clone(&first_write_seen_at),
    };
    let stage = CompressStage {
        algorithm: Algorithm::Gzip,
        keys: &key_columns,
        header: &header,
        store: &store,
    };
    let totals = compress_stream(&pool, groups, &stage)?;
    assert_eq!(totals.groups, total);
    assert_eq!(store.len(), total);

    let seen_at = first_write_seen_at.lock().unwrap().take();
    match seen_at {
        Some(at) => assert!(at < total - 1, "first write only seen at group {at}"),
        None => panic!("nothing was stored until the source was exhausted"),
    }
    Ok(())
}

#[test]
fn mixed_headers_in_one_result_are_rejected() -> anyhow::Result<()> {
    let first = mock_csv_file(
        &row(&["id", "region", "amount"]),
        &[row(&["1", "east", "10"]), row(&["2", "west", "20"])],
    )?;
    let second = mock_csv_file(&row(&["region", "note"]), &[row(&["east", "late"])])?;
    let out_dir = TempDirPath::new()?;
    let store = MemoryGroupStore::new(Namespace::new("sales", "mixed_headers")?);
    let runner = Runner::new(Algorithm::Gzip).with_workers(2);
    runner.compress_file(first.path(), &keys(&["region"]), &store)?;
    runner.compress_file(second.path(), &keys(&["region"]), &store)?;

    // west comes from one file only, so it still reads back
    let west = out_dir.file_path("west.csv");
    assert_eq!(runner.decompress_to_file(&parse_query(&["region=west"])?, &store, &west)?.groups, 1);

    let east = out_dir.file_path("east.csv");
    match runner.decompress_to_file(&parse_query(&["region=east"])?, &store, &east) {
        Err(Error::Worker(message)) => assert!(message.contains("columns"), "{message}"),
        other => panic!("expected a header mismatch, got {other:?}"),
    }
    Ok(())
}

#[test]
fn submission_order_is_reproducible() -> anyhow::Result<()> {
    let (header, rows) = generated_rows(600, 20);
    let input = mock_csv_file(&header, &rows)?;
    let out_dir = TempDirPath::new()?;
    let store = MemoryGroupStore::new(Namespace::new("load", "ordered")?);
    let runner = Runner::new(Algorithm::Bzip2)
        .with_workers(4)
        .with_grouping(Grouping::Bounded { cap: 5 })
        .with_output_order(OutputOrder::Submission);
    runner.compress_file(input.path(), &keys(&["tag"]), &store)?;

    let query = parse_query(&["tag=t7"])?;
    let mut expected: Vec<Row> = Vec::new();
    for doc in store.query(&query)? {
        let raw = decompress(&doc.payload, Algorithm::Bzip2)?;
        expected.extend(decode_rows(&raw)?);
    }
    assert_eq!(expected.len(), 30);

    for attempt in 0..3 {
        let out = out_dir.file_path(&format!("ordered_{attempt}.csv"));
        runner.decompress_to_file(&query, &store, &out)?;
        let (_, written) = read_csv_output(&out)?;
        assert_eq!(written, expected);
    }
    Ok(())
}

#[test]
fn header_can_be_left_out() -> anyhow::Result<()> {
    let (header, rows) = sample_sales();
    let input = mock_csv_file(&header, &rows)?;
    let out_dir = TempDirPath::new()?;
    let store = MemoryGroupStore::new(Namespace::new("sales", "no_header")?);
    let runner = Runner::new(Algorithm::Zlib).with_header(false);
    runner.compress_file(input.path(), &keys(&["year"]), &store)?;

    let out = out_dir.file_path("y2021.csv");
    runner.decompress_to_file(&parse_query(&["year=2021"])?, &store, &out)?;
    assert_rows_unordered_equal(
        read_headerless_output(&out)?,
        vec![row(&["3", "east", "2021", "30"]), row(&["5", "west", "2021", "50"])],
    );
    Ok(())
}

#[test]
fn empty_query_result_writes_nothing() -> anyhow::Result<()> {
    let (header, rows) = sample_sales();
    let input = mock_csv_file(&header, &rows)?;
    let out_dir = TempDirPath::new()?;
    let store = MemoryGroupStore::new(Namespace::new("sales", "empty")?);
    let runner = Runner::new(Algorithm::Gzip);
    runner.compress_file(input.path(), &keys(&["region"]), &store)?;

    let out = out_dir.file_path("south.csv");
    let result = runner.decompress_to_file(&parse_query(&["region=south"])?, &store, &out);
    assert!(matches!(result, Err(Error::EmptyQueryResult(_))));
    assert!(!out.exists());
    Ok(())
}

#[test]
fn reading_with_another_algorithm_fails() -> anyhow::Result<()> {
    let (header, rows) = sample_sales();
    let input = mock_csv_file(&header, &rows)?;
    let out_dir = TempDirPath::new()?;
    let store = MemoryGroupStore::new(Namespace::new("sales", "mixed")?);
    Runner::new(Algorithm::Gzip).compress_file(input.path(), &keys(&["region"]), &store)?;

    let out = out_dir.file_path("east.csv");
    let result = Runner::new(Algorithm::Bzip2).decompress_to_file(
        &parse_query(&["region=east"])?,
        &store,
        &out,
    );
    match result {
        Err(Error::CodecError { algorithm, message }) => {
            assert_eq!(algorithm, "bzip2");
            assert!(message.contains("[region: east]"), "{message}");
        }
        other => panic!("expected a codec error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn validation_happens_before_anything_is_stored() -> anyhow::Result<()> {
    let (header, rows) = sample_sales();
    let input = mock_csv_file(&header, &rows)?;
    let store = MemoryGroupStore::new(Namespace::new("sales", "invalid")?);
    let runner = Runner::new(Algorithm::Gzip);

    let err = runner
        .compress_file(input.path(), &keys(&["region", "month"]), &store)
        .unwrap_err();
    assert!(err.is_validation());
    assert!(matches!(err, Error::ColumnNotFound(ref c) if c == "month"));
    assert!(store.is_empty());
    Ok(())
}

#[test]
fn store_failure_aborts_compression() -> anyhow::Result<()> {
    let (header, rows) = sample_sales();
    let input = mock_csv_file(&header, &rows)?;
    let store = MemoryGroupStore::new(Namespace::new("sales", "down")?);
    store.set_reachable(false);

    let result = Runner::new(Algorithm::Gzip).compress_file(input.path(), &keys(&["region"]), &store);
    assert!(matches!(result, Err(Error::Store(_))));
    Ok(())
}

#[test]
fn dir_store_end_to_end() -> anyhow::Result<()> {
    let (header, rows) = sample_sales();
    let input = mock_csv_file(&header, &rows)?;
    let root = TempDirPath::new()?;
    let ns = Namespace::new("sales", "by_region_year")?;
    let runner = Runner::new(Algorithm::Xz)
        .with_workers(2)
        .with_output_order(OutputOrder::Submission);

    let writer = DirGroupStore::create(root.path(), ns.clone())?;
    runner.compress_file(input.path(), &keys(&["region", "year"]), &writer)?;

    let reader = DirGroupStore::open(root.path(), ns);
    let out = root.file_path("y2020.csv");
    let report = runner.decompress_to_file(&parse_query(&["year=2020"])?, &reader, &out)?;
    assert_eq!(report.groups, 3);

    let (written_header, written) = read_csv_output(&out)?;
    assert_eq!(written_header, header);
    assert_rows_unordered_equal(written, rows_where(&rows, 2, "2020"));
    Ok(())
}
