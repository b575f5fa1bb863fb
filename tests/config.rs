use shardstash::testing::{mock_csv_file, sample_sales, TempDirPath};
use shardstash::{
    default_workers, parse_query, Algorithm, Error, Grouping, MemoryGroupStore, Namespace,
    OutputOrder, RunConfig, Runner,
};
use std::time::Duration;

#[test]
fn defaults() {
    let config = RunConfig::default();
    assert_eq!(config.worker_count(), default_workers());
    assert_eq!(config.grouping(), Grouping::Bulk);
    assert_eq!(config.output_order, OutputOrder::Completion);
    assert!(config.write_header);
    assert_eq!(config.store.connect_timeout(), Duration::from_secs(1));
    assert!(default_workers() >= 2);
}

#[test]
fn partial_file_keeps_defaults() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = dir.file_path("run.json");
    std::fs::write(
        &path,
        r#"{ "memory_cap": 500, "output_order": "submission", "store": { "database": "sales" } }"#,
    )?;

    let config = RunConfig::from_file(&path)?;
    assert_eq!(config.grouping(), Grouping::Bounded { cap: 500 });
    assert_eq!(config.output_order, OutputOrder::Submission);
    assert_eq!(config.store.database.as_deref(), Some("sales"));
    assert_eq!(config.store.collection, None);
    assert_eq!(config.store.endpoint, "./shardstash-store");
    assert_eq!(config.workers, None);

    let runner = Runner::from_config(Algorithm::Xz, &config);
    assert_eq!(runner.grouping, Grouping::Bounded { cap: 500 });
    assert_eq!(runner.output_order, OutputOrder::Submission);
    assert_eq!(runner.workers, default_workers());
    Ok(())
}

#[test]
fn invalid_files_are_config_errors() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    for (name, body) in [
        ("broken.json", "{ not json"),
        ("zero_workers.json", r#"{ "workers": 0 }"#),
        ("zero_cap.json", r#"{ "memory_cap": 0 }"#),
        ("zero_timeout.json", r#"{ "store": { "connect_timeout_ms": 0 } }"#),
        ("bad_order.json", r#"{ "output_order": "random" }"#),
    ] {
        let path = dir.file_path(name);
        std::fs::write(&path, body)?;
        assert!(
            matches!(RunConfig::from_file(&path), Err(Error::Config(_))),
            "{name} was accepted"
        );
    }
    assert!(matches!(
        RunConfig::from_file(dir.file_path("absent.json")),
        Err(Error::InputNotFound(_))
    ));
    Ok(())
}

#[test]
fn reports_save_as_json() -> anyhow::Result<()> {
    let (header, rows) = sample_sales();
    let input = mock_csv_file(&header, &rows)?;
    let dir = TempDirPath::new()?;
    let store = MemoryGroupStore::new(Namespace::new("sales", "reports")?);
    let runner = Runner::new(Algorithm::Gzip).with_workers(2);

    let compress = runner.compress_file(input.path(), &["region".to_string()], &store)?;
    assert!(compress.raw_bytes > 0 && compress.compressed_bytes > 0);
    let path = dir.file_path("compress.json");
    compress.save_to_file(&path)?;
    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(saved["algorithm"], "gzip");
    assert_eq!(saved["mode"], "bulk");
    assert_eq!(saved["groups"], 3);
    assert_eq!(saved["rows"], 6);

    let out = dir.file_path("west.csv");
    let decompress = runner.decompress_to_file(&parse_query(&["region=west"])?, &store, &out)?;
    let path = dir.file_path("decompress.json");
    decompress.save_to_file(&path)?;
    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(saved["groups"], 1);
    assert_eq!(saved["rows"], 2);
    Ok(())
}
