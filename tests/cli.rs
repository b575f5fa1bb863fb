use shardstash::testing::{
    assert_rows_unordered_equal, read_csv_output, sample_sales, write_csv_file, TempDirPath,
};
use std::process::{Command, Output};

fn shardstash(dir: &TempDirPath, args: &[&str]) -> anyhow::Result<Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_shardstash"))
        .current_dir(dir.path())
        .env("RUST_LOG", "warn")
        .args(args)
        .output()?)
}

#[test]
fn compress_then_decompress() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let (header, rows) = sample_sales();
    write_csv_file(&dir.file_path("sales.csv"), &header, &rows)?;

    let out = shardstash(
        &dir,
        &[
            "compress", "-i", "sales.csv", "-f", "\"region\"", "\"year\"", "-a", "bzip2",
            "-d", "sales", "-c", "by_region_year", "--endpoint", "store", "--memory-cap", "2",
        ],
    )?;
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(dir.file_path("store/sales/by_region_year").is_dir());

    let out = shardstash(
        &dir,
        &[
            "decompress", "-o", "\"east.csv\"", "-f", "region=east", "-a", "bzip2", "-d",
            "sales", "-c", "by_region_year", "--endpoint", "store", "--ordered", "--report",
            "report.json",
        ],
    )?;
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let (written_header, written) = read_csv_output(&dir.file_path("east.csv"))?;
    assert_eq!(written_header, header);
    let east = rows.iter().filter(|r| r[1] == "east").cloned().collect();
    assert_rows_unordered_equal(written, east);
    assert!(dir.file_path("report.json").is_file());
    Ok(())
}

#[test]
fn invalid_arguments_exit_non_zero() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let (header, rows) = sample_sales();
    write_csv_file(&dir.file_path("sales.csv"), &header, &rows)?;
    let base = ["-a", "gzip", "-d", "sales", "-c", "coll", "--endpoint", "store"];

    let cases: [&[&str]; 5] = [
        // unquoted field name
        &["compress", "-i", "sales.csv", "-f", "region"],
        // missing input
        &["compress", "-i", "missing.csv", "-f", "\"region\""],
        // unknown column
        &["compress", "-i", "sales.csv", "-f", "\"month\""],
        // output name starting with a digit
        &["decompress", "-o", "\"1.csv\"", "-f", "region=east"],
        // nothing stored under this namespace
        &["decompress", "-o", "\"east.csv\"", "-f", "region=east"],
    ];
    for case in cases {
        let args: Vec<&str> = case.iter().chain(base.iter()).copied().collect();
        let out = shardstash(&dir, &args)?;
        assert!(!out.status.success(), "{case:?} succeeded");
        assert!(!out.stderr.is_empty(), "{case:?} printed no error");
    }
    assert!(!dir.file_path("east.csv").exists());
    Ok(())
}
