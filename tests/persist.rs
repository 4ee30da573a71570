use camino::Utf8PathBuf;

use assert_matches::assert_matches;
use rankscan::domain::RankRecord;
use rankscan::error::RankscanError;
use rankscan::persist::{CsvArtifact, Persister, check_artifact, read_artifact, resort_artifact};

fn temp_artifact(temp: &tempfile::TempDir, name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().join(name)).unwrap()
}

fn sample() -> Vec<RankRecord> {
    vec![
        RankRecord::new("https://example.test/p?id=3", 10),
        RankRecord::new("https://example.test/p?id=5", 20),
        RankRecord::new("https://example.test/p?id=1", 30),
    ]
}

#[test]
fn flush_then_read_matches_exactly() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp_artifact(&temp, "out.csv");
    let artifact = CsvArtifact::new(path.clone());

    artifact.flush(&sample()).unwrap();
    assert_eq!(artifact.read().unwrap(), sample());

    let raw = std::fs::read_to_string(path.as_std_path()).unwrap();
    assert_eq!(
        raw,
        "https://example.test/p?id=3,10\nhttps://example.test/p?id=5,20\nhttps://example.test/p?id=1,30\n"
    );
}

#[test]
fn flush_replaces_previous_content() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp_artifact(&temp, "out.csv");
    let artifact = CsvArtifact::new(path.clone());

    artifact.flush(&sample()).unwrap();
    let shorter = vec![RankRecord::new("only", 1)];
    artifact.flush(&shorter).unwrap();
    assert_eq!(read_artifact(&path).unwrap(), shorter);

    let leftovers: Vec<_> = std::fs::read_dir(temp.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1, "temp files left behind: {leftovers:?}");
}

#[test]
fn flush_creates_parent_directories() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp_artifact(&temp, "nested/dir/out.csv");
    CsvArtifact::new(path.clone()).flush(&sample()).unwrap();
    assert_eq!(read_artifact(&path).unwrap().len(), 3);
}

#[test]
fn append_accumulates_records() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp_artifact(&temp, "out.csv");
    let artifact = CsvArtifact::new(path.clone());
    for record in sample().into_iter().rev() {
        artifact.append(&record).unwrap();
    }
    let mut expected = sample();
    expected.reverse();
    assert_eq!(read_artifact(&path).unwrap(), expected);
}

#[test]
fn resort_and_check() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp_artifact(&temp, "out.csv");
    let mut unsorted = sample();
    unsorted.reverse();
    CsvArtifact::new(path.clone()).flush(&unsorted).unwrap();

    assert_matches!(
        check_artifact(&path),
        Err(RankscanError::ArtifactUnsorted { line: 2, .. })
    );
    assert_eq!(resort_artifact(&path).unwrap(), 3);
    assert_eq!(read_artifact(&path).unwrap(), sample());
    assert_eq!(check_artifact(&path).unwrap(), 3);

    // Sorting sorted output changes nothing.
    let before = std::fs::read(path.as_std_path()).unwrap();
    resort_artifact(&path).unwrap();
    assert_eq!(std::fs::read(path.as_std_path()).unwrap(), before);
}

#[test]
fn remove_and_exists() {
    let temp = tempfile::tempdir().unwrap();
    let artifact = CsvArtifact::new(temp_artifact(&temp, "out.csv"));
    assert!(!artifact.exists());
    artifact.remove().unwrap();
    artifact.flush(&[]).unwrap();
    assert!(artifact.exists());
    artifact.remove().unwrap();
    assert!(!artifact.exists());
}

#[test]
fn reading_malformed_artifact_fails() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp_artifact(&temp, "out.csv");
    std::fs::write(path.as_std_path(), "ref,not-a-number\n").unwrap();
    assert_matches!(read_artifact(&path), Err(RankscanError::ArtifactRead { .. }));
}
