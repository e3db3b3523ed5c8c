//! Cleanup against files on disk

use roadwatch_csv_clean::{clean_file, CleanError, CleanReport, DEFAULT_MIN_COLUMNS};
use tempfile::TempDir;

#[test]
fn test_clean_in_place() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("accelerometer.csv");
    std::fs::write(&path, "x,y,z\n1,2,16384\n3,4\n5\n6,7,16000\n").unwrap();

    let report = clean_file(&path, &path, DEFAULT_MIN_COLUMNS).unwrap();

    assert_eq!(report, CleanReport { kept: 3, removed: 2 });
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "x,y,z\n1,2,16384\n6,7,16000\n"
    );
}

#[test]
fn test_clean_file_is_left_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gps.csv");
    let content = "latitude,longitude\n50.45,30.52\n50.46,30.53\n";
    std::fs::write(&path, content).unwrap();

    let report = clean_file(&path, &path, 2).unwrap();

    assert_eq!(report, CleanReport { kept: 3, removed: 0 });
    assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
}

#[test]
fn test_quoted_fields_survive() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.csv");
    let output = dir.path().join("out.csv");
    std::fs::write(&input, "a,\"b,c\",d\n\"e,f\"\n").unwrap();

    let report = clean_file(&input, &output, 3).unwrap();

    assert_eq!(report, CleanReport { kept: 1, removed: 1 });
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "a,\"b,c\",d\n");
}

#[test]
fn test_missing_input() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.csv");

    let err = clean_file(&missing, &dir.path().join("out.csv"), 3).unwrap_err();

    assert!(matches!(err, CleanError::Read { .. }));
    assert!(!dir.path().join("out.csv").exists());
}
