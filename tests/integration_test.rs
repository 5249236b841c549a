use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn trackbook_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_trackbook"))
}

fn run(dir: &Path, args: &[&str]) -> Output {
    trackbook_cmd().current_dir(dir).args(args).output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn init(app: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let output = run(tmp.path(), &["init", "--app", app]);
    assert!(output.status.success(), "{}", stderr(&output));
    tmp
}

#[test]
fn test_init_creates_trackbook_directory() {
    let tmp = init("inventory");

    assert!(tmp.path().join(".trackbook/config.yaml").exists());
    assert!(tmp.path().join(".trackbook/data").is_dir());
    let config = std::fs::read_to_string(tmp.path().join(".trackbook/config.yaml")).unwrap();
    assert!(config.contains("app: inventory"));
}

#[test]
fn test_init_twice_fails() {
    let tmp = init("school");

    let output = run(tmp.path(), &["init"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Already initialized"));
}

#[test]
fn test_list_without_init_fails() {
    let tmp = TempDir::new().unwrap();

    let output = run(tmp.path(), &["list", "students"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Not in a trackbook project"));
}

#[test]
fn test_unknown_collection_fails() {
    let tmp = init("school");

    let output = run(tmp.path(), &["list", "invoices"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Valid collections: classes, students, progress"));
}

#[test]
fn test_seed_students_with_averages() {
    let tmp = init("school");

    let output = run(tmp.path(), &["list", "students", "--sort", "average", "--desc", "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let rows: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["code"], "S001");
    assert_eq!(rows[0]["average"], 91.0);
    assert_eq!(rows[0]["performance"], "Excellent");
}

#[test]
fn test_import_appends_student() {
    let tmp = init("school");
    std::fs::write(tmp.path().join("new.csv"), "Student ID,Full Name\nS004,New Student\n").unwrap();

    let output = run(tmp.path(), &["import", "students", "new.csv"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Imported 1 students record(s)"));

    let output = run(tmp.path(), &["list", "students", "--search", "S004", "--json"]);
    let rows: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "New Student");
    assert_eq!(rows[0]["average"], "N/A");
}

#[test]
fn test_strict_import_writes_nothing() {
    let tmp = init("school");
    std::fs::write(tmp.path().join("bad.csv"), "Full Name\nNobody\n").unwrap();

    let output = run(tmp.path(), &["import", "students", "bad.csv"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Student ID"));
    assert!(!tmp.path().join(".trackbook/data/school.students.json").exists());
}

#[test]
fn test_add_and_validation_errors() {
    let tmp = init("inventory");

    let output = run(
        tmp.path(),
        &[
            "add", "items", "--set", "sku=TBL-9", "--set", "name=Desk", "--set", "category=Furniture",
            "--set", "price=120", "--set", "quantity=-2",
        ],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("quantity"));

    let output = run(
        tmp.path(),
        &[
            "add", "items", "--set", "sku=TBL-9", "--set", "name=Desk", "--set", "category=Furniture",
            "--set", "price=120", "--set", "quantity=3", "--set", "min_stock_level=5", "--json",
        ],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    let item: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(item["status"], "Low Stock");
}

#[test]
fn test_delete_student_cascades_progress() {
    let tmp = init("school");

    let output = run(tmp.path(), &["delete", "students", "student-1"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--force"));

    let output = run(tmp.path(), &["delete", "students", "student-1", "--force"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("also removed 2 dependent record(s)"));

    let output = run(tmp.path(), &["list", "progress", "--filter", "student=student-1", "--json"]);
    let rows: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert!(rows.as_array().unwrap().is_empty());
}

#[test]
fn test_get_missing_record_fails() {
    let tmp = init("agile");

    let output = run(tmp.path(), &["get", "tasks", "task-99"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("not found"));
}

#[test]
fn test_update_with_patch() {
    let tmp = init("agile");

    let output = run(tmp.path(), &["update", "tasks", "task-4", "--patch", r#"{"status":"done"}"#]);
    assert!(output.status.success(), "{}", stderr(&output));

    let output = run(tmp.path(), &["get", "tasks", "task-4", "--json"]);
    let task: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(task["status"], "done");
}

#[test]
fn test_dark_mode_persists_per_app() {
    let tmp = init("school");

    let output = run(tmp.path(), &["theme", "dark"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let output = run(tmp.path(), &["theme"]);
    assert!(stdout(&output).contains("school theme: dark"));

    let output = run(tmp.path(), &["--app", "transport", "theme"]);
    assert!(stdout(&output).contains("transport theme: light"));
}

#[test]
fn test_export_import_round_trip() {
    let tmp = init("transport");

    let output = run(tmp.path(), &["export", "drivers", "--output", "drivers.csv"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let csv = std::fs::read_to_string(tmp.path().join("drivers.csv")).unwrap();
    assert!(csv.starts_with("\"Name\",\"License Number\",\"Phone\",\"Status\""));

    let output = run(tmp.path(), &["import", "drivers", "drivers.csv"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let output = run(tmp.path(), &["list", "drivers", "--search", "DL-48213", "--json"]);
    let rows: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], rows[1]["name"]);
    assert_eq!(rows[0]["status"], rows[1]["status"]);
    assert_ne!(rows[0]["id"], rows[1]["id"]);
}

#[test]
fn test_students_round_trip_through_csv() {
    let tmp = init("school");

    let output = run(tmp.path(), &["export", "students", "--output", "students.csv"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let output = run(tmp.path(), &["import", "students", "students.csv"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Imported 3 students record(s)"));

    let output = run(tmp.path(), &["list", "students", "--json"]);
    let rows: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 6);
    for (original, copy) in rows[..3].iter().zip(&rows[3..]) {
        assert_eq!(original["code"], copy["code"]);
        assert_eq!(original["name"], copy["name"]);
        assert_eq!(original["email"], copy["email"]);
        assert_eq!(original["class_id"], copy["class_id"]);
        assert_ne!(original["id"], copy["id"]);
    }
}

#[test]
fn test_update_rejects_unknown_patch_field() {
    let tmp = init("school");

    let output = run(
        tmp.path(),
        &["update", "students", "student-1", "--patch", r#"{"Full Name":"Renamed"}"#],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("unknown field 'Full Name'"));

    let output = run(tmp.path(), &["get", "students", "student-1", "--json"]);
    let student: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(student["name"], "Alice Johnson");
}

#[test]
fn test_corrupt_storage_warns_and_uses_seed() {
    let tmp = init("inventory");
    std::fs::write(tmp.path().join(".trackbook/data/inventory.items.json"), "{not json").unwrap();

    let output = run(tmp.path(), &["list", "items"]);
    assert!(output.status.success());
    assert!(stderr(&output).contains("inventory.items"));
    assert!(stdout(&output).contains("Items:"));
    assert!(tmp
        .path()
        .join(".trackbook/data/inventory.items.corrupt.json")
        .exists());
}

#[test]
fn test_stats_for_telehealth() {
    let tmp = init("clinic");

    let output = run(tmp.path(), &["stats", "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let stats: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let rating = stats
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["label"] == "Average rating")
        .unwrap();
    assert_eq!(rating["value"], "4.3");
}
