//! CLI integration tests for blueprint
//!
//! Tests the blueprint CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Isolated config directory and database file for one test
struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Command with the sandbox config dir and database
    #[allow(deprecated)]
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("blueprint").unwrap();
        cmd.env("BLUEPRINT_CONFIG_DIR", self.dir.path().join("config"));
        cmd.env_remove("RUST_LOG");
        cmd.arg("--db").arg(self.dir.path().join("test.db"));
        cmd
    }

    /// Run quietly and return trimmed stdout
    fn run_quiet(&self, args: &[&str]) -> String {
        let output = self
            .cmd()
            .arg("--quiet")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        String::from_utf8(output).unwrap().trim().to_string()
    }

    fn write_file(&self, name: &str, contents: &str) -> String {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path.display().to_string()
    }
}

#[test]
fn test_help_lists_commands() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("blueprints"))
        .stdout(predicate::str::contains("versions"))
        .stdout(predicate::str::contains("compile"));
}

#[test]
fn test_create_and_list_blueprints() {
    let sandbox = Sandbox::new();

    sandbox
        .cmd()
        .args(["blueprints", "create", "Fantasy", "--tag", "rpg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Blueprint created successfully"))
        .stdout(predicate::str::contains("Tags: rpg"));

    sandbox
        .cmd()
        .args(["blueprints", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fantasy"));
}

#[test]
fn test_empty_blueprint_list() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["blueprints", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No blueprints found"));
}

#[test]
fn test_version_lifecycle() {
    let sandbox = Sandbox::new();
    let blueprint_id = sandbox.run_quiet(&["blueprints", "create", "World"]);

    let v1 = sandbox.run_quiet(&["versions", "create", &blueprint_id]);
    let v2 = sandbox.run_quiet(&["versions", "create", &blueprint_id]);
    assert_ne!(v1, v2);

    sandbox
        .cmd()
        .args(["versions", "publish", &v1])
        .assert()
        .success()
        .stdout(predicate::str::contains("is published"));

    sandbox
        .cmd()
        .args(["versions", "list", &blueprint_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("v1"))
        .stdout(predicate::str::contains("[published]"))
        .stdout(predicate::str::contains("v2"))
        .stdout(predicate::str::contains("[draft]"));

    sandbox
        .cmd()
        .args(["versions", "deprecate", &v1])
        .assert()
        .success()
        .stdout(predicate::str::contains("is deprecated"));
    sandbox
        .cmd()
        .args(["versions", "archive", &v1])
        .assert()
        .success()
        .stdout(predicate::str::contains("is archived"));
}

#[test]
fn test_invalid_transition_reports_code() {
    let sandbox = Sandbox::new();
    let blueprint_id = sandbox.run_quiet(&["blueprints", "create", "World"]);
    let draft = sandbox.run_quiet(&["versions", "create", &blueprint_id]);

    sandbox
        .cmd()
        .args(["versions", "archive", &draft])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E201"));
}

#[test]
fn test_compile_unknown_blueprint_fails() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["compile", "no-such-blueprint"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E001"))
        .stderr(predicate::str::contains("blueprint blueprints list"));
}

#[test]
fn test_compile_without_versions_fails() {
    let sandbox = Sandbox::new();
    let blueprint_id = sandbox.run_quiet(&["blueprints", "create", "Empty"]);

    sandbox
        .cmd()
        .args(["compile", &blueprint_id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E003"));
}

#[test]
fn test_import_and_compile() {
    let sandbox = Sandbox::new();
    let blueprint_id = sandbox.run_quiet(&["blueprints", "create", "World"]);
    let draft = sandbox.run_quiet(&["versions", "create", &blueprint_id]);
    let bundle = sandbox.write_file(
        "bundle.json",
        r#"{
            "entity_types": [
                {"entity_kind": "CHARACTER",
                 "fields": [{"name": "name", "data_type": "text"}]},
                {"entity_kind": "HERO", "parent": "CHARACTER",
                 "fields": [{"name": "quest", "data_type": "text"}]}
            ],
            "relationship_types": [
                {"name": "guards", "source": "HERO", "target": "ARTIFACT"}
            ]
        }"#,
    );

    sandbox
        .cmd()
        .args(["versions", "import", &draft, &bundle])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entity types: 2"))
        .stdout(predicate::str::contains("Fields: 2"));

    let output = sandbox
        .cmd()
        .arg("--quiet")
        .args(["compile", &blueprint_id, "--version", &draft])
        .assert()
        .success()
        .stderr(predicate::str::contains("ARTIFACT"))
        .get_output()
        .stdout
        .clone();

    let compiled: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(compiled["entity_types"].as_array().unwrap().len(), 2);
    assert_eq!(compiled["fingerprint"].as_str().unwrap().len(), 64);
    assert_eq!(compiled["diagnostics"][0]["warning"], "unknown_relationship_endpoint");
}

#[test]
fn test_compile_version_of_other_blueprint_fails() {
    let sandbox = Sandbox::new();
    let first = sandbox.run_quiet(&["blueprints", "create", "First"]);
    let second = sandbox.run_quiet(&["blueprints", "create", "Second"]);
    let version = sandbox.run_quiet(&["versions", "create", &first]);

    sandbox
        .cmd()
        .args(["compile", &second, "--version", &version])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E800"))
        .stderr(predicate::str::contains("belongs to blueprint"));
}

#[test]
fn test_import_into_published_version_fails() {
    let sandbox = Sandbox::new();
    let blueprint_id = sandbox.run_quiet(&["blueprints", "create", "World"]);
    let version = sandbox.run_quiet(&["versions", "create", &blueprint_id]);
    sandbox.run_quiet(&["versions", "publish", &version]);
    let bundle = sandbox.write_file("bundle.json", r#"{"entity_types": []}"#);

    sandbox
        .cmd()
        .args(["versions", "import", &version, &bundle])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E202"));
}

#[test]
fn test_fork_from_version() {
    let sandbox = Sandbox::new();
    let blueprint_id = sandbox.run_quiet(&["blueprints", "create", "World"]);
    let v1 = sandbox.run_quiet(&["versions", "create", &blueprint_id]);
    let bundle = sandbox.write_file(
        "bundle.json",
        r#"{"entity_types": [{"entity_kind": "ITEM"}]}"#,
    );
    sandbox.run_quiet(&["versions", "import", &v1, &bundle]);
    sandbox.run_quiet(&["versions", "publish", &v1]);

    let v2 = sandbox.run_quiet(&["versions", "create", &blueprint_id, "--from", &v1]);

    let output = sandbox
        .cmd()
        .arg("--quiet")
        .args(["compile", &blueprint_id, "--version", &v2, "--pretty"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let compiled: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(compiled["version"]["version_number"], 2);
    assert_eq!(compiled["version"]["status"], "draft");
    assert_eq!(compiled["entity_types"][0]["entity_kind"], "ITEM");
}

#[test]
fn test_config_set_get_reset() {
    let sandbox = Sandbox::new();

    sandbox
        .cmd()
        .args(["config", "set", "compiler.max_inheritance_depth", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set compiler.max_inheritance_depth = 5"));

    sandbox
        .cmd()
        .args(["config", "get", "compiler.max_inheritance_depth"])
        .assert()
        .success()
        .stdout(predicate::str::diff("5\n"));

    sandbox
        .cmd()
        .args(["config", "set", "compiler.max_inheritance_depth", "0"])
        .assert()
        .failure();

    sandbox.cmd().args(["config", "reset"]).assert().success();

    sandbox
        .cmd()
        .args(["config", "get", "compiler.max_inheritance_depth"])
        .assert()
        .success()
        .stdout(predicate::str::diff("10\n"));
}

#[test]
fn test_config_unknown_key() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["config", "get", "llm.model"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}
