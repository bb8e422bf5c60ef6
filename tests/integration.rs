use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn lexrag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("lexrag");
    path
}

const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<dokumente>
  <norm doknr="BJNR001270871BJNE000102307">
    <metadaten>
      <jurabk>StGB</jurabk>
      <enbez>Inhaltsübersicht</enbez>
    </metadaten>
    <textdaten><text><Content><P>Allgemeiner Teil ...</P></Content></text></textdaten>
  </norm>
  <norm doknr="BJNR001270871BJNE042902307">
    <metadaten>
      <jurabk>StGB</jurabk>
      <enbez>§ 242</enbez>
      <titel format="parat">Diebstahl</titel>
    </metadaten>
    <textdaten>
      <text format="XML">
        <Content>
          <P>(1) Wer eine fremde bewegliche Sache einem anderen in der Absicht wegnimmt, die Sache sich oder einem Dritten rechtswidrig zuzueignen, wird mit Freiheitsstrafe bis zu fünf Jahren oder mit Geldstrafe bestraft.</P>
          <P>(2) Der Versuch ist strafbar.</P>
        </Content>
      </text>
    </textdaten>
  </norm>
  <norm doknr="BJNR001270871BJNE042000000">
    <metadaten>
      <jurabk>StGB</jurabk>
      <enbez>§ 249</enbez>
      <titel>Raub</titel>
    </metadaten>
    <textdaten>
      <text format="XML">
        <Content>
          <P>(1) Wer mit Gewalt gegen eine Person eine fremde bewegliche Sache wegnimmt, wird mit Freiheitsstrafe nicht unter einem Jahr bestraft.</P>
        </Content>
      </text>
    </textdaten>
  </norm>
</dokumente>"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = r#"[embedding]
dims = 1536
batch_size = 64

[retrieval]
top_k = 8
law = "StGB"

[server]
bind = "127.0.0.1:7341"
"#;

    let config_path = config_dir.join("lexrag.toml");
    fs::write(&config_path, config_content).unwrap();

    fs::write(root.join("stgb.xml"), SAMPLE_XML).unwrap();

    (tmp, config_path)
}

fn run_lexrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = lexrag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run lexrag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn parse_writes_sections_ndjson() {
    let (tmp, config_path) = setup_test_env();
    let root = tmp.path();

    let input = root.join("stgb.xml");
    let output = root.join("sections.ndjson");

    let (stdout, stderr, ok) = run_lexrag(
        &config_path,
        &[
            "parse",
            "--input",
            input.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
        ],
    );

    assert!(ok, "parse failed: {}", stderr);
    assert!(stdout.contains("norms seen: 3"), "stdout: {}", stdout);
    assert!(stdout.contains("sections written: 2"), "stdout: {}", stdout);

    let content = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["law_abbr"], "StGB");
    assert_eq!(first["section_number"], "242");
    assert_eq!(first["section_title"], "Diebstahl");
    assert_eq!(first["source_uri"], "stgb.xml");
    assert_eq!(first["lang"], "de");
    let full_text = first["full_text"].as_str().unwrap();
    assert!(full_text.starts_with("§ 242 Diebstahl"));
    assert!(full_text.contains("Der Versuch ist strafbar."));

    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["section_number"], "249");
    assert_eq!(second["section_title"], "Raub");
}

#[test]
fn parse_works_without_config_file() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::write(root.join("stgb.xml"), SAMPLE_XML).unwrap();

    let missing_config = root.join("no-such-config.toml");
    let (stdout, stderr, ok) = run_lexrag(
        &missing_config,
        &[
            "parse",
            "--input",
            root.join("stgb.xml").to_str().unwrap(),
            "--output",
            root.join("out.ndjson").to_str().unwrap(),
        ],
    );

    assert!(ok, "parse should not require config: {}", stderr);
    assert!(stdout.contains("sections written: 2"));
}

#[test]
fn embed_dry_run_counts_without_network() {
    let (tmp, config_path) = setup_test_env();
    let root = tmp.path();

    let input = root.join("stgb.xml");
    let sections = root.join("sections.ndjson");
    let (_, stderr, ok) = run_lexrag(
        &config_path,
        &[
            "parse",
            "--input",
            input.to_str().unwrap(),
            "--output",
            sections.to_str().unwrap(),
        ],
    );
    assert!(ok, "parse failed: {}", stderr);

    let (stdout, stderr, ok) = run_lexrag(
        &config_path,
        &[
            "embed",
            "--input",
            sections.to_str().unwrap(),
            "--output",
            root.join("embedded.ndjson").to_str().unwrap(),
            "--dry-run",
        ],
    );

    assert!(ok, "embed --dry-run failed: {}", stderr);
    assert!(stdout.contains("embed (dry-run)"), "stdout: {}", stdout);
    assert!(stdout.contains("sections in input: 2"), "stdout: {}", stdout);
    assert!(stdout.contains("to embed:          2"), "stdout: {}", stdout);
    assert!(!root.join("embedded.ndjson").exists());
}

#[test]
fn embed_dry_run_resume_counts_existing() {
    let (tmp, config_path) = setup_test_env();
    let root = tmp.path();

    let sections = root.join("sections.ndjson");
    run_lexrag(
        &config_path,
        &[
            "parse",
            "--input",
            root.join("stgb.xml").to_str().unwrap(),
            "--output",
            sections.to_str().unwrap(),
        ],
    );

    // Fake a previous partial run: first section already embedded.
    let content = fs::read_to_string(&sections).unwrap();
    let first_line = content.lines().next().unwrap();
    let mut record: serde_json::Value = serde_json::from_str(first_line).unwrap();
    record["embedding"] = serde_json::json!([0.1, 0.2, 0.3]);
    let embedded = root.join("embedded.ndjson");
    fs::write(&embedded, format!("{}\n", record)).unwrap();

    let (stdout, stderr, ok) = run_lexrag(
        &config_path,
        &[
            "embed",
            "--input",
            sections.to_str().unwrap(),
            "--output",
            embedded.to_str().unwrap(),
            "--resume",
            "--dry-run",
        ],
    );

    assert!(ok, "embed failed: {}", stderr);
    assert!(stdout.contains("already embedded:  1"), "stdout: {}", stdout);
    assert!(stdout.contains("to embed:          1"), "stdout: {}", stdout);
}

#[test]
fn load_empty_input_reports_ok() {
    let (tmp, config_path) = setup_test_env();
    let empty = tmp.path().join("empty.ndjson");
    fs::write(&empty, "").unwrap();

    let (stdout, stderr, ok) = run_lexrag(&config_path, &["load", "--input", empty.to_str().unwrap()]);

    assert!(ok, "load failed: {}", stderr);
    assert!(stdout.contains("no sections in input"), "stdout: {}", stdout);
    assert!(stdout.trim_end().ends_with("ok"), "stdout: {}", stdout);
}

#[test]
fn invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("lexrag.toml");
    fs::write(&config_path, "[retrieval]\ntop_k = 0\n").unwrap();

    let (_, stderr, ok) = run_lexrag(&config_path, &["stats"]);
    assert!(!ok);
    assert!(stderr.contains("top_k"), "stderr: {}", stderr);
}

#[test]
fn unknown_progress_mode_is_rejected() {
    let (_tmp, config_path) = setup_test_env();

    let binary = lexrag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("fancy")
        .arg("stats")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown progress mode"), "stderr: {}", stderr);
}
