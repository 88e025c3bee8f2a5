use std::process::Command;

use modpatch::document::{Document, DocumentCodec, NativeCodec};
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_modpatch").to_string()
}

fn encoded(doc: &Document) -> Vec<u8> {
    NativeCodec.encode(doc).unwrap()
}

#[test]
fn cli_config_prints_resolved_paths() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{"GamePath": "/games/romfs", "Versions": [110]}"#).unwrap();

    let out = Command::new(bin())
        .arg("--config")
        .arg(&config)
        .arg("config")
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("game path: /games/romfs"), "{stdout}");
    assert!(stdout.contains("versions: [110]"), "{stdout}");
}

#[test]
fn cli_compare_gdl_identical() {
    let dir = tempdir().unwrap();
    let doc: Document = [("Data", Document::Map(Default::default()))].into_iter().collect();
    let first = dir.path().join("a.byml");
    let second = dir.path().join("b.byml");
    std::fs::write(&first, encoded(&doc)).unwrap();
    std::fs::write(&second, encoded(&doc)).unwrap();

    let out = Command::new(bin())
        .arg("--config")
        .arg(dir.path().join("none.json"))
        .arg("compare-gdl")
        .arg(&first)
        .arg(&second)
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "identical");
}

#[test]
fn cli_package_without_config_fails() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("mod/romfs")).unwrap();

    let out = Command::new(bin())
        .arg("--config")
        .arg(dir.path().join("missing.json"))
        .args(["package", "--mod"])
        .arg(dir.path().join("mod"))
        .arg("-o")
        .arg(dir.path().join("out"))
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("modpatch:"));
}

#[test]
fn cli_merge_with_base_and_json_report() {
    let dir = tempdir().unwrap();
    let game = dir.path().join("game");
    let mod_file = dir.path().join("mod/romfs/Banc/New.byml");
    std::fs::create_dir_all(&game).unwrap();
    std::fs::create_dir_all(mod_file.parent().unwrap()).unwrap();
    let doc = Document::Array(vec![Document::Int32(1)]);
    std::fs::write(&mod_file, encoded(&doc)).unwrap();
    let output = dir.path().join("merged");

    let out = Command::new(bin())
        .arg("--config")
        .arg(dir.path().join("none.json"))
        .arg("--json")
        .args(["merge", "--base"])
        .arg(&game)
        .arg("--mods")
        .arg(dir.path().join("mod"))
        .arg("--output")
        .arg(&output)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(std::fs::read(output.join("Banc/New.byml")).unwrap(), encoded(&doc));
    assert!(String::from_utf8_lossy(&out.stderr).contains(r#""copied":1"#));
}

#[test]
fn cli_requires_subcommand() {
    let out = Command::new(bin()).output().unwrap();
    assert!(!out.status.success());
}
