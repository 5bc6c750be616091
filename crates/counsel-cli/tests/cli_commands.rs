use anyhow::Result;
use std::fs;
use std::process::Command;

const TEACHERS: &str = "\
Pregunta,Profesor A,Profesor B
¿Qué es Machine Learning?,Es un área de IA...,
¿Qué especialidad tiene más salida laboral?,,Redes y ciberseguridad.
";

fn counsel() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_counsel"));
    // Keep the run independent of any counsel.toml in the working directory.
    cmd.current_dir(std::env::temp_dir());
    cmd
}

#[test]
fn index_then_query_json() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let csv = dir.path().join("maestros.csv");
    let index = dir.path().join("index.json");
    fs::write(&csv, TEACHERS)?;

    let status = counsel()
        .arg("index")
        .arg("--source")
        .arg(format!("maestros={}", csv.display()))
        .arg("--out")
        .arg(&index)
        .status()?;
    assert!(status.success());
    assert!(index.exists());

    let output = counsel()
        .args(["query", "--json", "--query", "Cuéntame sobre Machine Learning", "--index"])
        .arg(&index)
        .output()?;
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["decision"], "matched");
    assert_eq!(value["best"]["source_label"], "Profesor A");
    assert_eq!(value["best"]["answer"], "Es un área de IA...");

    let output = counsel()
        .args(["query", "--json", "--query", "asdkjaslkdj", "--index"])
        .arg(&index)
        .output()?;
    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["decision"], "unmatched");
    assert!(value["best"].is_null());
    Ok(())
}

#[test]
fn record_out_of_range_fails() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let csv = dir.path().join("maestros.csv");
    fs::write(&csv, TEACHERS)?;

    let output = counsel()
        .args(["record", "--position", "99", "--source"])
        .arg(format!("maestros={}", csv.display()))
        .output()?;
    assert!(!output.status.success());

    let output = counsel()
        .args(["record", "--json", "--position", "1", "--source"])
        .arg(format!("maestros={}", csv.display()))
        .output()?;
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["record"]["source_label"], "Profesor B");
    Ok(())
}
