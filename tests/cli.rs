use assert_cmd::prelude::*;
use mockito::{Matcher, Server};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn write_config(dir: &Path, base_url: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = dir.join("config.toml");

    fs::write(
        &path,
        format!(
            "base_url = \"{}\"\nsession_path = \"{}\"\ndownload_dir = \"{}\"\ntimeout_secs = 5\n",
            base_url,
            dir.join("session.json").display(),
            dir.join("descargas").display(),
        ),
    )?;

    Ok(path)
}

#[test]
fn version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("actas")?;

    cmd.arg("version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));

    Ok(())
}

#[test]
fn upload_rejects_non_pdf_without_network() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    let get = server.mock("GET", Matcher::Any).expect(0).create();
    let post = server.mock("POST", Matcher::Any).expect(0).create();

    let dir = tempfile::tempdir()?;
    let config_path = write_config(dir.path(), &server.url())?;
    let file = dir.path().join("acta.png");
    fs::write(&file, b"not a pdf")?;

    let mut cmd = Command::cargo_bin("actas")?;

    cmd.arg("acta")
        .arg("upload")
        .arg("--config-path")
        .arg(&config_path)
        .arg("--sale")
        .arg("3")
        .arg(&file);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("only PDF files are allowed"));

    get.assert();
    post.assert();

    Ok(())
}

#[test]
fn acta_requires_reference() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("actas")?;

    cmd.arg("acta").arg("info");

    cmd.assert().failure();

    Ok(())
}

#[test]
fn info_lists_offered_slots() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    server
        .mock("GET", "/employees/7/acta-info")
        .with_body(
            r#"{
                "has_computer_devices": true,
                "has_mobile_devices": false,
                "computer_assignment_id": 42,
                "computer_acta_path": "actas/42.pdf"
            }"#,
        )
        .create();

    let dir = tempfile::tempdir()?;
    let config_path = write_config(dir.path(), &server.url())?;

    let mut cmd = Command::cargo_bin("actas")?;

    cmd.arg("acta")
        .arg("info")
        .arg("--config-path")
        .arg(&config_path)
        .arg("--employee")
        .arg("7");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("assignment #42 (computer): подписан"))
        .stdout(predicate::str::contains("acta_generada_assignment_42.pdf"));

    Ok(())
}

#[test]
fn generated_sale_acta_is_saved() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new();
    server
        .mock("GET", "/sales/8")
        .with_body(r#"{"id": 8, "acta_path": null}"#)
        .create();
    let generate = server
        .mock("POST", "/sales/8/generate-acta")
        .with_header("content-type", "application/pdf")
        .with_body(b"%PDF-1.4".as_slice())
        .create();

    let dir = tempfile::tempdir()?;
    let config_path = write_config(dir.path(), &server.url())?;

    let mut cmd = Command::cargo_bin("actas")?;

    cmd.arg("acta")
        .arg("generated")
        .arg("--config-path")
        .arg(&config_path)
        .arg("--sale")
        .arg("8");

    cmd.assert().success();

    generate.assert();
    assert_eq!(
        fs::read(dir.path().join("descargas").join("acta_generada_sale_8.pdf"))?,
        b"%PDF-1.4"
    );

    Ok(())
}
