use assert_cmd::Command;
use assert_cmd::cargo;
use flate2::Compression;
use flate2::write::GzEncoder;
use md5::{Digest, Md5};
use mockito::Server;
use predicates::prelude::*;
use std::fs;
use std::io::prelude::*;
use std::path::Path;
use tar::Builder;
use tempfile::tempdir;

fn create_tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let mut tar_builder = Builder::new(Vec::new());
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_path(name).unwrap();
        header.set_mode(0o755);
        header.set_cksum();
        tar_builder.append(&header, content.as_bytes()).unwrap();
    }
    let tar = tar_builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}

fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", Md5::digest(bytes))
}

fn write_config(dir: &Path, url: &str, root_md5: &str) -> std::path::PathBuf {
    let config = format!(
        r#"{{
            "linux": {{
                "ddsim": {{
                    "TarBallURL": "{url}/sw",
                    "1.0": {{
                        "TarBall": "ddsim_1.0.tgz",
                        "Dependencies": {{ "root": {{ "version": "6.0" }} }},
                        "AdditionalEnvVar": {{ "DDSIM_MODE": "fast" }}
                    }}
                }},
                "root": {{
                    "6.0": {{
                        "TarBall": "root_6.0.tgz",
                        "TarBallURL": "{url}/sw/",
                        "Md5Sum": "{root_md5}"
                    }}
                }}
            }}
        }}"#
    );
    let path = dir.join("packages.json");
    fs::write(&path, config).unwrap();
    path
}

fn tarsoft(config: &Path) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("tarsoft"));
    cmd.env_remove("TARSOFT_AREAS")
        .env("TARSOFT_CONFIG", config)
        .env("TARSOFT_PLATFORM", "linux");
    cmd
}

#[test]
fn test_end_to_end_install_with_dependency() {
    let mut server = Server::new();
    let root = create_tar_gz(&[
        ("root_6.0/bin/root", "#!/bin/sh"),
        ("root_6.0/lib/libCore.so", "core"),
    ]);
    let ddsim = create_tar_gz(&[("ddsim_1.0/bin/ddsim", "#!/bin/sh")]);

    let root_mock = server
        .mock("GET", "/sw/root_6.0.tgz")
        .with_status(200)
        .with_body(&root)
        .expect(1)
        .create();
    let ddsim_mock = server
        .mock("GET", "/sw/ddsim_1.0.tgz")
        .with_status(200)
        .with_body(&ddsim)
        .expect(1)
        .create();

    let dir = tempdir().unwrap();
    let area = dir.path().join("area");
    fs::create_dir_all(&area).unwrap();
    let config = write_config(dir.path(), &server.url(), &md5_hex(&root));

    tarsoft(&config)
        .args(["install", "ddsim", "1.0", "--area"])
        .arg(&area)
        .assert()
        .success()
        .stdout(predicate::str::contains("export ROOTSYS="))
        .stdout(predicate::str::contains("export DDSIM_DIR="))
        .stdout(predicate::str::contains("export DDSIM_MODE='fast'"))
        .stdout(predicate::str::contains("LD_LIBRARY_PATH"));

    root_mock.assert();
    ddsim_mock.assert();
    assert!(area.join("root_6.0/lib/libCore.so").exists());
    assert!(area.join("ddsim_1.0/bin/ddsim").exists());
    assert!(!area.join("root_6.0.tgz").exists());
    assert!(!area.join("ddsim_1.0.lock").exists());
}

#[test]
fn test_second_run_does_not_download_again() {
    let mut server = Server::new();
    let root = create_tar_gz(&[("root_6.0/lib/libCore.so", "core")]);
    let root_mock = server
        .mock("GET", "/sw/root_6.0.tgz")
        .with_status(200)
        .with_body(&root)
        .expect(1)
        .create();

    let dir = tempdir().unwrap();
    let area = dir.path().join("area");
    fs::create_dir_all(&area).unwrap();
    let config = write_config(dir.path(), &server.url(), &md5_hex(&root));

    for _ in 0..2 {
        tarsoft(&config)
            .args(["install", "root", "6.0", "--area"])
            .arg(&area)
            .assert()
            .success()
            .stdout(predicate::str::contains("export ROOTSYS="));
    }

    root_mock.assert();
}

#[test]
fn test_checksum_failure_is_reported() {
    let mut server = Server::new();
    let root_mock = server
        .mock("GET", "/sw/root_6.0.tgz")
        .with_status(200)
        .with_body(create_tar_gz(&[("root_6.0/lib/libCore.so", "tampered")]))
        .expect(2)
        .create();

    let dir = tempdir().unwrap();
    let area = dir.path().join("area");
    fs::create_dir_all(&area).unwrap();
    let config = write_config(dir.path(), &server.url(), &md5_hex(b"the real tarball"));

    tarsoft(&config)
        .args(["install", "root", "6.0", "--area"])
        .arg(&area)
        .assert()
        .failure()
        .stderr(predicate::str::contains("root 6.0"))
        .stderr(predicate::str::contains("checksum"));

    root_mock.assert();
    assert!(!area.join("root_6.0").exists());
    assert!(!area.join("root_6.0.tgz").exists());
}

#[test]
fn test_json_output() {
    let mut server = Server::new();
    let root = create_tar_gz(&[("root_6.0/lib/libCore.so", "core")]);
    let _root_mock = server
        .mock("GET", "/sw/root_6.0.tgz")
        .with_status(200)
        .with_body(&root)
        .create();

    let dir = tempdir().unwrap();
    let area = dir.path().join("area");
    fs::create_dir_all(&area).unwrap();
    let config = write_config(dir.path(), &server.url(), &md5_hex(&root));

    let output = tarsoft(&config)
        .args(["install", "root", "6.0", "--json", "--area"])
        .arg(&area)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["artifact"]["folder_name"], "root_6.0");
    assert!(json["environment"]["ROOTSYS"].is_string());
}

#[test]
fn test_no_area_available() {
    let server = Server::new();
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), &server.url(), "");

    tarsoft(&config)
        .args(["install", "root", "6.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no install area available"));
}

#[test]
fn test_locate_command() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "http://example.com", "");

    tarsoft(&config)
        .args(["locate", "ddsim", "1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("URL: http://example.com/sw/ddsim_1.0.tgz"))
        .stdout(predicate::str::contains("root 6.0"));
}

#[test]
fn test_missing_platform() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "http://example.com", "");

    Command::new(cargo::cargo_bin!("tarsoft"))
        .env_remove("TARSOFT_PLATFORM")
        .env("TARSOFT_CONFIG", &config)
        .args(["locate", "root", "6.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No platform given"));
}
