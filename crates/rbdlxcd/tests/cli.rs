//! Startup behaviour of the daemon binary.
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn rbdlxcd() -> Command {
    let mut cmd = Command::cargo_bin("rbdlxcd").unwrap();
    cmd.env_remove("RBDLXC_LISTEN")
        .env_remove("LXC_PATH")
        .env_remove("CEPH_CONF")
        .env_remove("CEPH_KEYRING")
        .env("RUST_LOG", "error");
    cmd
}

#[test]
fn help_lists_flags() {
    rbdlxcd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--lxcpath"))
        .stdout(predicate::str::contains("--ceph-conf"))
        .stdout(predicate::str::contains("--keyring"));
}

#[test]
fn missing_cluster_descriptor_aborts_startup() {
    let temp = TempDir::new().unwrap();

    rbdlxcd()
        .arg("--ceph-conf")
        .arg(temp.path().join("ceph.conf"))
        .arg("--keyring")
        .arg(temp.path().join("keyring"))
        .arg("--listen")
        .arg("127.0.0.1:0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ceph"));
}

#[test]
fn keyring_without_secret_aborts_startup() {
    let temp = TempDir::new().unwrap();
    let conf = temp.path().join("ceph.conf");
    let keyring = temp.path().join("keyring");
    std::fs::write(&conf, "[global]\nmon host = 10.0.0.1\n").unwrap();
    std::fs::write(&keyring, "[client.admin]\n").unwrap();

    rbdlxcd()
        .arg("--ceph-conf")
        .arg(&conf)
        .arg("--keyring")
        .arg(&keyring)
        .arg("--listen")
        .arg("127.0.0.1:0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("keyring has no key"));
}

#[test]
fn invalid_listen_address_is_rejected() {
    rbdlxcd()
        .arg("--listen")
        .arg("not-an-address")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--listen"));
}
