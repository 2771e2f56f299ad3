//! Update check: pinning, version policy, space gate, and staged download.

use crate::helpers::{Device, FakeServer, SERVER, firmware, manifest_for, sha256_hex, Entry};
use sha2::{Digest, Sha256};
use uota::integrity::NoPinning;
use uota::{CheckFailure, CheckOptions, CheckOutcome, UpdateError, UpdatePhase};

fn payload() -> Vec<u8> {
    firmware(&[Entry::File("main.py", b"print('v1.1')\n")])
}

#[test]
fn newer_version_is_staged() {
    let device = Device::provisioned(Some("1.0"));
    let payload = payload();
    let server = FakeServer::new()
        .serve("latest", manifest_for("1.1", &payload))
        .serve("fw.tar.gz", payload.clone());
    let mut updater = device.updater(server, 1024);

    let outcome = updater.check(&CheckOptions::default()).unwrap();
    assert_eq!(
        outcome,
        CheckOutcome::Staged {
            version: "1.1".to_owned(),
            artifact: device.artifact(),
            bytes: payload.len() as u64,
        }
    );
    assert_eq!(std::fs::read(device.artifact()).unwrap(), payload);
    assert_eq!(updater.phase(), UpdatePhase::Staged);
}

#[test]
fn equal_version_fetches_only_the_manifest() {
    let device = Device::provisioned(Some("1.0"));
    let server = FakeServer::new()
        .serve("latest", "1.0;fw.tar.gz;0;;")
        .serve("fw.tar.gz", payload());
    let log = server.request_log();
    let mut updater = device.updater(server, 1024);

    assert!(!updater.check_for_update(true, false, b"").unwrap());
    assert_eq!(*log.borrow(), vec![format!("{SERVER}/latest")]);
    assert!(!device.artifact().exists());
    assert_eq!(updater.phase(), UpdatePhase::NoUpdate);
}

#[test]
fn older_remote_version_is_ignored() {
    let device = Device::provisioned(Some("2.0"));
    let server = FakeServer::new().serve("latest", "1.9;fw.tar.gz;");
    let mut updater = device.updater(server, 1024);

    assert_eq!(
        updater.check(&CheckOptions::default()).unwrap(),
        CheckOutcome::NoUpdate
    );
}

#[test]
fn version_comparison_is_lexicographic() {
    // "10" sorts before "9": not an update.
    let device = Device::provisioned(Some("9"));
    let server = FakeServer::new().serve("latest", "10;fw.tar.gz;");
    let mut updater = device.updater(server, 1024);

    assert!(!updater.check_for_update(true, true, b"").unwrap());
}

#[test]
fn base_url_without_separator_is_normalized() {
    let device = Device::provisioned(Some("1.0"));
    let server = FakeServer::new().serve("latest", "1.0;fw.tar.gz;");
    let log = server.request_log();
    let mut updater = device.updater(server, 1024);

    updater.check(&CheckOptions::default()).unwrap();
    assert!(log.borrow()[0].ends_with("/fw/latest"));
}

#[test]
fn hash_mismatch_leaves_no_artifact() {
    let device = Device::provisioned(Some("1.0"));
    let server = FakeServer::new()
        .serve("latest", manifest_for("1.1", b"what the server meant to send"))
        .serve("fw.tar.gz", payload());
    let mut updater = device.updater(server, 1024);

    assert_eq!(
        updater.check(&CheckOptions::default()).unwrap(),
        CheckOutcome::Failed(CheckFailure::IntegrityMismatch)
    );
    assert!(!device.artifact().exists());
    assert_eq!(updater.phase(), UpdatePhase::CheckFailed);
}

#[test]
fn upper_case_published_hash_does_not_match() {
    let device = Device::provisioned(Some("1.0"));
    let payload = payload();
    let manifest = format!("1.1;fw.tar.gz;0;{};", sha256_hex(&payload).to_uppercase());
    let server = FakeServer::new()
        .serve("latest", manifest)
        .serve("fw.tar.gz", payload);
    let mut updater = device.updater(server, 1024);

    assert!(!updater.check_for_update(true, true, b"").unwrap());
}

#[test]
fn missing_hash_accepts_unverified_download() {
    let device = Device::provisioned(Some("1.0"));
    let server = FakeServer::new()
        .serve("latest", "1.1;fw.tar.gz;")
        .serve("fw.tar.gz", b"anything at all".to_vec());
    let mut updater = device.updater(server, 1024);

    assert!(updater.check_for_update(true, false, b"").unwrap());
    assert!(device.artifact().exists());
}

#[test]
fn insufficient_space_downloads_nothing() {
    let device = Device::provisioned(Some("1.0"));
    let server = FakeServer::new()
        .serve("latest", "1.1;fw.tar.gz;500;")
        .serve("fw.tar.gz", payload());
    let log = server.request_log();
    let mut updater = device.updater(server, 499);

    assert_eq!(
        updater.check(&CheckOptions::default()).unwrap(),
        CheckOutcome::Failed(CheckFailure::InsufficientSpace)
    );
    assert_eq!(log.borrow().len(), 1);
    assert!(!device.artifact().exists());
}

#[test]
fn exact_free_space_is_enough() {
    let device = Device::provisioned(Some("1.0"));
    let server = FakeServer::new()
        .serve("latest", "1.1;fw.tar.gz;500;")
        .serve("fw.tar.gz", payload());
    let mut updater = device.updater(server, 500);

    assert!(updater.check_for_update(true, true, b"").unwrap());
}

#[test]
fn non_numeric_space_requirement_fails_check() {
    let device = Device::provisioned(Some("1.0"));
    let server = FakeServer::new()
        .serve("latest", "1.1;fw.tar.gz;lots;")
        .serve("fw.tar.gz", payload());
    let mut updater = device.updater(server, u64::MAX / 2048);

    assert_eq!(
        updater.check(&CheckOptions::default()).unwrap(),
        CheckOutcome::Failed(CheckFailure::InsufficientSpace)
    );
}

#[test]
fn negative_space_requirement_is_always_met() {
    let device = Device::provisioned(Some("1.0"));
    let server = FakeServer::new()
        .serve("latest", "1.1;fw.tar.gz;-5;")
        .serve("fw.tar.gz", payload());
    let mut updater = device.updater(server, 0);

    assert!(updater.check_for_update(true, true, b"").unwrap());
}

#[test]
fn matching_pin_allows_download() {
    let device = Device::provisioned(Some("1.0"));
    let server = FakeServer::new()
        .with_certificate(b"server-certificate")
        .serve("latest", "1.1;fw.tar.gz;")
        .serve("fw.tar.gz", payload());
    let mut updater = device.updater(server, 1024);
    let pin = Sha256::digest(b"server-certificate").to_vec();

    assert!(updater.check_for_update(true, true, &pin).unwrap());
}

#[test]
fn pin_mismatch_aborts_before_download() {
    let device = Device::provisioned(Some("1.0"));
    let server = FakeServer::new()
        .with_certificate(b"impostor-certificate")
        .serve("latest", "1.1;fw.tar.gz;")
        .serve("fw.tar.gz", payload());
    let log = server.request_log();
    let mut updater = device.updater(server, 1024);
    let pin = Sha256::digest(b"server-certificate").to_vec();

    let options = CheckOptions {
        pinned_key_hash: pin,
        ..CheckOptions::default()
    };
    assert_eq!(
        updater.check(&options).unwrap(),
        CheckOutcome::Failed(CheckFailure::IdentityMismatch)
    );
    assert_eq!(*log.borrow(), vec![format!("{SERVER}/latest")]);
    assert!(!device.artifact().exists());
}

#[test]
fn pin_without_observed_certificate_fails_closed() {
    let device = Device::provisioned(Some("1.0"));
    let server = FakeServer::new()
        .serve("latest", "1.1;fw.tar.gz;")
        .serve("fw.tar.gz", payload());
    let mut updater = device.updater(server, 1024);

    assert!(!updater.check_for_update(true, true, b"some-pin").unwrap());
}

#[test]
fn pinning_unavailable_degrades_to_unpinned() {
    let device = Device::provisioned(Some("1.0"));
    let server = FakeServer::new()
        .with_certificate(b"impostor-certificate")
        .serve("latest", "1.1;fw.tar.gz;")
        .serve("fw.tar.gz", payload());
    let mut updater = device.updater(server, 1024).with_pinning(NoPinning);

    assert!(updater.check_for_update(true, true, b"some-pin").unwrap());
}

#[test]
fn missing_config_fails_without_network() {
    let device = Device::new();
    let server = FakeServer::new();
    let log = server.request_log();
    let mut updater = device.updater(server, 1024);

    assert_eq!(
        updater.check(&CheckOptions::default()).unwrap(),
        CheckOutcome::Failed(CheckFailure::ConfigurationUnavailable)
    );
    assert!(log.borrow().is_empty());
}

#[test]
fn missing_firmware_resource_is_a_network_error() {
    let device = Device::provisioned(Some("1.0"));
    let server = FakeServer::new().serve("latest", "1.1;fw.tar.gz;");
    let mut updater = device.updater(server, 1024);

    let err = updater.check(&CheckOptions::default()).unwrap_err();
    assert!(matches!(err, UpdateError::Network(_)));
    assert!(!device.artifact().exists());
}

#[test]
fn missing_local_version_policy() {
    let device = Device::provisioned(None);
    let server = FakeServer::new()
        .serve("latest", "1.1;fw.tar.gz;")
        .serve("fw.tar.gz", payload());
    let mut updater = device.updater(server, 1024);

    assert_eq!(
        updater.check(&CheckOptions::default()).unwrap(),
        CheckOutcome::Failed(CheckFailure::MissingLocalVersion)
    );
    assert!(updater.check_for_update(false, true, b"").unwrap());
}
