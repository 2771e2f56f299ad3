//! Install: extraction, exclusions, path safety, and post-install cleanup.

use crate::helpers::{Device, Entry, FakeServer, default_config, firmware};
use uota::{InstallOutcome, UpdateError, UpdatePhase};

fn stage(device: &Device, payload: &[u8]) {
    std::fs::write(device.artifact(), payload).unwrap();
}

#[test]
fn nothing_staged_leaves_device_untouched() {
    let device = Device::provisioned(Some("1.0"));
    let mut updater = device.updater(FakeServer::new(), 1024);

    assert_eq!(updater.install(false).unwrap(), InstallOutcome::NothingStaged);
    assert_eq!(updater.phase(), UpdatePhase::Idle);
    assert_eq!(std::fs::read(device.path("version")).unwrap(), b"1.0");
}

#[test]
fn extracts_files_and_directories() {
    let device = Device::provisioned(Some("1.0"));
    stage(
        &device,
        &firmware(&[
            Entry::File("version", b"1.1"),
            Entry::Dir("lib/"),
            Entry::Dir("lib/drivers/"),
            Entry::File("lib/drivers/led.py", b"LED = 2\n"),
            Entry::File("main.py", b"import lib\n"),
        ]),
    );
    let mut updater = device.updater(FakeServer::new(), 1024);

    let InstallOutcome::Installed(report) = updater.install(true).unwrap() else {
        panic!("expected an installation");
    };
    assert_eq!(report.files_written, 3);
    assert_eq!(report.directories_created, 2);
    assert_eq!(std::fs::read(device.path("version")).unwrap(), b"1.1");
    assert_eq!(
        std::fs::read(device.path("lib/drivers/led.py")).unwrap(),
        b"LED = 2\n"
    );
    assert!(!device.artifact().exists());
    assert_eq!(updater.phase(), UpdatePhase::Installed);
}

#[test]
fn existing_directories_are_reused() {
    let device = Device::provisioned(Some("1.0"));
    device.write("lib/keep.py", b"kept");
    stage(
        &device,
        &firmware(&[Entry::Dir("lib/"), Entry::File("lib/new.py", b"new")]),
    );
    let mut updater = device.updater(FakeServer::new(), 1024);

    let InstallOutcome::Installed(report) = updater.install(true).unwrap() else {
        panic!("expected an installation");
    };
    assert_eq!(report.directories_existing, 1);
    assert_eq!(std::fs::read(device.path("lib/keep.py")).unwrap(), b"kept");
    assert_eq!(std::fs::read(device.path("lib/new.py")).unwrap(), b"new");
}

#[test]
fn excluded_entries_are_not_written() {
    let device = Device::provisioned(Some("1.0"));
    let mut config = default_config();
    config.excluded_files.insert("secrets.py".to_owned());
    config.excluded_files.insert("data/".to_owned());
    device.write_config(&config);
    device.write("secrets.py", b"WIFI = 'home'");
    stage(
        &device,
        &firmware(&[
            Entry::File("uota.toml", b"url = 'https://attacker.test/'\n"),
            Entry::File("secrets.py", b"WIFI = 'factory'"),
            Entry::Dir("data/"),
            Entry::File("boot.py", b"# boot\n"),
        ]),
    );
    let mut updater = device.updater(FakeServer::new(), 1024);

    let InstallOutcome::Installed(report) = updater.install(true).unwrap() else {
        panic!("expected an installation");
    };
    assert_eq!(report.skipped, vec!["uota.toml", "secrets.py", "data/"]);
    assert_eq!(
        std::fs::read(device.path("secrets.py")).unwrap(),
        b"WIFI = 'home'"
    );
    assert!(!device.path("data").exists());
    assert!(device.path("boot.py").exists());
    assert_eq!(uota::OtaConfig::from_file(&device.path("uota.toml")).unwrap(), config);
}

#[test]
fn exclusion_requires_exact_name() {
    let device = Device::provisioned(Some("1.0"));
    let mut config = default_config();
    config.excluded_files.insert("lib".to_owned());
    device.write_config(&config);
    stage(&device, &firmware(&[Entry::Dir("lib/")]));
    let mut updater = device.updater(FakeServer::new(), 1024);

    updater.install(true).unwrap();
    assert!(device.path("lib").is_dir());
}

#[test]
fn parent_traversal_aborts_and_removes_artifact() {
    let device = Device::provisioned(Some("1.0"));
    stage(
        &device,
        &firmware(&[
            Entry::File("main.py", b"ok"),
            Entry::File("../escaped.py", b"nope"),
        ]),
    );
    let mut updater = device.updater(FakeServer::new(), 1024);

    let err = updater.install(true).unwrap_err();
    assert!(matches!(err, UpdateError::Archive(_)));
    assert!(device.path("main.py").exists());
    assert!(!device.root.parent().unwrap().join("escaped.py").exists());
    assert!(!device.artifact().exists());
    assert_eq!(updater.phase(), UpdatePhase::InstallFailed);
}

#[test]
fn missing_parent_directory_fails() {
    let device = Device::provisioned(Some("1.0"));
    stage(&device, &firmware(&[Entry::File("nested/file.py", b"x")]));
    let mut updater = device.updater(FakeServer::new(), 1024);

    let err = updater.install(true).unwrap_err();
    assert!(matches!(err, UpdateError::Io(_)));
    assert!(!device.artifact().exists());
}

#[test]
fn obsolete_paths_are_deleted_after_install() {
    let device = Device::provisioned(Some("1.0"));
    let mut config = default_config();
    config.delete = vec!["old/".to_owned(), "legacy.py".to_owned(), "gone.py".to_owned()];
    device.write_config(&config);
    device.write("old/nested/deep.py", b"x");
    device.write("old/top.py", b"x");
    device.write("legacy.py", b"x");
    stage(&device, &firmware(&[Entry::File("main.py", b"new")]));
    let mut updater = device.updater(FakeServer::new(), 1024);

    updater.install(true).unwrap();
    assert!(!device.path("old").exists());
    assert!(!device.path("legacy.py").exists());
    assert!(device.path("main.py").exists());
}

#[test]
fn delete_list_shipped_in_the_new_build_applies_immediately() {
    let device = Device::provisioned(Some("1.0"));
    device.write("obsolete.py", b"x");
    let mut shipped = default_config();
    shipped.delete = vec!["obsolete.py".to_owned()];
    let shipped_toml = toml::to_string(&shipped).unwrap();

    let mut config = default_config();
    config.excluded_files.clear();
    device.write_config(&config);
    stage(
        &device,
        &firmware(&[Entry::File("uota.toml", shipped_toml.as_bytes())]),
    );
    let mut updater = device.updater(FakeServer::new(), 1024);

    updater.install(true).unwrap();
    assert!(!device.path("obsolete.py").exists());
}

#[test]
fn root_entry_in_delete_list_is_refused() {
    let device = Device::provisioned(Some("1.0"));
    let mut config = default_config();
    config.delete = vec!["/".to_owned()];
    device.write_config(&config);
    stage(&device, &firmware(&[Entry::File("main.py", b"new")]));
    let mut updater = device.updater(FakeServer::new(), 1024);

    updater.install(true).unwrap();
    assert!(device.path("main.py").exists());
    assert!(device.path("uota.toml").exists());
}
