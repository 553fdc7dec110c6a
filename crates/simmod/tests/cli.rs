use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const GOOD_MANIFEST: &str = "\
name: sage_cooling
version: 1.2.0
type: cooling
library: libsage_cooling.so
dependency.0: sage_infall: 1.0.0
";

#[test]
fn test_version_compare() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("simmod")?
        .args(["version", "compare", "1.2.0", "1.10.0"])
        .assert()
        .success()
        .stdout(predicate::str::diff("less\n"));

    Command::cargo_bin("simmod")?
        .args(["version", "compare", "2.0", "2.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("equal"));

    Ok(())
}

#[test]
fn test_version_check_exit_codes() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("simmod")?
        .args(["version", "check", "1.5.0", "--min", "1.0.0", "--max", "2.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("compatible"));

    Command::cargo_bin("simmod")?
        .args(["version", "check", "1.5.0", "--min", "1.0.0", "--exact"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("incompatible"));

    Ok(())
}

#[test]
fn test_version_parse_failure() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("simmod")?
        .args(["version", "compare", "one", "1.0.0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("simmod:"));
    Ok(())
}

#[test]
fn test_validate_manifests() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let good = dir.path().join("sage_cooling.manifest");
    fs::write(&good, GOOD_MANIFEST)?;

    Command::cargo_bin("simmod")?
        .arg("validate")
        .arg(&good)
        .assert()
        .success()
        .stdout(predicate::str::contains("ok (0 errors, 0 warnings)"));

    let bad = dir.path().join("broken.manifest");
    fs::write(&bad, "name: broken\nversion: abc\ntype: cooling\nlibrary: libbroken.so\n")?;

    Command::cargo_bin("simmod")?
        .arg("validate")
        .arg(&good)
        .arg(&bad)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAILED"))
        .stdout(predicate::str::contains("manifest version 'abc' is invalid"));

    Ok(())
}

#[test]
fn test_validate_strict_promotes_warnings() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("sage_sf.manifest");
    fs::write(
        &path,
        "name: sage_sf\nversion: 1.0.0\ntype: star_formation\nlibrary: libsage_sf.so\n\
         dependency.0: cooling: 1.0.0\n",
    )?;

    Command::cargo_bin("simmod")?
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[warning]"));

    Command::cargo_bin("simmod")?
        .args(["validate", "--strict"])
        .arg(&path)
        .assert()
        .code(1);

    Ok(())
}

#[test]
fn test_validate_unparseable_manifest() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("garbage.manifest");
    fs::write(&path, "this line has no separator\n")?;

    Command::cargo_bin("simmod")?
        .arg("validate")
        .arg(&path)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("error: "));
    Ok(())
}

#[test]
fn test_load_empty_directory() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    Command::cargo_bin("simmod")?
        .arg("load")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("0 modules registered"));
    Ok(())
}

#[test]
fn test_load_reports_missing_library() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("sage_cooling.manifest"), GOOD_MANIFEST)?;

    let config = dir.path().join("registry.json");
    fs::write(&config, r#"{ "max_modules": 4 }"#)?;

    Command::cargo_bin("simmod")?
        .arg("load")
        .arg(dir.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("failed: "))
        .stdout(predicate::str::contains("sage_cooling.manifest"));
    Ok(())
}

#[test]
fn test_missing_subcommand_is_usage_error() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("simmod")?
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
    Ok(())
}
