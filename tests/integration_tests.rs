use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;

#[test]
fn runs_without_arguments() {
    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.assert().success().stdout(contains("sim80"));
}

#[test]
fn runs_add_program() {
    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.arg("run").arg("tests/files/add.asm").arg("--minimal");

    cmd.assert()
        .success()
        .stdout(contains("A 7\nB 7\nC 0\n"))
        .stdout(contains("PC 0x0806\nSP 0x0bb0\n"))
        .stdout(contains("FLAGS s=0 z=0 ac=0 p=0 c=0\n"))
        .stdout(contains("STACK\n"))
        .stdout(contains("Completed"));
}

#[test]
fn path_alone_runs_program() {
    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.arg("tests/files/add.asm");
    cmd.assert().success().stdout(contains("Completed"));
}

#[test]
fn runs_subroutine_and_stack() {
    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.arg("run").arg("tests/files/call.asm").arg("--minimal");

    cmd.assert()
        .success()
        .stdout(contains("A 42\n"))
        .stdout(contains("H 9\nL 0\n"))
        .stdout(contains("SP 0x0bae\n"))
        .stdout(contains("STACK 02 2a\n"));
}

#[test]
fn runs_loop_with_forward_label() {
    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.arg("run").arg("tests/files/loop.asm").arg("--minimal");

    cmd.assert()
        .success()
        .stdout(contains("A 42\nB 0\n"))
        .stdout(contains("FLAGS s=0 z=1 ac=0 p=1 c=0\n"));
}

#[test]
fn traces_to_stderr() {
    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.arg("run")
        .arg("tests/files/add.asm")
        .arg("--minimal")
        .arg("--trace");

    cmd.assert()
        .success()
        .stderr(contains("0x0800  3e 03     mvi a, 0x03\n"))
        .stderr(contains("0x0802  c6 04     adi 0x04\n"))
        .stderr(contains("0x0805  76        hlt\n"));
}

#[test]
fn trace_from_environment() {
    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.env("SIM80_TRACE", "1")
        .arg("run")
        .arg("tests/files/add.asm")
        .arg("--minimal");

    cmd.assert().success().stderr(contains("mov b, a"));
}

#[test]
fn stops_at_step_limit() {
    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.arg("run")
        .arg("tests/files/forever.asm")
        .arg("--minimal")
        .arg("--steps")
        .arg("50");
    cmd.assert()
        .failure()
        .stderr(contains("did not halt within 50 steps"));

    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.env("SIM80_STEP_LIMIT", "20")
        .arg("run")
        .arg("tests/files/forever.asm")
        .arg("--minimal");
    cmd.assert()
        .failure()
        .stderr(contains("did not halt within 20 steps"));

    // Flag wins over the environment
    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.env("SIM80_STEP_LIMIT", "20")
        .arg("run")
        .arg("tests/files/forever.asm")
        .arg("--steps")
        .arg("30");
    cmd.assert()
        .failure()
        .stderr(contains("did not halt within 30 steps"));
}

#[test]
fn check_reports_every_failing_line() {
    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.arg("check").arg("tests/files/errors.asm");

    cmd.assert()
        .failure()
        .stderr(contains("unknown instruction 'foo'"))
        .stderr(contains("label 'nowhere' is never defined"))
        .stderr(contains("Aborting due to 2 assembly errors"));
}

#[test]
fn check_accepts_valid_file() {
    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.arg("check").arg("tests/files/loop.asm");
    cmd.assert().success().stdout(contains("no errors found!"));
}

#[test]
fn run_refuses_file_with_errors() {
    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.arg("run").arg("tests/files/errors.asm").arg("--minimal");
    cmd.assert()
        .failure()
        .stdout(contains("Running").not())
        .stderr(contains("unknown instruction 'foo'"));
}

#[test]
fn dumps_listing() {
    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.arg("dump").arg("tests/files/loop.asm");

    cmd.assert()
        .success()
        .stdout(contains("0x0800  06 07     mvi b, 0x07"))
        .stdout(contains("0x0807  ca 0d 08  jz 0x080d"))
        .stdout(contains("0x080a  c3 04 08  jmp 0x0804"))
        .stdout(contains("0x080d  76        hlt"))
        .stdout(contains("labels\x1b[0m (2)"))
        .stdout(contains("  loop          0x0804\n  done          0x080d\n"));
}

#[test]
fn compiles_and_runs_binary() {
    let dest = std::env::temp_dir().join("sim80_compiles_and_runs_binary.bin");

    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.arg("compile").arg("tests/files/add.asm").arg(&dest);
    cmd.assert().success().stdout(contains("Saved"));

    let image = fs::read(&dest).unwrap();
    assert_eq!(image.len(), 0x03B0);
    assert_eq!(&image[..6], &[0x3E, 0x03, 0xC6, 0x04, 0x47, 0x76]);

    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.arg("run").arg(&dest).arg("--minimal");
    cmd.assert().success().stdout(contains("A 7\nB 7\n"));

    let _ = fs::remove_file(&dest);
}

#[test]
fn reports_unknown_opcode() {
    let path = std::env::temp_dir().join("sim80_reports_unknown_opcode.bin");
    // `mvi a, 5` followed by an I/O opcode
    fs::write(&path, [0x3E, 0x05, 0xDB]).unwrap();

    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.arg("run").arg(&path).arg("--minimal");
    cmd.assert()
        .failure()
        .stdout(contains("A 5\n"))
        .stdout(contains("PC 0x0802\n"))
        .stderr(contains("unrecognized opcode 0xdb at offset 0x0002"));

    let _ = fs::remove_file(&path);
}

#[test]
fn rejects_oversized_binary() {
    let path = std::env::temp_dir().join("sim80_rejects_oversized_binary.bin");
    fs::write(&path, vec![0u8; 0x03B1]).unwrap();

    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.arg("run").arg(&path);
    cmd.assert().failure().stderr(contains("larger than"));

    let _ = fs::remove_file(&path);
}

#[test]
fn rejects_unknown_extension() {
    let mut cmd = Command::cargo_bin("sim80").unwrap();
    cmd.arg("run").arg("tests/files/program.txt");
    cmd.assert()
        .failure()
        .stderr(contains("unknown extension"));
}
