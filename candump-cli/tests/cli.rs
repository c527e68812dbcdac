use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const DBC: &str = r#"VERSION ""

NS_ :
    CM_
    BA_DEF_
    BA_
    VAL_
    BA_DEF_DEF_

BS_:

BU_: PCM1 ECU2

BO_ 496 ExampleMessage: 8 PCM1
 SG_ Temperature : 55|16@0+ (1,0) [0|65535] "degK" ECU2

BO_ 291 EngineData: 8 PCM1
 SG_ EngineSpeed : 0|16@1+ (1,0) [0|16000] "rpm" ECU2
 SG_ Gear : 24|8@1+ (1,0) [0|3] "" ECU2

VAL_ 291 Gear 0 "Park" 1 "Reverse" 2 "Neutral" 3 "Drive" ;
"#;

fn candump_decode() -> Command {
    Command::cargo_bin("candump-decode").unwrap()
}

fn dbc_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(DBC.as_bytes()).unwrap();
    file
}

#[test]
fn test_help_flag() {
    candump_decode()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--frame-id-mask"))
        .stdout(predicate::str::contains("--csv"));
}

#[test]
fn test_missing_database_fails() {
    candump_decode()
        .arg("/nonexistent/powertrain.dbc")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load database"));
}

#[test]
fn test_decode_single_line() {
    let dbc = dbc_file();
    candump_decode()
        .arg("-s")
        .arg(dbc.path())
        .write_stdin("vcan0  1F0   [8]  00 00 00 00 00 00 1B C1\n")
        .assert()
        .success()
        .stdout(
            "vcan0  1F0   [8]  00 00 00 00 00 00 1B C1 :: ExampleMessage(Temperature: 7105 degK)\n",
        );
}

#[test]
fn test_unknown_lines_pass_through() {
    let dbc = dbc_file();
    candump_decode()
        .args(["-q", "-s", "-c"])
        .arg(dbc.path())
        .write_stdin("Interface up\nvcan0  123   [8]  10 27 00 03 00 00 00 00\nvcan0  7FF   [1]  00\n")
        .assert()
        .success()
        .stdout(
            "Interface up\n\
             vcan0  123   [8]  10 27 00 03 00 00 00 00 :: EngineData(EngineSpeed: 10000 rpm, Gear: 3)\n\
             vcan0  7FF   [1]  00\n",
        );
}

#[test]
fn test_csv_output() {
    let dbc = dbc_file();
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("decoded.csv");

    candump_decode()
        .arg("--csv")
        .arg(&csv_path)
        .args(["--start", "1"])
        .arg(dbc.path())
        .write_stdin(
            "(1.0) vcan0 123#1027000300000000\n\
             (2.0) vcan0 123#E803000100000000\n",
        )
        .assert()
        .success()
        .stdout("")
        .stderr(predicate::str::contains("Finished. Decoded 1 messages."));

    let written = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(written, "Timestamp,EngineSpeed,Gear\n2.0,1000,Reverse\n");
}

#[test]
fn test_config_file_and_flag_override() {
    let dbc = dbc_file();
    let mut config = NamedTempFile::new().unwrap();
    writeln!(
        config,
        "database = {:?}\nsingle_line = true\nend_at = 5",
        dbc.path().to_str().unwrap()
    )
    .unwrap();

    candump_decode()
        .arg("--config")
        .arg(config.path())
        .args(["--end", "1"])
        .write_stdin("vcan0  1F0   [8]  00 00 00 00 00 00 00 01\nvcan0  1F0   [8]  00 00 00 00 00 00 00 02\n")
        .assert()
        .success()
        .stdout("vcan0  1F0   [8]  00 00 00 00 00 00 00 01 :: ExampleMessage(Temperature: 1 degK)\n");
}
