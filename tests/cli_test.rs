use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*; // Assertions on command output
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

fn round_trip_test(data: &[u8],method: &str,extra: &[&str]) -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("original");
    let comp_path = temp_dir.path().join("compressed");
    let out_path = temp_dir.path().join("expanded");
    std::fs::write(&in_path,data)?;
    let mut cmd = Command::cargo_bin("huffpress")?;
    cmd.arg("compress")
        .arg("-m").arg(method)
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&comp_path);
    for arg in extra {
        cmd.arg(arg);
    }
    cmd.assert().success();
    let mut cmd = Command::cargo_bin("huffpress")?;
    cmd.arg("expand")
        .arg("-m").arg(method)
        .arg("-i").arg(&comp_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success();
    match (std::fs::read(&in_path),std::fs::read(&out_path)) {
        (Ok(v1),Ok(v2)) => {
            assert_eq!(v1,v2);
        },
        _ => panic!("unable to compare output with original")
    }
    Ok(())
}

/// deterministic bytes with a skew toward a small set of values
fn sample(len: usize) -> Vec<u8> {
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    (0..len).map(|i| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        match state % 3 {
            0 => b'a' + (i % 13) as u8,
            _ => (state >> 32) as u8
        }
    }).collect()
}

#[test]
fn static_round_trip() -> STDRESULT {
    round_trip_test(b"","static",&[])?;
    round_trip_test("I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes(),"static",&[])?;
    round_trip_test(&sample(40_000),"static",&[])
}

#[test]
fn static_round_trip_wide() -> STDRESULT {
    round_trip_test(&sample(40_001),"static",&["-b","2"])?;
    round_trip_test(&sample(39_999),"static",&["-b","3"])
}

#[test]
fn adaptive_round_trip() -> STDRESULT {
    round_trip_test(b"","adaptive",&[])?;
    round_trip_test("I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes(),"adaptive",&[])?;
    round_trip_test(&sample(40_000),"adaptive",&[])
}

#[test]
fn adaptive_round_trip_wide() -> STDRESULT {
    round_trip_test(&sample(40_001),"adaptive",&["-b","2"])?;
    round_trip_test(&sample(39_998),"adaptive",&["-b","4"])
}

#[test]
fn periodic_round_trip() -> STDRESULT {
    round_trip_test(b"","periodic",&[])?;
    round_trip_test(&sample(40_000),"periodic",&[])?;
    round_trip_test(&sample(40_001),"periodic",&["-b","2","-p","14"])
}

#[test]
fn adaptive_round_trip_shrink() -> STDRESULT {
    round_trip_test(&sample(1_200_000),"adaptive",&["-k","1"])?;
    round_trip_test(&sample(1_300_000),"adaptive",&["-k","1","-a","3"])
}

#[test]
fn unknown_method_is_refused() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("original");
    std::fs::write(&in_path,b"data")?;
    let mut cmd = Command::cargo_bin("huffpress")?;
    cmd.arg("expand")
        .arg("-m").arg("lzw")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(temp_dir.path().join("expanded"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("not supported"));
    Ok(())
}
