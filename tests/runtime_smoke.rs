use std::process::Command;

fn merl() -> Command {
    Command::new(env!("CARGO_BIN_EXE_merl"))
}

#[test]
fn demo_program_computes_norm_through_method_dispatch() {
    let out = merl().output().expect("failed to run merl");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("norm Point(3, 4)"), "got: {}", stdout);
    assert_eq!(stdout.lines().last().map(str::trim), Some("5"));
}

#[test]
fn dump_shape_emits_the_definition_image_as_json() {
    let out = merl().arg("--dump-shape").output().expect("failed to run merl");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    let image: serde_json::Value = serde_json::from_str(&stdout).expect("not valid JSON");
    assert_eq!(image["prop_capacity"], 4);
    assert_eq!(image["method_capacity"], 2);
    assert_eq!(image["props"].as_array().map(Vec::len), Some(4));
    // Symbols x=1, y=2 occupy the table; norm=3 sits in the method table.
    let occupied: Vec<u64> = image["props"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["symbol"].as_u64().unwrap())
        .filter(|&s| s != 0)
        .collect();
    assert_eq!(occupied.len(), 2);
}

#[test]
fn unknown_argument_shows_usage() {
    let out = merl().arg("--bogus").output().expect("failed to run merl");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Usage"), "expected usage message, got: {}", stderr);
}
