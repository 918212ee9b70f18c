use std::process::Command;

fn enhance_file() -> Command {
    Command::new(env!("CARGO_BIN_EXE_enhance_file"))
}

fn enhance_mic() -> Command {
    Command::new(env!("CARGO_BIN_EXE_enhance_mic"))
}

#[test]
fn missing_required_flags_exit_with_one() {
    let output = enhance_file().output().expect("run enhance_file");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--library_path"), "stderr: {stderr}");

    let output = enhance_mic().output().expect("run enhance_mic");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn help_exits_successfully() {
    let output = enhance_file().arg("--help").output().expect("run enhance_file");
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--input_path"));
}

#[test]
fn unloadable_library_exits_with_one() {
    let dir = tempfile::tempdir().expect("tempdir");
    let library = dir.path().join("libmissing_engine.so");
    let output = enhance_file()
        .args([
            "--library_path",
            library.to_str().unwrap(),
            "--access_key",
            "key",
            "--input_path",
            dir.path().join("in.wav").to_str().unwrap(),
            "--output_path",
            dir.path().join("out.wav").to_str().unwrap(),
        ])
        .output()
        .expect("run enhance_file");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to open library"), "stderr: {stderr}");
}

#[test]
fn same_input_and_output_is_rejected() {
    let output = enhance_file()
        .args([
            "--library_path",
            "/nonexistent/libengine.so",
            "--access_key",
            "key",
            "--input_path",
            "audio.wav",
            "--output_path",
            "audio.wav",
        ])
        .output()
        .expect("run enhance_file");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("different files"), "stderr: {stderr}");
}

#[test]
fn capture_output_must_be_wav() {
    let output = enhance_mic()
        .args([
            "--library_path",
            "/nonexistent/libengine.so",
            "--access_key",
            "key",
            "--model_path",
            "model.pv",
            "--output_audio_path",
            "out.raw",
        ])
        .output()
        .expect("run enhance_mic");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(".wav"), "stderr: {stderr}");
}

#[test]
fn inference_listing_needs_library_path() {
    let output = enhance_mic()
        .arg("--show_inference_devices")
        .output()
        .expect("run enhance_mic");
    assert_eq!(output.status.code(), Some(1));
}
