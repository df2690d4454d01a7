#![cfg(feature = "cli")]

use std::net::UdpSocket;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "ed247cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn write_config(tag: &str, config: &Value) -> PathBuf {
    let path = unique_temp_dir(tag).join("component.json");
    std::fs::write(&path, config.to_string()).expect("config should be writable");
    path
}

fn free_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0")
        .and_then(|socket| socket.local_addr())
        .expect("ephemeral port should be available")
        .port()
}

fn label_config(direction: &str, link: Value) -> Value {
    json!({
        "name": "Probe",
        "identifier": 7,
        "channels": [{
            "name": "Labels",
            "link": link,
            "streams": [{
                "name": "Label",
                "uid": 42,
                "kind": "A429",
                "direction": direction,
                "sample_max_size": 4,
                "sample_max_number": 2,
            }],
        }],
    })
}

fn ed247() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ed247"));
    cmd.arg("--log-level").arg("error").arg("--format").arg("json");
    cmd
}

#[test]
fn info_prints_topology_as_json() {
    let path = write_config("info", &label_config("out", json!({ "remote": "127.0.0.1:9" })));

    let output = ed247()
        .arg("info")
        .arg(&path)
        .output()
        .expect("info should run");

    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let out: Value = serde_json::from_slice(&output.stdout).expect("info output should be JSON");
    assert_eq!(out["component"], "Probe");
    assert_eq!(out["identifier"], 7);
    assert_eq!(out["channels"][0]["streams"][0]["uid"], 42);
    assert_eq!(out["channels"][0]["streams"][0]["kind"], "A429");
    assert_eq!(out["channels"][0]["streams"][0]["direction"], "out");
}

#[test]
fn invalid_topology_exits_with_data_invalid() {
    let mut config = label_config("out", json!({ "remote": "127.0.0.1:9" }));
    let stream = config["channels"][0]["streams"][0].clone();
    config["channels"][0]["streams"]
        .as_array_mut()
        .expect("streams should be an array")
        .push(stream);
    let path = write_config("dup", &config);

    let output = ed247().arg("info").arg(&path).output().expect("info should run");

    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

#[test]
fn missing_config_exits_with_failure() {
    let path = unique_temp_dir("missing").join("absent.json");
    let output = ed247().arg("info").arg(&path).output().expect("info should run");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn send_emits_one_frame_per_sample() {
    let sink = UdpSocket::bind("127.0.0.1:0").expect("sink should bind");
    sink.set_read_timeout(Some(Duration::from_secs(5)))
        .expect("timeout should be settable");
    let remote = sink.local_addr().expect("sink address");
    let path = write_config("send", &label_config("out", json!({ "remote": remote })));

    let output = ed247()
        .arg("send")
        .arg(&path)
        .arg("--stream")
        .arg("Label")
        .arg("--hex")
        .arg("deadbeef")
        .arg("--count")
        .arg("2")
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let out: Value = serde_json::from_slice(&output.stdout).expect("send output should be JSON");
    assert_eq!(out["samples"], 2);
    assert_eq!(out["frames"], 2);

    let mut buf = [0u8; 64];
    for expected_seq in 0u16..2 {
        let len = sink.recv(&mut buf).expect("frame should arrive");
        assert_eq!(len, 20);
        assert_eq!(&buf[0..2], &7u16.to_be_bytes());
        assert_eq!(&buf[2..4], &expected_seq.to_be_bytes());
        assert_eq!(&buf[12..14], &42u16.to_be_bytes());
        assert_eq!(&buf[14..16], &4u16.to_be_bytes());
        assert_eq!(&buf[16..20], &[0xde, 0xad, 0xbe, 0xef]);
    }
}

#[test]
fn send_rejects_wrong_sample_size() {
    let path = write_config("short", &label_config("out", json!({ "remote": "127.0.0.1:9" })));
    let output = ed247()
        .arg("send")
        .arg(&path)
        .arg("--stream")
        .arg("Label")
        .arg("--hex")
        .arg("dead")
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn listen_prints_received_sample() {
    let port = free_port();
    let local = format!("127.0.0.1:{port}");
    let path = write_config("listen", &label_config("in", json!({ "local": local })));

    let mut child = ed247()
        .arg("listen")
        .arg(&path)
        .arg("--count")
        .arg("1")
        .arg("--timeout")
        .arg("10s")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("listen should start");

    let mut frame = Vec::new();
    frame.extend_from_slice(&3u16.to_be_bytes());
    frame.extend_from_slice(&5u16.to_be_bytes());
    frame.extend_from_slice(&[0; 8]);
    frame.extend_from_slice(&42u16.to_be_bytes());
    frame.extend_from_slice(&4u16.to_be_bytes());
    frame.extend_from_slice(&[1, 2, 3, 4]);

    let sender = UdpSocket::bind("127.0.0.1:0").expect("sender should bind");
    let start = Instant::now();
    while child.try_wait().expect("child status").is_none() {
        assert!(start.elapsed() < Duration::from_secs(10), "listen did not exit");
        let _ = sender.send_to(&frame, &local);
        thread::sleep(Duration::from_millis(50));
    }

    let output = child.wait_with_output().expect("listen output");
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let line = String::from_utf8_lossy(&output.stdout);
    let sample: Value = serde_json::from_str(line.trim()).expect("sample should be JSON");
    assert_eq!(sample["stream"], "Label");
    assert_eq!(sample["payload"], "01020304");
    assert_eq!(sample["component_identifier"], 3);
    assert_eq!(sample["sequence_number"], 5);
}

#[test]
fn listen_times_out_without_traffic() {
    let local = format!("127.0.0.1:{}", free_port());
    let path = write_config("quiet", &label_config("in", json!({ "local": local })));

    let output = ed247()
        .arg("listen")
        .arg(&path)
        .arg("--timeout")
        .arg("200ms")
        .output()
        .expect("listen should run");
    assert_eq!(output.status.code(), Some(124));
}

#[test]
fn version_reports_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_ed247"))
        .arg("version")
        .output()
        .expect("version should run");
    assert_eq!(output.status.code(), Some(0));
    let text = String::from_utf8_lossy(&output.stdout);
    assert_eq!(text.trim(), format!("ed247 {}", env!("CARGO_PKG_VERSION")));
}
