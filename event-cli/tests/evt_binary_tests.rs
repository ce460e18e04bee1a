#![allow(non_snake_case)]

use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::process::Command;
use std::thread;

use tempfile::tempdir;

fn evt() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_evt"));
    command.env("RUST_LOG", "warn");
    command
}

#[test]
fn evt_binary__log_then_merge__then_events_in_timestamp_order() {
    let dir = tempdir().expect("tempdir");
    let early = dir.path().join("early.log");
    let late = dir.path().join("late.log");
    fs::write(&early, "run event=\"start\" 1s\nrun event=\"end\" 3s\n").unwrap();

    let status = evt()
        .args(["log", "--event", "comment", "--collection", "probe", "--file"])
        .arg(&late)
        .status()
        .expect("run evt log");
    assert!(status.success());
    // Rewrite the appended event to a known instant between the other two.
    let appended = fs::read_to_string(&late).unwrap();
    let (head, _) = appended.trim_end().rsplit_once(' ').unwrap();
    fs::write(&late, format!("{head} 2000ms\n")).unwrap();

    let output = evt()
        .args(["merge", "--format", "InfluxDB", "--precision", "s"])
        .arg(&late)
        .arg(&early)
        .output()
        .expect("run evt merge");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "run event=\"start\" 1\nprobe event=\"comment\" 2\nrun event=\"end\" 3\n"
    );
}

#[test]
fn evt_binary__merge_json__then_one_object_per_event() {
    let dir = tempdir().expect("tempdir");
    let file = dir.path().join("a.log");
    fs::write(&file, "2021-03-01T10:00:00 run start\n2021-03-01T10:00:01 run end\n").unwrap();

    let output = evt()
        .args(["merge", "--format", "LOG", "--output", "json"])
        .arg(&file)
        .output()
        .expect("run evt merge");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let events = stdout
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["event"], "2021-03-01T10:00:01 run end");
}

#[test]
fn evt_binary__collect_with_config__then_files_listed() {
    let dir = tempdir().expect("tempdir");
    let file = dir.path().join("probe.csv");
    fs::write(&file, "\"2021-03-01T10:00:00\",\"run\",\"\",\"\",\"start\",\"\",\"\",\"\"\n").unwrap();
    let config = dir.path().join("events.json");
    fs::write(&config, r#"{"log-format": "CSV", "log-collection-name": "upgrade-{bundle}"}"#).unwrap();

    let output = evt()
        .args(["collect", "--list", "--output", "json", "--bundle", "focal", "--config"])
        .arg(&config)
        .arg(&file)
        .output()
        .expect("run evt collect");

    assert!(output.status.success());
    let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["files"][0]["format"], "CSV");
    assert_eq!(listing["files"][0]["name"], "files");
}

#[test]
fn evt_binary__merge_unknown_format__then_fails() {
    let output = evt()
        .args(["merge", "--format", "yaml", "whatever.log"])
        .output()
        .expect("run evt merge");

    assert!(!output.status.success());
}

#[test]
fn evt_binary__collect_with_upload__then_batch_posted() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !String::from_utf8_lossy(&request).ends_with("m v=2 2000000") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        stream
            .write_all(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .unwrap();
        String::from_utf8(request).unwrap()
    });

    let dir = tempdir().expect("tempdir");
    let file = dir.path().join("probe.log");
    fs::write(&file, "m v=1 1s\nm v=2 2s\n").unwrap();
    let config = dir.path().join("events.json");
    let body = format!(
        r#"{{"log-format": "InfluxDB", "upload": [{{"type": "InfluxDB", "url": "{base}", "database": "{{bundle}}"}}]}}"#
    );
    fs::write(&config, body).unwrap();

    let output = evt()
        .args(["collect", "--bundle", "focal", "--config"])
        .arg(&config)
        .arg(&file)
        .output()
        .expect("run evt collect");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let request = server.join().unwrap();
    assert!(request.starts_with("POST /write?db=focal&precision=u HTTP/1.1\r\n"));
    assert!(request.ends_with("\r\n\r\nm v=1 1000000\nm v=2 2000000"));
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "m v=1 1000000\nm v=2 2000000\n");
}
