use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn folio_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("folio");
    path
}

struct Server {
    child: Child,
    base: String,
    _tmp: TempDir,
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn start_server() -> Server {
    let tmp = TempDir::new().unwrap();
    let port = free_port();
    let config_path = tmp.path().join("folio.toml");
    fs::write(
        &config_path,
        format!(
            r#"[chunking]
chunk_size = 30
chunk_overlap = 0

[output]
prefix = "P: "

[server]
bind = "127.0.0.1:{}"
max_upload_bytes = 4096
"#,
            port
        ),
    )
    .unwrap();

    let child = Command::new(folio_binary())
        .arg("--config")
        .arg(&config_path)
        .arg("serve")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to start folio serve");
    let server = Server {
        child,
        base: format!("http://127.0.0.1:{}", port),
        _tmp: tmp,
    };

    let client = reqwest::blocking::Client::new();
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Ok(resp) = client.get(format!("{}/health", server.base)).send() {
            if resp.status().is_success() {
                break;
            }
        }
        assert!(Instant::now() < deadline, "server did not come up");
        std::thread::sleep(Duration::from_millis(50));
    }
    server
}

fn odt_fixture() -> Vec<u8> {
    let content = r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0"
  xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0">
  <office:body><office:text>
    <text:h text:outline-level="1">Morning</text:h>
    <text:p>Coffee first.</text:p>
    <text:h text:outline-level="1">Evening</text:h>
    <text:p>Tea last.</text:p>
  </office:text></office:body>
</office:document-content>"#;
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, body) in [
        ("mimetype", "application/vnd.oasis.opendocument.text"),
        ("content.xml", content),
    ] {
        writer
            .start_file(name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[test]
fn test_server_end_to_end() {
    let server = start_server();
    let client = reqwest::blocking::Client::new();

    // health
    let health: serde_json::Value = client
        .get(format!("{}/health", server.base))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));

    // separators
    let table: serde_json::Value = client
        .get(format!("{}/separators", server.base))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert!(table["kinds"]
        .as_array()
        .unwrap()
        .iter()
        .any(|k| k["kind"] == "python"));

    // chapters
    let resp = client
        .post(format!("{}/chapters?name=day.odt", server.base))
        .body(odt_fixture())
        .send()
        .unwrap();
    assert_eq!(resp.status(), 200);
    let chapters: serde_json::Value = resp.json().unwrap();
    assert_eq!(chapters["format"], "odt");
    assert_eq!(chapters["chapters"][1]["title"], "Evening");

    // split with per-request overrides
    let text = "one two three four five six seven eight nine ten eleven twelve";
    let resp = client
        .post(format!("{}/split?chunk_size=20&chunk_overlap=4", server.base))
        .body(text)
        .send()
        .unwrap();
    assert_eq!(resp.status(), 200);
    let report: serde_json::Value = resp.json().unwrap();
    assert_eq!(report["format"], "text");
    let chunks = report["chapters"][0]["chunks"].as_array().unwrap();
    assert!(chunks.len() > 2);
    for chunk in chunks {
        assert!(chunk["text"].as_str().unwrap().chars().count() <= 20);
    }
    assert!(report["chapters"][0]["prefixed"][0]
        .as_str()
        .unwrap()
        .starts_with("P: "));

    // archive
    let resp = client
        .post(format!("{}/archive?name=day.odt&no_prefix=true", server.base))
        .body(odt_fixture())
        .send()
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/zip");
    assert!(resp.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .contains("day.zip"));
    let bytes = resp.bytes().unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    let mut first = String::new();
    archive
        .by_name("001_morning/chunk_001.txt")
        .unwrap()
        .read_to_string(&mut first)
        .unwrap();
    assert!(first.starts_with("Morning"));
    assert!(archive.by_name("manifest.json").is_ok());
}

#[test]
fn test_server_error_envelope() {
    let server = start_server();
    let client = reqwest::blocking::Client::new();

    let error_of = |resp: reqwest::blocking::Response| -> (u16, serde_json::Value) {
        let status = resp.status().as_u16();
        (status, resp.json().unwrap())
    };

    // overlap >= size
    let (status, body) = error_of(
        client
            .post(format!("{}/split?chunk_size=10&chunk_overlap=10", server.base))
            .body("text")
            .send()
            .unwrap(),
    );
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"].as_str().unwrap().contains("chunk_overlap"));

    // empty body
    let (status, body) = error_of(
        client
            .post(format!("{}/split", server.base))
            .send()
            .unwrap(),
    );
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    // corrupt container
    let (status, body) = error_of(
        client
            .post(format!("{}/chapters?format=epub", server.base))
            .body("definitely not a zip")
            .send()
            .unwrap(),
    );
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    // chapter out of range
    let (status, body) = error_of(
        client
            .post(format!("{}/split?chapter=5", server.base))
            .body("only one chapter")
            .send()
            .unwrap(),
    );
    assert_eq!(status, 400);
    assert!(body["error"]["message"].as_str().unwrap().contains("out of range"));

    // over the upload limit
    let resp = client
        .post(format!("{}/split", server.base))
        .body("x".repeat(10_000))
        .send()
        .unwrap();
    assert_eq!(resp.status(), 413);
}
