use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use assert_cmd::Command;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use insta::assert_snapshot;
use predicates::str::contains;
use tempfile::tempdir;
use tiny_http::{Header, Response, Server, StatusCode};

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, content).expect("write");
}

fn write_receipt(dir: &Path) -> PathBuf {
    let path = dir.join("factura_001.xml");
    write_file(&path, "<Invoice><ID>F001-1</ID></Invoice>");
    path
}

fn write_config(dir: &Path, base_url: &str) -> PathBuf {
    let path = dir.join("config.toml");
    write_file(
        &path,
        &format!(
            r#"[credentials]
client_id = "e2e-client"
client_secret = "e2e-secret"
username = "MODDATOS"
password = "moddatos"

[endpoints]
auth_base_url = "{base_url}"
api_base_url = "{base_url}"

[poll]
max_attempts = 3
initial_delay = "0s"
interval = "10ms"
"#
        ),
    );
    path
}

fn normalize_output(raw: &str) -> String {
    raw.lines()
        .map(|line| {
            if line.starts_with("cdr: ") {
                "cdr: <CDR_FILE>".to_string()
            } else if line.starts_with("detail: ") {
                "detail: <DETAIL_FILE>".to_string()
            } else if line.starts_with("# ") {
                "# <CONFIG_FILE>".to_string()
            } else {
                line.replace('\\', "/")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn cdr_archive_base64(entry_name: &str, contents: &[u8]) -> String {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(entry_name, zip::write::SimpleFileOptions::default())
        .expect("start entry");
    writer.write_all(contents).expect("write entry");
    BASE64.encode(writer.finish().expect("finish zip").into_inner())
}

fn token_ok() -> (u16, String) {
    (200, r#"{"access_token":"tok-e2e"}"#.to_string())
}

fn submit_ok(ticket: &str) -> (u16, String) {
    (200, format!(r#"{{"numTicket":"{ticket}"}}"#))
}

fn status_processing() -> (u16, String) {
    (200, r#"{"codRespuesta":"98"}"#.to_string())
}

struct TestSunat {
    base_url: String,
    seen: Arc<Mutex<Vec<String>>>,
    handle: thread::JoinHandle<()>,
}

impl TestSunat {
    fn join(self) -> Vec<String> {
        self.handle.join().expect("join server");
        let seen = self.seen.lock().expect("seen lock");
        seen.clone()
    }
}

fn spawn_sunat(responses: Vec<(u16, String)>) -> TestSunat {
    let server = Server::http("127.0.0.1:0").expect("server");
    let base_url = format!("http://{}", server.server_addr());
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_in = Arc::clone(&seen);
    let handle = thread::spawn(move || {
        for (status, body) in responses {
            let req = server.recv().expect("request");
            seen_in
                .lock()
                .expect("seen lock")
                .push(format!("{} {}", req.method(), req.url()));
            let resp = Response::from_string(body)
                .with_status_code(StatusCode(status))
                .with_header(
                    Header::from_bytes("Content-Type", "application/json").expect("header"),
                );
            req.respond(resp).expect("respond");
        }
    });
    TestSunat {
        base_url,
        seen,
        handle,
    }
}

fn sunat_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sunat"));
    for var in [
        "SUNAT_CONFIG_PATH",
        "SUNAT_CLIENT_ID",
        "SUNAT_CLIENT_SECRET",
        "SUNAT_USERNAME",
        "SUNAT_PASSWORD",
        "SUNAT_AUTH_BASE_URL",
        "SUNAT_API_BASE_URL",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn send_prints_the_ticket_number() {
    let td = tempdir().expect("tempdir");
    let server = spawn_sunat(vec![token_ok(), submit_ok("T-100")]);
    let config = write_config(td.path(), &server.base_url);
    let receipt = write_receipt(td.path());

    sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("send")
        .arg(&receipt)
        .assert()
        .success()
        .stdout(contains("ticket: T-100"));

    let seen = server.join();
    assert_eq!(
        seen,
        vec![
            "POST /v1/clientessol/e2e-client/oauth2/token/".to_string(),
            "POST /v1/contribuyente/gem/comprobantes/factura_001".to_string(),
        ]
    );
}

#[test]
fn send_write_zip_persists_a_readable_archive() {
    let td = tempdir().expect("tempdir");
    let server = spawn_sunat(vec![token_ok(), submit_ok("T-101")]);
    let config = write_config(td.path(), &server.base_url);
    let receipt = write_receipt(td.path());

    sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("send")
        .arg(&receipt)
        .arg("--write-zip")
        .assert()
        .success()
        .stdout(contains("ticket: T-101"));
    server.join();

    let zip_path = td.path().join("factura_001.zip");
    let mut archive =
        zip::ZipArchive::new(fs::File::open(&zip_path).expect("open zip")).expect("read zip");
    assert_eq!(archive.len(), 1);
    let entry = archive.by_index(0).expect("entry");
    assert_eq!(entry.name(), "factura_001.xml");
}

#[test]
fn send_missing_file_fails_before_any_request() {
    let td = tempdir().expect("tempdir");
    let config = write_config(td.path(), "http://127.0.0.1:9");

    sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("send")
        .arg(td.path().join("missing.xml"))
        .assert()
        .failure()
        .stderr(contains("failed to package"));
}

#[test]
fn rejected_credentials_stop_before_any_submission() {
    let td = tempdir().expect("tempdir");
    let server = spawn_sunat(vec![(401, r#"{"error":"invalid_client"}"#.to_string())]);
    let config = write_config(td.path(), &server.base_url);
    let receipt = write_receipt(td.path());

    sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("send")
        .arg(&receipt)
        .assert()
        .failure()
        .stderr(contains("authentication failed"));

    let seen = server.join();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with("POST /v1/clientessol/"));
}

#[test]
fn process_polls_to_acceptance_and_extracts_the_cdr() {
    let td = tempdir().expect("tempdir");
    let cdr = cdr_archive_base64("R-factura_001.xml", b"<ApplicationResponse/>");
    let server = spawn_sunat(vec![
        token_ok(),
        submit_ok("T-200"),
        status_processing(),
        (
            200,
            format!(r#"{{"codRespuesta":"0","indCdrGenerado":true,"arcCdr":"{cdr}"}}"#),
        ),
    ]);
    let config = write_config(td.path(), &server.base_url);
    let receipt = write_receipt(td.path());
    let out_dir = td.path().join("cdr");

    let out = sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("process")
        .arg(&receipt)
        .arg("-o")
        .arg(&out_dir)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    server.join();

    let stdout = String::from_utf8(out).expect("utf8");
    assert_snapshot!(
        normalize_output(&stdout),
        @r#"
ticket: T-200
ticket T-200: accepted
cdr: <CDR_FILE>
"#
    );
    assert_eq!(
        fs::read(out_dir.join("R-factura_001.xml")).expect("read cdr"),
        b"<ApplicationResponse/>"
    );
}

#[test]
fn process_rejection_saves_the_detail_and_exits_nonzero() {
    let td = tempdir().expect("tempdir");
    let server = spawn_sunat(vec![
        token_ok(),
        submit_ok("T-300"),
        (
            200,
            r#"{"codRespuesta":"99","error":{"numError":"2335","desError":"Documento alterado"}}"#
                .to_string(),
        ),
    ]);
    let config = write_config(td.path(), &server.base_url);
    let receipt = write_receipt(td.path());
    let error_dir = td.path().join("errors");

    sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("process")
        .arg(&receipt)
        .arg("-o")
        .arg(td.path())
        .arg("--error-dir")
        .arg(&error_dir)
        .assert()
        .code(1)
        .stdout(contains("ticket T-300: rejected"))
        .stderr(contains("rejection 2335"));
    server.join();

    assert_eq!(
        fs::read_to_string(error_dir.join("factura_001_error.txt")).expect("read detail"),
        "Error Code: 2335 | Detail: Documento alterado"
    );
}

#[test]
fn process_reports_still_processing_without_failing() {
    let td = tempdir().expect("tempdir");
    let server = spawn_sunat(vec![
        token_ok(),
        submit_ok("T-400"),
        status_processing(),
        status_processing(),
        status_processing(),
    ]);
    let config = write_config(td.path(), &server.base_url);
    let receipt = write_receipt(td.path());

    sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("process")
        .arg(&receipt)
        .assert()
        .success()
        .stdout(contains("ticket T-400: still processing"))
        .stderr(contains("sunat fetch T-400"));
    server.join();
}

#[test]
fn process_honors_poll_flags_over_the_config_file() {
    let td = tempdir().expect("tempdir");
    let server = spawn_sunat(vec![
        token_ok(),
        submit_ok("T-401"),
        status_processing(),
    ]);
    let config = write_config(td.path(), &server.base_url);
    let receipt = write_receipt(td.path());

    sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("process")
        .arg(&receipt)
        .arg("--max-attempts")
        .arg("1")
        .arg("--poll-interval")
        .arg("5ms")
        .assert()
        .success()
        .stdout(contains("ticket T-401: still processing"));

    // One status check, not the three the file allows.
    let seen = server.join();
    assert_eq!(seen.len(), 3);
}

#[test]
fn fetch_checks_a_ticket_once() {
    let td = tempdir().expect("tempdir");
    let server = spawn_sunat(vec![token_ok(), status_processing()]);
    let config = write_config(td.path(), &server.base_url);

    sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("fetch")
        .arg("T-500")
        .assert()
        .success()
        .stdout(contains("ticket T-500: still processing"));

    let seen = server.join();
    assert_eq!(
        seen[1],
        "GET /v1/contribuyente/gem/comprobantes/envios/T-500"
    );
}

#[test]
fn fetch_names_rejection_details_after_the_ticket() {
    let td = tempdir().expect("tempdir");
    let server = spawn_sunat(vec![
        token_ok(),
        (
            200,
            r#"{"codRespuesta":"99","error":{"numError":"1033","desError":"RUC no autorizado"}}"#
                .to_string(),
        ),
    ]);
    let config = write_config(td.path(), &server.base_url);
    let error_dir = td.path().join("errors");

    sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("fetch")
        .arg("T-600")
        .arg("-o")
        .arg(td.path())
        .arg("--error-dir")
        .arg(&error_dir)
        .assert()
        .code(1)
        .stdout(contains("ticket T-600: rejected"));
    server.join();

    assert_eq!(
        fs::read_to_string(error_dir.join("T-600_error.txt")).expect("read detail"),
        "Error Code: 1033 | Detail: RUC no autorizado"
    );
}

#[test]
fn missing_credentials_name_the_keys_but_not_values() {
    let td = tempdir().expect("tempdir");
    let config = td.path().join("config.toml");
    write_file(
        &config,
        r#"[endpoints]
auth_base_url = "http://127.0.0.1:9"
api_base_url = "http://127.0.0.1:9"
"#,
    );
    let receipt = write_receipt(td.path());

    sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("send")
        .arg(&receipt)
        .assert()
        .failure()
        .stderr(contains(
            "missing credentials: client_id, client_secret, username, password",
        ));
}

#[test]
fn config_show_masks_secret_values() {
    let td = tempdir().expect("tempdir");
    let config = write_config(td.path(), "https://api-cpe.sunat.gob.pe");

    let out = sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .arg("show")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(out).expect("utf8");
    assert!(stdout.contains("client_secret = \"e2e-****\""));
    assert!(stdout.contains("password = \"********\""));
    assert!(stdout.contains("max_attempts = 3"));
    assert!(!stdout.contains("e2e-secret"));
    assert!(!stdout.contains("moddatos"));
}

#[test]
fn config_set_updates_the_file() {
    let td = tempdir().expect("tempdir");
    let config = td.path().join("config.toml");

    sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .arg("set")
        .arg("poll.max_attempts")
        .arg("7")
        .assert()
        .success();

    sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .arg("show")
        .assert()
        .success()
        .stdout(contains("max_attempts = 7"));
}

#[test]
fn config_set_rejects_unknown_keys() {
    let td = tempdir().expect("tempdir");
    let config = td.path().join("config.toml");

    sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .arg("set")
        .arg("poll.jitter")
        .arg("1s")
        .assert()
        .failure()
        .stderr(contains("unknown config key"));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let td = tempdir().expect("tempdir");
    let config = td.path().join("config.toml");

    sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .arg("init")
        .assert()
        .success()
        .stdout(contains("wrote "));
    assert!(
        fs::read_to_string(&config)
            .expect("read config")
            .contains("[credentials]")
    );

    sunat_cmd()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .arg("init")
        .assert()
        .failure()
        .stderr(contains("already exists"));
}

#[test]
fn invalid_duration_flag_fails() {
    let td = tempdir().expect("tempdir");
    let receipt = write_receipt(td.path());

    sunat_cmd()
        .arg("process")
        .arg(&receipt)
        .arg("--initial-delay")
        .arg("not-a-duration")
        .assert()
        .failure()
        .stderr(contains("invalid duration"));
}

#[test]
fn completions_cover_the_binary_name() {
    sunat_cmd()
        .arg("completions")
        .arg("bash")
        .assert()
        .success()
        .stdout(contains("_sunat"));
}
