//! Tests de integración para el servidor de archivos
//!
//! A diferencia de los tests unitarios, acá se levanta el servidor
//! completo en un puerto efímero y se habla con él por el socket, como lo
//! haría un cliente real. Cada test usa su propio storage root temporal.

use file_server::config::Config;
use file_server::server::{Server, ShutdownHandle};
use file_server::transfer::{EventSender, NullObserver, StatusObserver, TransferKind, TransferPhase};
use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Levanta un servidor sobre `root` con el observer dado
fn start_server(
    root: &Path,
    observer: Arc<dyn StatusObserver>,
) -> (SocketAddr, ShutdownHandle, thread::JoinHandle<()>) {
    let config = Config {
        port: 0,
        host: "127.0.0.1".to_string(),
        storage_root: root.to_string_lossy().into_owned(),
        max_connections: 8,
    };

    let mut server = Server::new(config, observer).expect("server");
    let addr = server.bind().expect("bind");
    let handle = server.shutdown_handle().expect("handle");
    let join = thread::spawn(move || {
        server.run().expect("run");
    });
    (addr, handle, join)
}

/// Helper: envía bytes crudos y retorna la response completa
fn send_raw(addr: SocketAddr, raw: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream.write_all(raw).expect("write");
    stream.shutdown(std::net::Shutdown::Write).unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).expect("read");
    response
}

fn send_get(addr: SocketAddr, path: &str) -> String {
    let raw = format!("GET {} HTTP/1.0\r\n\r\n", path);
    String::from_utf8_lossy(&send_raw(addr, raw.as_bytes())).into_owned()
}

/// Helper: arma un POST multipart con un solo archivo
fn multipart_post(boundary: &str, filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\r\n",
            boundary, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let mut raw = format!(
        "POST /upload HTTP/1.0\r\nContent-Type: multipart/form-data; boundary={}\r\n\
         Content-Length: {}\r\n\r\n",
        boundary,
        body.len()
    )
    .into_bytes();
    raw.extend_from_slice(&body);
    raw
}

/// Helper: extrae el body de una response HTTP
fn extract_body(response: &[u8]) -> &[u8] {
    let sep = b"\r\n\r\n";
    match response.windows(sep.len()).position(|w| w == sep) {
        Some(pos) => &response[pos + sep.len()..],
        None => &[],
    }
}

#[test]
fn test_upload_then_download_round_trip() {
    let dir = TempDir::new().unwrap();
    let (addr, handle, join) = start_server(dir.path(), Arc::new(NullObserver));

    // Payload binario, no solo texto
    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

    let response = send_raw(addr, &multipart_post("----frontera", "datos.bin", &payload));
    let text = String::from_utf8_lossy(&response);
    assert!(text.contains("200 OK"));
    assert!(text.contains("Success!"));

    // El archivo quedó en el storage root, byte a byte
    assert_eq!(fs::read(dir.path().join("datos.bin")).unwrap(), payload);

    // Y se puede bajar idéntico
    let response = send_raw(addr, b"GET /datos.bin HTTP/1.0\r\n\r\n");
    let text = String::from_utf8_lossy(&response);
    assert!(text.contains("200 OK"));
    assert!(text.contains("Content-Type: application/octet-stream"));
    assert!(text.contains(&format!("Content-Length: {}", payload.len())));
    assert!(text.contains("Content-Disposition: attachment; filename=datos.bin"));
    assert_eq!(extract_body(&response), &payload[..]);

    handle.stop();
    join.join().unwrap();
}

#[test]
fn test_directory_listing_has_absolute_links() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), "A").unwrap();
    fs::write(dir.path().join("b.txt"), "B").unwrap();
    let (addr, handle, join) = start_server(dir.path(), Arc::new(NullObserver));

    let response = send_get(addr, "/");
    assert!(response.contains("200 OK"));
    assert!(response.contains("Content-Type: text/html"));
    assert!(response.contains("HTTP File Browser"));

    // Links con el path absoluto de cada entrada
    let canonical = fs::canonicalize(dir.path()).unwrap();
    assert!(response.contains(&format!("{}/a.txt", canonical.display())));
    assert!(response.contains(&format!("{}/b.txt", canonical.display())));

    handle.stop();
    join.join().unwrap();
}

#[test]
fn test_listing_link_navigates_back_to_file() {
    // El link absoluto que genera el listado debe funcionar como GET
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("nota.txt"), "hola").unwrap();
    let (addr, handle, join) = start_server(dir.path(), Arc::new(NullObserver));

    let canonical = fs::canonicalize(dir.path()).unwrap();
    let legacy_path = format!("{}/nota.txt", canonical.display());

    let response = send_get(addr, &legacy_path);
    assert!(response.contains("200 OK"));
    assert!(response.ends_with("hola"));

    handle.stop();
    join.join().unwrap();
}

#[test]
fn test_missing_path_is_textual_error_with_200() {
    let dir = TempDir::new().unwrap();
    let (addr, handle, join) = start_server(dir.path(), Arc::new(NullObserver));

    let response = send_get(addr, "/no-existe.txt");
    assert!(response.contains("200 OK"));
    assert!(response.contains("Error! No such file or directory"));

    handle.stop();
    join.join().unwrap();
}

#[test]
fn test_post_without_boundary_is_upload_error() {
    let dir = TempDir::new().unwrap();
    let (addr, handle, join) = start_server(dir.path(), Arc::new(NullObserver));

    let raw = b"POST /upload HTTP/1.0\r\nContent-Type: multipart/form-data\r\n\
                Content-Length: 0\r\n\r\n";
    let response = send_raw(addr, raw);
    let text = String::from_utf8_lossy(&response);
    assert!(text.contains("200 OK"));
    assert!(text.contains("Error uploading file!"));

    handle.stop();
    join.join().unwrap();
}

#[test]
fn test_upload_emits_started_then_completed() {
    let dir = TempDir::new().unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    let (addr, handle, join) = start_server(dir.path(), Arc::new(EventSender::new(tx)));

    let response = send_raw(addr, &multipart_post("XYZ", "note.txt", b"hello"));
    assert!(String::from_utf8_lossy(&response).contains("Success!"));

    let expected = fs::canonicalize(dir.path()).unwrap().join("note.txt");
    let events: Vec<_> = rx
        .try_iter()
        .filter(|e| e.progress_percent.is_none())
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, TransferKind::Upload);
    assert_eq!(events[0].phase, TransferPhase::Started);
    assert_eq!(events[0].path, expected);
    assert_eq!(events[1].phase, TransferPhase::Completed);
    assert_eq!(events[1].path, expected);

    handle.stop();
    join.join().unwrap();
}

#[test]
fn test_download_emits_started_then_completed() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("x.bin"), b"abc").unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    let (addr, handle, join) = start_server(dir.path(), Arc::new(EventSender::new(tx)));

    let response = send_get(addr, "/x.bin");
    assert!(response.ends_with("abc"));

    let events: Vec<_> = rx.try_iter().collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, TransferKind::Download);
    assert_eq!(events[0].phase, TransferPhase::Started);
    assert_eq!(events[1].phase, TransferPhase::Completed);

    handle.stop();
    join.join().unwrap();
}

#[test]
fn test_upload_reports_progress_up_to_100() {
    let dir = TempDir::new().unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    let (addr, handle, join) = start_server(dir.path(), Arc::new(EventSender::new(tx)));

    let payload = vec![b'p'; 50_000];
    send_raw(addr, &multipart_post("B", "grande.bin", &payload));

    let reports: Vec<u8> = rx
        .try_iter()
        .filter_map(|e| e.progress_percent)
        .collect();
    assert!(!reports.is_empty());
    // El último porcentaje puede quedar en 99 si el CRLF final del body
    // no llegó a consumirse; nunca por debajo
    assert!(*reports.last().unwrap() >= 99);
    for pair in reports.windows(2) {
        assert!(pair[0] < pair[1], "progreso no monótono: {:?}", reports);
    }

    handle.stop();
    join.join().unwrap();
}

#[test]
fn test_traversal_is_rejected_over_socket() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("visible.txt"), "ok").unwrap();
    let (addr, handle, join) = start_server(dir.path(), Arc::new(NullObserver));

    for path in ["/../../etc/passwd", "/%2e%2e/%2e%2e/etc/passwd"] {
        let response = send_get(addr, path);
        assert!(response.contains("Error! No such file or directory"));
    }

    handle.stop();
    join.join().unwrap();
}

#[test]
fn test_other_methods_answer_success() {
    let dir = TempDir::new().unwrap();
    let (addr, handle, join) = start_server(dir.path(), Arc::new(NullObserver));

    for raw in [
        &b"PUT /x HTTP/1.0\r\n\r\n"[..],
        &b"DELETE /x HTTP/1.0\r\n\r\n"[..],
    ] {
        let text = String::from_utf8_lossy(&send_raw(addr, raw)).into_owned();
        assert!(text.contains("200 OK"));
        assert!(text.contains("Success!"));
    }

    handle.stop();
    join.join().unwrap();
}

#[test]
fn test_stop_unblocks_run_without_draining() {
    let dir = TempDir::new().unwrap();
    let (addr, handle, join) = start_server(dir.path(), Arc::new(NullObserver));

    // Conexión ociosa en vuelo
    let idle = TcpStream::connect(addr).unwrap();

    handle.stop();
    join.join().unwrap();
    drop(idle);
}
