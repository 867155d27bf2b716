//! Integration tests for icert.
//!
//! These tests verify the complete workflows of the system, including a real
//! TLS handshake with the issued certificates.

use icert::cert::builder::SubjectName;
use icert::cert::ca::{generate_ca_certificate, CaRequest};
use icert::cert::entity::{generate_endpoint_certificate, EndpointRequest};
use icert::cert::inspect::inspect_file;
use icert::crypto::keygen::KeyAlgorithm;
use icert::error::{IcertError, Result};
use icert::storage::pem_files::PemLayout;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, ClientConnection, RootCertStore, ServerConfig, ServerConnection};
use std::fs;
use std::io::{BufReader, Read, Write};
use std::net::{IpAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const DAY: Duration = Duration::from_secs(24 * 3600);

fn create_ca(dir: &Path, algorithm: KeyAlgorithm, layout: &str) -> Result<PemLayout> {
    let output = match layout {
        "combined" => PemLayout::combined(dir.join("ca.pem")),
        _ => PemLayout::split(dir.join("ca_cert.pem"), dir.join("ca_key.pem")),
    };
    let request = CaRequest::new(algorithm, SubjectName::new().organization("Test CA"), DAY);
    generate_ca_certificate(&request, &output)?;
    Ok(output)
}

fn endpoint_request(algorithm: KeyAlgorithm) -> EndpointRequest {
    EndpointRequest::new(algorithm, SubjectName::new().organization("Test Endpoint"), DAY)
        .dns_names(["localhost", "localhost6"])
        .ip_addresses(["127.0.0.1".parse().unwrap(), "::1".parse().unwrap()])
}

fn read_certs(path: &Path) -> Vec<CertificateDer<'static>> {
    let mut reader = BufReader::new(fs::File::open(path).unwrap());
    rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .unwrap()
}

fn read_key(path: &Path) -> PrivateKeyDer<'static> {
    let mut reader = BufReader::new(fs::File::open(path).unwrap());
    rustls_pemfile::private_key(&mut reader).unwrap().unwrap()
}

fn root_store(ca: &PemLayout) -> RootCertStore {
    let mut roots = RootCertStore::empty();
    for cert in read_certs(ca.cert_path()) {
        roots.add(cert).unwrap();
    }
    roots
}

fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn server_config(endpoint: &PemLayout, client_ca: Option<&PemLayout>) -> Arc<ServerConfig> {
    let builder = ServerConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .unwrap();

    let builder = match client_ca {
        Some(ca) => {
            let verifier =
                WebPkiClientVerifier::builder_with_provider(Arc::new(root_store(ca)), provider())
                    .build()
                    .unwrap();
            builder.with_client_cert_verifier(verifier)
        }
        None => builder.with_no_client_auth(),
    };

    Arc::new(
        builder
            .with_single_cert(read_certs(endpoint.cert_path()), read_key(endpoint.key_path()))
            .unwrap(),
    )
}

fn client_config(ca: &PemLayout, identity: Option<&PemLayout>) -> Arc<ClientConfig> {
    let builder = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(root_store(ca));

    let config = match identity {
        Some(identity) => builder
            .with_client_auth_cert(read_certs(identity.cert_path()), read_key(identity.key_path()))
            .unwrap(),
        None => builder.with_no_client_auth(),
    };

    Arc::new(config)
}

/// Run a ping/pong exchange over a loopback TLS connection.
fn ping_pong(
    server: Arc<ServerConfig>,
    client: Arc<ClientConfig>,
    server_name: &str,
) -> std::result::Result<(), String> {
    let listener = TcpListener::bind("127.0.0.1:0").map_err(|e| e.to_string())?;
    let addr = listener.local_addr().map_err(|e| e.to_string())?;

    let server_thread = thread::spawn(move || -> std::result::Result<(), String> {
        let (sock, _) = listener.accept().map_err(|e| e.to_string())?;
        let conn = ServerConnection::new(server).map_err(|e| e.to_string())?;
        let mut tls = rustls::StreamOwned::new(conn, sock);

        let mut buf = [0u8; 4];
        tls.read_exact(&mut buf).map_err(|e| e.to_string())?;
        if &buf != b"ping" {
            return Err("server expected ping".to_string());
        }
        tls.write_all(b"pong").map_err(|e| e.to_string())?;
        tls.conn.send_close_notify();
        tls.flush().map_err(|e| e.to_string())?;
        Ok(())
    });

    let client_result = (|| -> std::result::Result<(), String> {
        let name = ServerName::try_from(server_name.to_string()).map_err(|e| e.to_string())?;
        let conn = ClientConnection::new(client, name).map_err(|e| e.to_string())?;
        let sock = TcpStream::connect(addr).map_err(|e| e.to_string())?;
        let mut tls = rustls::StreamOwned::new(conn, sock);

        tls.write_all(b"ping").map_err(|e| e.to_string())?;
        let mut buf = [0u8; 4];
        tls.read_exact(&mut buf).map_err(|e| e.to_string())?;
        if &buf != b"pong" {
            return Err("client expected pong".to_string());
        }
        Ok(())
    })();

    let server_result = server_thread
        .join()
        .map_err(|_| "server thread panicked".to_string())?;

    client_result?;
    server_result
}

#[test]
fn test_tls_handshake_all_algorithms_and_layouts() -> Result<()> {
    for ca_algorithm in [KeyAlgorithm::Ed25519, KeyAlgorithm::Rsa] {
        for endpoint_algorithm in [KeyAlgorithm::Ed25519, KeyAlgorithm::Rsa] {
            for layout in ["combined", "split"] {
                let temp_dir = TempDir::new().unwrap();
                let ca = create_ca(temp_dir.path(), ca_algorithm, layout)?;

                let endpoint = match layout {
                    "combined" => PemLayout::combined(temp_dir.path().join("server.pem")),
                    _ => PemLayout::split(
                        temp_dir.path().join("server_cert.pem"),
                        temp_dir.path().join("server_key.pem"),
                    ),
                };
                generate_endpoint_certificate(
                    &endpoint_request(endpoint_algorithm),
                    &ca,
                    &endpoint,
                )?;

                for server_name in ["localhost", "127.0.0.1"] {
                    let result = ping_pong(
                        server_config(&endpoint, None),
                        client_config(&ca, None),
                        server_name,
                    );
                    assert!(
                        result.is_ok(),
                        "{}-signed {} endpoint ({}) as {}: {:?}",
                        ca_algorithm,
                        endpoint_algorithm,
                        layout,
                        server_name,
                        result
                    );
                }
            }
        }
    }

    Ok(())
}

#[test]
fn test_mutual_tls_with_endpoint_certificates() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let ca = create_ca(temp_dir.path(), KeyAlgorithm::Ed25519, "combined")?;

    let server = PemLayout::combined(temp_dir.path().join("server.pem"));
    let client = PemLayout::split(
        temp_dir.path().join("client_cert.pem"),
        temp_dir.path().join("client_key.pem"),
    );
    generate_endpoint_certificate(&endpoint_request(KeyAlgorithm::Ed25519), &ca, &server)?;
    generate_endpoint_certificate(&endpoint_request(KeyAlgorithm::Rsa), &ca, &client)?;

    let result = ping_pong(
        server_config(&server, Some(&ca)),
        client_config(&ca, Some(&client)),
        "localhost",
    );
    assert!(result.is_ok(), "mTLS handshake failed: {:?}", result);

    Ok(())
}

#[test]
fn test_handshake_fails_with_other_ca() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let ca = create_ca(temp_dir.path(), KeyAlgorithm::Ed25519, "combined")?;
    let other_dir = TempDir::new().unwrap();
    let other_ca = create_ca(other_dir.path(), KeyAlgorithm::Ed25519, "combined")?;

    let server = PemLayout::combined(temp_dir.path().join("server.pem"));
    generate_endpoint_certificate(&endpoint_request(KeyAlgorithm::Ed25519), &ca, &server)?;

    let result = ping_pong(
        server_config(&server, None),
        client_config(&other_ca, None),
        "localhost",
    );
    assert!(result.is_err());

    Ok(())
}

#[test]
fn test_handshake_fails_for_name_not_in_certificate() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let ca = create_ca(temp_dir.path(), KeyAlgorithm::Ed25519, "combined")?;

    let server = PemLayout::combined(temp_dir.path().join("server.pem"));
    generate_endpoint_certificate(&endpoint_request(KeyAlgorithm::Ed25519), &ca, &server)?;

    let result = ping_pong(
        server_config(&server, None),
        client_config(&ca, None),
        "example.com",
    );
    assert!(result.is_err());

    Ok(())
}

#[test]
fn test_written_certificate_matches_returned_certificate() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let ca = create_ca(temp_dir.path(), KeyAlgorithm::Rsa, "split")?;

    let endpoint = PemLayout::combined(temp_dir.path().join("server.pem"));
    let issued =
        generate_endpoint_certificate(&endpoint_request(KeyAlgorithm::Ed25519), &ca, &endpoint)?;

    assert_eq!(inspect_file(endpoint.cert_path())?, issued.summary()?);

    let contents = fs::read_to_string(endpoint.cert_path())?;
    assert!(contents.starts_with(&issued.cert_pem));
    assert!(contents.contains(&issued.key_pem));

    Ok(())
}

#[test]
fn test_test_ca_loopback_exchange() -> Result<()> {
    let hour = Duration::from_secs(3600);
    let temp_dir = TempDir::new().unwrap();

    let ca = PemLayout::combined(temp_dir.path().join("ca.pem"));
    let ca_request = CaRequest::new(
        KeyAlgorithm::Ed25519,
        SubjectName::new().common_name("Test CA").organization("Test CA"),
        hour,
    );
    let ca_summary = generate_ca_certificate(&ca_request, &ca)?.summary()?;

    assert!(ca_summary.is_ca);
    assert!(ca_summary.is_self_issued());
    assert!(ca_summary.subject.contains("Test CA"));
    assert_eq!(ca_summary.not_after - ca_summary.not_before, hour.as_secs());

    let endpoint = PemLayout::combined(temp_dir.path().join("endpoint.pem"));
    let request = EndpointRequest::new(
        KeyAlgorithm::Ed25519,
        SubjectName::new().organization("Test Endpoint"),
        hour,
    )
    .dns_names(["localhost", "localhost6"])
    .ip_addresses(["127.0.0.1".parse().unwrap(), "::1".parse().unwrap()]);
    let summary = generate_endpoint_certificate(&request, &ca, &endpoint)?.summary()?;

    assert!(!summary.is_ca);
    assert_eq!(summary.issuer, ca_summary.subject);
    assert_eq!(summary.dns_names, vec!["localhost", "localhost6"]);
    assert_eq!(
        summary.ip_addresses,
        vec![
            "127.0.0.1".parse::<IpAddr>().unwrap(),
            "::1".parse::<IpAddr>().unwrap()
        ]
    );
    assert_eq!(summary.not_after - summary.not_before, hour.as_secs());

    for server_name in ["localhost", "127.0.0.1"] {
        let result = ping_pong(
            server_config(&endpoint, None),
            client_config(&ca, None),
            server_name,
        );
        assert!(result.is_ok(), "exchange as {} failed: {:?}", server_name, result);
    }

    Ok(())
}

#[test]
fn test_empty_subject_alt_names_write_nothing() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let ca = create_ca(temp_dir.path(), KeyAlgorithm::Ed25519, "combined")?;
    let endpoint = PemLayout::split(
        temp_dir.path().join("cert.pem"),
        temp_dir.path().join("key.pem"),
    );

    let request = EndpointRequest::new(
        KeyAlgorithm::Ed25519,
        SubjectName::new().organization("Test Endpoint"),
        DAY,
    );
    let result = generate_endpoint_certificate(&request, &ca, &endpoint);

    assert!(matches!(result, Err(IcertError::InvalidSubjectAltNames(_))));
    assert!(!endpoint.cert_path().exists());
    assert!(!endpoint.key_path().exists());

    Ok(())
}

#[test]
fn test_unsupported_algorithm_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let output = PemLayout::combined(temp_dir.path().join("ca.pem"));

    let result = "dsa".parse::<KeyAlgorithm>().and_then(|algorithm| {
        let request = CaRequest::new(algorithm, SubjectName::new().organization("Test CA"), DAY);
        generate_ca_certificate(&request, &output)
    });

    match result {
        Err(IcertError::UnsupportedAlgorithm(tag)) => assert_eq!(tag, "dsa"),
        other => panic!("Expected UnsupportedAlgorithm, got {:?}", other),
    }
    assert!(!output.cert_path().exists());
}

#[test]
fn test_serial_numbers_differ_across_runs() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let ca = create_ca(temp_dir.path(), KeyAlgorithm::Ed25519, "combined")?;

    let first = generate_endpoint_certificate(
        &endpoint_request(KeyAlgorithm::Ed25519),
        &ca,
        &PemLayout::combined(temp_dir.path().join("first.pem")),
    )?
    .summary()?;
    let second = generate_endpoint_certificate(
        &endpoint_request(KeyAlgorithm::Ed25519),
        &ca,
        &PemLayout::combined(temp_dir.path().join("second.pem")),
    )?
    .summary()?;

    assert_ne!(first.serial_hex, second.serial_hex);
    assert_ne!(first.public_key_hex, second.public_key_hex);

    Ok(())
}

#[test]
fn test_ca_key_mismatch() -> Result<()> {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let first = create_ca(first_dir.path(), KeyAlgorithm::Rsa, "split")?;
    let second = create_ca(second_dir.path(), KeyAlgorithm::Ed25519, "split")?;

    let mixed = PemLayout::split(first.cert_path(), second.key_path());
    let endpoint = PemLayout::combined(first_dir.path().join("server.pem"));
    let request = endpoint_request(KeyAlgorithm::Rsa);
    let result = generate_endpoint_certificate(&request, &mixed, &endpoint);

    assert!(matches!(result, Err(IcertError::CaLoadFailed { .. })));
    assert!(!endpoint.cert_path().exists());

    Ok(())
}

#[cfg(unix)]
#[test]
fn test_file_permissions() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let ca = create_ca(temp_dir.path(), KeyAlgorithm::Ed25519, "split")?;

    let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode(ca.cert_path()), 0o644);
    assert_eq!(mode(ca.key_path()), 0o600);

    let combined = PemLayout::combined(temp_dir.path().join("server.pem"));
    generate_endpoint_certificate(&endpoint_request(KeyAlgorithm::Ed25519), &ca, &combined)?;
    assert_eq!(mode(combined.cert_path()), 0o600);

    Ok(())
}

#[test]
fn test_cli_workflow() {
    use std::process::Command;

    let temp_dir = TempDir::new().unwrap();
    let ca = temp_dir.path().join("ca.pem");
    let cert = temp_dir.path().join("cert.pem");
    let key = temp_dir.path().join("key.pem");

    let status = Command::new(env!("CARGO_BIN_EXE_icert"))
        .args(["ca", "--subject", "CN=Test CA,O=Test Org", "--ttl-hours", "24", "--cert"])
        .arg(&ca)
        .status()
        .unwrap();
    assert!(status.success());

    let status = Command::new(env!("CARGO_BIN_EXE_icert"))
        .args(["endpoint", "--algorithm", "rsa", "--subject", "O=Test Endpoint"])
        .args(["--dns", "localhost", "--ip", "127.0.0.1", "--ca-cert"])
        .arg(&ca)
        .arg("--cert")
        .arg(&cert)
        .arg("--key")
        .arg(&key)
        .status()
        .unwrap();
    assert!(status.success());

    let output = Command::new(env!("CARGO_BIN_EXE_icert"))
        .args(["show", "--json", "--cert"])
        .arg(&cert)
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["key_algorithm"], "rsa");
    assert_eq!(summary["dns_names"][0], "localhost");
    assert_eq!(summary["ip_addresses"][0], "127.0.0.1");
    assert_eq!(summary["is_ca"], false);

    let status = Command::new(env!("CARGO_BIN_EXE_icert"))
        .args(["endpoint", "--subject", "O=Test Endpoint", "--ca-cert"])
        .arg(&ca)
        .arg("--cert")
        .arg(temp_dir.path().join("nosan.pem"))
        .status()
        .unwrap();
    assert!(!status.success());
    assert!(!temp_dir.path().join("nosan.pem").exists());
}
