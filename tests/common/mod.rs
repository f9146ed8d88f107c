#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use certsweep::scan::Prober;
use chrono::{DateTime, TimeZone, Utc};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose,
    SerialNumber, date_time_ymd,
};
use rustls::{
    RootCertStore, ServerConfig, SupportedProtocolVersion,
    crypto::ring::default_provider,
    pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer},
    version::{TLS12, TLS13},
};
use std::{net::SocketAddr, sync::Arc};
use tokio::{io::AsyncReadExt, net::TcpListener, task::JoinHandle};
use tokio_rustls::TlsAcceptor;

pub const LEAF_HOST: &str = "localhost";
pub const LEAF_SERIAL: &str = "1001";

/// Root -> intermediate -> leaf, all generated for the test run
pub struct TestPki {
    pub root: CertificateDer<'static>,
    pub intermediate: CertificateDer<'static>,
    pub leaf: CertificateDer<'static>,
    pub leaf_key: PrivateKeyDer<'static>,
    pub expired_leaf: CertificateDer<'static>,
    pub expired_leaf_key: PrivateKeyDer<'static>,
}

/// `notAfter` of the valid leaf
pub fn leaf_not_after() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap()
}

fn ca_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params
}

fn leaf(
    issuer: &Certificate,
    issuer_key: &KeyPair,
    serial: Vec<u8>,
    validity: ((i32, u8, u8), (i32, u8, u8)),
) -> (CertificateDer<'static>, PrivateKeyDer<'static>) {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec![LEAF_HOST.to_string()]).unwrap();
    params.distinguished_name.push(DnType::CommonName, LEAF_HOST);
    params.serial_number = Some(SerialNumber::from(serial));

    let ((by, bm, bd), (ay, am, ad)) = validity;
    params.not_before = date_time_ymd(by, bm, bd);
    params.not_after = date_time_ymd(ay, am, ad);

    let cert = params.signed_by(&key, issuer, issuer_key).unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der()));
    (cert.der().clone(), key)
}

impl TestPki {
    pub fn generate() -> Self {
        let root_key = KeyPair::generate().unwrap();
        let root = ca_params("certsweep test root").self_signed(&root_key).unwrap();

        let intermediate_key = KeyPair::generate().unwrap();
        let intermediate = ca_params("certsweep test intermediate")
            .signed_by(&intermediate_key, &root, &root_key)
            .unwrap();

        let (leaf_cert, leaf_key) = leaf(
            &intermediate,
            &intermediate_key,
            vec![0x10, 0x01],
            ((2020, 1, 1), (2099, 1, 1)),
        );
        let (expired_leaf, expired_leaf_key) = leaf(
            &intermediate,
            &intermediate_key,
            vec![0x20, 0x02],
            ((2020, 1, 1), (2021, 1, 1)),
        );

        Self {
            root: root.der().clone(),
            intermediate: intermediate.der().clone(),
            leaf: leaf_cert,
            leaf_key,
            expired_leaf,
            expired_leaf_key,
        }
    }

    pub fn root_store(&self) -> RootCertStore {
        let mut store = RootCertStore::empty();
        store.add(self.root.clone()).unwrap();
        store
    }

    /// Prober that trusts only the generated root
    pub fn prober(&self) -> Prober {
        Prober::with_root_certificates(self.root_store()).unwrap()
    }

    pub fn full_chain(&self) -> Vec<CertificateDer<'static>> {
        vec![self.leaf.clone(), self.intermediate.clone()]
    }

    pub fn leaf_only(&self) -> Vec<CertificateDer<'static>> {
        vec![self.leaf.clone()]
    }

    pub fn expired_chain(&self) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
        (
            vec![self.expired_leaf.clone(), self.intermediate.clone()],
            self.expired_leaf_key.clone_key(),
        )
    }
}

/// TLS endpoint on 127.0.0.1 serving a fixed chain
pub struct TestServer {
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn serve(
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    versions: &[&'static SupportedProtocolVersion],
) -> TestServer {
    let config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
        .with_protocol_versions(versions)
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(mut tls) = acceptor.accept(stream).await {
                    // Hold the session until the client hangs up
                    let mut buf = [0_u8; 64];
                    let _ = tls.read(&mut buf).await;
                }
            });
        }
    });

    TestServer { addr, handle }
}

pub async fn serve_tls13(pki: &TestPki) -> TestServer {
    serve(pki.full_chain(), pki.leaf_key.clone_key(), &[&TLS13]).await
}

pub async fn serve_tls12(pki: &TestPki) -> TestServer {
    serve(pki.full_chain(), pki.leaf_key.clone_key(), &[&TLS12]).await
}

/// Accepts TCP connections and never speaks TLS
pub async fn serve_silent() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    TestServer { addr, handle }
}

/// A local port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
