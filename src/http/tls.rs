use rustls::crypto::ring;
use rustls::{CipherSuite, ClientConfig, RootCertStore};
use std::sync::Arc;

/// Cipher suites offered to gateways. Everything else the provider knows is dropped.
pub const CIPHER_SUITES: &[CipherSuite] = &[
	CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
	CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
	CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
	CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
	CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
	CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
];

/// Builds the TLS configuration shared by every gateway client.
///
/// The protocol is pinned to TLS 1.2 on both ends and only [`CIPHER_SUITES`]
/// are negotiable. Server certificates are checked against the Mozilla root
/// program.
pub fn client_config() -> Result<ClientConfig, rustls::Error> {
	let mut provider = ring::default_provider();
	provider
		.cipher_suites
		.retain(|suite| CIPHER_SUITES.contains(&suite.suite()));

	let mut roots = RootCertStore::empty();
	roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

	let config = ClientConfig::builder_with_provider(Arc::new(provider))
		.with_protocol_versions(&[&rustls::version::TLS12])?
		.with_root_certificates(roots)
		.with_no_client_auth();

	Ok(config)
}
