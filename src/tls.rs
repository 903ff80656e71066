//! Embedded trust roots
//!
//! S3 endpoints chain to Amazon Root CA 1, cross-signed by the Starfield
//! Services G2 root. Devices with an old or empty certificate store can trust
//! these two bundled roots instead of the system store.

/// Amazon Root CA 1 (RSA 2048)
pub const AMAZON_ROOT_CA_1: &str = include_str!("../certs/amazon-root-ca-1.pem");

/// Starfield Services Root Certificate Authority - G2
pub const STARFIELD_SERVICES_ROOT_CA_G2: &str =
    include_str!("../certs/starfield-services-root-ca-g2.pem");

/// Every bundled root, in PEM form
pub const EMBEDDED_ROOTS: &[&str] = &[AMAZON_ROOT_CA_1, STARFIELD_SERVICES_ROOT_CA_G2];

/// Point an AWS config loader at an HTTPS client that only trusts [`EMBEDDED_ROOTS`]
#[cfg(feature = "s3")]
pub fn with_embedded_roots(
    loader: aws_config::ConfigLoader,
) -> crate::error::Result<aws_config::ConfigLoader> {
    use aws_smithy_http_client::tls::{self, rustls_provider::CryptoMode, TlsContext, TrustStore};
    use aws_smithy_http_client::Builder;

    let trust_store = EMBEDDED_ROOTS
        .iter()
        .fold(TrustStore::empty().with_native_roots(false), |store, pem| {
            store.with_pem_certificate(pem.as_bytes())
        });

    let tls_context = TlsContext::builder()
        .with_trust_store(trust_store)
        .build()
        .map_err(|e| crate::error::FetcherError::Tls(e.to_string()))?;

    let http_client = Builder::new()
        .tls_provider(tls::Provider::Rustls(CryptoMode::AwsLc))
        .tls_context(tls_context)
        .build_https();

    Ok(loader.http_client(http_client))
}
