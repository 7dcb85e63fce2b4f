//! TLS termination for webhook listeners.
//!
//! - [`AllowList`]: IPv4 hosts and subnets allowed to connect
//! - [`TlsIdentity`]: certificate chain plus optional private key
//! - [`TlsAcceptor`]: applies both to each accepted TCP connection

mod acceptor;
mod allow_list;
mod identity;

pub use acceptor::{DEFAULT_HANDSHAKE_TIMEOUT, MaybeTlsStream, TlsAcceptor};
pub use allow_list::{AllowEntry, AllowEntryError, AllowList, Subnet};
pub use identity::{
    TlsIdentity, common_name, parse_certificates, parse_private_key, read_pem_file,
};
pub use rustls::pki_types::{CertificateDer, PrivateKeyDer};

#[cfg(test)]
pub(crate) use identity::test_support;
