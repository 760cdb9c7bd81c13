//! Collector trust anchor.
//!
//! The root certificate the broker's chain must verify against.  It is
//! embedded at build time from `PLANTNODE_TRUST_ANCHOR` (see `build.rs`),
//! PEM-encoded and NUL-terminated as mbedTLS expects, and lives for the
//! whole program.

use core::ffi::CStr;
use core::fmt;

use crate::error::CommsError;

static EMBEDDED: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/trust_anchor.pem"));

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Validated, NUL-terminated PEM certificate.
#[derive(Clone, Copy)]
pub struct TrustAnchor(&'static CStr);

impl TrustAnchor {
    /// The certificate baked into the firmware image.
    pub fn embedded() -> Result<Self, CommsError> {
        Self::from_pem(EMBEDDED)
    }

    /// Accept `bytes` if it holds a NUL-terminated PEM certificate.
    pub fn from_pem(bytes: &'static [u8]) -> Result<Self, CommsError> {
        let pem = CStr::from_bytes_until_nul(bytes).map_err(|_| CommsError::InvalidTrustAnchor)?;
        let text = pem.to_str().map_err(|_| CommsError::InvalidTrustAnchor)?;
        match (text.find(PEM_BEGIN), text.rfind(PEM_END)) {
            (Some(begin), Some(end)) if begin < end => Ok(Self(pem)),
            _ => Err(CommsError::InvalidTrustAnchor),
        }
    }

    pub fn as_cstr(&self) -> &'static CStr {
        self.0
    }

    /// PEM text without the terminator.
    pub fn as_str(&self) -> &'static str {
        self.0.to_str().unwrap_or_default()
    }
}

impl fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrustAnchor({} bytes)", self.0.to_bytes().len())
    }
}
