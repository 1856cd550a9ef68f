//! Tag identity URI resolution.
//!
//! Converting a raw EPC into its pure-identity and tag-encoding URIs needs
//! the tag data translation tables, which live outside this crate. Adapters
//! call a resolver with the binary form of the EPC and attach whatever it
//! returns. Unprogrammed or unknown tags fail to resolve all the time, so a
//! failure is logged at debug and the tag is still delivered.

use tagwire_core::TagBuilder;
use tracing::debug;

/// URIs derived from an EPC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub pure_identity_uri: String,
    pub tag_encoding_uri: String,
}

/// Translates an EPC into its identity URIs.
pub trait IdentityResolver: Send + Sync {
    /// Resolve the EPC given as a binary digit string.
    ///
    /// Returns a description of the failure when the EPC does not decode.
    fn resolve(&self, binary: &str) -> Result<ResolvedIdentity, String>;
}

/// Resolver that never knows any URI.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unresolved;

impl IdentityResolver for Unresolved {
    fn resolve(&self, _binary: &str) -> Result<ResolvedIdentity, String> {
        Err("no tag data translation configured".into())
    }
}

/// Attach the resolved URIs to `builder`, leaving them empty on failure.
pub(crate) fn apply(resolver: &dyn IdentityResolver, builder: TagBuilder) -> TagBuilder {
    match resolver.resolve(&builder.binary()) {
        Ok(identity) => builder
            .pure_identity_uri(identity.pure_identity_uri)
            .tag_encoding_uri(identity.tag_encoding_uri),
        Err(e) => {
            debug!("Tag decoding error: {}", e);
            builder
        }
    }
}
