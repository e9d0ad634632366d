//! sxd-document / sxd-xpath backend for xbind
//!
//! Documents are parsed with sxd-document and queries evaluated with
//! sxd-xpath (XPath 1.0).

pub mod document;
pub mod xpath;

pub use document::{XmlDocument, XmlNode};
pub use xpath::{SxdQuery, SxdXPathProcessor};

// Re-export key types for convenience
pub use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};

use xbind_core::{BindingConfig, XmlBinder};

/// Binder with its own registry over a default processor
pub fn new_binder() -> XmlBinder<SxdXPathProcessor> {
    XmlBinder::from_processor(SxdXPathProcessor::new())
}

pub fn new_binder_with_config(config: BindingConfig) -> XmlBinder<SxdXPathProcessor> {
    XmlBinder::with_config(SxdXPathProcessor::new(), config)
}
