//! # Kernel kinds
//!
//! Every kernel basename carries an extension that fixes its [`Kind`] for the lifetime of
//! the process. The kind decides which per-kind precedence list a file lands in when it is
//! furnished, which inspection path the metadata store takes (binary object enumeration vs.
//! text keyword scanning), and which files can be grouped together in a set or stack.
//!
//! The variants mirror the standard SPICE kernel families; [`Kind::ALL`] lists them in
//! canonical metakernel load order.

use std::fmt;

use crate::spicerack_errors::{Result, SpiceRackError};

/// The fixed category of a kernel basename, derived from its file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    /// Metakernel, a text file listing other kernels to load.
    Meta,
    /// Leapseconds kernel; applies to every identifier and all times.
    Lsk,
    /// Frames kernel.
    Fk,
    /// Instrument kernel.
    Ik,
    /// Planetary constants kernel, text or binary.
    Pck,
    /// Digital shape kernel.
    Dsk,
    /// Spacecraft clock kernel.
    Sclk,
    /// Pointing (attitude) kernel.
    Ck,
    /// Ephemeris kernel.
    Spk,
    /// Star catalog.
    Star,
}

impl Kind {
    /// Every kind, in canonical metakernel load order.
    pub const ALL: [Kind; 10] = [
        Kind::Meta,
        Kind::Lsk,
        Kind::Fk,
        Kind::Ik,
        Kind::Pck,
        Kind::Dsk,
        Kind::Sclk,
        Kind::Ck,
        Kind::Spk,
        Kind::Star,
    ];

    /// The kind associated with a file extension (leading dot, any case), if recognized.
    ///
    /// A `.txt` file is only a *candidate* metakernel; the registry demotes it when its
    /// content lacks a `KERNELS_TO_LOAD` assignment.
    pub fn from_extension(ext: &str) -> Option<Kind> {
        match ext.to_ascii_lowercase().as_str() {
            ".bc" => Some(Kind::Ck),
            ".bdb" => Some(Kind::Star),
            ".bds" => Some(Kind::Dsk),
            ".bpc" => Some(Kind::Pck),
            ".bsp" => Some(Kind::Spk),
            ".tf" => Some(Kind::Fk),
            ".ti" => Some(Kind::Ik),
            ".tls" => Some(Kind::Lsk),
            ".tm" => Some(Kind::Meta),
            ".tpc" => Some(Kind::Pck),
            ".tsc" => Some(Kind::Sclk),
            ".txt" => Some(Kind::Meta),
            _ => None,
        }
    }

    /// The kind of a basename, or an error if the extension is not recognized.
    pub fn from_basename(basename: &str) -> Result<Kind> {
        Kind::from_extension(&extension_of(basename))
            .ok_or_else(|| SpiceRackError::UnknownExtension(basename.to_string()))
    }

    /// The kind a regular expression pattern implies through its trailing extension,
    /// if any can be inferred.
    pub fn from_pattern(pattern: &str) -> Option<Kind> {
        Kind::from_extension(&extension_of(pattern))
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Meta => "META",
            Kind::Lsk => "LSK",
            Kind::Fk => "FK",
            Kind::Ik => "IK",
            Kind::Pck => "PCK",
            Kind::Dsk => "DSK",
            Kind::Sclk => "SCLK",
            Kind::Ck => "CK",
            Kind::Spk => "SPK",
            Kind::Star => "STAR",
        };
        write!(f, "{name}")
    }
}

/// The extension of a basename or pattern, with its leading dot, lowercased.
pub fn extension_of(basename: &str) -> String {
    match basename.rfind('.') {
        Some(i) => basename[i..].to_ascii_lowercase(),
        None => String::new(),
    }
}

/// True if this extension denotes a text kernel (`.t*`), false for binary (`.b*`).
pub fn extension_is_text(ext: &str) -> bool {
    ext.as_bytes().get(1) == Some(&b't') || ext.as_bytes().get(1) == Some(&b'T')
}

/// True if this string looks like a literal kernel basename rather than a match pattern:
/// only word characters, dashes, and dots, ending in a recognized extension.
pub fn is_basename(text: &str) -> bool {
    if Kind::from_extension(&extension_of(text)).is_none() {
        return false;
    }
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod kinds_test {
    use super::*;

    #[test]
    fn extension_mapping() {
        assert_eq!(Kind::from_extension(".bsp"), Some(Kind::Spk));
        assert_eq!(Kind::from_extension(".BSP"), Some(Kind::Spk));
        assert_eq!(Kind::from_extension(".tpc"), Some(Kind::Pck));
        assert_eq!(Kind::from_extension(".bpc"), Some(Kind::Pck));
        assert_eq!(Kind::from_extension(".dat"), None);
    }

    #[test]
    fn basename_kind_and_errors() {
        assert_eq!(Kind::from_basename("naif0012.tls").unwrap(), Kind::Lsk);
        assert!(Kind::from_basename("readme.md").is_err());
    }

    #[test]
    fn text_vs_binary() {
        assert!(extension_is_text(".tls"));
        assert!(!extension_is_text(".bsp"));
    }

    #[test]
    fn basename_detection() {
        assert!(is_basename("sat337.bsp"));
        assert!(is_basename("cas_v40.tf"));
        assert!(!is_basename(r"sat\d+\.bsp"));
        assert!(!is_basename("sat337"));
    }
}
