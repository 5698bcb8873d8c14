use thiserror::Error;

pub type Asn1Result<T> = Result<T, Asn1Error>;

/// Error type for DER decoding.
///
/// `field` names the ASN.1 field that was being decoded when the problem was found.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Asn1Error {
    /// Structurally invalid tag, length or value
    #[error("Malformed encoding in {field}: {reason}")]
    MalformedEncoding { field: &'static str, reason: String },

    /// Valid encoding that this decoder does not implement (e.g. indefinite length)
    #[error("Unsupported encoding in {field}: {reason}")]
    UnsupportedEncoding { field: &'static str, reason: String },
}

impl Asn1Error {
    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedEncoding {
            field,
            reason: reason.into(),
        }
    }

    pub fn unsupported(field: &'static str, reason: impl Into<String>) -> Self {
        Self::UnsupportedEncoding {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the offending field
    pub fn field(&self) -> &'static str {
        match self {
            Self::MalformedEncoding { field, .. } | Self::UnsupportedEncoding { field, .. } => {
                field
            }
        }
    }

    /// Re-attribute the error to an enclosing field, keeping the reason.
    pub(crate) fn within(self, field: &'static str) -> Self {
        match self {
            Self::MalformedEncoding { field: inner, reason } => Self::MalformedEncoding {
                field,
                reason: format!("{inner}: {reason}"),
            },
            Self::UnsupportedEncoding { field: inner, reason } => Self::UnsupportedEncoding {
                field,
                reason: format!("{inner}: {reason}"),
            },
        }
    }
}
