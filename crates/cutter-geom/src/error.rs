use thiserror::Error;

/// Errors raised while decoding, encoding or operating on geometries.
#[derive(Debug, Error)]
pub enum GeomError {
    #[error("truncated geometry blob: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("unsupported byte order marker: {0:#04x}")]
    UnsupportedByteOrder(u8),

    #[error("unknown geometry type code: {0}")]
    UnknownGeometryType(u32),

    #[error("geometry blob has {0} trailing bytes")]
    TrailingBytes(usize),

    #[error("nested geometry of type {found} is not allowed inside {container}")]
    UnexpectedMember {
        container: &'static str,
        found: &'static str,
    },

    #[error("ordinate count mismatch: expected {expected}, got {actual}")]
    OrdinateMismatch { expected: usize, actual: usize },

    #[error("WKT parse error: {0}")]
    Wkt(String),

    #[error("geometry collections nested deeper than {0} levels")]
    NestingTooDeep(usize),
}

pub type Result<T> = std::result::Result<T, GeomError>;
