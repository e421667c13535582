//! Leaf values

/// The value bound to a key: either present bytes or absent.
///
/// An empty byte string is a legitimate present value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    /// The key holds these bytes
    Present(Vec<u8>),
    /// No value is bound to the key
    Absent,
}

impl Value {
    /// Whether a value is present
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Borrow the bytes of a present value
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => None,
        }
    }

    /// Convert into an `Option`
    pub fn into_option(self) -> Option<Vec<u8>> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => None,
        }
    }
}

impl From<Option<Vec<u8>>> for Value {
    fn from(value: Option<Vec<u8>>) -> Self {
        value.map_or(Self::Absent, Self::Present)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Present(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::Present(value.to_vec())
    }
}
