use std::fmt;

/// A value that was either recognized as a known variant `T`, or is an
/// unrecognized raw value `Raw` (a shader name nobody maps, an image type byte
/// no decoder handles, an entry tag from a newer writer).
///
/// This is conceptually similar to `Result<T, Raw>`, but the "error" isn't
/// really an error: the raw value is kept so callers can fall back to a
/// default or report exactly what they saw.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Recognized<T, Raw = String> {
    Known(T),
    Unknown(Raw),
}

impl<T: Copy, Raw: Copy> Copy for Recognized<T, Raw> {}

impl<T, Raw> Recognized<T, Raw> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Recognized::Known(t) => Some(t),
            Recognized::Unknown(_) => None,
        }
    }

    pub fn unknown(&self) -> Option<&Raw> {
        match self {
            Recognized::Known(_) => None,
            Recognized::Unknown(raw) => Some(raw),
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Recognized::Known(_))
    }

    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Recognized::Known(t) => t,
            Recognized::Unknown(_) => default,
        }
    }

    pub fn ok_or_else<E, F: FnOnce(Raw) -> E>(self, f: F) -> Result<T, E> {
        match self {
            Recognized::Known(t) => Ok(t),
            Recognized::Unknown(raw) => Err(f(raw)),
        }
    }
}

impl<T, Raw> From<T> for Recognized<T, Raw> {
    fn from(value: T) -> Self {
        Recognized::Known(value)
    }
}

impl<T: fmt::Debug, Raw: fmt::Display> fmt::Display for Recognized<T, Raw> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recognized::Known(t) => write!(f, "{t:?}"),
            Recognized::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_falls_back_to_default() {
        let value: Recognized<u8, String> = Recognized::Unknown("Legacy/Shader".to_string());
        assert!(!value.is_known());
        assert_eq!(value.unknown().map(String::as_str), Some("Legacy/Shader"));
        assert_eq!(value.unwrap_or(7), 7);
    }

    #[test]
    fn display_marks_unknown_values() {
        let known: Recognized<u8, i32> = Recognized::Known(3);
        let unknown: Recognized<u8, i32> = Recognized::Unknown(-4);
        assert_eq!(known.to_string(), "3");
        assert_eq!(unknown.to_string(), "unknown(-4)");
    }
}
