/// An optional backend (OCR engine, element detection, device control,
/// confirmation signals). Callers branch on the unavailable case explicitly
/// instead of probing for libraries at the point of use.
#[derive(Debug)]
pub enum Capability<T> {
    Available(T),
    Unavailable { reason: String },
}

impl<T> Capability<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Capability::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }

    /// The reason this capability is missing, if it is.
    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Capability::Available(_) => None,
            Capability::Unavailable { reason } => Some(reason),
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for Capability<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Capability::Available(v),
            Err(e) => Capability::unavailable(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_result_keeps_error_text() {
        let cap: Capability<u8> = Err::<u8, _>("no display").into();
        assert!(!cap.is_available());
        assert_eq!(cap.unavailable_reason(), Some("no display"));
    }
}
