//! Credential material that must not leak through formatting.

// self
use crate::_prelude::*;

const MASK: &str = "***";

/// Client secret or bearer token.
///
/// Clones share one allocation, since the cached credential is handed to every request. Both
/// `Debug` and `Display` print a fixed mask; only [`expose`](Self::expose) yields the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Arc<str>);
impl Secret {
	/// Takes ownership of `value`.
	pub fn new(value: impl Into<String>) -> Self {
		Self(Arc::from(value.into()))
	}

	/// Raw value for the wire. Never log it.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Whether the value is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl From<&str> for Secret {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}
impl From<String> for Secret {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}
impl Debug for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Secret({MASK})")
	}
}
impl Display for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(MASK)
	}
}
