//! Navigation port: where the client currently is and how to send it to the login page.

// self
use crate::_prelude::*;

/// Current location as seen by the host application.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
	/// Absolute path, e.g. `/orders/42`.
	pub path: String,
	/// Query string without the leading `?`.
	pub query: Option<String>,
}
impl Location {
	/// Creates a location from a path without a query.
	pub fn new(path: impl Into<String>) -> Self {
		Self { path: path.into(), query: None }
	}

	/// Parses `/path?query` into its components.
	pub fn parse(value: &str) -> Self {
		let value = value.split('#').next().unwrap_or_default();

		match value.split_once('?') {
			Some((path, query)) =>
				Self { path: path.into(), query: (!query.is_empty()).then(|| query.into()) },
			None => Self::new(value),
		}
	}

	/// Path plus `?query` when a query is present.
	pub fn path_and_query(&self) -> String {
		match &self.query {
			Some(query) => format!("{}?{query}", self.path),
			None => self.path.clone(),
		}
	}
}
impl Display for Location {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.path_and_query())
	}
}

/// Host hook for reading the location and performing navigations.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Returns the current location, or `None` outside an interactive context.
	fn location(&self) -> Option<Location>;

	/// Navigates to `target`. Called at most once per terminal auth failure.
	fn navigate(&self, target: &str);
}
impl Debug for dyn Navigator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Navigator").field("location", &self.location()).finish()
	}
}

/// Navigator that tracks location in memory and records every navigation.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
	location: RwLock<Option<Location>>,
	history: Mutex<Vec<String>>,
}
impl MemoryNavigator {
	/// Starts at `path` (which may carry a query string).
	pub fn at(path: &str) -> Self {
		Self { location: RwLock::new(Some(Location::parse(path))), history: Default::default() }
	}

	/// Navigator without a location, as in a server-side context.
	pub fn detached() -> Self {
		Self::default()
	}

	/// Moves to `path` without recording a navigation.
	pub fn set_location(&self, path: &str) {
		*self.location.write() = Some(Location::parse(path));
	}

	/// Every navigation performed so far, oldest first.
	pub fn history(&self) -> Vec<String> {
		self.history.lock().clone()
	}

	/// The most recent navigation, if any.
	pub fn last_navigation(&self) -> Option<String> {
		self.history.lock().last().cloned()
	}
}
impl Navigator for MemoryNavigator {
	fn location(&self) -> Option<Location> {
		self.location.read().clone()
	}

	fn navigate(&self, target: &str) {
		self.history.lock().push(target.to_owned());
		*self.location.write() = Some(Location::parse(target));
	}
}
