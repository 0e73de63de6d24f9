//! Lazy, restartable traversal of paginated list endpoints.
//!
//! List endpoints answer `{ "record_count": N, "<items_key>": [...] }`. A [`PagedSequence`]
//! describes one such endpoint plus filters; every call to [`PagedSequence::stream`] starts a
//! fresh traversal at page 1 and fetches the next page only after the previous page's items
//! have been consumed.

// crates.io
use futures::{Stream, TryStreamExt, stream};
// self
use crate::{
	_prelude::*,
	error::TransportError,
	request::{Query, RequestOptions, RequestOrchestrator},
};

/// Page size used when none is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

const RESERVED_PARAMS: [&str; 3] = ["page_size", "page_no", "count"];

/// Shape violations in a list response.
#[derive(Debug, ThisError)]
pub enum PageError {
	/// The response body is not a JSON object.
	#[error("List response must be a JSON object.")]
	NotAnObject,
	/// `record_count` is present but not a non-negative integer.
	#[error("The `record_count` field must be a non-negative integer.")]
	InvalidRecordCount,
	/// The items entry is present but not an array.
	#[error("The `{items_key}` field must be an array.")]
	ItemsNotArray {
		/// Key the items were expected under.
		items_key: String,
	},
	/// An item does not match the requested type.
	#[error("Items under `{items_key}` could not be decoded.")]
	Items {
		/// Key the items were read from.
		items_key: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}

/// One fetched page.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
	/// Total matching records reported by the endpoint (`0` when omitted).
	pub total_count: u64,
	/// Items carried by this page.
	pub items: Vec<T>,
}
impl<T> Page<T>
where
	T: DeserializeOwned,
{
	/// Interprets a list response, reading items from `items_key`.
	///
	/// A missing `record_count` counts as zero and a missing items entry as an empty page.
	pub fn from_value(value: Value, items_key: &str) -> Result<Self, PageError> {
		let Value::Object(mut object) = value else {
			return Err(PageError::NotAnObject);
		};
		let total_count = match object.get("record_count") {
			None | Some(Value::Null) => 0,
			Some(count) => count.as_u64().ok_or(PageError::InvalidRecordCount)?,
		};
		let items = match object.remove(items_key) {
			None | Some(Value::Null) => Vec::new(),
			Some(items @ Value::Array(_)) => serde_path_to_error::deserialize(items)
				.map_err(|source| PageError::Items { items_key: items_key.to_owned(), source })?,
			Some(_) => return Err(PageError::ItemsNotArray { items_key: items_key.to_owned() }),
		};

		Ok(Self { total_count, items })
	}
}

/// Lazy sequence over every record of a list endpoint.
pub struct PagedSequence<T> {
	orchestrator: Arc<RequestOrchestrator>,
	path: String,
	items_key: String,
	filters: Query,
	page_size: u32,
	_item: PhantomData<fn() -> T>,
}
impl<T> PagedSequence<T>
where
	T: DeserializeOwned,
{
	/// Creates a sequence over `path`, reading items from `items_key`.
	pub fn new(
		orchestrator: Arc<RequestOrchestrator>,
		path: impl Into<String>,
		items_key: impl Into<String>,
	) -> Self {
		Self {
			orchestrator,
			path: path.into(),
			items_key: items_key.into(),
			filters: Query::new(),
			page_size: DEFAULT_PAGE_SIZE,
			_item: PhantomData,
		}
	}

	/// Overrides the page size (minimum 1).
	pub fn with_page_size(mut self, page_size: u32) -> Self {
		self.page_size = page_size.max(1);

		self
	}

	/// Adds one endpoint-specific filter.
	pub fn with_filter(mut self, key: impl Into<String>, value: impl Display) -> Self {
		self.filters.push(key, value);

		self
	}

	/// Adds every filter from `filters`.
	pub fn with_filters(mut self, filters: &Query) -> Self {
		self.filters.extend(filters);

		self
	}

	/// Configured page size.
	pub fn page_size(&self) -> u32 {
		self.page_size
	}

	/// Fetches a single page (1-based) with the configured filters.
	pub async fn page(&self, page_no: u32) -> Result<Page<T>> {
		let options = RequestOptions::get().queries(&self.page_query(page_no));
		let value: Value = self.orchestrator.request(&self.path, options).await?;

		Page::from_value(value, &self.items_key).map_err(|source| {
			TransportError::MalformedPage { path: self.path.clone(), source }.into()
		})
	}

	/// Starts a new traversal at page 1.
	///
	/// Items are yielded as soon as their page arrives. The traversal ends after a page with no
	/// items, once the yielded count reaches the first page's reported `record_count`, or after a
	/// page shorter than the page size. When the first page comes back shorter than requested
	/// while `record_count` reports more records, its length is taken as the server's page-size
	/// cap for the rest of the traversal. A failed fetch is yielded as the final element.
	pub fn stream(&self) -> impl Stream<Item = Result<T>> + '_ {
		stream::try_unfold(Cursor::new(), move |cursor| self.next_item(cursor))
	}

	/// Drains a full traversal into a vector.
	pub async fn collect_all(&self) -> Result<Vec<T>> {
		self.stream().try_collect().await
	}

	async fn next_item(&self, mut cursor: Cursor<T>) -> Result<Option<(T, Cursor<T>)>> {
		loop {
			if let Some(item) = cursor.pending.pop_front() {
				return Ok(Some((item, cursor)));
			}
			if cursor.finished {
				return Ok(None);
			}

			let page = self.page(cursor.next_page).await?;

			cursor.absorb(page, self.page_size);
		}
	}

	fn page_query(&self, page_no: u32) -> Query {
		let mut query = self
			.filters
			.iter()
			.filter(|(key, _)| !RESERVED_PARAMS.contains(key))
			.collect::<Query>();

		query.push("page_size", self.page_size);
		query.push("page_no", page_no);
		query.push("count", true);

		query
	}
}
impl<T> Clone for PagedSequence<T> {
	fn clone(&self) -> Self {
		Self {
			orchestrator: Arc::clone(&self.orchestrator),
			path: self.path.clone(),
			items_key: self.items_key.clone(),
			filters: self.filters.clone(),
			page_size: self.page_size,
			_item: PhantomData,
		}
	}
}
impl<T> Debug for PagedSequence<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PagedSequence")
			.field("path", &self.path)
			.field("items_key", &self.items_key)
			.field("filters", &self.filters)
			.field("page_size", &self.page_size)
			.finish()
	}
}

/// Per-traversal progress; dropped with the stream.
struct Cursor<T> {
	next_page: u32,
	total: Option<u64>,
	// Page length the server actually honors; fixed by the first page.
	page_limit: Option<u64>,
	fetched: u64,
	pending: VecDeque<T>,
	finished: bool,
}
impl<T> Cursor<T> {
	fn new() -> Self {
		Self {
			next_page: 1,
			total: None,
			page_limit: None,
			fetched: 0,
			pending: VecDeque::new(),
			finished: false,
		}
	}

	fn absorb(&mut self, page: Page<T>, page_size: u32) {
		let total = *self.total.get_or_insert(page.total_count);
		let received = page.items.len() as u64;
		// A short first page with more records reported means the server caps the page size.
		let page_limit = *self.page_limit.get_or_insert(match (total > received, received) {
			(true, 1..) => received.min(u64::from(page_size)),
			_ => u64::from(page_size),
		});

		self.next_page = self.next_page.saturating_add(1);
		self.fetched += received;

		// A zero total means the endpoint did not report one; rely on short pages instead.
		let complete = total > 0 && self.fetched >= total;

		self.finished = received == 0 || received < page_limit || complete;
		self.pending.extend(page.items);
	}
}
