//! Generic CRUD surface over the API's resource collections.
//!
//! Each collection is described by a [`ResourceDescriptor`]: its path (e.g. `/Tickets`), the key
//! its entities are wrapped under (e.g. `tickets`), and a label used in error messages. Writes
//! follow the API convention of POSTing a single-element array to the collection path, with
//! updates carrying the entity `id` inside the payload.

// crates.io
use serde::de::IgnoredAny;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
	pagination::{Page, PagedSequence},
	request::{Query, RequestOptions, RequestOrchestrator},
};

/// Static description of one resource collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceDescriptor {
	/// Collection path relative to `/api`, e.g. `/Tickets`.
	pub path: &'static str,
	/// Key wrapping entity arrays in responses, e.g. `tickets`.
	pub items_key: &'static str,
	/// Singular label used in error messages, e.g. `Ticket`.
	pub label: &'static str,
}
impl ResourceDescriptor {
	/// Ticket actions (notes, emails, time entries).
	pub const ACTIONS: Self = Self::new("/Actions", "actions", "Action");
	/// Agents (technicians).
	pub const AGENTS: Self = Self::new("/Agent", "agents", "Agent");
	/// Calendar appointments.
	pub const APPOINTMENTS: Self = Self::new("/Appointment", "appointments", "Appointment");
	/// Assets (configuration items).
	pub const ASSETS: Self = Self::new("/Asset", "assets", "Asset");
	/// Clients (customer companies).
	pub const CLIENTS: Self = Self::new("/Client", "clients", "Client");
	/// Contacts (end users).
	pub const CONTACTS: Self = Self::new("/Users", "users", "Contact");
	/// Client contracts.
	pub const CONTRACTS: Self = Self::new("/ClientContract", "contracts", "Contract");
	/// Invoices.
	pub const INVOICES: Self = Self::new("/Invoice", "invoices", "Invoice");
	/// Products and services.
	pub const ITEMS: Self = Self::new("/Item", "items", "Item");
	/// Sales opportunities.
	pub const OPPORTUNITIES: Self = Self::new("/Opportunities", "opportunities", "Opportunity");
	/// Projects.
	pub const PROJECTS: Self = Self::new("/Projects", "projects", "Project");
	/// Quotations.
	pub const QUOTES: Self = Self::new("/Quotation", "quotations", "Quote");
	/// Client sites.
	pub const SITES: Self = Self::new("/Site", "sites", "Site");
	/// Suppliers.
	pub const SUPPLIERS: Self = Self::new("/Supplier", "suppliers", "Supplier");
	/// Agent teams.
	pub const TEAMS: Self = Self::new("/Team", "teams", "Team");
	/// Tickets.
	pub const TICKETS: Self = Self::new("/Tickets", "tickets", "Ticket");

	/// Describes a collection not covered by the built-in constants.
	pub const fn new(path: &'static str, items_key: &'static str, label: &'static str) -> Self {
		Self { path, items_key, label }
	}

	/// Path of one entity, e.g. `/Tickets/42`.
	pub fn entity_path(&self, id: u64) -> String {
		format!("{}/{id}", self.path)
	}
}

/// Handle for CRUD calls against one collection.
#[derive(Clone, Debug)]
pub struct Resource {
	orchestrator: Arc<RequestOrchestrator>,
	descriptor: ResourceDescriptor,
}
impl Resource {
	/// Binds a descriptor to an orchestrator.
	pub fn new(orchestrator: Arc<RequestOrchestrator>, descriptor: ResourceDescriptor) -> Self {
		Self { orchestrator, descriptor }
	}

	/// Descriptor this handle targets.
	pub fn descriptor(&self) -> ResourceDescriptor {
		self.descriptor
	}

	/// Fetches a single page; `query` carries `page_size`/`page_no` and filters as given.
	pub async fn list<T>(&self, query: &Query) -> Result<Page<T>>
	where
		T: DeserializeOwned,
	{
		let path = self.descriptor.path;
		let value: Value =
			self.orchestrator.request(path, RequestOptions::get().queries(query)).await?;

		Page::from_value(value, self.descriptor.items_key).map_err(|source| {
			TransportError::MalformedPage { path: path.to_owned(), source }.into()
		})
	}

	/// Lazy traversal of every matching entity.
	pub fn list_all<T>(&self, filters: &Query) -> PagedSequence<T>
	where
		T: DeserializeOwned,
	{
		PagedSequence::new(
			Arc::clone(&self.orchestrator),
			self.descriptor.path,
			self.descriptor.items_key,
		)
		.with_filters(filters)
	}

	/// Fetches one entity; fails with [`Error::NotFound`] when the response holds none.
	pub async fn get<T>(&self, id: u64) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let path = self.descriptor.entity_path(id);
		let value: Value = self.orchestrator.request(&path, RequestOptions::get()).await?;

		match first_entity(value, self.descriptor.items_key) {
			Ok(Some(entity)) => decode_entity(&path, entity),
			Ok(None) => Err(Error::NotFound {
				message: format!("{} {id} not found", self.descriptor.label),
				payload: None,
			}),
			Err(payload) =>
				Err(TransportError::EmptyResult {
					path,
					items_key: self.descriptor.items_key.into(),
					payload: Some(payload),
				}
				.into()),
		}
	}

	/// Creates one entity and returns the stored representation.
	pub async fn create<T, D>(&self, data: &D) -> Result<T>
	where
		T: DeserializeOwned,
		D: ?Sized + Serialize,
	{
		let body = serde_json::to_value(data).map_err(ConfigError::from)?;

		self.write(body).await
	}

	/// Updates one entity; `id` is merged into the payload, which must be a JSON object.
	pub async fn update<T, D>(&self, id: u64, data: &D) -> Result<T>
	where
		T: DeserializeOwned,
		D: ?Sized + Serialize,
	{
		let Value::Object(mut body) = serde_json::to_value(data).map_err(ConfigError::from)? else {
			return Err(ConfigError::UpdateNotObject.into());
		};

		body.insert("id".into(), Value::from(id));

		self.write(Value::Object(body)).await
	}

	/// Deletes one entity, ignoring any response body.
	pub async fn delete(&self, id: u64) -> Result<()> {
		let _: IgnoredAny = self
			.orchestrator
			.request(&self.descriptor.entity_path(id), RequestOptions::delete())
			.await?;

		Ok(())
	}

	async fn write<T>(&self, entity: Value) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let path = self.descriptor.path;
		let options = RequestOptions::post().json(Value::Array(vec![entity]));
		let value: Value = self.orchestrator.request(path, options).await?;

		match first_entity(value, self.descriptor.items_key) {
			Ok(Some(entity)) => decode_entity(path, entity),
			Ok(None) | Err(_) => Err(TransportError::EmptyResult {
				path: path.to_owned(),
				items_key: self.descriptor.items_key.into(),
				payload: None,
			}
			.into()),
		}
	}
}

/// Extracts the first entity of `{ <items_key>: [...] }`.
///
/// A bare object without `items_key` is treated as the entity itself. Returns `Err` with the
/// original value when the shape is unrecognized.
fn first_entity(value: Value, items_key: &str) -> Result<Option<Value>, Value> {
	match value {
		Value::Object(mut object) => match object.remove(items_key) {
			Some(Value::Array(items)) => Ok(items.into_iter().next()),
			Some(other) => {
				object.insert(items_key.into(), other);

				Err(Value::Object(object))
			},
			None if object.is_empty() => Ok(None),
			None => Ok(Some(Value::Object(object))),
		},
		Value::Array(items) => Ok(items.into_iter().next()),
		Value::Null => Ok(None),
		other => Err(other),
	}
}

fn decode_entity<T>(path: &str, entity: Value) -> Result<T>
where
	T: DeserializeOwned,
{
	serde_path_to_error::deserialize(entity).map_err(|source| {
		TransportError::Decode { path: path.to_owned(), status: 200, source }.into()
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn descriptors_build_entity_paths() {
		assert_eq!(ResourceDescriptor::TICKETS.entity_path(42), "/Tickets/42");
		assert_eq!(ResourceDescriptor::CONTACTS.items_key, "users");
		assert_eq!(ResourceDescriptor::new("/KBArticle", "articles", "Article").path, "/KBArticle");
	}

	#[test]
	fn first_entity_accepts_wrapped_bare_and_empty_shapes() {
		assert_eq!(
			first_entity(json!({ "tickets": [{ "id": 1 }, { "id": 2 }] }), "tickets"),
			Ok(Some(json!({ "id": 1 })))
		);
		assert_eq!(first_entity(json!({ "tickets": [] }), "tickets"), Ok(None));
		assert_eq!(first_entity(json!({ "id": 7 }), "tickets"), Ok(Some(json!({ "id": 7 }))));
		assert_eq!(first_entity(json!([{ "id": 3 }]), "tickets"), Ok(Some(json!({ "id": 3 }))));
		assert_eq!(first_entity(json!({}), "tickets"), Ok(None));
		assert_eq!(first_entity(Value::Null, "tickets"), Ok(None));
		assert!(first_entity(json!({ "tickets": 5 }), "tickets").is_err());
		assert!(first_entity(json!("text"), "tickets").is_err());
	}
}
