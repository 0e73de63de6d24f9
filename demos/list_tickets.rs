//! Demonstrates authenticating, paging through tickets, and creating one against a mock tenant.
//!
//! The mock server stands in for `https://{tenant}.halopsa.com`; swap `base_url` for `tenant` to
//! talk to a real instance.

// crates.io
use color_eyre::Result;
use futures::TryStreamExt;
use httpmock::prelude::*;
use serde::Deserialize;
use serde_json::json;
// self
use halopsa_client::{HaloClient, config::ClientConfig, request::Query};

#[derive(Debug, Deserialize)]
struct Ticket {
	id: u64,
	summary: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let first_page = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/Tickets").query_param("page_no", "1");
			then.status(200).header("content-type", "application/json").body(
				r#"{"record_count":3,"tickets":[{"id":1,"summary":"VPN down"},{"id":2,"summary":"New starter"}]}"#,
			);
		})
		.await;
	let second_page = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/Tickets").query_param("page_no", "2");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"record_count":3,"tickets":[{"id":3,"summary":"Printer jam"}]}"#);
		})
		.await;
	let create = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/Tickets");
			then.status(201)
				.header("content-type", "application/json")
				.body(r#"{"tickets":[{"id":4,"summary":"Monitor flicker"}]}"#);
		})
		.await;
	let config = ClientConfig::builder("demo-client", "demo-secret")
		.base_url(server.base_url())
		.build()?;
	let client = HaloClient::new(config)?;
	let tickets = client.tickets();
	let open = tickets.list_all::<Ticket>(&Query::new().with("open_only", true)).with_page_size(2);
	let mut stream = std::pin::pin!(open.stream());

	while let Some(ticket) = stream.try_next().await? {
		println!("Ticket #{}: {}.", ticket.id, ticket.summary);
	}

	let created: Ticket = tickets.create(&json!({ "summary": "Monitor flicker" })).await?;
	let status = client.rate_limit_status();

	println!("Created ticket #{} ({}).", created.id, created.summary);
	println!("{} requests left in the current window.", status.remaining);

	token_mock.assert_async().await;
	first_page.assert_async().await;
	second_page.assert_async().await;
	create.assert_async().await;

	Ok(())
}
