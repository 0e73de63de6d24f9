// std
use std::pin::pin;
// crates.io
use futures::TryStreamExt;
use httpmock::prelude::*;
use serde::Deserialize;
use serde_json::Value;
// self
use halopsa_client::{_preludet::*, error::ErrorKind, request::Query};

async fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body(TEST_TOKEN, 360_000));
		})
		.await
}

#[derive(Debug, PartialEq, Deserialize)]
struct Ticket {
	id: u64,
	summary: String,
}

async fn mock_two_pages(
	server: &MockServer,
	page_size: u32,
) -> (httpmock::Mock<'_>, httpmock::Mock<'_>) {
	let page_size = page_size.to_string();
	let first = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/Tickets")
				.query_param("page_size", &page_size)
				.query_param("page_no", "1")
				.query_param("count", "true");
			then.status(200).header("content-type", "application/json").body(
				r#"{"record_count":75,"tickets":[{"id":1,"summary":"VPN down"},{"id":2,"summary":"New starter"}]}"#,
			);
		})
		.await;
	let second = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/Tickets")
				.query_param("page_size", &page_size)
				.query_param("page_no", "2")
				.query_param("count", "true");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"record_count":75,"tickets":[{"id":3,"summary":"Printer jam"}]}"#);
		})
		.await;

	(first, second)
}

#[tokio::test]
async fn traversal_stops_after_the_short_page() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let (first, second) = mock_two_pages(&server, 2).await;
	let client = build_test_client(&server.base_url());
	let tickets = client.paged::<Ticket>("/Tickets", "tickets").with_page_size(2);
	let collected = tickets.collect_all().await.expect("Traversal should succeed.");

	assert_eq!(collected.iter().map(|ticket| ticket.id).collect::<Vec<_>>(), [1, 2, 3]);
	assert_eq!(collected[2].summary, "Printer jam");

	first.assert_calls_async(1).await;
	second.assert_calls_async(1).await;
}

#[tokio::test]
async fn server_capped_pages_do_not_cut_the_traversal_short() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let (first, second) = mock_two_pages(&server, 50).await;
	let client = build_test_client(&server.base_url());
	let collected = client
		.tickets()
		.list_all::<Ticket>(&Query::new())
		.collect_all()
		.await
		.expect("Traversal should succeed.");

	assert_eq!(collected.iter().map(|ticket| ticket.id).collect::<Vec<_>>(), [1, 2, 3]);

	first.assert_calls_async(1).await;
	second.assert_calls_async(1).await;
}

#[tokio::test]
async fn traversals_restart_from_the_first_page() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let (first, second) = mock_two_pages(&server, 2).await;
	let client = build_test_client(&server.base_url());
	let tickets = client.tickets().list_all::<Ticket>(&Query::new()).with_page_size(2);

	for _ in 0..2 {
		let collected = tickets.collect_all().await.expect("Traversal should succeed.");

		assert_eq!(collected.len(), 3);
	}

	first.assert_calls_async(2).await;
	second.assert_calls_async(2).await;
}

#[tokio::test]
async fn pages_are_fetched_only_when_consumed() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let (first, second) = mock_two_pages(&server, 2).await;
	let client = build_test_client(&server.base_url());
	let tickets = client.paged::<Ticket>("/Tickets", "tickets").with_page_size(2);
	let mut stream = pin!(tickets.stream());
	let ticket = stream
		.try_next()
		.await
		.expect("First item should load.")
		.expect("First page should not be empty.");

	assert_eq!(ticket, Ticket { id: 1, summary: "VPN down".into() });

	first.assert_calls_async(1).await;
	second.assert_calls_async(0).await;

	stream.try_next().await.expect("Second item should load.");

	second.assert_calls_async(0).await;

	stream.try_next().await.expect("Third item should load.");

	second.assert_calls_async(1).await;

	assert!(stream.try_next().await.expect("Exhausted streams end cleanly.").is_none());

	second.assert_calls_async(1).await;
}

#[tokio::test]
async fn empty_first_page_ends_the_traversal() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let list = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/Client");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"record_count":10,"clients":[]}"#);
		})
		.await;
	let client = build_test_client(&server.base_url());
	let clients = client
		.clients()
		.list_all::<Value>(&Query::new())
		.collect_all()
		.await
		.expect("Empty traversal should succeed.");

	assert!(clients.is_empty());

	list.assert_calls_async(1).await;
}

#[tokio::test]
async fn filters_are_forwarded_with_paging_params() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let list = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/Tickets")
				.query_param("open_only", "true")
				.query_param("client_id", "12")
				.query_param("page_size", "50")
				.query_param("page_no", "1")
				.query_param("count", "true");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"record_count":1,"tickets":[{"id":9,"summary":"Lone ticket"}]}"#);
		})
		.await;
	let client = build_test_client(&server.base_url());
	let filters = Query::new().with("open_only", true).with("client_id", 12);
	let tickets = client
		.tickets()
		.list_all::<Ticket>(&filters)
		.collect_all()
		.await
		.expect("Filtered traversal should succeed.");

	assert_eq!(tickets, [Ticket { id: 9, summary: "Lone ticket".into() }]);

	list.assert_calls_async(1).await;
}

#[tokio::test]
async fn failed_pages_end_the_traversal_with_an_error() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let _first = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/Tickets").query_param("page_no", "1");
			then.status(200).header("content-type", "application/json").body(
				r#"{"record_count":4,"tickets":[{"id":1,"summary":"A"},{"id":2,"summary":"B"}]}"#,
			);
		})
		.await;
	let _second = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/Tickets").query_param("page_no", "2");
			then.status(500).body(r#"{"message":"Database unavailable"}"#);
		})
		.await;
	let client = build_test_client(&server.base_url());
	let tickets = client.paged::<Ticket>("/Tickets", "tickets").with_page_size(2);
	let mut stream = pin!(tickets.stream());
	let mut seen = Vec::new();
	let err = loop {
		match stream.try_next().await {
			Ok(Some(ticket)) => seen.push(ticket.id),
			Ok(None) => panic!("The failing page should surface as an error."),
			Err(err) => break err,
		}
	};

	assert_eq!(seen, [1, 2]);
	assert_eq!(err.kind(), ErrorKind::Server);
	assert!(stream.try_next().await.expect("Streams end after an error.").is_none());
}

#[tokio::test]
async fn malformed_list_responses_are_transport_errors() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let _list = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/Tickets");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"record_count":1,"tickets":{"id":1}}"#);
		})
		.await;
	let client = build_test_client(&server.base_url());
	let err = client
		.tickets()
		.list::<Value>(&Query::new().with("page_size", 10).with("page_no", 1))
		.await
		.expect_err("Non-array items should be rejected.");

	assert_eq!(err.kind(), ErrorKind::Transport);
}
