//! Integration tests for manual redirect following and result classification.

use std::time::Duration;

use catalog_fetch_core::{AbortSignal, FetchErrorKind, HttpResult, RequestOptions};
use wiremock::matchers::{body_string, header, headers, method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::AbortingResponder;
use support::socket_guard::start_mock_server_or_skip;

fn redirect(status: u16, location: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).insert_header("location", location)
}

#[tokio::test]
async fn test_redirect_chain_is_followed_to_final_response() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let (_, client) = support::client();

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(redirect(302, "/b"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(redirect(308, "/c"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("{}", "application/opds+json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/a", server.uri());
    let result = client
        .fetch_formatted(&url, RequestOptions::get(), None)
        .await;

    assert!(result.is_success, "{result:?}");
    assert_eq!(result.status_code, Some(200));
    assert_eq!(result.url, url);
    assert_eq!(result.response_url, Some(format!("{}/c", server.uri())));
    assert_eq!(result.content_type.as_deref(), Some("application/opds+json"));
}

#[tokio::test]
async fn test_redirect_loop_stops_after_twenty_hops() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let (_, client) = support::client();

    // Hops 0..=20 are followed; the response to hop 21 trips the limit.
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(redirect(302, "/loop"))
        .expect(22)
        .mount(&server)
        .await;

    let result = client
        .fetch_formatted(&format!("{}/loop", server.uri()), RequestOptions::get(), None)
        .await;

    assert!(result.is_failure);
    assert!(result.is_network_error);
    assert!(!result.is_timeout);
    assert!(!result.is_abort);
    assert_eq!(result.error_kind, Some(FetchErrorKind::RedirectLoop));
    assert!(
        result
            .status_message
            .as_deref()
            .is_some_and(|msg| msg.contains("maximum redirect")),
        "{result:?}"
    );
}

#[tokio::test]
async fn test_redirect_without_location_is_returned_as_is() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let (_, client) = support::client();

    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(ResponseTemplate::new(302))
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .fetch_formatted(&format!("{}/moved", server.uri()), RequestOptions::get(), None)
        .await;

    assert_eq!(result.status_code, Some(302));
    assert!(result.is_failure);
    assert!(!result.is_network_error);
}

#[tokio::test]
async fn test_see_other_downgrades_post_to_bodyless_get() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let (_, client) = support::client();

    Mock::given(method("POST"))
        .and(path("/form"))
        .respond_with(redirect(303, "/done"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/done"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let options = RequestOptions::post().with_body("user=reader");
    let result = client
        .post(&format!("{}/form", server.uri()), options)
        .await;
    assert!(result.is_success, "{result:?}");

    let requests = server.received_requests().await.unwrap();
    let follow = requests
        .iter()
        .find(|request| request.url.path() == "/done")
        .unwrap();
    assert_eq!(follow.method.as_str(), "GET");
    assert!(follow.body.is_empty());
    assert!(!follow.headers.contains_key("content-length"));
}

#[tokio::test]
async fn test_moved_permanently_downgrades_post() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let (_, client) = support::client();

    Mock::given(method("POST"))
        .and(path("/old"))
        .respond_with(redirect(301, "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .post(
            &format!("{}/old", server.uri()),
            RequestOptions::post().with_body("payload"),
        )
        .await;
    assert!(result.is_success, "{result:?}");
}

#[tokio::test]
async fn test_temporary_redirect_preserves_post_and_body() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let (_, client) = support::client();

    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(redirect(307, "/submit-here"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/submit-here"))
        .and(body_string("payload"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .post(
            &format!("{}/submit", server.uri()),
            RequestOptions::post().with_body("payload"),
        )
        .await;
    assert!(result.is_success, "{result:?}");
    assert_eq!(result.status_code, Some(201));
}

#[tokio::test]
async fn test_cookie_set_on_intermediate_hop_reaches_next_hop() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let (_, client) = support::client();

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(redirect(302, "/home").insert_header("set-cookie", "sid=abc; Path=/"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/home"))
        .and(header("cookie", "sid=abc"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .fetch_formatted(&format!("{}/login", server.uri()), RequestOptions::get(), None)
        .await;
    assert!(result.is_success, "cookie was not replayed: {result:?}");
}

#[tokio::test]
async fn test_identification_headers_are_injected() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let (_, client) = support::client();

    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(headers("accept-language", vec!["fr-FR", "en-US;q=0.7", "en;q=0.5"]))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .fetch_formatted(
            &format!("{}/feed", server.uri()),
            RequestOptions::get(),
            Some("fr-FR"),
        )
        .await;
    assert!(result.is_success, "{result:?}");

    let requests = server.received_requests().await.unwrap();
    let agent = requests[0].headers.get("user-agent").unwrap();
    assert!(agent.to_str().unwrap().starts_with("catalog-fetch/"));
}

#[tokio::test]
async fn test_slow_response_is_classified_as_timeout() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let (_, client) = support::client();

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let options = RequestOptions::get().with_timeout(Duration::from_millis(200));
    let result = client
        .fetch_formatted(&format!("{}/slow", server.uri()), options, None)
        .await;

    assert!(result.is_failure);
    assert!(result.is_network_error);
    assert!(result.is_timeout);
    assert!(!result.is_abort);
    assert_eq!(result.error_kind, Some(FetchErrorKind::TimedOut));
}

#[tokio::test]
async fn test_abort_during_request_is_classified_as_abort() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let (_, client) = support::client();

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let signal = AbortSignal::new();
    let trigger = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.dispatch();
    });

    let options = RequestOptions::get().with_signal(signal);
    let result = client
        .fetch_formatted(&format!("{}/slow", server.uri()), options, None)
        .await;

    assert!(result.is_abort, "{result:?}");
    assert!(result.is_failure);
    assert!(!result.is_network_error);
    assert!(!result.is_timeout);
    assert!(!result.is_success);
}

#[tokio::test]
async fn test_abort_between_hops_stops_redirect_chain() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let (_, client) = support::client();
    let signal = AbortSignal::new();

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(AbortingResponder {
            signal: signal.clone(),
            template: redirect(302, "/b"),
        })
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let options = RequestOptions::get().with_signal(signal);
    let result = client
        .fetch_formatted(&format!("{}/a", server.uri()), options, None)
        .await;

    assert!(result.is_abort, "{result:?}");
    assert!(!result.is_network_error);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_callback_result_is_detached() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let (_, client) = support::client();

    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("catalog body"))
        .mount(&server)
        .await;

    let result: HttpResult<String> = client
        .fetch_formatted_with(
            &format!("{}/doc", server.uri()),
            RequestOptions::get(),
            |mut result: HttpResult| async move {
                let text = match result.take_response() {
                    Some(response) => response.text().await.unwrap_or_default(),
                    None => String::new(),
                };
                result.with_data(text)
            },
            None,
        )
        .await;

    assert!(result.is_success);
    assert_eq!(result.data.as_deref(), Some("catalog body"));
    assert!(result.response.is_none());
}
