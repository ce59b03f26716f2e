use httpmock::Method::GET;
use numista_rs::RequestDescriptor;

use crate::common::{API_KEY, builder_for, setup_server};

#[tokio::test]
async fn every_request_carries_the_api_key() {
    let server = setup_server();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/catalogues")
            .header("numista-api-key", API_KEY)
            .header("accept", "application/json");
        then.status(200).body(r#"{"catalogues": []}"#);
    });
    let client = builder_for(&server).build().unwrap();

    client
        .execute(&RequestDescriptor::get("/catalogues"))
        .await
        .unwrap();
    mock.assert_calls(1);
}

#[tokio::test]
async fn bearer_token_is_sent_when_configured() {
    let server = setup_server();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/users/7/collections")
            .header("authorization", "Bearer access-token");
        then.status(200).body(r#"{"collections": []}"#);
    });
    let client = builder_for(&server)
        .bearer_token("access-token")
        .build()
        .unwrap();

    client
        .execute(&RequestDescriptor::get("/users/7/collections"))
        .await
        .unwrap();
    mock.assert_calls(1);
}

#[tokio::test]
async fn custom_user_agent_is_applied() {
    let server = setup_server();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/issuers")
            .header("user-agent", "coin-shelf/2.1");
        then.status(200).body(r#"{"issuers": []}"#);
    });
    let client = builder_for(&server)
        .user_agent("coin-shelf/2.1")
        .build()
        .unwrap();

    client
        .execute(&RequestDescriptor::get("/issuers"))
        .await
        .unwrap();
    mock.assert_calls(1);
}

#[test]
fn building_without_an_api_key_fails() {
    let err = numista_rs::NumistaClient::builder().build().unwrap_err();
    assert!(matches!(err, numista_rs::NumistaError::Config(_)));
}
