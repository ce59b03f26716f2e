use httpmock::Method::{DELETE, GET};
use numista_rs::{NumistaError, RequestDescriptor};
use serde_json::{Value, json};

use crate::common::{client_for, mock_json, setup_server};

#[tokio::test]
async fn not_found_is_fatal_and_carries_the_api_message() {
    let server = setup_server();
    let mock = mock_json(
        &server,
        "/types/999999",
        404,
        &json!({"error_message": "Type not found"}),
    );
    let client = client_for(&server);

    let err = client
        .execute(&RequestDescriptor::get("/types/999999"))
        .await
        .unwrap_err();
    match &err {
        NumistaError::ClientRequest {
            status, message, ..
        } => {
            assert_eq!(*status, 404);
            assert_eq!(message.as_deref(), Some("Type not found"));
        }
        other => panic!("expected ClientRequest, got {other:?}"),
    }
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("Type not found"));
    mock.assert_calls(1);
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let server = setup_server();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/catalogues");
        then.status(401).body("nope");
    });
    let client = client_for(&server);

    let err = client
        .execute(&RequestDescriptor::get("/catalogues"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        NumistaError::ClientRequest {
            status: 401,
            message: None,
            ..
        }
    ));
    mock.assert_calls(1);
}

#[tokio::test]
async fn fatal_responses_are_never_cached() {
    let server = setup_server();
    let mock = mock_json(&server, "/types/5", 404, &json!({"error_message": "gone"}));
    let client = client_for(&server);
    let req = RequestDescriptor::get("/types/5");

    assert!(client.execute(&req).await.is_err());
    assert!(client.execute(&req).await.is_err());
    mock.assert_calls(2);
}

#[tokio::test]
async fn no_content_decodes_to_null() {
    let server = setup_server();
    let mock = server.mock(|when, then| {
        when.method(DELETE).path("/users/7/collected_items/3");
        then.status(204);
    });
    let client = client_for(&server);

    let env = client
        .execute(&RequestDescriptor::delete("/users/7/collected_items/3"))
        .await
        .unwrap();
    assert_eq!(env.status(), 204);
    assert_eq!(env.payload(), &Value::Null);
    mock.assert_calls(1);
}

#[tokio::test]
async fn typed_decoding_reports_mismatches_as_data_errors() {
    #[derive(Debug, serde::Deserialize)]
    struct Catalogue {
        id: u64,
        code: String,
    }

    let server = setup_server();
    let _mock = mock_json(
        &server,
        "/catalogues",
        200,
        &json!({"catalogues": [{"id": 3, "code": "KM"}]}),
    );
    let client = client_for(&server);
    let req = RequestDescriptor::get("/catalogues");

    let env = client.execute(&req).await.unwrap();
    let cats: Vec<Catalogue> = env.decode_field("catalogues").unwrap();
    assert_eq!(cats[0].id, 3);
    assert_eq!(cats[0].code, "KM");

    let err = client.get_json::<Vec<Catalogue>>(&req).await.unwrap_err();
    assert!(matches!(err, NumistaError::Data(_)));
}

#[tokio::test]
async fn not_modified_is_an_unexpected_status_not_a_client_error() {
    let server = setup_server();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/catalogues");
        then.status(304);
    });
    let client = client_for(&server);

    let err = client
        .execute(&RequestDescriptor::get("/catalogues"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        NumistaError::UnexpectedStatus { status: 304, .. }
    ));
    assert!(!err.is_retryable());
    mock.assert_calls(1);
}
