//! GeoNamesClient against a mock provider.

use mapa_astral_gateway::geocoding::{GeoNamesClient, Geocoder};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn resolves_first_result() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/searchJSON"))
        .and(query_param("q", "RIO DE JANEIRO/RJ"))
        .and(query_param("country", "BR"))
        .and(query_param("featureClass", "P"))
        .and(query_param("maxRows", "1"))
        .and(query_param("username", "tester"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "totalResultsCount": 1,
            "geonames": [{
                "name": "Rio de Janeiro",
                "adminCode1": "21",
                "lat": "-22.90642",
                "lng": "-43.18223",
                "countryCode": "BR"
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = GeoNamesClient::new(&mock_server.uri(), "tester").unwrap();
    let coords = client.resolve("Rio de Janeiro/RJ").await.unwrap();

    assert_eq!(coords.city, "Rio de Janeiro");
    assert_eq!(coords.region, "21");
    assert_eq!(coords.country, "Brasil");
    assert!((coords.latitude + 22.90642).abs() < 1e-9);
    assert!((coords.longitude + 43.18223).abs() < 1e-9);
}

#[tokio::test]
async fn empty_result_is_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/searchJSON"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "totalResultsCount": 0,
            "geonames": []
        })))
        .mount(&mock_server)
        .await;

    let client = GeoNamesClient::new(&mock_server.uri(), "tester").unwrap();
    assert!(client.resolve("Nonexistent City/ZZ").await.is_none());
}

#[tokio::test]
async fn provider_error_is_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/searchJSON"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = GeoNamesClient::new(&mock_server.uri(), "tester").unwrap();
    assert!(client.resolve("Curitiba/PR").await.is_none());
}

#[tokio::test]
async fn malformed_body_is_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/searchJSON"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let client = GeoNamesClient::new(&mock_server.uri(), "tester").unwrap();
    assert!(client.resolve("Curitiba/PR").await.is_none());
}

#[tokio::test]
async fn account_errors_without_results_are_none() {
    let mock_server = MockServer::start().await;

    // GeoNames reports bad credentials with a 200 and a status object
    Mock::given(method("GET"))
        .and(path("/searchJSON"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": {"message": "user account not enabled", "value": 10}
        })))
        .mount(&mock_server)
        .await;

    let client = GeoNamesClient::new(&mock_server.uri(), "tester").unwrap();
    assert!(client.resolve("Curitiba/PR").await.is_none());
}

#[tokio::test]
async fn unreachable_provider_is_none() {
    // nothing listens on port 9 in the test environment
    let client = GeoNamesClient::new("http://127.0.0.1:9", "tester").unwrap();
    assert!(client.resolve("Curitiba/PR").await.is_none());
}
