/// Integration tests with mocked external APIs: the forward geocoder and
/// the hosted auth provider, exercised without hitting real services.
use retail_map_api::auth::AuthClient;
use retail_map_api::errors::AppError;
use retail_map_api::geocoding::{in_country_bounds, Coordinates, GeocoderClient};
use wiremock::matchers::{header, method, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_geocoder_returns_top_ranked_coordinates() {
    let mock_server = MockServer::start().await;

    // Mapbox-style response: center is [lon, lat], best match first
    let mock_response = serde_json::json!({
        "type": "FeatureCollection",
        "features": [
            { "center": [-99.1332, 19.4326], "relevance": 0.96 },
            { "center": [-100.0, 25.0], "relevance": 0.41 }
        ]
    });

    Mock::given(method("GET"))
        .and(path_regex(r"^/geocoding/v5/mapbox\.places/.+\.json$"))
        .and(query_param("limit", "1"))
        .and(query_param("country", "mx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .mount(&mock_server)
        .await;

    let client = GeocoderClient::new(mock_server.uri(), "test_token".to_string()).unwrap();
    let coords = client
        .forward("Av. Juarez 100, Centro, Ciudad de Mexico, 06000, Mexico")
        .await
        .unwrap()
        .unwrap();

    assert!((coords.lat - 19.4326).abs() < 1e-6);
    assert!((coords.lon + 99.1332).abs() < 1e-6);
    assert!(in_country_bounds(coords));
}

#[tokio::test]
async fn test_geocoder_no_features_is_none_not_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/geocoding/v5/mapbox\.places/.+\.json$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"type": "FeatureCollection", "features": []})),
        )
        .mount(&mock_server)
        .await;

    let client = GeocoderClient::new(mock_server.uri(), "test_token".to_string()).unwrap();
    let result = client.forward("nowhere at all").await.unwrap();

    assert!(result.is_none());
}

#[tokio::test]
async fn test_geocoder_server_error_surfaces_as_external_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/geocoding/v5/mapbox\.places/.+\.json$"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let client = GeocoderClient::new(mock_server.uri(), "test_token".to_string()).unwrap();
    let result = client.forward("Av. Juarez 100").await;

    assert!(matches!(result, Err(AppError::ExternalApiError(_))));
}

#[tokio::test]
async fn test_geocoder_result_outside_bounds_detected() {
    // Bogotá: a plausible mismatch for a short ambiguous address
    let coords = Coordinates {
        lat: 4.711,
        lon: -74.072,
    };
    assert!(!in_country_bounds(coords));
}

#[tokio::test]
async fn test_auth_valid_token_resolves_account_id() {
    let mock_server = MockServer::start().await;
    let user_id = "4f5a8f1e-7d34-4a8e-9a11-92d4c2a1b0ee";

    Mock::given(method("GET"))
        .and(path_regex(r"^/auth/v1/user$"))
        .and(header("apikey", "service_key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": user_id,
                "email": "operator@example.com"
            })),
        )
        .mount(&mock_server)
        .await;

    let client = AuthClient::new(mock_server.uri(), "service_key".to_string()).unwrap();
    let owner_id = client.validate_token("valid-token").await.unwrap();

    assert_eq!(owner_id.to_string(), user_id);
}

#[tokio::test]
async fn test_auth_invalid_token_is_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/auth/v1/user$"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(serde_json::json!({"msg": "bad token"})),
        )
        .mount(&mock_server)
        .await;

    let client = AuthClient::new(mock_server.uri(), "service_key".to_string()).unwrap();
    let result = client.validate_token("expired-token").await;

    assert!(matches!(result, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn test_auth_provider_outage_is_not_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/auth/v1/user$"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = AuthClient::new(mock_server.uri(), "service_key".to_string()).unwrap();
    let result = client.validate_token("some-token").await;

    // A provider outage must not look like a token problem
    assert!(matches!(result, Err(AppError::ExternalApiError(_))));
}
