use std::env;

use serial_test::serial;

use super::*;
use crate::config::GeminiConfig;

fn test_config() -> Config {
    Config {
        gemini: GeminiConfig {
            endpoint: "https://example.test".to_string(),
            model: "test-embedding-model".to_string(),
            batch_size: 8,
            timeout_seconds: 5,
        },
        ..Config::default()
    }
}

#[test]
fn client_configuration() {
    let config = test_config();
    let client = GeminiClient::with_api_key(&config, "secret".to_string())
        .expect("Failed to create client");

    assert_eq!(client.model, "test-embedding-model");
    assert_eq!(client.batch_size, 8);
    assert_eq!(client.api_key, "secret");
    assert_eq!(client.base_url.host_str(), Some("example.test"));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let config = test_config();
    let client = GeminiClient::with_api_key(&config, "secret".to_string())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);

    assert_eq!(client.retry_attempts, 5);
}

#[test]
fn invalid_endpoint_is_unavailable() {
    let mut config = test_config();
    config.gemini.endpoint = "not a url".to_string();

    let result = GeminiClient::with_api_key(&config, "secret".to_string());
    assert!(matches!(
        result,
        Err(AnalyzerError::EmbeddingUnavailable(_))
    ));
}

#[test]
#[serial]
fn missing_api_key_is_unavailable() {
    let saved = env::var(API_KEY_ENV_VAR).ok();
    // SAFETY: #[serial] guarantees no other test mutates the environment
    // concurrently.
    unsafe {
        env::remove_var(API_KEY_ENV_VAR);
    }

    let result = GeminiClient::new(&test_config());
    assert!(matches!(
        result,
        Err(AnalyzerError::EmbeddingUnavailable(_))
    ));

    if let Some(key) = saved {
        // SAFETY: same #[serial] guarantee as above.
        unsafe {
            env::set_var(API_KEY_ENV_VAR, key);
        }
    }
}

#[test]
#[serial]
fn blank_api_key_is_unavailable() {
    let saved = env::var(API_KEY_ENV_VAR).ok();
    // SAFETY: #[serial] guarantees no other test mutates the environment
    // concurrently.
    unsafe {
        env::set_var(API_KEY_ENV_VAR, "   ");
    }

    let result = GeminiClient::new(&test_config());
    assert!(matches!(
        result,
        Err(AnalyzerError::EmbeddingUnavailable(_))
    ));

    match saved {
        // SAFETY: same #[serial] guarantee as above.
        Some(key) => unsafe { env::set_var(API_KEY_ENV_VAR, key) },
        // SAFETY: same #[serial] guarantee as above.
        None => unsafe { env::remove_var(API_KEY_ENV_VAR) },
    }
}

#[tokio::test]
async fn empty_batch_embeds_to_nothing() {
    let config = test_config();
    let client = GeminiClient::with_api_key(&config, "secret".to_string())
        .expect("Failed to create client");

    let vectors = client.embed(&[]).await.expect("empty batch should succeed");
    assert!(vectors.is_empty());
}
