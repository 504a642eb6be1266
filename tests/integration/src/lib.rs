//! Integration tests for Raziel against a DynamoDB-compatible endpoint.
//!
//! These tests require a running endpoint, `http://localhost:8000` unless
//! `DYNAMODB_ENDPOINT_URL` says otherwise. They are marked `#[ignore]` so they
//! don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p raziel-integration -- --ignored
//! ```

use std::sync::{Arc, Once};

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType,
};
use raziel_aws::SdkTransport;
use raziel_core::{Database, DatabaseConfig, OpenOptions, Table};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL of the store.
fn endpoint_url() -> String {
    std::env::var("DYNAMODB_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:8000".to_owned())
}

/// Create a raw SDK client pointing at the local endpoint.
#[must_use]
pub fn dynamodb_client() -> aws_sdk_dynamodb::Client {
    init_tracing();

    let creds = Credentials::new("test", "test", None, None, "integration-test");

    let config = aws_sdk_dynamodb::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(creds)
        .endpoint_url(endpoint_url())
        .build();

    aws_sdk_dynamodb::Client::from_conf(config)
}

/// Generate a unique table name for a test.
#[must_use]
pub fn test_table_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("raziel-{prefix}-{id}")
}

/// Create a table with the `hkey`/`rkey` schema through the raw client.
pub async fn create_table(client: &aws_sdk_dynamodb::Client, name: &str) -> anyhow::Result<()> {
    let mut request = client
        .create_table()
        .table_name(name)
        .billing_mode(BillingMode::PayPerRequest);
    for (attr, key_type) in [("hkey", KeyType::Hash), ("rkey", KeyType::Range)] {
        request = request
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(attr)
                    .key_type(key_type)
                    .build()?,
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(attr)
                    .attribute_type(ScalarAttributeType::S)
                    .build()?,
            );
    }
    request.send().await?;
    Ok(())
}

/// Create a fresh table and open it through the SDK transport.
pub async fn open_test_table(prefix: &str) -> anyhow::Result<(aws_sdk_dynamodb::Client, Table)> {
    let client = dynamodb_client();
    let name = test_table_name(prefix);
    create_table(&client, &name).await?;

    let transport = Arc::new(SdkTransport::from_client(client.clone()));
    let db = Database::new(transport, DatabaseConfig::default());
    let opts = OpenOptions {
        assume_exists: Some(true),
        ..OpenOptions::default()
    };
    let table = db.open(&name, opts).await?;
    Ok((client, table))
}

/// Drop a test table, ignoring failures.
pub async fn drop_table(client: &aws_sdk_dynamodb::Client, name: &str) {
    let _ = client.delete_table().table_name(name).send().await;
}

mod test_table;
