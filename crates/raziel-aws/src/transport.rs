//! The SDK-backed transport.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use raziel_core::Transport;
use raziel_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    QueryInput, ScanInput,
};
use raziel_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, PutItemOutput,
    QueryOutput, ScanOutput,
};
use raziel_model::{TransportError, TransportErrorCode};
use tracing::debug;

use crate::config::SdkTransportConfig;
use crate::convert::{
    from_optional_item, from_sdk_item, from_sdk_keys, from_sdk_write_request, non_empty_item,
    non_empty_names, to_sdk_item, to_sdk_keys, to_sdk_select, to_sdk_write_request,
};

/// Sends each request once through an `aws-sdk-dynamodb` client.
#[derive(Clone)]
pub struct SdkTransport {
    client: Client,
}

impl fmt::Debug for SdkTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdkTransport").finish_non_exhaustive()
    }
}

impl SdkTransport {
    /// Build a client from `config`, inheriting everything else from the SDK
    /// default chain.
    pub async fn connect(config: SdkTransportConfig) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region));
        if let Some(credentials) = config.credentials {
            loader = loader.credentials_provider(credentials);
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
        if let Some(endpoint) = config.endpoint {
            debug!(endpoint = %endpoint, "using endpoint override");
            builder = builder.endpoint_url(endpoint);
        }
        Self::from_client(Client::from_conf(builder.build()))
    }

    /// Wrap an existing client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// The underlying client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Map an SDK failure onto the transport error, keeping the store's code and
/// message and the SDK error as source.
fn map_sdk_error<E, R>(err: SdkError<E, R>) -> TransportError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    let code = match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => TransportErrorCode::Network,
        _ => err
            .code()
            .map_or(TransportErrorCode::Unknown, TransportErrorCode::from_code),
    };
    let message = err
        .message()
        .map_or_else(|| err.to_string(), str::to_owned);
    TransportError::with_message(code, message).with_source(err)
}

fn page_count(count: i32) -> i32 {
    count.max(0)
}

#[async_trait]
impl Transport for SdkTransport {
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, TransportError> {
        let out = self
            .client
            .put_item()
            .table_name(input.table_name)
            .set_item(Some(to_sdk_item(input.item)))
            .set_condition_expression(input.condition_expression)
            .set_expression_attribute_names(non_empty_names(input.expression_attribute_names))
            .set_expression_attribute_values(non_empty_item(input.expression_attribute_values))
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(PutItemOutput {
            attributes: from_optional_item(out.attributes)?,
        })
    }

    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, TransportError> {
        let out = self
            .client
            .get_item()
            .table_name(input.table_name)
            .set_key(Some(to_sdk_item(input.key)))
            .set_consistent_read(input.consistent_read)
            .set_projection_expression(input.projection_expression)
            .set_expression_attribute_names(non_empty_names(input.expression_attribute_names))
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(GetItemOutput {
            item: out.item.map(from_sdk_item).transpose()?,
        })
    }

    async fn delete_item(
        &self,
        input: DeleteItemInput,
    ) -> Result<DeleteItemOutput, TransportError> {
        let out = self
            .client
            .delete_item()
            .table_name(input.table_name)
            .set_key(Some(to_sdk_item(input.key)))
            .set_condition_expression(input.condition_expression)
            .set_expression_attribute_names(non_empty_names(input.expression_attribute_names))
            .set_expression_attribute_values(non_empty_item(input.expression_attribute_values))
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(DeleteItemOutput {
            attributes: from_optional_item(out.attributes)?,
        })
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput, TransportError> {
        let out = self
            .client
            .query()
            .table_name(input.table_name)
            .set_key_condition_expression(input.key_condition_expression)
            .set_filter_expression(input.filter_expression)
            .set_projection_expression(input.projection_expression)
            .set_expression_attribute_names(non_empty_names(input.expression_attribute_names))
            .set_expression_attribute_values(non_empty_item(input.expression_attribute_values))
            .set_scan_index_forward(input.scan_index_forward)
            .set_limit(input.limit)
            .set_exclusive_start_key(non_empty_item(input.exclusive_start_key))
            .set_select(input.select.map(to_sdk_select))
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(QueryOutput {
            items: out
                .items
                .unwrap_or_default()
                .into_iter()
                .map(from_sdk_item)
                .collect::<Result<_, _>>()?,
            count: page_count(out.count),
            scanned_count: page_count(out.scanned_count),
            last_evaluated_key: from_optional_item(out.last_evaluated_key)?,
        })
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, TransportError> {
        let out = self
            .client
            .scan()
            .table_name(input.table_name)
            .set_filter_expression(input.filter_expression)
            .set_projection_expression(input.projection_expression)
            .set_expression_attribute_names(non_empty_names(input.expression_attribute_names))
            .set_expression_attribute_values(non_empty_item(input.expression_attribute_values))
            .set_limit(input.limit)
            .set_exclusive_start_key(non_empty_item(input.exclusive_start_key))
            .set_select(input.select.map(to_sdk_select))
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(ScanOutput {
            items: out
                .items
                .unwrap_or_default()
                .into_iter()
                .map(from_sdk_item)
                .collect::<Result<_, _>>()?,
            count: page_count(out.count),
            scanned_count: page_count(out.scanned_count),
            last_evaluated_key: from_optional_item(out.last_evaluated_key)?,
        })
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, TransportError> {
        let mut request_items = HashMap::with_capacity(input.request_items.len());
        for (table, requests) in input.request_items {
            let requests = requests
                .into_iter()
                .map(to_sdk_write_request)
                .collect::<Result<Vec<_>, _>>()?;
            request_items.insert(table, requests);
        }
        let out = self
            .client
            .batch_write_item()
            .set_request_items(Some(request_items))
            .send()
            .await
            .map_err(map_sdk_error)?;

        let mut unprocessed_items = HashMap::new();
        for (table, requests) in out.unprocessed_items.unwrap_or_default() {
            let requests = requests
                .into_iter()
                .map(from_sdk_write_request)
                .collect::<Result<Vec<_>, _>>()?;
            if !requests.is_empty() {
                unprocessed_items.insert(table, requests);
            }
        }
        Ok(BatchWriteItemOutput { unprocessed_items })
    }

    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, TransportError> {
        let request_items = input
            .request_items
            .into_iter()
            .map(|(table, spec)| Ok((table, to_sdk_keys(spec)?)))
            .collect::<Result<HashMap<_, _>, TransportError>>()?;
        let out = self
            .client
            .batch_get_item()
            .set_request_items(Some(request_items))
            .send()
            .await
            .map_err(map_sdk_error)?;

        let mut responses = HashMap::new();
        for (table, items) in out.responses.unwrap_or_default() {
            let items = items
                .into_iter()
                .map(from_sdk_item)
                .collect::<Result<Vec<_>, _>>()?;
            responses.insert(table, items);
        }
        let mut unprocessed_keys = HashMap::new();
        for (table, spec) in out.unprocessed_keys.unwrap_or_default() {
            unprocessed_keys.insert(table, from_sdk_keys(spec)?);
        }
        Ok(BatchGetItemOutput {
            responses,
            unprocessed_keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_should_build_client_without_network() {
        let transport = SdkTransport::connect(SdkTransportConfig::local("8000")).await;
        let config = transport.client().config();
        assert_eq!(
            config.region().map(ToString::to_string).as_deref(),
            Some("us-east-1")
        );
        assert!(format!("{transport:?}").starts_with("SdkTransport"));
    }

    #[test]
    fn test_should_clamp_negative_counts() {
        assert_eq!(page_count(-1), 0);
        assert_eq!(page_count(7), 7);
    }
}
