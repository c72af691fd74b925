use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::ExtractionError;

/// Joins extracted fields into the index string.
pub const INDEX_SEPARATOR: &str = ",";

/// Produces the searchable fields of one item. May be slow or I/O-bound.
#[async_trait]
pub trait FieldExtractor<T>: Send + Sync {
    async fn extract(&self, item: &T) -> Result<Vec<String>, ExtractionError>;
}

pub type DynFieldExtractor<T> = Arc<dyn FieldExtractor<T>>;

pub fn join_fields(fields: &[String]) -> String {
    fields.join(INDEX_SEPARATOR)
}

/// Serializes the item and uses its field values, coerced to strings, in declaration order.
///
/// Objects yield one value per field, arrays one per element, anything else itself. Strings
/// are used verbatim and `null` becomes an empty string. A nested array becomes its coerced
/// elements joined with [`INDEX_SEPARATOR`]; a nested object is rendered as compact JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerdeFieldsExtractor;

#[async_trait]
impl<T> FieldExtractor<T> for SerdeFieldsExtractor
where
    T: Serialize + Send + Sync,
{
    async fn extract(&self, item: &T) -> Result<Vec<String>, ExtractionError> {
        let value =
            serde_json::to_value(item).map_err(|e| ExtractionError::Serialize(e.to_string()))?;
        Ok(field_values(value))
    }
}

pub fn field_values(value: Value) -> Vec<String> {
    match value {
        Value::Object(fields) => fields.into_iter().map(|(_, v)| coerce(v)).collect(),
        Value::Array(items) => items.into_iter().map(coerce).collect(),
        other => vec![coerce(other)],
    }
}

fn coerce(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .into_iter()
            .map(coerce)
            .collect::<Vec<_>>()
            .join(INDEX_SEPARATOR),
        object => object.to_string(),
    }
}

/// Wraps a closure returning the fields synchronously.
pub struct SyncFnExtractor<F>(F);

#[async_trait]
impl<T, F> FieldExtractor<T> for SyncFnExtractor<F>
where
    T: Send + Sync,
    F: Fn(&T) -> Vec<String> + Send + Sync,
{
    async fn extract(&self, item: &T) -> Result<Vec<String>, ExtractionError> {
        Ok((self.0)(item))
    }
}

/// Wraps a closure returning a future. The future must own what it needs from the item.
pub struct FnExtractor<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<T, F, Fut> FieldExtractor<T> for FnExtractor<F, Fut>
where
    T: Send + Sync,
    F: Fn(&T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<String>, ExtractionError>> + Send,
{
    async fn extract(&self, item: &T) -> Result<Vec<String>, ExtractionError> {
        (self.f)(item).await
    }
}

pub fn from_fn<T, F>(f: F) -> DynFieldExtractor<T>
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> Vec<String> + Send + Sync + 'static,
{
    Arc::new(SyncFnExtractor(f))
}

pub fn from_async_fn<T, F, Fut>(f: F) -> DynFieldExtractor<T>
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<String>, ExtractionError>> + Send + 'static,
{
    Arc::new(FnExtractor {
        f,
        _marker: PhantomData,
    })
}
