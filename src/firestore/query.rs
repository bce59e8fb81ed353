use super::models::{
    CollectionSelector, CompositeFilter, CompositeOperator, Direction, FieldFilter, FieldOperator,
    FieldReference, Filter, Order, RunQueryRequest, RunQueryResponse, StructuredQuery,
};
use super::reference::{convert_serde_value_to_firestore_value, DocumentReference};
use super::snapshot::{DocumentSnapshot, QuerySnapshot};
use super::{api_error, FirestoreError};
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;

/// A definition of a Firestore query over a single root collection.
///
/// This struct allows you to build a query independently of a specific Firestore client,
/// then hand it to `FirebaseFirestore::query` for execution.
#[derive(Clone, Debug)]
pub struct Query {
    pub(crate) collection_id: String,
    pub(crate) query: StructuredQuery,
}

impl Query {
    /// Creates a new `Query` targeting the specified collection.
    pub fn new(collection_id: impl Into<String>) -> Self {
        let collection_id = collection_id.into();
        Self {
            query: StructuredQuery {
                from: Some(vec![CollectionSelector {
                    collection_id: collection_id.clone(),
                }]),
                ..Default::default()
            },
            collection_id,
        }
    }

    /// Adds a filter to the query. Multiple filters are AND-combined.
    pub fn where_filter<T: Serialize>(
        mut self,
        field: &str,
        op: FieldOperator,
        value: T,
    ) -> Result<Self, FirestoreError> {
        let serde_value = serde_json::to_value(value)?;
        let filter = Filter::FieldFilter(FieldFilter {
            field: FieldReference {
                field_path: field.to_string(),
            },
            op,
            value: convert_serde_value_to_firestore_value(serde_value)?,
        });

        self.query.where_clause = Some(match self.query.where_clause.take() {
            None => filter,
            Some(Filter::CompositeFilter(mut composite)) if composite.op == CompositeOperator::And => {
                composite.filters.push(filter);
                Filter::CompositeFilter(composite)
            }
            Some(existing) => Filter::CompositeFilter(CompositeFilter {
                op: CompositeOperator::And,
                filters: vec![existing, filter],
            }),
        });

        Ok(self)
    }

    /// Shorthand for an `Equal` filter.
    pub fn where_eq<T: Serialize>(self, field: &str, value: T) -> Result<Self, FirestoreError> {
        self.where_filter(field, FieldOperator::Equal, value)
    }

    /// Sorts the query results by the specified field.
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        let order = Order {
            field: FieldReference {
                field_path: field.to_string(),
            },
            direction,
        };

        self.query.order_by.get_or_insert_with(Vec::new).push(order);
        self
    }

    /// Limits the number of documents returned.
    pub fn limit(mut self, limit: i32) -> Self {
        self.query.limit = Some(limit);
        self
    }
}

/// A `Query` attached to a Firestore client, ready for execution.
#[derive(Clone)]
pub struct ExecutableQuery<'a> {
    pub(crate) client: &'a ClientWithMiddleware,
    pub(crate) parent_path: String,
    pub(crate) query: Query,
}

impl<'a> ExecutableQuery<'a> {
    pub(crate) fn new(client: &'a ClientWithMiddleware, parent_path: String, query: Query) -> Self {
        Self {
            client,
            parent_path,
            query,
        }
    }

    /// Executes the query and returns the results as a `QuerySnapshot`.
    pub async fn get(&self) -> Result<QuerySnapshot<'a>, FirestoreError> {
        let url = format!("{}:runQuery", self.parent_path);

        let request = RunQueryRequest {
            structured_query: self.query.query.clone(),
        };

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Run query failed").await);
        }

        let responses: Vec<RunQueryResponse> = response.json().await?;

        let mut documents = Vec::new();
        let mut read_time = None;

        for res in responses {
            if let Some(rt) = res.read_time {
                read_time = Some(rt);
            }

            if let Some(doc) = res.document {
                let id = doc.name.rsplit('/').next().unwrap_or_default().to_string();

                let reference = DocumentReference {
                    client: self.client,
                    path: format!("{}/{}/{}", self.parent_path, self.query.collection_id, id),
                };

                documents.push(DocumentSnapshot {
                    id,
                    reference,
                    document: Some(doc),
                    read_time: read_time.clone(),
                });
            }
        }

        Ok(QuerySnapshot {
            documents,
            read_time,
        })
    }
}
