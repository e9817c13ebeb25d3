use axum::Json;
use flowgate_schema::{Operation, TypeDescriptor, SCHEMA, SCHEMA_VERSION};
use serde::Serialize;

use crate::response::DataResponse;

/// The exposed contract: every type and operation.
#[derive(Debug, Serialize)]
pub struct SchemaDocument {
    pub version: &'static str,
    pub fingerprint: String,
    pub types: &'static [TypeDescriptor],
    pub operations: &'static [Operation],
}

/// GET /api/v1/schema
pub async fn get_schema() -> Json<DataResponse<SchemaDocument>> {
    Json(DataResponse {
        data: SchemaDocument {
            version: SCHEMA_VERSION,
            fingerprint: SCHEMA.fingerprint(),
            types: SCHEMA.types(),
            operations: SCHEMA.operations(),
        },
    })
}
