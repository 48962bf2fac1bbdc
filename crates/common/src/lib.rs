pub mod error;
pub mod naming;
pub mod record;
pub mod spec;

pub use error::{Error, Result};
pub use naming::{provisional_name, sanitize_service_name, validate_service_name};
pub use record::{ServiceRecord, ServiceStatus};
pub use spec::{EndpointSpec, FieldType, HttpMethod, SchemaField, ServiceSpec};
