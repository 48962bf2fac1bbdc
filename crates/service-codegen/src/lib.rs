//! Service Code Generator
//!
//! Turns a [`ServiceSpec`](architect_common::ServiceSpec) into the source
//! tree of a small axum microservice and packs it as a gzipped tarball
//! ready to hand to a container build.

pub mod codegen;
pub mod package;

pub use codegen::CodeGenerator;
pub use package::{package_service, PackagedSource};
