//! Code generation for single-endpoint axum services
//!
//! This module transforms a ServiceSpec into a buildable Cargo project.

pub mod handler_gen;
pub mod type_gen;

use anyhow::{Context, Result};
use architect_common::ServiceSpec;
use quote::quote;
use std::path::Path;
use tracing::debug;

/// Name of the binary inside the generated project
pub const BINARY_NAME: &str = "server";

/// Main code generator that orchestrates service project creation
pub struct CodeGenerator {
    spec: ServiceSpec,
}

impl CodeGenerator {
    /// Create a new code generator from a validated spec
    pub fn new(spec: ServiceSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    /// Generate `src/main.rs` of the service
    pub fn generate(&self) -> Result<String> {
        self.spec.validate().context("Invalid service spec")?;

        let imports = handler_gen::generate_imports(self.spec.endpoint.method);
        let model = type_gen::generate_model(&self.spec.endpoint)?;
        let handler = handler_gen::generate_handler(&self.spec)?;
        let main_fn = handler_gen::generate_main(&self.spec)?;

        let tokens = quote! {
            #imports

            #model

            #handler

            #main_fn
        };

        let file: syn::File =
            syn::parse2(tokens).context("Generated service code did not parse")?;

        Ok(prettyplease::unparse(&file))
    }

    /// Write the complete project (Cargo.toml, Dockerfile, sources) into `output_dir`
    pub fn generate_package<P: AsRef<Path>>(&self, output_dir: P) -> Result<()> {
        let output_dir = output_dir.as_ref();

        std::fs::create_dir_all(output_dir.join("src")).with_context(|| {
            format!("Failed to create source directory in {}", output_dir.display())
        })?;

        let main_rs = self.generate()?;
        std::fs::write(output_dir.join("src/main.rs"), main_rs)?;
        std::fs::write(output_dir.join("Cargo.toml"), self.generate_cargo_toml())?;
        std::fs::write(output_dir.join("Dockerfile"), self.generate_dockerfile())?;
        std::fs::write(output_dir.join(".dockerignore"), "target\n")?;

        debug!(
            "Generated project for {} in {}",
            self.spec.service_name,
            output_dir.display()
        );

        Ok(())
    }

    /// Cargo package names may not start with a digit
    pub fn package_name(&self) -> String {
        match self.spec.service_name.chars().next() {
            Some(c) if c.is_ascii_digit() => format!("svc-{}", self.spec.service_name),
            _ => self.spec.service_name.clone(),
        }
    }

    fn generate_cargo_toml(&self) -> String {
        format!(
            r#"[package]
name = "{}"
version = "0.1.0"
edition = "2021"

[[bin]]
name = "{}"
path = "src/main.rs"

[dependencies]
axum = "0.8"
serde = {{ version = "1", features = ["derive"] }}
serde_json = "1"
tokio = {{ version = "1", features = ["full"] }}
"#,
            self.package_name(),
            BINARY_NAME
        )
    }

    fn generate_dockerfile(&self) -> String {
        format!(
            r#"FROM rust:1-slim AS builder
WORKDIR /app
COPY . .
RUN cargo build --release

FROM debian:bookworm-slim
COPY --from=builder /app/target/release/{bin} /usr/local/bin/{bin}
ENV PORT=8080
EXPOSE 8080
CMD ["{bin}"]
"#,
            bin = BINARY_NAME
        )
    }
}
