//! Type generation - converts the endpoint schema into the request model

use anyhow::{bail, Result};
use architect_common::{EndpointSpec, FieldType, SchemaField};
use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};

/// Generate the request model struct and its `validate` method
pub fn generate_model(endpoint: &EndpointSpec) -> Result<TokenStream> {
    let model = model_ident(&endpoint.model_name)?;

    let mut fields = Vec::with_capacity(endpoint.schema_fields.len());
    let mut checks = Vec::new();
    for field in &endpoint.schema_fields {
        let ident = field_ident(&field.name)?;
        fields.push(generate_field(&ident, field));
        if field.field_type == FieldType::Email {
            checks.push(generate_email_check(&ident, field));
        }
    }

    let email_helper = if checks.is_empty() {
        quote! {}
    } else {
        quote! {
            fn is_email(value: &str) -> bool {
                match value.split_once('@') {
                    Some((local, domain)) => {
                        !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
                    }
                    None => false,
                }
            }
        }
    };

    Ok(quote! {
        #[derive(Debug, Clone, Serialize, Deserialize)]
        pub struct #model {
            #(#fields),*
        }

        impl #model {
            fn validate(&self) -> Result<(), String> {
                #(#checks)*
                Ok(())
            }
        }

        #email_helper
    })
}

fn generate_field(ident: &Ident, field: &SchemaField) -> TokenStream {
    let ty = map_field_type(field.field_type);
    if field.required {
        quote! { pub #ident: #ty }
    } else {
        quote! {
            #[serde(default)]
            pub #ident: Option<#ty>
        }
    }
}

fn generate_email_check(ident: &Ident, field: &SchemaField) -> TokenStream {
    let message = format!("field '{}' must be a valid email address", field.name);
    if field.required {
        quote! {
            if !is_email(&self.#ident) {
                return Err(#message.to_string());
            }
        }
    } else {
        quote! {
            if let Some(value) = &self.#ident {
                if !is_email(value) {
                    return Err(#message.to_string());
                }
            }
        }
    }
}

/// Map spec field types to Rust types
pub fn map_field_type(field_type: FieldType) -> TokenStream {
    match field_type {
        FieldType::String | FieldType::Email => quote! { String },
        FieldType::Integer => quote! { i64 },
        FieldType::Number => quote! { f64 },
        FieldType::Boolean => quote! { bool },
        FieldType::StringList => quote! { Vec<String> },
        FieldType::IntegerList => quote! { Vec<i64> },
        FieldType::Object => quote! { serde_json::Value },
    }
}

/// Ident for the request model
pub fn model_ident(name: &str) -> Result<Ident> {
    syn::parse_str::<Ident>(name)
        .map_err(|_| anyhow::anyhow!("model name '{}' is not a valid Rust identifier", name))
}

/// Ident for a struct field; keywords become raw identifiers
pub fn field_ident(name: &str) -> Result<Ident> {
    if let Ok(ident) = syn::parse_str::<Ident>(name) {
        return Ok(ident);
    }

    if matches!(name, "_" | "self" | "super" | "crate" | "Self") || name.is_empty() {
        bail!("field name '{}' cannot be used as a Rust identifier", name);
    }

    Ok(format_ident!("r#{}", name))
}

/// Convert PascalCase to snake_case
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
