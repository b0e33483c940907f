use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

mod module_meta;
use module_meta::{parse_module_info, parse_params};

/// Registers a cleaning module with the crate's module registry.
///
/// The struct must implement `Default` and `CleaningModule`. Fields tagged
/// with `#[param(...)]` are published as the module's parameter schema.
#[proc_macro_derive(CleaningModule, attributes(module_meta, param))]
pub fn derive_cleaning_module(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let info = match parse_module_info(&input) {
        Ok(info) => info,
        Err(e) => return e.write_errors().into(),
    };

    let fields = match parse_params(&input) {
        Ok(fields) => fields,
        Err(e) => return e.write_errors().into(),
    };

    let struct_name = &input.ident;
    let module_id = &info.id;
    let module_name = &info.name;
    let category = &info.category;
    let description = info.description.clone().unwrap_or_default();
    let kind = if info.plugin {
        quote!(crate::registry::ModuleKind::Plugin)
    } else {
        quote!(crate::registry::ModuleKind::Builtin)
    };

    let params = fields.iter().filter_map(|f| {
        let field_name = f.ident.as_ref()?.to_string();
        let param_type = f
            .kind
            .clone()
            .unwrap_or_else(|| extract_type_name(&f.ty).to_string());
        let required = f.required;

        let default = match &f.default {
            Some(literal) => quote! {
                ::serde_json::from_str::<::serde_json::Value>(#literal)
                    .unwrap_or_else(|_| ::serde_json::Value::String(#literal.to_string()))
            },
            None => quote!(::serde_json::Value::Null),
        };

        let description = match &f.description {
            Some(d) => quote!(Some(#d.to_string())),
            None => quote!(None),
        };
        let min = match f.min {
            Some(v) => quote!(Some(#v)),
            None => quote!(None),
        };
        let max = match f.max {
            Some(v) => quote!(Some(#v)),
            None => quote!(None),
        };

        Some(quote! {
            crate::registry::ParameterSchema {
                name: #field_name.to_string(),
                param_type: #param_type.to_string(),
                default: #default,
                required: #required,
                description: #description,
                min: #min,
                max: #max,
            }
        })
    });

    let lower = struct_name.to_string().to_lowercase();
    let mod_name = syn::Ident::new(
        &format!("__module_registration_{}", lower),
        struct_name.span(),
    );
    let factory_fn_name = syn::Ident::new(
        &format!("create_metadata_{}", lower),
        struct_name.span(),
    );

    let expanded = quote! {
        #[doc(hidden)]
        mod #mod_name {
            use super::*;

            fn #factory_fn_name() -> crate::registry::ModuleMetadata {
                crate::registry::ModuleMetadata {
                    id: #module_id.to_string(),
                    name: #module_name.to_string(),
                    category: #category.to_string(),
                    description: #description.to_string(),
                    kind: #kind,
                    parameters: vec![#(#params),*],
                    factory: || Box::new(<#struct_name as ::std::default::Default>::default()),
                }
            }

            ::inventory::submit! {
                crate::registry::ModuleMetadataFactoryWrapper(#factory_fn_name)
            }
        }
    };

    TokenStream::from(expanded)
}

fn extract_type_name(ty: &syn::Type) -> &'static str {
    let type_str = quote!(#ty).to_string();

    if type_str.contains("Vec") {
        "list"
    } else if type_str.contains("f64") || type_str.contains("f32") {
        "number"
    } else if type_str.contains("u32") || type_str.contains("i32")
        || type_str.contains("u64") || type_str.contains("i64")
        || type_str.contains("usize") || type_str.contains("isize") {
        "integer"
    } else if type_str.contains("String") || type_str.contains("str") {
        "string"
    } else if type_str.contains("bool") {
        "boolean"
    } else if type_str.contains("Value") {
        "any"
    } else {
        "unknown"
    }
}
