use darling::{FromAttributes, FromField};
use syn::{DeriveInput, Fields};

/// Parsed attributes from #[module_meta(...)]
#[derive(Debug, FromAttributes)]
#[darling(attributes(module_meta))]
pub struct ModuleMetaArgs {
    pub id: String,
    pub name: String,
    pub category: String,

    #[darling(default)]
    pub description: Option<String>,

    /// Marks the module as an add-on rather than a built-in cleaning step
    #[darling(default)]
    pub plugin: bool,
}

/// Parsed attributes from #[param(...)]
#[derive(Debug, FromField)]
#[darling(attributes(param))]
pub struct ParamField {
    pub ident: Option<syn::Ident>,
    pub ty: syn::Type,

    /// JSON literal, e.g. `"5"`, `"\"mean\""`, `"null"`
    #[darling(default)]
    pub default: Option<String>,

    /// Overrides the type name derived from the field type
    #[darling(default)]
    pub kind: Option<String>,

    #[darling(default)]
    pub required: bool,

    #[darling(default)]
    pub description: Option<String>,

    #[darling(default)]
    pub min: Option<f64>,

    #[darling(default)]
    pub max: Option<f64>,
}

pub fn parse_module_info(input: &DeriveInput) -> darling::Result<ModuleMetaArgs> {
    ModuleMetaArgs::from_attributes(&input.attrs)
}

pub fn parse_params(input: &DeriveInput) -> darling::Result<Vec<ParamField>> {
    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => return Ok(Vec::new()),
        },
        _ => return Ok(Vec::new()),
    };

    fields
        .iter()
        .filter(|f| f.attrs.iter().any(|attr| attr.path().is_ident("param")))
        .map(ParamField::from_field)
        .collect()
}
