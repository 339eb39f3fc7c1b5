//! Field-level `#[db(...)]` attribute parsing shared by both derives.

use heck::ToSnakeCase;
use syn::{Data, DeriveInput, Fields, Result};

/// Parsed `#[db(...)]` options for one field.
#[derive(Default)]
pub(crate) struct FieldAttr {
    pub column: Option<String>,
    pub skip: bool,
    pub flatten: bool,
}

impl syn::parse::Parse for FieldAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut attr = FieldAttr::default();

        while !input.is_empty() {
            let ident: syn::Ident = input.parse()?;
            if ident == "skip" {
                attr.skip = true;
            } else if ident == "flatten" {
                attr.flatten = true;
            } else if ident == "column" {
                let _: syn::Token![=] = input.parse()?;
                let value: syn::LitStr = input.parse()?;
                attr.column = Some(value.value());
            } else {
                return Err(syn::Error::new(
                    ident.span(),
                    "expected `column = \"...\"`, `skip` or `flatten`",
                ));
            }

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        Ok(attr)
    }
}

/// A named field together with its resolved column mapping.
pub(crate) struct MappedField<'a> {
    pub ident: &'a syn::Ident,
    pub ty: &'a syn::Type,
    pub column: String,
    pub skip: bool,
    pub flatten: bool,
}

fn field_attr(field: &syn::Field) -> Result<FieldAttr> {
    let mut merged = FieldAttr::default();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("db")) {
        let parsed: FieldAttr = attr.parse_args()?;
        merged.column = parsed.column.or(merged.column);
        merged.skip |= parsed.skip;
        merged.flatten |= parsed.flatten;
    }
    if merged.flatten && merged.column.is_some() {
        return Err(syn::Error::new_spanned(
            field,
            "`flatten` and `column` cannot be combined",
        ));
    }
    Ok(merged)
}

/// Column name for a field without an explicit `column`: the snake_case field
/// name, with any raw-identifier prefix removed.
fn default_column(ident: &syn::Ident) -> String {
    let name = ident.to_string();
    name.strip_prefix("r#").unwrap_or(&name).to_snake_case()
}

/// Resolve the named fields of a struct, or fail for anything else.
pub(crate) fn mapped_fields<'a>(input: &'a DeriveInput, derive: &str) -> Result<Vec<MappedField<'a>>> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    format!("{derive} can only be derived for structs with named fields"),
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                format!("{derive} can only be derived for structs"),
            ));
        }
    };

    fields
        .iter()
        .map(|field| {
            let ident = field
                .ident
                .as_ref()
                .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
            let attr = field_attr(field)?;
            Ok(MappedField {
                ident,
                ty: &field.ty,
                column: attr.column.unwrap_or_else(|| default_column(ident)),
                skip: attr.skip,
                flatten: attr.flatten,
            })
        })
        .collect()
}
