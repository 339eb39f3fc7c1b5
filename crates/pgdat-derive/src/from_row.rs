//! FromRow derive macro implementation

use crate::attrs::mapped_fields;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let field_extracts: Vec<_> = mapped_fields(&input, "FromRow")?
        .into_iter()
        .map(|field| {
            let ident = field.ident;
            let ty = field.ty;
            let column = &field.column;
            if field.skip {
                quote! { #ident: ::core::default::Default::default() }
            } else if field.flatten {
                quote! { #ident: <#ty as ::pgdat::FromRow>::from_row(row)? }
            } else {
                quote! { #ident: ::pgdat::RowExt::try_get_column(row, #column)? }
            }
        })
        .collect();

    Ok(quote! {
        impl #impl_generics ::pgdat::FromRow for #name #ty_generics #where_clause {
            fn from_row(row: &::pgdat::tokio_postgres::Row) -> ::pgdat::DatResult<Self> {
                Ok(Self {
                    #(#field_extracts),*
                })
            }
        }
    })
}
