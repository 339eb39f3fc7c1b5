//! Record derive macro implementation

use crate::attrs::mapped_fields;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut names = Vec::new();
    let mut values = Vec::new();
    for field in mapped_fields(&input, "Record")? {
        if field.skip {
            continue;
        }
        let ident = field.ident;
        let ty = field.ty;
        if field.flatten {
            names.push(quote! {
                names.extend(<#ty as ::pgdat::Record>::column_names());
            });
            values.push(quote! {
                values.extend(::pgdat::Record::column_values(&self.#ident));
            });
        } else {
            let column = &field.column;
            names.push(quote! { names.push(#column); });
            values.push(quote! {
                values.push(::core::convert::Into::<::pgdat::Value>::into(
                    ::core::clone::Clone::clone(&self.#ident),
                ));
            });
        }
    }

    Ok(quote! {
        impl #impl_generics ::pgdat::Record for #name #ty_generics #where_clause {
            #[allow(unused_mut)]
            fn column_names() -> ::std::vec::Vec<&'static str> {
                let mut names: ::std::vec::Vec<&'static str> = ::std::vec::Vec::new();
                #(#names)*
                names
            }

            #[allow(unused_mut)]
            fn column_values(&self) -> ::std::vec::Vec<::pgdat::Value> {
                let mut values: ::std::vec::Vec<::pgdat::Value> = ::std::vec::Vec::new();
                #(#values)*
                values
            }
        }
    })
}
