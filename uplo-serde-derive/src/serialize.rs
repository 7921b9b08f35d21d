use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{self};

pub fn impl_encode_macro(ast: &syn::DeriveInput) -> TokenStream {
    let name = ast.ident.clone();
    match ast.data {
        syn::Data::Struct(ref data) => {
            let statements: Vec<quote::__private::TokenStream> = data
                .fields
                .iter()
                .zip(0..1_000_000)
                .map(|(field, index)| serialize_field(field, index))
                .collect();

            let expanded = quote! {
                impl Encode for #name {
                    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
                    where
                        W: std::io::Write,
                    {
                        #(#statements)*
                        Ok(())
                    }
                }
            };
            TokenStream::from(expanded)
        }
        syn::Data::Enum(ref data) => {
            let variants: Vec<quote::__private::TokenStream> = data
                .variants
                .iter()
                .enumerate()
                .map(|(tag, variant)| serialize_variant(variant, &name, tag as u8))
                .collect();

            let expanded: quote::__private::TokenStream = quote! {
                impl Encode for #name {
                    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
                    where
                        W: std::io::Write,
                    {
                        match *self {
                            #(#variants)*
                        }
                        Ok(())
                    }
                }
            };
            TokenStream::from(expanded)
        }
        _ => unimplemented!("Encode can only be derived for structs and enums"),
    }
}

fn serialize_field(field: &syn::Field, index: usize) -> quote::__private::TokenStream {
    match field.ident.clone() {
        Some(id) => quote! { self.#id.encode(&mut target)?; },
        None => {
            let index = syn::Index::from(index);
            quote! { self.#index.encode(&mut target)?; }
        }
    }
}

/// Enum variants are tagged with a single leading byte (their declaration
/// order), then each field is encoded in order. Variant bindings are named
/// positionally (`f0`, `f1`, ...) so variants with more than one unnamed
/// field serialize correctly.
fn serialize_variant(
    variant: &syn::Variant,
    name: &syn::Ident,
    tag: u8,
) -> quote::__private::TokenStream {
    let ident = variant.ident.clone();

    let bindings: Vec<quote::__private::TokenStream> = variant
        .fields
        .iter()
        .enumerate()
        .map(|(i, field)| match field.ident.clone() {
            Some(ident) => quote! { ref #ident, },
            None => {
                let binding = format_ident!("f{}", i);
                quote! { ref #binding, }
            }
        })
        .collect();

    let statements: Vec<quote::__private::TokenStream> = variant
        .fields
        .iter()
        .enumerate()
        .map(|(i, field)| match field.ident.clone() {
            Some(ident) => quote! { #ident.encode(&mut target)?; },
            None => {
                let binding = format_ident!("f{}", i);
                quote! { #binding.encode(&mut target)?; }
            }
        })
        .collect();

    let is_named = variant.fields.iter().any(|f| f.ident.is_some());
    let pattern = if bindings.is_empty() {
        quote! { #name::#ident }
    } else if is_named {
        quote! { #name::#ident { #(#bindings)* } }
    } else {
        quote! { #name::#ident ( #(#bindings)* ) }
    };

    quote! {
        #pattern => {
            #tag.encode(&mut target)?;
            #(#statements)*
        },
    }
}
