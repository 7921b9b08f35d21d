use proc_macro::TokenStream;
use quote::quote;
use syn;

pub fn impl_decode_macro(ast: &syn::DeriveInput) -> TokenStream {
    let name = ast.ident.clone();
    match ast.data {
        syn::Data::Struct(ref data) => {
            let is_tuple_struct = matches!(data.fields, syn::Fields::Unnamed(_));
            let statements: Vec<quote::__private::TokenStream> = data
                .fields
                .iter()
                .zip(0..1_000_000)
                .map(|(field, index)| deserialize_field(field, index))
                .collect();

            let expanded = if is_tuple_struct {
                quote! {
                    impl Decode for #name {
                        fn decode<R: std::io::Read>(mut target: R) -> Result<Self, DecodeError> {
                            Ok(#name (
                                #(#statements)*
                            ))
                        }
                    }
                }
            } else {
                quote! {
                    impl Decode for #name {
                        fn decode<R: std::io::Read>(mut target: R) -> Result<Self, DecodeError> {
                            Ok(#name {
                                #(#statements)*
                            })
                        }
                    }
                }
            };
            TokenStream::from(expanded)
        }
        syn::Data::Enum(ref data) => {
            let arms: Vec<quote::__private::TokenStream> = data
                .variants
                .iter()
                .enumerate()
                .map(|(tag, variant)| deserialize_variant(variant, &name, tag as u8))
                .collect();

            let expanded = quote! {
                impl Decode for #name {
                    fn decode<R: std::io::Read>(mut target: R) -> Result<Self, DecodeError> {
                        let tag = u8::decode(&mut target)?;
                        match tag {
                            #(#arms)*
                            other => Err(DecodeError::Parse("unknown enum discriminant")),
                        }
                    }
                }
            };
            TokenStream::from(expanded)
        }
        _ => unimplemented!("Decode can only be derived for structs and enums"),
    }
}

fn deserialize_field(field: &syn::Field, _index: usize) -> quote::__private::TokenStream {
    let ty = field.ty.clone();
    match field.ident.clone() {
        Some(name) => {
            quote! { #name: <#ty as Decode>::decode(&mut target)?, }
        }
        None => {
            quote! { <#ty as Decode>::decode(&mut target)?, }
        }
    }
}

fn deserialize_variant(
    variant: &syn::Variant,
    name: &syn::Ident,
    tag: u8,
) -> quote::__private::TokenStream {
    let ident = variant.ident.clone();
    let is_named = variant.fields.iter().any(|f| f.ident.is_some());

    let statements: Vec<quote::__private::TokenStream> = variant
        .fields
        .iter()
        .map(|field| {
            let ty = field.ty.clone();
            match field.ident.clone() {
                Some(fname) => quote! { #fname: <#ty as Decode>::decode(&mut target)?, },
                None => quote! { <#ty as Decode>::decode(&mut target)?, },
            }
        })
        .collect();

    let body = if variant.fields.is_empty() {
        quote! { #name::#ident }
    } else if is_named {
        quote! { #name::#ident { #(#statements)* } }
    } else {
        quote! { #name::#ident ( #(#statements)* ) }
    };

    quote! { #tag => Ok(#body), }
}
