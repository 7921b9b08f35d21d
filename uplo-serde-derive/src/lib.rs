extern crate proc_macro;
use proc_macro::TokenStream;

mod deserialize;
mod serialize;

/// Derives `Decode` by decoding each field (or each tuple-variant field) in
/// declaration order. Assumes every field type itself implements `Decode`.
#[proc_macro_derive(Decode)]
pub fn decodable(input: TokenStream) -> TokenStream {
    let ast = syn::parse(input).unwrap();
    deserialize::impl_decode_macro(&ast)
}

/// Derives `Encode` by encoding each field (or each tuple-variant field) in
/// declaration order. Assumes every field type itself implements `Encode`.
#[proc_macro_derive(Encode)]
pub fn encodable(input: TokenStream) -> TokenStream {
    let ast = syn::parse(input).unwrap();
    serialize::impl_encode_macro(&ast)
}
