//! Derive macros for the consensus-critical `WrenSerialize` and
//! `WrenDeserialize` traits defined in `wren-chain`.
//!
//! The expansion serializes struct fields in declaration order, which is
//! exactly the composite-record rule of the canonical encoding.
extern crate proc_macro;
use proc_macro::TokenStream;

mod deserialize;
mod serialize;

#[proc_macro_derive(WrenSerialize)]
pub fn serializable(input: TokenStream) -> TokenStream {
    let ast = syn::parse(input).unwrap();
    serialize::impl_ser_macro(&ast)
}

#[proc_macro_derive(WrenDeserialize)]
pub fn deserializable(input: TokenStream) -> TokenStream {
    let ast = syn::parse(input).unwrap();
    deserialize::impl_deser_macro(&ast)
}
