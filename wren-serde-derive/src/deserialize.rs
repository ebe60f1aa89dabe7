use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;

pub fn impl_deser_macro(ast: &syn::DeriveInput) -> TokenStream {
    let name = ast.ident.clone();
    match ast.data {
        syn::Data::Struct(ref data) => {
            let named = data.fields.iter().all(|field| field.ident.is_some());
            let fields: Vec<TokenStream2> = data
                .fields
                .iter()
                .map(|field| deserialize_field(field))
                .collect();

            let constructor = if named {
                quote! { #name { #(#fields)* } }
            } else {
                quote! { #name ( #(#fields)* ) }
            };

            let expanded = quote! {
                impl WrenDeserialize for #name {
                    fn wren_deserialize<R: std::io::Read>(
                        mut reader: R,
                    ) -> Result<Self, SerializationError>
                    where
                        Self: Sized,
                    {
                        Ok(#constructor)
                    }
                }
            };
            TokenStream::from(expanded)
        }
        // Enum layouts are domain-specific (e.g. the coinbase input marker),
        // so their deserializers are written by hand.
        _ => unimplemented!(),
    }
}

fn deserialize_field(field: &syn::Field) -> TokenStream2 {
    let ty = field.ty.clone();
    match field.ident.clone() {
        Some(id) => quote! { #id: <#ty>::wren_deserialize(&mut reader)?, },
        None => quote! { <#ty>::wren_deserialize(&mut reader)?, },
    }
}
