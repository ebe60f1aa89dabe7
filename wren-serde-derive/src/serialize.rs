use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;

pub fn impl_ser_macro(ast: &syn::DeriveInput) -> TokenStream {
    let name = ast.ident.clone();
    match ast.data {
        syn::Data::Struct(ref data) => {
            let statements: Vec<TokenStream2> = data
                .fields
                .iter()
                .enumerate()
                .map(|(index, field)| serialize_field(field, index))
                .collect();

            let expanded = quote! {
                impl WrenSerialize for #name {
                    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
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
            let variants: Vec<TokenStream2> = data
                .variants
                .iter()
                .map(|variant| serialize_variant(variant, &name))
                .collect();

            let expanded = quote! {
                impl WrenSerialize for #name {
                    fn wren_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
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
        _ => unimplemented!(),
    }
}

fn serialize_field(field: &syn::Field, index: usize) -> TokenStream2 {
    match field.ident.clone() {
        Some(id) => quote! { self.#id.wren_serialize(&mut target)?; },
        None => {
            let index = syn::Index::from(index);
            quote! { self.#index.wren_serialize(&mut target)?; }
        }
    }
}

fn serialize_variant(variant: &syn::Variant, name: &syn::Ident) -> TokenStream2 {
    let ident = variant.ident.clone();

    let subfields: Vec<TokenStream2> = variant
        .fields
        .iter()
        .map(|field| {
            if let Some(ident) = field.ident.clone() {
                quote! { ref #ident , }
            } else {
                quote!(ref inner)
            }
        })
        .collect();

    let statements: Vec<TokenStream2> = variant
        .fields
        .iter()
        .map(|field| {
            if let Some(ident) = field.ident.clone() {
                quote! { #ident.wren_serialize(&mut target)?; }
            } else {
                quote! { inner.wren_serialize(&mut target)?; }
            }
        })
        .collect();

    if !subfields.is_empty() {
        quote! { #name::#ident ( #(#subfields)* ) => {
            #(#statements)*
        },}
    } else {
        quote! { #name::#ident => {
            #(#statements)*
        },}
    }
}
