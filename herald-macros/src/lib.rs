//! Procedural macros for Herald.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, LitStr, Path, parse_macro_input, parse_quote};

/// Derive macro for implementing `Message` trait.
///
/// Generic parameters get a `Message` bound. Use
/// `#[herald(crate = "herald_core")]` when deriving outside the `herald`
/// facade.
#[proc_macro_derive(Message, attributes(herald))]
pub fn derive_message(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_message(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_message(mut input: DeriveInput) -> syn::Result<TokenStream2> {
    let krate = crate_path(&input)?;
    let name = &input.ident;

    for param in input.generics.type_params_mut() {
        param.bounds.push(parse_quote!(#krate::Message));
    }
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #krate::Message for #name #ty_generics #where_clause {}
    })
}

fn crate_path(input: &DeriveInput) -> syn::Result<Path> {
    let mut krate: Path = parse_quote!(::herald);
    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("herald")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("crate") {
                let value: LitStr = meta.value()?.parse()?;
                krate = value.parse()?;
                Ok(())
            } else {
                Err(meta.error("unsupported herald attribute, expected `crate`"))
            }
        })?;
    }
    Ok(krate)
}
