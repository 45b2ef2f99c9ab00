//! Derive macros for ezra-rs. Use `#[derive(Injectable)]` so you don't need to hand-write `impl Injectable for T`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Expr, Field, Fields};

/// How one field is filled in.
enum FieldSource {
    /// `#[inject]`: `Arc<T>` taken from the arguments or resolved.
    Dependency,
    /// Plain field: argument value, required.
    Value,
    /// `#[arg(default)]`: argument value or `Default::default()`.
    ValueOrDefault,
    /// `#[arg(default = expr)]`: argument value or `expr`.
    ValueOr(Expr),
}

fn field_source(field: &Field) -> syn::Result<FieldSource> {
    let mut source = FieldSource::Value;
    for attr in &field.attrs {
        if attr.path().is_ident("inject") {
            source = FieldSource::Dependency;
        } else if attr.path().is_ident("arg") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("default") {
                    source = if meta.input.peek(syn::Token![=]) {
                        FieldSource::ValueOr(meta.value()?.parse()?)
                    } else {
                        FieldSource::ValueOrDefault
                    };
                    Ok(())
                } else {
                    Err(meta.error("expected `default` or `default = <expr>`"))
                }
            })?;
        }
    }
    Ok(source)
}

fn field_value(field: &Field, name: &str) -> syn::Result<TokenStream2> {
    let tokens = match field_source(field)? {
        FieldSource::Dependency => quote! { resolver.dependency(args, #name)? },
        FieldSource::Value => quote! { resolver.value(args, #name)? },
        FieldSource::ValueOrDefault => {
            quote! { resolver.value_or_else(args, #name, ::std::default::Default::default)? }
        }
        FieldSource::ValueOr(expr) => quote! { resolver.value_or_else(args, #name, || #expr)? },
    };
    Ok(tokens)
}

/// Implements the `Injectable` trait: each field is resolved in declaration order.
/// `#[inject]` marks an `Arc<T>` dependency; other fields are argument values, with
/// `#[arg(default)]` or `#[arg(default = expr)]` supplying a fallback.
/// Parameter names are the field names (`"0"`, `"1"`, ... for tuple structs).
/// Requires `Injectable`, `Resolver`, `Args` and `ResolveError` to be in scope (e.g. `use ezra_rs::{...}`).
#[proc_macro_derive(Injectable, attributes(inject, arg))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(name, "Injectable can only be derived for structs"));
    };

    let body = match &data.fields {
        Fields::Named(fields) => {
            let mut inits = Vec::new();
            for field in &fields.named {
                let ident = field
                    .ident
                    .as_ref()
                    .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
                let value = field_value(field, &ident.to_string())?;
                inits.push(quote! { #ident: #value });
            }
            quote! { Self { #(#inits),* } }
        }
        Fields::Unnamed(fields) => {
            let mut bindings = Vec::new();
            let mut idents = Vec::new();
            for (i, field) in fields.unnamed.iter().enumerate() {
                let binding = format_ident!("field_{}", i);
                let value = field_value(field, &i.to_string())?;
                bindings.push(quote! { let #binding = #value; });
                idents.push(binding);
            }
            quote! {
                #(#bindings)*
                Self(#(#idents),*)
            }
        }
        Fields::Unit => quote! { Self },
    };

    Ok(quote! {
        impl #impl_generics Injectable for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn construct(resolver: &Resolver, args: &mut Args) -> ::std::result::Result<Self, ResolveError> {
                ::std::result::Result::Ok({ #body })
            }
        }
    })
}
