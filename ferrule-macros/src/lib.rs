use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};

use syn::meta::ParseNestedMeta;
use syn::parse::{Parse as _, Parser as _};
use syn::spanned::Spanned as _;
use syn::{
    Attribute, Data, DeriveInput, Error, Fields, FnArg, GenericArgument, Ident, ImplItem,
    ItemImpl, Pat, PathArguments, ReturnType, Token, Type,
};

const INJECT_ATTR: &str = "inject";
const INJECTABLE_ATTR: &str = "injectable";
const CONSTRUCTOR_ATTR: &str = "constructor";

fn extract_generic_type(ty: &Type, wrapper: &str) -> Option<Type> {
    if let Type::Path(type_path) = ty
        && type_path.qself.is_none()
        && let Some(segment) = type_path.path.segments.last()
        && segment.ident == wrapper
        && let PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(GenericArgument::Type(inner)) = args.args.first()
    {
        return Some(inner.clone());
    }
    None
}

fn extract_arc_type(ty: &Type) -> Option<Type> {
    extract_generic_type(ty, "Arc")
}

/// `Option<Arc<T>>` marks a property.
fn extract_property_type(ty: &Type) -> Option<Type> {
    extract_arc_type(&extract_generic_type(ty, "Option")?)
}

fn parse_injectable_meta(interfaces: &mut Vec<Type>, meta: ParseNestedMeta) -> syn::Result<()> {
    if meta.path.is_ident("implements") {
        let content;
        syn::parenthesized!(content in meta.input);
        let types = content.parse_terminated(Type::parse, Token![,])?;
        interfaces.extend(types);
        return Ok(());
    }
    Err(meta.error("unsupported option, expected `implements(...)`"))
}

fn extract_interfaces(attrs: &[Attribute]) -> syn::Result<Vec<Type>> {
    let mut interfaces = Vec::new();
    for attr in attrs {
        if attr.path().is_ident(INJECT_ATTR) {
            attr.parse_nested_meta(|meta| parse_injectable_meta(&mut interfaces, meta))?;
        }
    }
    Ok(interfaces)
}

fn is_default_field(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut default = false;
    for attr in attrs {
        if attr.path().is_ident(INJECT_ATTR) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("default") {
                    default = true;
                    Ok(())
                } else {
                    Err(meta.error(format!("unsupported #[{INJECT_ATTR}] option, expected `default`")))
                }
            })?;
        }
    }
    Ok(default)
}

/// Generates the `Implements` impls, the `interfaces()` body and the type submission
/// shared by the derive and the attribute.
fn expand_registration(self_ty: &TokenStream2, interfaces: &[Type]) -> (TokenStream2, TokenStream2) {
    let impls = quote! {
        #(
            impl ::ferrule::Implements<#interfaces> for #self_ty {
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<#interfaces> {
                    self
                }
            }
        )*

        ::ferrule::submit_type!(#self_ty);
    };
    let interfaces_fn = if interfaces.is_empty() {
        quote! {}
    } else {
        quote! {
            fn interfaces() -> ::std::vec::Vec<::ferrule::InterfaceBinding> {
                ::std::vec![
                    #(::ferrule::InterfaceBinding::of::<#interfaces, Self>(),)*
                ]
            }
        }
    };
    (impls, interfaces_fn)
}

/// Derives `Injectable` for a struct.
///
/// * `Arc<T>` fields become constructor parameters named after the field.
/// * `Option<Arc<T>>` fields start empty and are filled by build-up.
/// * `#[inject(default)]` fields are initialized with `Default::default()`.
///
/// `#[inject(implements(dyn Trait, ...))]` on the struct declares the
/// interfaces the type can be served as.
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    handle_derive_injectable(input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

/// Implements `Injectable` from the `#[constructor]` functions of an impl block.
///
/// Constructor parameters must be `Arc<T>`; a constructor returns `Self` or
/// `Result<Self, E>` where `E` converts into a boxed error. Several
/// constructors may be declared; the container picks the one with the most
/// resolvable parameters. The attribute accepts the same `implements(...)`
/// option as the derive.
#[proc_macro_attribute]
pub fn injectable(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut interfaces = Vec::new();
    let parser = syn::meta::parser(|meta| parse_injectable_meta(&mut interfaces, meta));
    if let Err(err) = parser.parse(attr) {
        return err.into_compile_error().into();
    }
    match syn::parse::<ItemImpl>(item) {
        Ok(item_impl) => handle_injectable_impl(item_impl, &interfaces)
            .unwrap_or_else(Error::into_compile_error)
            .into(),
        Err(err) => Error::new(
            err.span(),
            format!("#[{INJECTABLE_ATTR}] can only be applied to impl blocks"),
        )
        .into_compile_error()
        .into(),
    }
}

fn handle_derive_injectable(input: DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "Generic types cannot be injectable",
        ));
    }
    let fields = match &input.data {
        Data::Struct(s) => &s.fields,
        _ => return Err(Error::new(name.span(), "Only structs are supported")),
    };

    let mut parameters = Vec::new();
    let mut field_lets = Vec::new();
    let mut field_inits = Vec::new();
    let mut properties = Vec::new();

    match fields {
        Fields::Named(fields) => {
            for field in &fields.named {
                let Some(field_ident) = field.ident.as_ref() else {
                    continue;
                };
                let field_ty = &field.ty;
                let field_name = field_ident.to_string();

                if is_default_field(&field.attrs)? {
                    field_inits.push(quote! { #field_ident: ::core::default::Default::default() });
                } else if let Some(inner_type) = extract_arc_type(field_ty) {
                    parameters.push(quote! {
                        ::ferrule::Parameter::of::<#inner_type>(#field_name)
                    });
                    field_lets.push(quote! {
                        let #field_ident = __ferrule_args.next::<#inner_type>()?;
                    });
                    field_inits.push(quote! { #field_ident });
                } else if let Some(inner_type) = extract_property_type(field_ty) {
                    let slot = format_ident!("__ferrule_slot_{}", field_ident);
                    properties.push(quote! {
                        ::ferrule::Property::new::<#inner_type>(#field_name, {
                            fn #slot(
                                this: &mut #name,
                            ) -> &mut ::core::option::Option<::std::sync::Arc<#inner_type>> {
                                &mut this.#field_ident
                            }
                            #slot
                        })
                    });
                    field_inits.push(quote! { #field_ident: ::core::option::Option::None });
                } else {
                    return Err(Error::new(
                        field_ty.span(),
                        format!(
                            "Injected fields must be Arc<T>, Option<Arc<T>> or use #[{INJECT_ATTR}(default)]"
                        ),
                    ));
                }
            }
        }
        Fields::Unnamed(_) => {
            return Err(Error::new(name.span(), "Tuple structs are not supported"));
        }
        Fields::Unit => {}
    }

    let construct = match fields {
        Fields::Unit => quote! { Self },
        _ => quote! { Self { #(#field_inits,)* } },
    };
    let args_ident = if parameters.is_empty() {
        quote! { _ }
    } else {
        quote! { __ferrule_args }
    };
    let properties_fn = if properties.is_empty() {
        quote! {}
    } else {
        quote! {
            fn properties() -> ::std::vec::Vec<::ferrule::Property<Self>> {
                ::std::vec![#(#properties,)*]
            }
        }
    };

    let interfaces = extract_interfaces(&input.attrs)?;
    let (registration, interfaces_fn) = expand_registration(&quote! { #name }, &interfaces);

    Ok(quote! {
        impl ::ferrule::Injectable for #name {
            fn constructors() -> ::std::vec::Vec<::ferrule::Constructor<Self>> {
                ::std::vec![::ferrule::Constructor::new(
                    ::std::vec![#(#parameters,)*],
                    |#args_ident: &mut ::ferrule::Arguments| {
                        #(#field_lets)*
                        ::core::result::Result::Ok(#construct)
                    },
                )]
            }

            #properties_fn

            #interfaces_fn
        }

        #registration
    })
}

struct ConstructorFn {
    name: Ident,
    parameters: Vec<(Ident, Type)>,
    fallible: bool,
}

fn parse_constructor(method: &syn::ImplItemFn, self_ty: &Type) -> syn::Result<ConstructorFn> {
    let sig = &method.sig;
    if sig.asyncness.is_some() {
        return Err(Error::new(sig.span(), "Constructors cannot be async"));
    }
    if !sig.generics.params.is_empty() {
        return Err(Error::new(sig.generics.span(), "Constructors cannot be generic"));
    }

    let fallible = match &sig.output {
        ReturnType::Default => {
            return Err(Error::new(sig.span(), "Constructor must return Self or Result<Self, E>"));
        }
        ReturnType::Type(_, ty) => {
            if extract_generic_type(ty, "Result").is_some() {
                true
            } else if is_self_type(ty, self_ty) {
                false
            } else {
                return Err(Error::new(ty.span(), "Constructor must return Self or Result<Self, E>"));
            }
        }
    };

    let mut parameters = Vec::new();
    for fn_arg in &sig.inputs {
        let FnArg::Typed(pat_type) = fn_arg else {
            return Err(Error::new(
                fn_arg.span(),
                "Constructor method cannot have self parameter",
            ));
        };
        let Pat::Ident(pat_ident) = pat_type.pat.as_ref() else {
            return Err(Error::new(pat_type.pat.span(), "Only simple bindings supported"));
        };
        let Some(inner_type) = extract_arc_type(&pat_type.ty) else {
            return Err(Error::new(
                pat_type.ty.span(),
                "Constructor arguments must be of type Arc<T>",
            ));
        };
        parameters.push((pat_ident.ident.clone(), inner_type));
    }

    Ok(ConstructorFn {
        name: sig.ident.clone(),
        parameters,
        fallible,
    })
}

fn is_self_type(ty: &Type, self_ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) if type_path.path.is_ident("Self") => true,
        _ => quote!(#ty).to_string() == quote!(#self_ty).to_string(),
    }
}

fn handle_injectable_impl(input: ItemImpl, interfaces: &[Type]) -> syn::Result<TokenStream2> {
    if input.trait_.is_some() {
        return Err(Error::new(input.span(), "Trait impls are not supported"));
    }
    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "Generic types cannot be injectable",
        ));
    }

    let self_ty = &input.self_ty;
    let mut constructors = Vec::new();
    for item in &input.items {
        if let ImplItem::Fn(method) = item
            && method
                .attrs
                .iter()
                .any(|attr| attr.path().is_ident(CONSTRUCTOR_ATTR))
        {
            constructors.push(parse_constructor(method, self_ty)?);
        }
    }
    if constructors.is_empty() {
        return Err(Error::new(
            input.span(),
            format!("No #[{CONSTRUCTOR_ATTR}] method found"),
        ));
    }

    let mut cleaned_input = input.clone();
    for item in &mut cleaned_input.items {
        if let ImplItem::Fn(method) = item {
            method
                .attrs
                .retain(|attr| !attr.path().is_ident(CONSTRUCTOR_ATTR));
        }
    }

    let descriptors = constructors.iter().map(|constructor| {
        let method_name = &constructor.name;
        let names: Vec<_> = constructor.parameters.iter().map(|(name, _)| name).collect();
        let types: Vec<_> = constructor.parameters.iter().map(|(_, ty)| ty).collect();
        let param_names = names.iter().map(|name| name.to_string());
        let args_ident = if names.is_empty() {
            quote! { _ }
        } else {
            quote! { __ferrule_args }
        };
        let call = quote! { Self::#method_name(#(#names),*) };
        let body = if constructor.fallible {
            quote! { #call.map_err(::core::convert::Into::into) }
        } else {
            quote! { ::core::result::Result::Ok(#call) }
        };
        quote! {
            ::ferrule::Constructor::new(
                ::std::vec![#(::ferrule::Parameter::of::<#types>(#param_names),)*],
                |#args_ident: &mut ::ferrule::Arguments| {
                    #(let #names = __ferrule_args.next::<#types>()?;)*
                    #body
                },
            )
        }
    });

    let (registration, interfaces_fn) = expand_registration(&quote! { #self_ty }, interfaces);

    Ok(quote! {
        #cleaned_input

        impl ::ferrule::Injectable for #self_ty {
            fn constructors() -> ::std::vec::Vec<::ferrule::Constructor<Self>> {
                ::std::vec![#(#descriptors,)*]
            }

            #interfaces_fn
        }

        #registration
    })
}
