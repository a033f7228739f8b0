extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::{Ident, Span};
use quote::quote;

/// Options accepted by both attributes: `crate = "name"` and `capacity = N`.
struct Options {
    krate: Ident,
    capacity: Option<usize>,
}

fn parse_options(args: syn::AttributeArgs) -> Result<Options, syn::Error> {
    let mut krate = None;
    let mut capacity = None;
    for arg in args {
        let option = match arg {
            syn::NestedMeta::Meta(syn::Meta::NameValue(option)) => option,
            _ => return Err(syn::Error::new_spanned(arg, "expect `name = value` option")),
        };
        let name = option.path.get_ident().map(|ident| ident.to_string()).unwrap_or_default();
        match (name.as_str(), &option.lit) {
            ("crate", syn::Lit::Str(s)) if krate.is_none() => {
                let path = s.parse::<syn::Path>()?;
                krate = Some(path.get_ident().cloned().ok_or_else(|| syn::Error::new_spanned(s, "expect crate name"))?);
            },
            ("capacity", syn::Lit::Int(n)) if capacity.is_none() => match n.base10_parse::<usize>()? {
                0 => return Err(syn::Error::new_spanned(n, "capacity must not be zero")),
                n => capacity = Some(n),
            },
            ("crate" | "capacity", _) => {
                return Err(syn::Error::new_spanned(&option, format!("duplicated or malformed `{}`", name)))
            },
            _ => return Err(syn::Error::new_spanned(&option.path, "unknown option")),
        }
    }
    Ok(Options { krate: krate.unwrap_or_else(|| Ident::new("coweave", Span::call_site())), capacity })
}

fn generate(is_test: bool, attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = syn::parse_macro_input!(attr as syn::AttributeArgs);
    let input = syn::parse_macro_input!(item as syn::ItemFn);
    let options = match parse_options(args) {
        Ok(options) => options,
        Err(err) => return TokenStream::from(err.into_compile_error()),
    };

    let ret = &input.sig.output;
    let inputs = &input.sig.inputs;
    let name = &input.sig.ident;
    let body = &input.block;
    let attrs = &input.attrs;
    let vis = &input.vis;

    let macro_name = if is_test { "#[coweave::test]" } else { "#[coweave::main]" };

    if input.sig.asyncness.is_some() {
        let err = syn::Error::new_spanned(
            &input.sig.fn_token,
            format!("only synchronous function can be tagged with {}, spawn coroutines inside it", macro_name),
        );
        return TokenStream::from(err.into_compile_error());
    }

    if !is_test && name != "main" {
        let err = syn::Error::new_spanned(name, "only the main function can be tagged with #[coweave::main]");
        return TokenStream::from(err.into_compile_error());
    }

    let header = if is_test {
        quote! {
            #[::core::prelude::v1::test]
        }
    } else {
        quote! {}
    };

    let krate = &options.krate;
    let capacity = options.capacity.map(|n| quote! { builder.capacity(#n); });
    let result = quote! {
        #header
        #(#attrs)*
        #vis fn #name() #ret {
            fn entry(#inputs) #ret {
                #body
            }

            let mut builder = #krate::runtime::Builder::default();
            #capacity
            let scheduler = builder.build();
            let scope = scheduler.enter();
            let result = entry();
            scheduler.run_to_quiescence();
            drop(scope);
            result
        }
    };

    result.into()
}

/// Executes marked main function with a freshly built scheduler entered.
///
/// Coroutines still queued after the function returns are drained before exit.
///
/// ## Options
/// * `capacity`: positive integer to specify initial capacity of scheduler run queue
///
/// ## Examples
/// ```ignore
/// #[coweave::main]
/// fn main() {
///     let wait = coweave::coroutine::spawn(async { Ok::<_, coweave::Exception>(5) });
///     assert_eq!(*wait.get(), 5);
/// }
/// ```
///
/// ```ignore
/// #[coweave::main(capacity = 16)]
/// fn main() {
///     let promise = coweave::WaitPromise::<()>::new();
///     promise.finish();
/// }
/// ```
#[cfg(not(test))]
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    generate(false, attr, item)
}

/// Executes marked test function with a freshly built scheduler entered.
///
/// See [macro@main] for configurable options.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    generate(true, attr, item)
}
