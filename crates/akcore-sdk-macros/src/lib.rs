//! Procedural macros for building AutonomousKoi bus plugins.
//!
//! This crate provides `#[akcore_sdk::plugin]`, which generates the `start`
//! and `recv` WebAssembly exports the host expects and wires them to the
//! plugin's router.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemFn, parse_macro_input};

/// Marks the function that builds a plugin's router.
///
/// The function must take no arguments and return
/// `akcore_sdk::BusResult<akcore_sdk::TopicRouter>`. It runs once, from the
/// generated `start` export; every later `recv` dispatches through the
/// router it returned.
///
/// ```rust,ignore
/// #[akcore_sdk::plugin]
/// fn init() -> akcore_sdk::BusResult<akcore_sdk::TopicRouter> {
///     Ok(akcore_sdk::TopicRouter::new())
/// }
/// ```
#[proc_macro_attribute]
pub fn plugin(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        let attr = proc_macro2::TokenStream::from(attr);
        return syn::Error::new_spanned(attr, "#[plugin] takes no arguments")
            .to_compile_error()
            .into();
    }

    let input = parse_macro_input!(item as ItemFn);
    if !input.sig.inputs.is_empty() {
        return syn::Error::new_spanned(
            &input.sig.inputs,
            "the plugin init function must take no arguments",
        )
        .to_compile_error()
        .into();
    }
    if input.sig.asyncness.is_some() {
        return syn::Error::new_spanned(
            input.sig.asyncness,
            "the plugin init function cannot be async",
        )
        .to_compile_error()
        .into();
    }

    let init = &input.sig.ident;

    let expanded = quote! {
        #input

        #[allow(dead_code)]
        static __AKCORE_ROUTER: ::std::sync::OnceLock<::akcore_sdk::TopicRouter> =
            ::std::sync::OnceLock::new();

        /// Called once by the host after the plugin is loaded.
        #[cfg(target_arch = "wasm32")]
        #[allow(unsafe_code)]
        #[unsafe(no_mangle)]
        pub extern "C" fn start() -> i32 {
            ::akcore_sdk::entry::start(&__AKCORE_ROUTER, #init)
        }

        /// Called by the host for each message delivered to the plugin.
        #[cfg(target_arch = "wasm32")]
        #[allow(unsafe_code)]
        #[unsafe(no_mangle)]
        pub extern "C" fn recv() -> i32 {
            ::akcore_sdk::entry::recv(&__AKCORE_ROUTER)
        }
    };

    TokenStream::from(expanded)
}
