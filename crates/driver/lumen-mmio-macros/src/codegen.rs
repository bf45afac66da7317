//! Code generation for `register_block!`.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::parse::{RegisterBlock, RegisterDef};

/// Generates the register block struct and its accessors.
pub fn generate(block: &RegisterBlock) -> TokenStream {
    let vis = &block.vis;
    let name = &block.name;
    let attrs = &block.attrs;

    let accessors = block.registers.iter().map(generate_accessors);

    quote! {
        #(#attrs)*
        #vis struct #name<I: ::lumen_mmio::RegisterIo = ::lumen_mmio::Mmio> {
            io: I,
        }

        impl #name<::lumen_mmio::Mmio> {
            /// Creates an accessor over memory-mapped registers at `base`.
            ///
            /// # Safety
            ///
            /// `base` must be the physical address of a device register window
            /// covering every register of this block, accessible for the
            /// lifetime of the accessor.
            #[must_use]
            #vis const unsafe fn new(base: usize) -> Self {
                // SAFETY: forwarded to the caller.
                Self { io: unsafe { ::lumen_mmio::Mmio::new(base) } }
            }
        }

        impl<I: ::lumen_mmio::RegisterIo> #name<I> {
            /// Creates an accessor over an arbitrary register backend.
            #[must_use]
            #vis const fn with_io(io: I) -> Self {
                Self { io }
            }

            /// Returns the underlying register backend.
            #[must_use]
            #vis fn io(&self) -> &I {
                &self.io
            }

            #(#accessors)*
        }
    }
}

fn generate_accessors(reg: &RegisterDef) -> TokenStream {
    let mut out = TokenStream::new();

    let name = &reg.name;
    let offset = &reg.offset;
    let attrs = &reg.attrs;
    let width_ty = format_ident!("{}", reg.width.type_name());
    let read_fn = format_ident!("read_{}", reg.width.type_name());
    let write_fn = format_ident!("write_{}", reg.width.type_name());

    if reg.access.readable() {
        out.extend(match &reg.bitflags_type {
            Some(flags) => quote! {
                #(#attrs)*
                #[inline]
                pub fn #name(&self) -> #flags {
                    #flags::from_bits_retain(
                        ::lumen_mmio::RegisterIo::#read_fn(&self.io, #offset)
                    )
                }
            },
            None => quote! {
                #(#attrs)*
                #[inline]
                pub fn #name(&self) -> #width_ty {
                    ::lumen_mmio::RegisterIo::#read_fn(&self.io, #offset)
                }
            },
        });
    }

    if reg.access.writable() {
        let setter = format_ident!("set_{}", name);
        let doc = format!("Writes the `{name}` register.");
        out.extend(match &reg.bitflags_type {
            Some(flags) => quote! {
                #[doc = #doc]
                #[inline]
                pub fn #setter(&self, value: #flags) {
                    ::lumen_mmio::RegisterIo::#write_fn(&self.io, #offset, value.bits());
                }
            },
            None => quote! {
                #[doc = #doc]
                #[inline]
                pub fn #setter(&self, value: #width_ty) {
                    ::lumen_mmio::RegisterIo::#write_fn(&self.io, #offset, value);
                }
            },
        });
    }

    out
}
