//! Proc-macro crate behind `lumen_mmio::register_block!`.
//!
//! Expands a declarative register map into a struct that is generic over the
//! register backend, so the same driver code runs against real MMIO and the
//! recording mock used in host tests.

mod codegen;
mod parse;

use proc_macro::TokenStream;
use syn::parse_macro_input;

use crate::parse::RegisterBlock;

/// Generates a typed register block struct.
///
/// # Syntax
///
/// ```ignore
/// register_block! {
///     /// Doc comment for the struct.
///     pub StructName {
///         /// Doc comment for the register.
///         [offset; width; access_mode] name => OptionalBitflagsType,
///     }
/// }
/// ```
///
/// - `offset`: byte offset from the block base (integer literal)
/// - `width`: `u8`, `u16`, `u32`, or `u64`
/// - `access_mode`: `ro`, `wo` or `rw`
/// - `=> Type`: optional bitflags type with `from_bits_retain` and `bits`
///
/// Two registers may share an offset only if one is `ro` and the other `wo`
/// (a transmit register aliased with a receive register, for example).
/// Names must be unique.
///
/// # Generated code
///
/// `StructName<I: RegisterIo = Mmio>` with:
/// - `unsafe fn new(base: usize)` for the volatile backend
/// - `fn with_io(io: I)` for any other backend
/// - `fn name(&self)` per readable register
/// - `fn set_name(&self, value)` per writable register
#[proc_macro]
pub fn register_block(input: TokenStream) -> TokenStream {
    let block = parse_macro_input!(input as RegisterBlock);
    codegen::generate(&block).into()
}
