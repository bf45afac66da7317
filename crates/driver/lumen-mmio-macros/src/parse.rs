//! Parser for the `register_block!` DSL.

use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Attribute, Ident, LitInt, Token, Visibility, braced, bracketed};

/// Parsed `register_block!` input.
pub struct RegisterBlock {
    pub attrs: Vec<Attribute>,
    pub vis: Visibility,
    pub name: Ident,
    pub registers: Vec<RegisterDef>,
}

/// Direction(s) in which a register may be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn readable(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

impl Parse for AccessMode {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let ident: Ident = input.parse()?;
        Ok(match ident.to_string().as_str() {
            "ro" => Self::ReadOnly,
            "wo" => Self::WriteOnly,
            "rw" => Self::ReadWrite,
            _ => return Err(syn::Error::new(ident.span(), "access mode must be ro, wo or rw")),
        })
    }
}

/// Access width of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegWidth {
    U8,
    U16,
    U32,
    U64,
}

impl RegWidth {
    const ALL: [Self; 4] = [Self::U8, Self::U16, Self::U32, Self::U64];

    /// Integer type of the register, also the `RegisterIo` method suffix.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
        }
    }
}

impl Parse for RegWidth {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let ident: Ident = input.parse()?;
        Self::ALL
            .into_iter()
            .find(|w| ident == w.type_name())
            .ok_or_else(|| syn::Error::new(ident.span(), "width must be u8, u16, u32 or u64"))
    }
}

/// One `[offset; width; access] name => Flags` entry.
pub struct RegisterDef {
    pub attrs: Vec<Attribute>,
    pub offset: LitInt,
    pub width: RegWidth,
    pub access: AccessMode,
    pub name: Ident,
    pub bitflags_type: Option<Ident>,
}

impl Parse for RegisterDef {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;

        let header;
        bracketed!(header in input);
        let offset: LitInt = header.parse()?;
        offset.base10_parse::<usize>()?;
        header.parse::<Token![;]>()?;
        let width: RegWidth = header.parse()?;
        header.parse::<Token![;]>()?;
        let access: AccessMode = header.parse()?;

        let name: Ident = input.parse()?;
        let bitflags_type = if input.parse::<Option<Token![=>]>>()?.is_some() {
            Some(input.parse()?)
        } else {
            None
        };

        Ok(Self {
            attrs,
            offset,
            width,
            access,
            name,
            bitflags_type,
        })
    }
}

impl Parse for RegisterBlock {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let vis: Visibility = input.parse()?;
        let name: Ident = input.parse()?;

        let body;
        braced!(body in input);
        let registers: Vec<RegisterDef> =
            Punctuated::<RegisterDef, Token![,]>::parse_terminated(&body)?
                .into_iter()
                .collect();

        for (i, reg) in registers.iter().enumerate() {
            for earlier in &registers[..i] {
                check_pair(earlier, reg)?;
            }
        }

        Ok(Self {
            attrs,
            vis,
            name,
            registers,
        })
    }
}

/// Rejects duplicate names, and two registers at one offset that could both
/// be read or both be written. A read-only and a write-only register may
/// share an offset.
fn check_pair(earlier: &RegisterDef, reg: &RegisterDef) -> syn::Result<()> {
    if earlier.name == reg.name {
        return Err(syn::Error::new(
            reg.name.span(),
            format!("register `{}` defined twice", reg.name),
        ));
    }

    let same_offset = earlier.offset.base10_parse::<usize>()? == reg.offset.base10_parse::<usize>()?;
    let clash = (earlier.access.readable() && reg.access.readable())
        || (earlier.access.writable() && reg.access.writable());
    if same_offset && clash {
        return Err(syn::Error::new(
            reg.offset.span(),
            format!("`{}` overlaps `{}` in the same direction", reg.name, earlier.name),
        ));
    }
    Ok(())
}
