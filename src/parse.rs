//! Helper macros for parsing the packed little-endian
//! blocks of the camera container.
//!
//! Both the BMP header and the metadata block are plain
//! sequences of fixed-width integers, so a struct
//! declaration with field types is all the layout we need.

use anyhow::Result;
use byteordered::{byteorder::ReadBytesExt, ByteOrdered, Endian};

/// Declare a [`Parseable`] struct.
///
/// Fields are read in declaration order. A field written as
/// `name => u8 as u16` is read as the first type and stored
/// as the second. Supports only simple structs without
/// generics.
macro_rules! declare_parseable_struct {
    (
        $(#[$smeta:meta])*
            $svis:vis struct $sname:ident {
                #format => $errh:expr,
                $($fvis:vis $name:ident $(as $err:expr)? => $ty:ty $(as $ty2:ty)? ),* $(,)?
            }
    ) => {

        $(#[$smeta])*
            $svis struct $sname {
                $($fvis $name: declaration_type!($ty $(as $ty2)?)),*
            }

        impl crate::parse::Parseable for $sname {
            type Error = anyhow::Error;
            fn parse<T: byteordered::byteorder::ReadBytesExt, E: byteordered::Endian>(
                r: &mut byteordered::ByteOrdered<T, E>,
            ) -> std::result::Result<Self, Self::Error> {
                parse_as_bindings!(
                    r, #format => $errh,
                    $( $name $(as $err)? => $ty $(as $ty2)? ),*
                );
                Ok($sname {
                    $( $name ),*
                })
            }
        }
    };
    (
        $(#[$smeta:meta])*
            $svis:vis struct $sname:ident {
                $($fvis:vis $name:ident $(as $err:expr)? => $ty:ty $(as $ty2:ty)? ),* $(,)?
            }
    ) => {
        declare_parseable_struct! {
            $(#[$smeta])*
                $svis struct $sname {
                    #format => |e| format!("parsing field `{}.{}`", stringify!($sname), e),
                    $($fvis $name $(as $err)? => $ty $(as $ty2)?),*
                }
        }
    };
}

/// Helper macro that expands to the parsed type or the
/// converted type.
macro_rules! declaration_type {
    ($ty:ty as $ty2:ty) => {
        $ty2
    };
    ($ty:ty) => {
        $ty
    };
}

/// Generate `let` bindings by parsing a reader.
macro_rules! parse_as_bindings {
    (
        $rdr: expr $(, #format => $errh:expr)?,
        $( $name:ident $(as $err:expr)? => $ty:ty $(as $ty2:ty)? ),* $(,)?
    ) => {
        #[allow(unused_parens)]
        let ($($name),*) = parse_from_reader!(
            $rdr $(, $errh)?,
            $( $ty $(as $ty2)? => stringify_binding!($name $(as $err)?) ),*
        );
    };
}

/// Helper macro to generate error context as a given
/// expression, or default to identifier name.
macro_rules! stringify_binding {
    ($name: ident as $err:expr) => {
        $err
    };
    ($name: ident) => {
        stringify!($name)
    };
}

/// Generate expression that evaluates to tuple of values
/// parsed from a reader.
macro_rules! parse_from_reader {
    ($rdr: expr, $errh: expr, $( $ty:ty $(as $ty2:ty)? => $err:expr ),* $(,)?) => {{
        let rdr = $rdr;
        ($(
            anyhow::Context::with_context(
                <$ty as crate::parse::Parseable>::parse(&mut *rdr), || ($errh)($err)
            )? $(as $ty2)?
        ),*)
    }};
    ($rdr: expr, $( $ty:ty $(as $ty2:ty)? => $err:expr ),* $(,)?) => {{
        parse_from_reader!($rdr, |e| format!("field `{}`", e), $( $ty $(as $ty2)? => $err ),*)
    }};
}

/// Parse a [`Parseable`] from the front of a little-endian
/// byte slice. Trailing bytes are left unread.
pub(crate) fn parse_le<P>(bytes: &[u8]) -> Result<P>
where
    P: Parseable,
    <P as Parseable>::Error: Into<anyhow::Error>,
{
    let mut rdr = ByteOrdered::le(bytes);
    P::parse(&mut rdr).map_err(Into::into)
}

pub(crate) trait Parseable: Sized {
    type Error;
    fn parse<T: ReadBytesExt, E: Endian>(r: &mut ByteOrdered<T, E>) -> Result<Self, Self::Error>;
}

use std::{error::Error, io::Error as IOError};
macro_rules! impl_parseable {
    ($ty:ty, $method:ident) => {
        impl Parseable for $ty {
            type Error = IOError;
            fn parse<T: ReadBytesExt, E: Endian>(
                r: &mut ByteOrdered<T, E>,
            ) -> Result<Self, IOError> {
                r.$method()
            }
        }
    };
}

impl_parseable!(u8, read_u8);
impl_parseable!(i8, read_i8);
impl_parseable!(u16, read_u16);
impl_parseable!(i16, read_i16);
impl_parseable!(u32, read_u32);
impl_parseable!(i32, read_i32);

impl<Ty, const N: usize> Parseable for [Ty; N]
where
    Ty: Parseable,
    <Ty as Parseable>::Error: Send + Sync + Error + 'static,
    [Ty; N]: Default,
{
    type Error = anyhow::Error;
    fn parse<T: ReadBytesExt, E: Endian>(r: &mut ByteOrdered<T, E>) -> Result<Self, Self::Error> {
        let mut out: [Ty; N] = Default::default();
        for slot in out.iter_mut() {
            *slot = Ty::parse(r)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    declare_parseable_struct! {
        #[derive(Debug)]
        struct Reading {
            code => u8 as u32,
            value => i16,
            tail as "reserved" => [u8; 3],
        }
    }

    declare_parseable_struct! {
        #[derive(Debug)]
        struct Wrapped {
            #format => |e| format!("parsing `Wrapped.{}` (custom message)", e),
            magic => [u8; 2],
            reading => Reading,
        }
    }

    #[test]
    fn parses_fields_in_order() -> Result<()> {
        let bytes = [7u8, 0x36, 0x01, 1, 2, 3, 0xAA];
        let r: Reading = parse_le(&bytes)?;
        assert_eq!(r.code, 7u32);
        assert_eq!(r.value, 310);
        assert_eq!(r.tail, [1, 2, 3]);
        Ok(())
    }

    #[test]
    fn nested_struct_reports_field_context() {
        let bytes = [b'B', b'M', 7, 0x36];
        let err = parse_le::<Wrapped>(&bytes).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("Wrapped.reading"), "{}", msg);
        assert!(msg.contains("Reading.value"), "{}", msg);
    }

    #[test]
    fn negative_values_are_sign_extended() -> Result<()> {
        let bytes = [0, 0xF6, 0xFF, 0, 0, 0];
        let r: Reading = parse_le(&bytes)?;
        assert_eq!(r.value, -10);
        Ok(())
    }
}
