/// Implements `to_u8`, `from_u8` and `Display` for a fieldless enum. This is the representation
/// used by the store.
macro_rules! byte_enum {
    ($name:ident { $($variant:ident = $byte:expr => $display:expr),* $(,)? }) => {
        impl $name {
            #[inline]
            pub fn to_u8(self) -> u8 {
                match self {
                    $(Self::$variant => $byte,)*
                }
            }

            #[inline]
            pub fn from_u8(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Self::$variant),)*
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str(match self {
                    $(Self::$variant => $display,)*
                })
            }
        }
    };
}

pub(crate) use byte_enum;
