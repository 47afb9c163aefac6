#[doc(hidden)]
#[macro_export]
macro_rules! dummy {
    ($t:tt) => {
        ()
    };
}

/// Declares an enum naming one of the chip's fixed hardware resources (a
/// buffer, filter or mask), along with the register that anchors it.
#[doc(hidden)]
#[macro_export]
macro_rules! index_def {
    (
        $(#[doc = $doc:expr])*
        $name:ident($method:ident) => {
            $(
                $(#[doc = $var_doc:expr])*
                $var:ident => $reg:expr
            ),*
        }
    ) => {
        $(#[doc = $doc])*
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
        pub enum $name {
            $(
                $(#[doc = $var_doc])*
                $var,
            )*
        }

        impl $name {
            #[doc = concat!("All valid options for [`", stringify!($name), "`], in index order.")]
            pub const ALL: [Self; <[_]>::len(&[$($crate::dummy!($var)),*])] = [$(Self::$var),*];

            #[doc = concat!("Returns the `", stringify!($method), "` register of this [`", stringify!($name), "`].")]
            pub const fn $method(self) -> $crate::regs::Register {
                match self {
                    $(Self::$var => $reg,)*
                }
            }

            /// Hardware index of this resource.
            #[inline]
            pub const fn index(self) -> u8 {
                self as u8
            }
        }

        impl core::convert::TryFrom<u8> for $name {
            type Error = $crate::error::InvalidIndex;

            fn try_from(value: u8) -> core::result::Result<Self, Self::Error> {
                Self::ALL
                    .get(value as usize)
                    .copied()
                    .ok_or($crate::error::InvalidIndex(value))
            }
        }
    };
}

// Logging goes to `defmt` and/or `log` depending on enabled features, and
// disappears entirely when neither is.

macro_rules! log_trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        defmt::trace!($($arg)*);
        #[cfg(feature = "log")]
        log::trace!($($arg)*);
    }};
}

macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        defmt::debug!($($arg)*);
        #[cfg(feature = "log")]
        log::debug!($($arg)*);
    }};
}

macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        defmt::warn!($($arg)*);
        #[cfg(feature = "log")]
        log::warn!($($arg)*);
    }};
}

pub(crate) use log_debug;
pub(crate) use log_trace;
pub(crate) use log_warn;
