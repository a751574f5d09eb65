//! Helper macro for generating domain port error enums.

macro_rules! define_port_error {
    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        ::paste::paste! {
            #[doc = concat!("Helper constructor for [`Self::", stringify!($variant), "`].")]
            pub fn [<$variant:snake>]($( $field: impl Into<$ty> ),*) -> Self {
                Self::$variant { $( $field: $field.into() ),* }
            }
        }
    };
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident { $($field:ident : $ty:ty),* $(,)? } => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant { $($field : $ty),* },
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant { $($field : $ty),* });
            )*
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    define_port_error! {
        /// Example error for macro coverage.
        pub enum ExamplePortError {
            /// String payload.
            Foo { message: String } => "foo: {message}",
            /// Mixed payload.
            Bar { message: String, count: u32 } => "bar: {message} ({count})",
        }
    }

    #[test]
    fn constructors_accept_str_for_string_fields() {
        let err = ExamplePortError::foo("hello");
        assert_eq!(err.to_string(), "foo: hello");
    }

    #[test]
    fn constructors_support_mixed_fields() {
        let err = ExamplePortError::bar("hello", 42_u32);
        assert_eq!(err.to_string(), "bar: hello (42)");
    }
}
