use std::path::Path;

use crate::error::{Chainable, ErrorDetail, Result};

pub trait Format: Sized {
    /// The data format's error type.
    type Error: serde::de::Error + ErrorDetail + 'static;

    /// Parses `string` as the data format `Self` as a `T` or returns an error
    /// if the `string` is an invalid `T`.
    fn from_str<T: serde::de::DeserializeOwned>(string: &str) -> Result<T, Self::Error>;

    /// Reads the file at `path` and parses it as a `T`.
    fn read<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
        let string = std::fs::read_to_string(path).chain_with(|| error! {
            "failed to read file",
            "path" => path.display(),
        })?;

        Self::from_str(&string).chain_with(|| error! {
            "failed to parse file",
            "path" => path.display(),
        })
    }
}

macro_rules! impl_format {
    ($name:ident : $func:expr, $E:ty) => (
        #[derive(Debug, Default, Copy, Clone)]
        pub struct $name;

        impl Format for $name {
            type Error = $E;

            fn from_str<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, $E> {
                $func(s)
            }
        }
    );
}

impl_format!(Toml: toml::from_str, toml::de::Error);
impl_format!(Json: serde_json::from_str, serde_json::error::Error);
