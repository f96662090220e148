use std::borrow::Cow;
use std::path::Path;

pub trait PathExt: AsRef<Path> {
    fn without_extension(&self) -> Cow<'_, Path>;

    /// The path as a `/`-separated string, regardless of platform.
    fn to_slash_lossy(&self) -> String;
}

impl PathExt for Path {
    fn without_extension(&self) -> Cow<'_, Path> {
        match self.extension() {
            Some(_) => self.with_extension("").into(),
            None => self.into(),
        }
    }

    fn to_slash_lossy(&self) -> String {
        self.components()
            .filter_map(|c| match c {
                std::path::Component::Normal(s) => Some(s.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}
