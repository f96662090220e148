use std::{fmt, io};
use std::panic::Location;
use std::error::Error as StdError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification of a failure, used by the orchestrator to decide
/// what is fatal and by the render call to pick the root cause out of several
/// concurrent stage failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing directories, no source files, bad configuration values.
    Config,
    /// A malformed source record.
    Parse,
    /// No candidate layout exists for a mandatory renderable.
    Layout,
    /// Template registration or execution failed.
    Template,
    /// A transform stage failed.
    Transform,
    /// The destination store rejected a write.
    Publish,
    Io,
    /// A neighbouring pipeline stage went away. Always a secondary failure.
    Disconnected,
    Other,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    detail: Vec<Box<dyn ErrorDetail>>,
    prev: Option<Box<Error>>,
    _location: &'static Location<'static>,
}

pub trait ErrorDetail: fmt::Display + fmt::Debug + Send + Sync {
    fn context(&self) -> Vec<(Option<String>, String)> { vec![] }

    fn kind(&self) -> ErrorKind { ErrorKind::Other }
}

impl Error {
    #[track_caller]
    pub fn from_std<E>(error: E) -> Self
        where E: StdError + Send + Sync + 'static
    {
        Error::from(Box::new(error) as Box<dyn StdError + Send + Sync>)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// `true` if this error only reports that a pipeline neighbour vanished.
    pub fn is_disconnect(&self) -> bool {
        self.kind == ErrorKind::Disconnected
    }

    /// Places `self` behind `other`. The result keeps `other`'s kind unless
    /// `other` is unclassified.
    pub fn chain(self, mut other: Error) -> Self {
        #[inline]
        fn _chain(error: Error, behind: &mut Error) {
            if let Some(prev) = behind.prev.as_mut() {
                _chain(error, prev);
            } else {
                behind.prev = Some(Box::new(error));
            }
        }

        if other.kind == ErrorKind::Other {
            other.kind = self.kind;
        }

        _chain(self, &mut other);
        other
    }

    /// Picks the root cause out of the results of concurrently running
    /// pipeline stages, listed in pipeline order.
    pub fn first_cause<I>(results: I) -> Result<()>
        where I: IntoIterator<Item = Result<()>>
    {
        let mut disconnect = None;
        for result in results {
            match result {
                Ok(()) => continue,
                Err(e) if e.is_disconnect() => { disconnect.get_or_insert(e); },
                Err(e) => return Err(e),
            }
        }

        disconnect.map_or(Ok(()), Err)
    }
}

impl ErrorDetail for &(dyn StdError + Send + Sync) {
    fn context(&self) -> Vec<(Option<String>, String)> {
        let mut ctxt = vec![];
        let mut error = self.source();
        while let Some(e) = error {
            ctxt.push((None, e.to_string()));
            error = e.source();
        }

        ctxt
    }
}

impl ErrorDetail for Box<dyn StdError + Send + Sync> {
    fn context(&self) -> Vec<(Option<String>, String)> {
        let error: &(dyn StdError + Send + Sync) = &**self;
        error.context()
    }
}

macro_rules! impl_error_detail_with_std_error {
    ($T:ty $(=> |$e:ident| $kind:expr)?) => {
        impl $crate::error::ErrorDetail for $T {
            fn context(&self) -> Vec<(Option<String>, String)> {
                let error: &(dyn std::error::Error + Send + Sync) = self;
                error.context()
            }

            $(
                fn kind(&self) -> $crate::error::ErrorKind {
                    let $e = self;
                    $kind
                }
            )?
        }
    }
}

impl_error_detail_with_std_error!(io::Error => |e| match e.kind() {
    io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionAborted => ErrorKind::Disconnected,
    _ => ErrorKind::Io,
});

impl_error_detail_with_std_error!(toml::de::Error => |_e| ErrorKind::Parse);
impl_error_detail_with_std_error!(serde_json::Error => |_e| ErrorKind::Parse);
impl_error_detail_with_std_error!(chrono::ParseError => |_e| ErrorKind::Parse);
impl_error_detail_with_std_error!(minijinja::Error => |e| match e.kind() {
    minijinja::ErrorKind::WriteFailure => ErrorKind::Disconnected,
    _ => ErrorKind::Template,
});

impl ErrorDetail for String { }
impl ErrorDetail for &str { }

impl<T: ErrorDetail + 'static> From<T> for Error {
    #[track_caller]
    fn from(detail: T) -> Self {
        Error {
            kind: detail.kind(),
            prev: None,
            detail: vec![Box::new(detail)],
            _location: std::panic::Location::caller(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Copy, Clone)] struct Indent(usize);

        impl fmt::Display for Indent {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for _ in 0..(self.0 * 4) { write!(f, " ")? }
                Ok(())
            }
        }

        struct NestedError<'a>(Indent, &'a Error);

        impl fmt::Display for NestedError<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let NestedError(indent, e) = self;

                for detail in &e.detail {
                    let indent_line = format!("\n{indent}");

                    writeln!(f, "{indent}{}", format!("{:#}", detail).replace('\n', &indent_line))?;
                    if let Some(prev) = &e.prev {
                        NestedError(Indent(indent.0 + 1), prev).fmt(f)?;
                    }

                    for (key, value) in detail.context() {
                        let value = value.replace('\n', &indent_line);
                        if let Some(key) = key {
                            writeln!(f, "{indent}{key}: {value}")?;
                        } else {
                            writeln!(f, "{indent}{value}")?;
                        }
                    }

                    if std::env::var_os("RUST_BACKTRACE").is_some() {
                        writeln!(f, "{indent}[{}]", e._location)?;
                    }
                }

                Ok(())
            }
        }

        NestedError(Indent(0), self).fmt(f)
    }
}

#[derive(Debug)]
pub struct MakeshiftError {
    pub message: String,
    pub parameters: Vec<(Option<String>, String)>,
}

#[doc(hidden)]
#[macro_export]
macro_rules! err {
    ($($token:tt)*) => (Err($crate::error!($($token)*)));
}

#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ($msg:expr, $($rest:tt)*) => (
        $crate::error::Error::from($crate::error::MakeshiftError {
            message: $msg.to_string(),
            parameters: {
                #[allow(unused_mut)]
                let mut v: Vec<(Option<String>, String)> = Vec::new();
                $crate::error!(@param v $($rest)*);
                v
            },
        })
    );

    ($msg:expr) => ( $crate::error!($msg,) );

    (@param $v:ident $key:expr => $value:expr, $($rest:tt)*) => {
        $crate::error!(@param $v $key => $value);
        $crate::error!(@param $v $($rest)*);
    };

    (@param $v:ident $key:expr => $value:expr) => {
        $v.push((Some($key.to_string()), $value.to_string()));
    };

    (@param $v:ident $value:expr, $($rest:tt)*) => {
        $crate::error!(@param $v $value);
        $crate::error!(@param $v $($rest)*);
    };

    (@param $v:ident $value:expr) => {
        $v.push((None, $value.to_string()));
    };

    (@param $v:ident $(,)?) => { };
}

impl fmt::Display for MakeshiftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

impl ErrorDetail for MakeshiftError {
    fn context(&self) -> Vec<(Option<String>, String)> {
        self.parameters.clone()
    }
}

pub trait Chainable<T> {
    fn chain(self, other: impl Into<Error>) -> Result<T>;

    fn chain_with<F, E>(self, f: F) -> Result<T>
        where F: FnOnce() -> E, E: Into<Error>;

    fn kind(self, kind: ErrorKind) -> Result<T>;
}

impl<T, E: Into<Error>> Chainable<T> for Result<T, E> {
    #[track_caller]
    fn chain(self, other: impl Into<Error>) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().chain(other.into()))
        }
    }

    fn chain_with<F, Err>(self, f: F) -> Result<T>
        where F: FnOnce() -> Err, Err: Into<Error>,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().chain(f().into()))
        }
    }

    fn kind(self, kind: ErrorKind) -> Result<T> {
        self.map_err(|e| e.into().with_kind(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_error_inherits_kind() {
        let inner = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(inner.kind(), ErrorKind::Io);

        let outer = inner.chain(error!("failed to read layout", "name" => "x.html"));
        assert_eq!(outer.kind(), ErrorKind::Io);

        let text = outer.to_string();
        assert!(text.contains("failed to read layout"));
        assert!(text.contains("name: x.html"));
        assert!(text.contains("gone"));
    }

    #[test]
    fn broken_pipe_is_a_disconnect() {
        let e = Error::from(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(e.is_disconnect());
    }

    #[test]
    fn first_cause_skips_disconnects() {
        let results = vec![
            Ok(()),
            Err(Error::from(io::Error::from(io::ErrorKind::BrokenPipe))),
            Err(error!("stage blew up").with_kind(ErrorKind::Transform)),
        ];

        let e = Error::first_cause(results).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Transform);

        let only_disconnects = vec![Err(Error::from(io::Error::from(io::ErrorKind::BrokenPipe)))];
        assert!(Error::first_cause(only_disconnects).unwrap_err().is_disconnect());
        assert!(Error::first_cause(vec![Ok(()), Ok(())]).is_ok());
    }
}
