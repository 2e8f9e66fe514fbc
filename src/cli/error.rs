use std::fmt;
use std::io;

pub struct Error(String);

impl Error {
    pub fn new(s: &str) -> Error {
        Error(s.to_string())
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Error {
        Error(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error(s)
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Error {
        Error(format!("{}", err))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error(format!("{}", err))
    }
}

impl From<gptcore::Error> for Error {
    fn from(err: gptcore::Error) -> Error {
        match err {
            gptcore::Error::Io(err) => Error(format!("I/O error: {}", err)),
            gptcore::Error::Write { step, source } => {
                Error(format!("could not write the {}: {}", step, source))
            }
            err => Error(format!("{}", err)),
        }
    }
}

impl From<gptcore::guid::GuidError> for Error {
    fn from(err: gptcore::guid::GuidError) -> Error {
        Error(format!("{}", err))
    }
}

#[cfg(target_os = "linux")]
impl From<gptcore::linux::BlockError> for Error {
    fn from(err: gptcore::linux::BlockError) -> Error {
        Error(format!("{}", err))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)?;

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
