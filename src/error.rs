use std::fmt;

#[derive(Debug)]
pub enum PrintError {
    SurfaceUnavailable(String),
    SurfaceLoad(String),
    Platform(String),
    InvalidConfiguration(String),
    Io(std::io::Error),
}

impl fmt::Display for PrintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrintError::SurfaceUnavailable(message) => {
                write!(f, "rendering surface unavailable: {}", message)
            }
            PrintError::SurfaceLoad(message) => {
                write!(f, "rendering surface failed to load: {}", message)
            }
            PrintError::Platform(message) => write!(f, "platform error: {}", message),
            PrintError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            PrintError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for PrintError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PrintError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PrintError {
    fn from(value: std::io::Error) -> Self {
        PrintError::Io(value)
    }
}
