use std::fmt;

#[derive(Debug)]
pub enum DossierError {
    InvalidConfiguration(String),
    Theme(String),
    /// Text could not be measured, usually because the font is not registered.
    Measurement(String),
    /// The lifecycle was driven out of order (for example drawing after finish).
    Lifecycle(String),
    Font(String),
    Data(serde_json::Error),
    Pdf(lopdf::Error),
    Io(std::io::Error),
}

impl fmt::Display for DossierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DossierError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            DossierError::Theme(message) => write!(f, "invalid theme: {}", message),
            DossierError::Measurement(message) => write!(f, "cannot measure text: {}", message),
            DossierError::Lifecycle(message) => write!(f, "page lifecycle error: {}", message),
            DossierError::Font(message) => write!(f, "font error: {}", message),
            DossierError::Data(err) => write!(f, "invalid document data: {}", err),
            DossierError::Pdf(err) => write!(f, "pdf read error: {}", err),
            DossierError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for DossierError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DossierError::Data(err) => Some(err),
            DossierError::Pdf(err) => Some(err),
            DossierError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DossierError {
    fn from(value: std::io::Error) -> Self {
        DossierError::Io(value)
    }
}

impl From<serde_json::Error> for DossierError {
    fn from(value: serde_json::Error) -> Self {
        DossierError::Data(value)
    }
}

impl From<lopdf::Error> for DossierError {
    fn from(value: lopdf::Error) -> Self {
        DossierError::Pdf(value)
    }
}
