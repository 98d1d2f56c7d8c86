use thiserror::Error;

/// Failure taxonomy shared by every agenda operation. Each variant carries the
/// human-readable reason shown back to the requesting user.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgendaError {
    #[error("Item \"{0}\" not in agenda")]
    NotFound(String),
    #[error("Item \"{0}\" already in agenda")]
    AlreadyExists(String),
    #[error("Invalid importance level \"{0}\"")]
    InvalidImportance(String),
    #[error("Invalid field \"{0}\"")]
    InvalidField(String),
    #[error("Invalid item name \"{0}\"")]
    InvalidName(String),
    #[error("{0}")]
    Store(String),
}

impl AgendaError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::InvalidImportance(_) => "invalid_importance",
            Self::InvalidField(_) => "invalid_field",
            Self::InvalidName(_) => "invalid_name",
            Self::Store(_) => "store_error",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Agenda(#[from] AgendaError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The agenda is temporarily unavailable. Please retry shortly."
            }
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Agenda(AgendaError::Store(message)) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Agenda(error) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
        }
    }
}
