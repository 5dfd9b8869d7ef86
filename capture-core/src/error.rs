use std::borrow::Cow;

use thiserror::Error;

use crate::stream::StreamId;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    #[error("Duplicate external frame number: {0}")]
    DuplicateExternalId(u32),
    #[error("Not found: {0}")]
    NotFound(Cow<'static, str>),
    #[error("Unknown stream: {0}")]
    UnknownStream(StreamId),
    #[error("Invalid: {0}")]
    Invalid(Cow<'static, str>),
    #[error("Again: {0}")]
    Again(Cow<'static, str>),
}

#[macro_export]
macro_rules! invalid_error {
    ($param:literal) => {
        $crate::error::Error::Invalid($param.into())
    };
    ($param:expr) => {
        $crate::error::Error::Invalid(format!("{:?}", $param).into())
    };
}

