//! Mapping of transport errors and failed outcomes onto the error taxonomy

use crate::error::Error;
use crate::protocol::{LogicalCode, RegistrationOutcome};
use crate::traits::transport::TransportError;

pub(crate) fn classify_transport_error(err: &TransportError) -> Error {
    match err {
        TransportError::Connect(detail) => {
            Error::registration(format!("broker unreachable: {detail}"))
        }
        TransportError::Timeout => Error::registration("broker request timed out"),
        TransportError::InvalidResponse(detail) => {
            Error::registration(format!("unusable broker response: {detail}"))
        }
    }
}

/// Turn a non-success outcome into the error surfaced to the caller. Broker
/// "not found" during an update maps to a transport-class registration error
/// rather than `DeviceNotFound`, which is reserved for the local store.
pub(crate) fn classify_failed_outcome(outcome: &RegistrationOutcome) -> Error {
    match outcome {
        RegistrationOutcome::TransportFailure => {
            Error::registration("broker returned an unusable response")
        }
        RegistrationOutcome::LogicalFailure {
            code: LogicalCode::NotFound,
            detail,
        } => Error::registration(match detail {
            Some(detail) => format!("registration unknown to broker: {detail}"),
            None => "registration unknown to broker".to_string(),
        }),
        RegistrationOutcome::LogicalFailure {
            code: LogicalCode::Rejected,
            detail,
        } => Error::logical_rejection(
            detail
                .clone()
                .unwrap_or_else(|| "no reason supplied".to_string()),
        ),
        RegistrationOutcome::Success { .. } => {
            Error::registration("success outcome reached failure classifier")
        }
    }
}
