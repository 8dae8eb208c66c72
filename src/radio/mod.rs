/// Transport capability trait and result types
pub mod traits;

pub use traits::{
    ActivationOutcome, ErrorKind, RxWindow, SendOutcome, SignalQuality, StatusCode, Transport,
    TransportError,
};
