mod error;
mod shutdown;
mod stage;

pub mod prelude {
    pub use crate::error::{DeclarationError, SchedulerFault, TransportError};
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
    pub use crate::stage::{parse_duration, RampProfile, Stage, StageOptions};
}
