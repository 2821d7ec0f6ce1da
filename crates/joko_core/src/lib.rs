pub mod init;
pub mod trace;

pub use cap_std::fs::Dir;

pub mod prelude {
    pub use enumflags2::{self, bitflags, BitFlags};
    pub use glam::{DVec2, DVec3};
    pub use miette;
    pub use miette::{bail, Context, Diagnostic, IntoDiagnostic, Result};
    pub use serde;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{from_reader, from_str, to_string, to_string_pretty};
    pub use std::collections::{BTreeMap, HashMap};
    pub use std::sync::Arc;
    pub use thiserror::{self, Error};
    pub use time::OffsetDateTime;
    pub use tracing::{
        debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
    };
}
