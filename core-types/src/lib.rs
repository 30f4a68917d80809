// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Shared schemas, identities, configuration, and service plumbing for the lottery reconciler.

pub mod clock;
pub mod config;
pub mod identity;
pub mod retry;
pub mod status;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::{Identity, RecordId};
pub use types::{
    Amount, CallerContext, EligibilityFlags, FieldName, LifecycleStatus, RecordFields, RoleFlags,
};
