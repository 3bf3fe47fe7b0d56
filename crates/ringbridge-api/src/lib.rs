// ringbridge-api: collaborator seam between the bridge core and a vendor client

pub mod client;
pub mod error;
pub mod types;

pub use client::{
    Authorized, CredentialService, DeviceControl, Directory, EventStream, TokenUpdates,
    VendorClient,
};
pub use error::Error;
pub use types::{DeviceEvent, DeviceKind, DeviceRecord, EventKind, LocationRecord, TokenUpdate};
