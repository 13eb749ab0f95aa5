//! Conformance harness for vector image reads and writes on TP10 images.
//!
//! A run uploads a [`HostImage`], copies it into a compressed image with each of the six
//! [`VARIANTS`], converts it back with a 1x1 baseline kernel and compares the result with the
//! upload byte for byte. The compute device is abstracted by [`Device`], [`HostDevice`] evaluates
//! the kernels in software.

pub use catalog::{Baseline, CONVERT_UV, CONVERT_Y, KernelVariant, PlaneTarget, ReadOp, VARIANTS};
pub use device::{
    AccessMode, Device, DeviceError, Extension, ImageDesc, KernelArg, KernelHandle, MapFlags,
    Mapping, MemHandle, Region, SamplerDesc, SamplerHandle,
};
pub use driver::{
    Driver, DriverConfig, Report, Role, ValidationRecord, VariantReport, check_capabilities, run,
};
pub use error::{HarnessError, Stage};
pub use host::HostDevice;
pub use image::{HostImage, ImageError};
pub use pixel_format::{InvalidPlaneError, PixelFormat, PlaneSelector};
pub use view::{ImageId, PlaneView, Registry, ViewError, ViewId};
pub use work_size::{Footprint, WorkSize};

mod catalog;
pub mod device;
mod driver;
mod error;
mod host;
mod image;
mod pixel_format;
mod plane_decs;
pub mod tp10;
mod view;
mod work_size;
