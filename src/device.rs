//! Contract of the compute device the harness runs on.
//!
//! A device owns one in-order queue. Every call blocks until the queued work it depends on has
//! completed, so callers can rely on program order alone.

use crate::{PixelFormat, PlaneView, WorkSize};
use std::fmt;

/// Device status codes, negative values as reported by OpenCL implementations
pub mod status {
    pub const IMAGE_FORMAT_NOT_SUPPORTED: i32 = -10;
    pub const INVALID_VALUE: i32 = -30;
    pub const INVALID_MEM_OBJECT: i32 = -38;
    pub const INVALID_IMAGE_FORMAT_DESCRIPTOR: i32 = -39;
    pub const INVALID_IMAGE_SIZE: i32 = -40;
    pub const INVALID_SAMPLER: i32 = -41;
    pub const INVALID_KERNEL_NAME: i32 = -46;
    pub const INVALID_KERNEL: i32 = -48;
    pub const INVALID_ARG_INDEX: i32 = -49;
    pub const INVALID_ARG_VALUE: i32 = -50;
    pub const INVALID_KERNEL_ARGS: i32 = -52;
    pub const INVALID_OPERATION: i32 = -59;
    pub const INVALID_GLOBAL_WORK_SIZE: i32 = -63;
}

/// A device call failed with the given status
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("device error {status}")]
pub struct DeviceError {
    pub status: i32,
}

impl DeviceError {
    pub const fn new(status: i32) -> Self {
        Self { status }
    }
}

/// Device extensions the harness depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    /// TP10 and compressed TP10 image formats
    OtherImage,
    /// Vector image reads and writes
    VectorImageOps,
    /// Images backed by externally allocated host memory
    ExtHostPtr,
    /// ION allocations as external host memory
    IonHostPtr,
}

impl Extension {
    /// Extensions required for a run, in the order they're checked
    pub const REQUIRED: [Extension; 4] = [
        Extension::OtherImage,
        Extension::VectorImageOps,
        Extension::ExtHostPtr,
        Extension::IonHostPtr,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Extension::OtherImage => "cl_qcom_other_image",
            Extension::VectorImageOps => "cl_qcom_vector_image_ops",
            Extension::ExtHostPtr => "cl_qcom_ext_host_ptr",
            Extension::IonHostPtr => "cl_qcom_ion_host_ptr",
        }
    }

    /// What the extension is needed for, used in error reports
    pub fn purpose(&self) -> &'static str {
        match self {
            Extension::OtherImage => "the TP10 image format",
            Extension::VectorImageOps => "vector image reads/writes",
            Extension::ExtHostPtr | Extension::IonHostPtr => "ION-backed images",
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Device side access of a memory object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn readable(&self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    pub fn writable(&self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

/// Format and logical dimensions of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    pub format: PixelFormat,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    None,
    ClampToEdge,
    Clamp,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerDesc {
    pub normalized_coords: bool,
    pub addressing: AddressingMode,
    pub filter: FilterMode,
}

impl SamplerDesc {
    /// Unnormalized coordinates, clamp to edge, nearest filtering
    pub const NEAREST_CLAMP_TO_EDGE: SamplerDesc = SamplerDesc {
        normalized_coords: false,
        addressing: AddressingMode::ClampToEdge,
        filter: FilterMode::Nearest,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelArg {
    Image(MemHandle),
    Sampler(SamplerHandle),
}

/// Host access requested when mapping an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapFlags {
    pub read: bool,
    pub write: bool,
}

impl MapFlags {
    pub const READ: MapFlags = MapFlags {
        read: true,
        write: false,
    };
    pub const WRITE: MapFlags = MapFlags {
        read: false,
        write: true,
    };
    pub const READ_WRITE: MapFlags = MapFlags {
        read: true,
        write: true,
    };
}

/// Texel region of a map, always starting at the origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub width: usize,
    pub height: usize,
}

/// Host visible copy of an image region
///
/// Rows are `row_pitch` bytes apart. Changes are written back on unmap if the map was created with
/// write access.
#[derive(Debug)]
pub struct Mapping {
    pub(crate) id: u32,
    pub(crate) mem: MemHandle,
    pub(crate) flags: MapFlags,
    pub(crate) region: Region,
    pub(crate) row_pitch: usize,
    pub(crate) data: Vec<u8>,
}

impl Mapping {
    pub fn new(
        id: u32,
        mem: MemHandle,
        flags: MapFlags,
        region: Region,
        row_pitch: usize,
        data: Vec<u8>,
    ) -> Self {
        Self {
            id,
            mem,
            flags,
            region,
            row_pitch,
            data,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn mem(&self) -> MemHandle {
        self.mem
    }

    pub fn flags(&self) -> MapFlags {
        self.flags
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// `len` bytes of row `y`
    pub fn row(&self, y: usize, len: usize) -> &[u8] {
        let start = y * self.row_pitch;
        &self.data[start..start + len]
    }

    pub fn row_mut(&mut self, y: usize, len: usize) -> &mut [u8] {
        let start = y * self.row_pitch;
        &mut self.data[start..start + len]
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// An execution queue and its context
pub trait Device {
    fn supports(&self, extension: Extension) -> bool;

    /// Allocate an image backed by device memory
    fn create_image(&mut self, desc: &ImageDesc, access: AccessMode)
    -> Result<MemHandle, DeviceError>;

    /// Create an image sharing memory with `parent`, projected as described by `view`
    fn create_view(&mut self, parent: MemHandle, view: &PlaneView)
    -> Result<MemHandle, DeviceError>;

    fn create_sampler(&mut self, desc: SamplerDesc) -> Result<SamplerHandle, DeviceError>;

    /// Look up a compiled kernel entry point. Every call returns a new kernel object with its own arguments.
    fn create_kernel(&mut self, name: &str) -> Result<KernelHandle, DeviceError>;

    fn set_kernel_arg(
        &mut self,
        kernel: KernelHandle,
        index: u32,
        arg: KernelArg,
    ) -> Result<(), DeviceError>;

    /// Run `kernel` over a 2D grid of `work_size` invocations
    fn enqueue_kernel(&mut self, kernel: KernelHandle, work_size: WorkSize)
    -> Result<(), DeviceError>;

    /// Map `region` of a single plane image into host memory, blocking until all queued work is done
    fn map_image(
        &mut self,
        mem: MemHandle,
        flags: MapFlags,
        region: Region,
    ) -> Result<Mapping, DeviceError>;

    fn unmap(&mut self, mapping: Mapping) -> Result<(), DeviceError>;

    /// Block until all queued work has completed
    fn finish(&mut self) -> Result<(), DeviceError>;
}
