//! Software implementation of a [`Device`] supporting the TP10 and vector image extensions.
//!
//! Used to run the harness without hardware and as the device of the test suite.

use crate::catalog::PlaneTarget;
use crate::device::{
    AccessMode, Device, DeviceError, Extension, ImageDesc, KernelArg, KernelHandle, MapFlags,
    Mapping, MemHandle, Region, SamplerDesc, SamplerHandle, status,
};
use crate::{PixelFormat, PlaneSelector, PlaneView, WorkSize};
use kernels::{BuiltinKernel, Source};
use memory::ImageStorage;

mod kernels;
mod memory;

/// Number of arguments every built-in kernel takes: source image, destination image, sampler
const KERNEL_ARGS: usize = 3;

#[derive(Debug, Clone, Copy)]
struct MemObject {
    image: usize,
    /// Plane of the backing image, `None` for a whole planar image
    plane: Option<usize>,
    desc: ImageDesc,
    access: AccessMode,
}

struct KernelObject {
    program: &'static BuiltinKernel,
    args: [Option<KernelArg>; KERNEL_ARGS],
}

/// In-order queue evaluating kernels on the host
pub struct HostDevice {
    extensions: Vec<Extension>,
    images: Vec<ImageStorage>,
    mems: Vec<MemObject>,
    samplers: Vec<SamplerDesc>,
    kernels: Vec<KernelObject>,
    mapped: Vec<(u32, MemHandle)>,
    next_map_id: u32,
    dispatches: usize,
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDevice {
    /// Device supporting every extension the harness requires
    pub fn new() -> Self {
        Self::with_extensions(Extension::REQUIRED)
    }

    pub fn with_extensions(extensions: impl IntoIterator<Item = Extension>) -> Self {
        Self {
            extensions: extensions.into_iter().collect(),
            images: vec![],
            mems: vec![],
            samplers: vec![],
            kernels: vec![],
            mapped: vec![],
            next_map_id: 0,
            dispatches: 0,
        }
    }

    /// Number of images and views created so far
    pub fn mem_objects(&self) -> usize {
        self.mems.len()
    }

    /// Number of kernels enqueued so far
    pub fn dispatches(&self) -> usize {
        self.dispatches
    }

    /// Number of maps not yet unmapped
    pub fn outstanding_maps(&self) -> usize {
        self.mapped.len()
    }

    fn mem(&self, mem: MemHandle) -> Result<&MemObject, DeviceError> {
        self.mems
            .get(mem.0 as usize)
            .ok_or(DeviceError::new(status::INVALID_MEM_OBJECT))
    }

    fn kernel_mut(&mut self, kernel: KernelHandle) -> Result<&mut KernelObject, DeviceError> {
        self.kernels
            .get_mut(kernel.0 as usize)
            .ok_or(DeviceError::new(status::INVALID_KERNEL))
    }

    fn push_mem(&mut self, mem: MemObject) -> MemHandle {
        self.mems.push(mem);
        MemHandle(self.mems.len() as u32 - 1)
    }

    /// Resolve the image arguments of a kernel, checking they fit its signature
    fn resolve_args(
        &self,
        kernel: &KernelObject,
    ) -> Result<(MemObject, MemObject), DeviceError> {
        let invalid = DeviceError::new(status::INVALID_KERNEL_ARGS);

        let [Some(KernelArg::Image(src)), Some(KernelArg::Image(dst)), Some(KernelArg::Sampler(_))] =
            kernel.args
        else {
            return Err(invalid);
        };

        let src = *self.mem(src)?;
        let dst = *self.mem(dst)?;

        if src.plane.is_some() || !src.access.readable() {
            return Err(invalid);
        }

        let expected = match kernel.program.target {
            PlaneTarget::YOnly => 0,
            PlaneTarget::UvOnly => 1,
        };

        if single_plane_index(dst.desc.format) != Some(expected) || !dst.access.writable() {
            return Err(invalid);
        }

        Ok((src, dst))
    }
}

/// Which plane of its planar parent a single plane format is
fn single_plane_index(format: PixelFormat) -> Option<usize> {
    match format {
        PixelFormat::Tp10Y | PixelFormat::CompressedTp10Y => Some(0),
        PixelFormat::Tp10Uv | PixelFormat::CompressedTp10Uv => Some(1),
        PixelFormat::Tp10 | PixelFormat::CompressedTp10 => None,
    }
}

impl Device for HostDevice {
    fn supports(&self, extension: Extension) -> bool {
        self.extensions.contains(&extension)
    }

    fn create_image(
        &mut self,
        desc: &ImageDesc,
        access: AccessMode,
    ) -> Result<MemHandle, DeviceError> {
        if !self.supports(Extension::OtherImage) {
            return Err(DeviceError::new(status::IMAGE_FORMAT_NOT_SUPPORTED));
        }

        if desc.width == 0 || desc.height == 0 || desc.width % 2 != 0 || desc.height % 2 != 0 {
            return Err(DeviceError::new(status::INVALID_IMAGE_SIZE));
        }

        self.images.push(ImageStorage::new(*desc));

        let plane = (!desc.format.is_planar()).then_some(0);

        Ok(self.push_mem(MemObject {
            image: self.images.len() - 1,
            plane,
            desc: *desc,
            access,
        }))
    }

    fn create_view(
        &mut self,
        parent: MemHandle,
        view: &PlaneView,
    ) -> Result<MemHandle, DeviceError> {
        let parent = *self.mem(parent)?;

        let format = parent
            .desc
            .format
            .plane(view.plane())
            .map_err(|_| DeviceError::new(status::INVALID_IMAGE_FORMAT_DESCRIPTOR))?;

        if format != view.format() {
            return Err(DeviceError::new(status::INVALID_IMAGE_FORMAT_DESCRIPTOR));
        }

        // Views of planes keep the parent's dimensions
        if view.width() != parent.desc.width || view.height() != parent.desc.height {
            return Err(DeviceError::new(status::INVALID_IMAGE_SIZE));
        }

        let plane = match view.plane() {
            PlaneSelector::Full => parent.plane,
            PlaneSelector::Y => Some(0),
            PlaneSelector::Uv => Some(1),
        };

        Ok(self.push_mem(MemObject {
            image: parent.image,
            plane,
            desc: view.desc(),
            access: view.access(),
        }))
    }

    fn create_sampler(&mut self, desc: SamplerDesc) -> Result<SamplerHandle, DeviceError> {
        // Vector reads are only defined for this sampler
        if desc != SamplerDesc::NEAREST_CLAMP_TO_EDGE {
            return Err(DeviceError::new(status::INVALID_VALUE));
        }

        self.samplers.push(desc);

        Ok(SamplerHandle(self.samplers.len() as u32 - 1))
    }

    fn create_kernel(&mut self, name: &str) -> Result<KernelHandle, DeviceError> {
        let program = kernels::find(name).ok_or(DeviceError::new(status::INVALID_KERNEL_NAME))?;

        self.kernels.push(KernelObject {
            program,
            args: [None; KERNEL_ARGS],
        });

        Ok(KernelHandle(self.kernels.len() as u32 - 1))
    }

    fn set_kernel_arg(
        &mut self,
        kernel: KernelHandle,
        index: u32,
        arg: KernelArg,
    ) -> Result<(), DeviceError> {
        match arg {
            KernelArg::Image(mem) => {
                self.mem(mem)?;
            }
            KernelArg::Sampler(sampler) => {
                if sampler.0 as usize >= self.samplers.len() {
                    return Err(DeviceError::new(status::INVALID_SAMPLER));
                }
            }
        }

        let kernel = self.kernel_mut(kernel)?;

        let slot = kernel
            .args
            .get_mut(index as usize)
            .ok_or(DeviceError::new(status::INVALID_ARG_INDEX))?;

        let fits = matches!(
            (index, arg),
            (0 | 1, KernelArg::Image(_)) | (2, KernelArg::Sampler(_))
        );

        if !fits {
            return Err(DeviceError::new(status::INVALID_ARG_VALUE));
        }

        *slot = Some(arg);

        Ok(())
    }

    fn enqueue_kernel(
        &mut self,
        kernel: KernelHandle,
        work_size: WorkSize,
    ) -> Result<(), DeviceError> {
        if !self.supports(Extension::VectorImageOps) {
            return Err(DeviceError::new(status::INVALID_OPERATION));
        }

        if work_size.is_empty() {
            return Err(DeviceError::new(status::INVALID_GLOBAL_WORK_SIZE));
        }

        let object = self
            .kernels
            .get(kernel.0 as usize)
            .ok_or(DeviceError::new(status::INVALID_KERNEL))?;

        let (src, dst) = self.resolve_args(object)?;
        let program = object.program;

        let source = Source::new(&self.images[src.image])
            .ok_or(DeviceError::new(status::INVALID_KERNEL_ARGS))?;

        let writes = program.run(&source, work_size);

        let plane_index = dst.plane.ok_or(DeviceError::new(status::INVALID_KERNEL_ARGS))?;
        let plane = &mut self.images[dst.image].planes[plane_index];

        for write in &writes {
            write.apply(plane);
        }

        self.dispatches += 1;

        Ok(())
    }

    fn map_image(
        &mut self,
        mem: MemHandle,
        flags: MapFlags,
        region: Region,
    ) -> Result<Mapping, DeviceError> {
        let object = *self.mem(mem)?;

        // Planar and compressed images aren't host accessible, only planes of linear images are
        let plane_index = object
            .plane
            .filter(|_| !object.desc.format.is_compressed())
            .ok_or(DeviceError::new(status::INVALID_OPERATION))?;

        let (max_width, max_height) = object
            .desc
            .format
            .map_region(object.desc.width, object.desc.height)
            .ok_or(DeviceError::new(status::INVALID_OPERATION))?;

        if region.width == 0
            || region.height == 0
            || region.width > max_width
            || region.height > max_height
        {
            return Err(DeviceError::new(status::INVALID_VALUE));
        }

        let plane = &self.images[object.image].planes[plane_index];
        let data = plane.data[..plane.stride * region.height].to_vec();

        let id = self.next_map_id;
        self.next_map_id += 1;
        self.mapped.push((id, mem));

        Ok(Mapping::new(id, mem, flags, region, plane.stride, data))
    }

    fn unmap(&mut self, mapping: Mapping) -> Result<(), DeviceError> {
        let position = self
            .mapped
            .iter()
            .position(|&(id, mem)| id == mapping.id() && mem == mapping.mem())
            .ok_or(DeviceError::new(status::INVALID_VALUE))?;

        self.mapped.swap_remove(position);

        if mapping.flags().write {
            let object = *self.mem(mapping.mem())?;
            let plane_index = object
                .plane
                .ok_or(DeviceError::new(status::INVALID_MEM_OBJECT))?;

            let plane = &mut self.images[object.image].planes[plane_index];
            let data = mapping.into_data();

            plane.data[..data.len()].copy_from_slice(&data);
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Registry;

    const DESC: ImageDesc = ImageDesc {
        format: PixelFormat::Tp10,
        width: 12,
        height: 4,
    };

    #[test]
    fn planar_images_are_not_mappable() {
        let mut device = HostDevice::new();
        let image = device.create_image(&DESC, AccessMode::ReadOnly).unwrap();

        let err = device
            .map_image(
                image,
                MapFlags::READ,
                Region {
                    width: 12,
                    height: 4,
                },
            )
            .unwrap_err();

        assert_eq!(err.status, status::INVALID_OPERATION);
    }

    #[test]
    fn mapped_writes_land_in_the_plane() {
        let mut device = HostDevice::new();
        let mut registry = Registry::new();

        let image = registry
            .create_image(&mut device, DESC, AccessMode::ReadOnly, "image")
            .unwrap();
        let uv = registry
            .derive_view(&mut device, image, PlaneSelector::Uv, AccessMode::ReadOnly, "uv")
            .unwrap();

        let region = Region {
            width: 6,
            height: 2,
        };

        let mut mapping = device
            .map_image(registry.view_mem(uv), MapFlags::WRITE, region)
            .unwrap();
        assert_eq!(mapping.row_pitch(), 64);
        assert_eq!(mapping.region(), region);
        mapping.row_mut(1, 4).copy_from_slice(&[1, 2, 3, 4]);
        device.unmap(mapping).unwrap();

        let mapping = device
            .map_image(registry.view_mem(uv), MapFlags::READ, region)
            .unwrap();
        assert_eq!(mapping.row(1, 5), &[1, 2, 3, 4, 0]);
        device.unmap(mapping).unwrap();

        assert_eq!(device.outstanding_maps(), 0);
    }

    #[test]
    fn uv_map_region_is_bounded_by_sub_sampling() {
        let mut device = HostDevice::new();
        let mut registry = Registry::new();

        let image = registry
            .create_image(&mut device, DESC, AccessMode::ReadOnly, "image")
            .unwrap();
        let uv = registry
            .derive_view(&mut device, image, PlaneSelector::Uv, AccessMode::ReadOnly, "uv")
            .unwrap();

        let err = device
            .map_image(
                registry.view_mem(uv),
                MapFlags::READ,
                Region {
                    width: 12,
                    height: 4,
                },
            )
            .unwrap_err();

        assert_eq!(err.status, status::INVALID_VALUE);
    }

    #[test]
    fn unknown_kernel_name() {
        let mut device = HostDevice::new();

        assert_eq!(
            device.create_kernel("read_yuv_8x8_write_y_3x1"),
            Err(DeviceError::new(status::INVALID_KERNEL_NAME))
        );
    }

    #[test]
    fn kernel_objects_are_distinct() {
        let mut device = HostDevice::new();

        let a = device.create_kernel("read_yuv_1x1_write_y_3x1").unwrap();
        let b = device.create_kernel("read_yuv_1x1_write_y_3x1").unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn arguments_are_type_checked() {
        let mut device = HostDevice::new();
        let kernel = device.create_kernel("read_yuv_4x1_write_y_3x1").unwrap();
        let sampler = device
            .create_sampler(SamplerDesc::NEAREST_CLAMP_TO_EDGE)
            .unwrap();

        assert_eq!(
            device.set_kernel_arg(kernel, 0, KernelArg::Sampler(sampler)),
            Err(DeviceError::new(status::INVALID_ARG_VALUE))
        );
        assert_eq!(
            device.set_kernel_arg(kernel, 3, KernelArg::Sampler(sampler)),
            Err(DeviceError::new(status::INVALID_ARG_INDEX))
        );
        assert_eq!(
            device.set_kernel_arg(kernel, 0, KernelArg::Image(MemHandle(9))),
            Err(DeviceError::new(status::INVALID_MEM_OBJECT))
        );
    }

    #[test]
    fn kernels_need_all_arguments() {
        let mut device = HostDevice::new();
        let kernel = device.create_kernel("read_yuv_4x1_write_y_3x1").unwrap();

        assert_eq!(
            device.enqueue_kernel(kernel, WorkSize { x: 1, y: 1 }),
            Err(DeviceError::new(status::INVALID_KERNEL_ARGS))
        );
        assert_eq!(device.dispatches(), 0);
    }

    #[test]
    fn destination_must_be_the_written_plane() {
        let mut device = HostDevice::new();
        let mut registry = Registry::new();

        let src = registry
            .create_image(&mut device, DESC, AccessMode::ReadOnly, "src")
            .unwrap();
        let compressed = registry
            .create_image(
                &mut device,
                ImageDesc {
                    format: PixelFormat::CompressedTp10,
                    ..DESC
                },
                AccessMode::ReadOnly,
                "compressed",
            )
            .unwrap();
        let uv = registry
            .derive_view(
                &mut device,
                compressed,
                PlaneSelector::Uv,
                AccessMode::ReadWrite,
                "uv",
            )
            .unwrap();

        let sampler = device
            .create_sampler(SamplerDesc::NEAREST_CLAMP_TO_EDGE)
            .unwrap();
        let kernel = device.create_kernel("read_yuv_1x1_write_y_3x1").unwrap();

        device
            .set_kernel_arg(kernel, 0, KernelArg::Image(registry.image_mem(src)))
            .unwrap();
        device
            .set_kernel_arg(kernel, 1, KernelArg::Image(registry.view_mem(uv)))
            .unwrap();
        device
            .set_kernel_arg(kernel, 2, KernelArg::Sampler(sampler))
            .unwrap();

        assert_eq!(
            device.enqueue_kernel(kernel, WorkSize { x: 4, y: 4 }),
            Err(DeviceError::new(status::INVALID_KERNEL_ARGS))
        );
    }

    #[test]
    fn only_the_vector_sampler_is_supported() {
        let mut device = HostDevice::new();

        let linear = SamplerDesc {
            filter: crate::device::FilterMode::Linear,
            ..SamplerDesc::NEAREST_CLAMP_TO_EDGE
        };

        assert_eq!(
            device.create_sampler(linear),
            Err(DeviceError::new(status::INVALID_VALUE))
        );
    }

    #[test]
    fn formats_need_the_extension() {
        let mut device = HostDevice::with_extensions([Extension::VectorImageOps]);

        assert_eq!(
            device.create_image(&DESC, AccessMode::ReadOnly),
            Err(DeviceError::new(status::IMAGE_FORMAT_NOT_SUPPORTED))
        );
    }
}
