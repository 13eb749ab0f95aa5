//! Runs every kernel variant and validates its output against the baseline conversion.
//!
//! For each variant, in catalog order:
//!
//! 1. the variant copies the source image into one plane of the compressed image
//! 2. the baseline for that plane converts the compressed image back into the output image
//! 3. the source plane and the output plane are mapped and compared row by row
//! 4. the compared bytes of the output plane are cleared and both maps are released
//!
//! Any failure ends the run.

use crate::catalog::{KernelVariant, PlaneTarget, VARIANTS};
use crate::device::{
    AccessMode, Device, DeviceError, Extension, ImageDesc, KernelArg, KernelHandle, MapFlags,
    Mapping, MemHandle, Region, SamplerDesc, SamplerHandle,
};
use crate::error::{HarnessError, Stage};
use crate::view::{ImageId, Registry, ViewId};
use crate::{HostImage, InvalidPlaneError, PixelFormat, PlaneSelector, WorkSize};
use tracing::{debug, error, info};

/// Kernel objects and the sampler shared by every step of a run
#[derive(Debug, Clone)]
pub struct DriverConfig {
    variants: [KernelHandle; VARIANTS.len()],
    convert_y: KernelHandle,
    convert_uv: KernelHandle,
    sampler: SamplerHandle,
}

impl DriverConfig {
    /// Create a kernel object for every variant and baseline. Baselines get their own objects even
    /// when they share an entry point with a variant.
    pub fn build<D: Device + ?Sized>(device: &mut D) -> Result<Self, HarnessError> {
        let sampler = device
            .create_sampler(SamplerDesc::NEAREST_CLAMP_TO_EDGE)
            .map_err(|source| HarnessError::ResourceCreation {
                what: "sampler",
                source,
            })?;

        let mut kernel = |name: &str| {
            debug!("Creating kernel {name}");

            device
                .create_kernel(name)
                .map_err(|source| HarnessError::ResourceCreation {
                    what: "kernel",
                    source,
                })
        };

        let mut variants = [KernelHandle(0); VARIANTS.len()];

        for (handle, variant) in variants.iter_mut().zip(&VARIANTS) {
            *handle = kernel(variant.name)?;
        }

        Ok(Self {
            variants,
            convert_y: kernel(PlaneTarget::YOnly.baseline().name)?,
            convert_uv: kernel(PlaneTarget::UvOnly.baseline().name)?,
            sampler,
        })
    }

    pub fn variant(&self, index: usize) -> KernelHandle {
        self.variants[index]
    }

    pub fn baseline(&self, plane: PlaneTarget) -> KernelHandle {
        match plane {
            PlaneTarget::YOnly => self.convert_y,
            PlaneTarget::UvOnly => self.convert_uv,
        }
    }

    pub fn sampler(&self) -> SamplerHandle {
        self.sampler
    }
}

/// Images taking part in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Holds the uploaded host image, the reference of every comparison
    Source,
    /// Written by the variants, read by the baselines
    Compressed,
    /// Written by the baselines, the candidate of every comparison
    Output,
}

#[derive(Debug, Clone, Copy)]
struct ImageSet {
    image: ImageId,
    /// Y and UV views
    planes: [ViewId; 2],
}

impl ImageSet {
    fn create<D: Device + ?Sized>(
        registry: &mut Registry,
        device: &mut D,
        desc: ImageDesc,
        plane_access: AccessMode,
        what: &'static str,
    ) -> Result<Self, HarnessError> {
        let image = registry.create_image(device, desc, AccessMode::ReadOnly, what)?;

        let y = registry.derive_view(device, image, PlaneSelector::Y, plane_access, what)?;
        let uv = registry.derive_view(device, image, PlaneSelector::Uv, plane_access, what)?;

        Ok(Self {
            image,
            planes: [y, uv],
        })
    }

    fn plane(&self, plane: PlaneTarget) -> ViewId {
        match plane {
            PlaneTarget::YOnly => self.planes[0],
            PlaneTarget::UvOnly => self.planes[1],
        }
    }
}

/// Outcome of a passing variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantReport {
    pub name: &'static str,
    pub plane: PlaneTarget,
    pub work_size: WorkSize,
    pub rows: usize,
    pub bytes_per_row: usize,
}

/// Outcome of a passing run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Report {
    pub variants: Vec<VariantReport>,
}

impl Report {
    pub fn bytes_compared(&self) -> usize {
        self.variants
            .iter()
            .map(|variant| variant.rows * variant.bytes_per_row)
            .sum()
    }
}

/// A reference and a candidate plane mapped for comparison
pub struct ValidationRecord {
    pub reference: Mapping,
    pub candidate: Mapping,
    /// Bytes compared per row
    pub width: usize,
    pub height: usize,
}

impl ValidationRecord {
    /// Compare the mapped planes, clearing the compared bytes of the candidate if they're equal
    pub fn validate(&mut self, variant: usize) -> Result<(), HarnessError> {
        let reference_pitch = self.reference.row_pitch();
        let candidate_pitch = self.candidate.row_pitch();

        if reference_pitch != candidate_pitch {
            return Err(HarnessError::Consistency {
                variant,
                reference_pitch,
                candidate_pitch,
            });
        }

        for row in 0..self.height {
            let reference = self.reference.row(row, self.width);
            let candidate = self.candidate.row(row, self.width);

            if let Some(column) = reference.iter().zip(candidate).position(|(r, c)| r != c) {
                return Err(HarnessError::ValidationMismatch {
                    variant,
                    row,
                    column,
                });
            }
        }

        // Only the compared bytes, padding at the end of the rows is left as is
        for row in 0..self.height {
            self.candidate.row_mut(row, self.width).fill(0);
        }

        Ok(())
    }
}

/// Owns the images of a run on a device
pub struct Driver<'d, D: Device + ?Sized> {
    device: &'d mut D,
    registry: Registry,
    width: usize,
    height: usize,
    source: ImageSet,
    compressed: ImageSet,
    output: ImageSet,
}

impl<'d, D: Device + ?Sized> Driver<'d, D> {
    /// Check the device's capabilities, create all images and views and upload `image`
    pub fn new(device: &'d mut D, image: &HostImage) -> Result<Self, HarnessError> {
        check_capabilities(&*device)?;

        let (width, height) = (image.width(), image.height());
        let mut registry = Registry::new();

        let desc = |format| ImageDesc {
            format,
            width,
            height,
        };

        let source = ImageSet::create(
            &mut registry,
            &mut *device,
            desc(PixelFormat::Tp10),
            AccessMode::ReadOnly,
            "source image",
        )?;
        let output = ImageSet::create(
            &mut registry,
            &mut *device,
            desc(PixelFormat::Tp10),
            AccessMode::WriteOnly,
            "output image",
        )?;
        let compressed = ImageSet::create(
            &mut registry,
            &mut *device,
            desc(PixelFormat::CompressedTp10),
            AccessMode::ReadWrite,
            "compressed image",
        )?;

        let mut driver = Self {
            device,
            registry,
            width,
            height,
            source,
            compressed,
            output,
        };

        driver.upload(image)?;

        Ok(driver)
    }

    /// Create the kernels and the sampler of the run
    pub fn build_config(&mut self) -> Result<DriverConfig, HarnessError> {
        DriverConfig::build(&mut *self.device)
    }

    /// Validate every variant in catalog order, stopping at the first failure
    pub fn run(&mut self, config: &DriverConfig) -> Result<Report, HarnessError> {
        info!(
            "Validating {} variants on a {}x{} image",
            VARIANTS.len(),
            self.width,
            self.height
        );

        let mut report = Report::default();

        for (index, variant) in VARIANTS.iter().enumerate() {
            match self.run_variant(config, index, variant) {
                Ok(variant_report) => report.variants.push(variant_report),
                Err(err) => {
                    error!("Variant {index} ({variant}) failed: {err}");
                    return Err(err);
                }
            }
        }

        info!("All variants passed, {} bytes compared", report.bytes_compared());

        Ok(report)
    }

    /// Run a single variant through dispatch, baseline conversion, comparison and clear
    pub fn run_variant(
        &mut self,
        config: &DriverConfig,
        index: usize,
        variant: &KernelVariant,
    ) -> Result<VariantReport, HarnessError> {
        info!("Variant {index}: {variant} ({} reads)", variant.read);

        let work_size = variant.work_size(self.width, self.height);

        debug!("Dispatching {variant} over {}x{}", work_size.x, work_size.y);
        self.dispatch(
            config.variant(index),
            KernelArgs {
                src: Role::Source,
                dst: Role::Compressed,
                plane: variant.plane,
                sampler: config.sampler(),
            },
            work_size,
        )
        .map_err(|source| HarnessError::Binding {
            variant: index,
            stage: Stage::Variant,
            source,
        })?;

        self.dispatch_baseline(config, index, variant.plane)?;

        let mut record = self.map_for_validation(index, variant.plane)?;
        let (rows, bytes_per_row) = (record.height, record.width);

        debug!("Comparing {rows} rows of {bytes_per_row} bytes");
        let result = record.validate(index);
        let released = self.release(index, record);

        result?;
        released?;

        info!("Variant {index}: {variant} passed");

        Ok(VariantReport {
            name: variant.name,
            plane: variant.plane,
            work_size,
            rows,
            bytes_per_row,
        })
    }

    /// Convert the compressed image back into `plane` of the output image
    pub fn dispatch_baseline(
        &mut self,
        config: &DriverConfig,
        index: usize,
        plane: PlaneTarget,
    ) -> Result<(), HarnessError> {
        let baseline = plane.baseline();
        let work_size = baseline.work_size(self.width, self.height);

        debug!(
            "Dispatching baseline {} over {}x{}",
            baseline.name, work_size.x, work_size.y
        );

        self.dispatch(
            config.baseline(plane),
            KernelArgs {
                src: Role::Compressed,
                dst: Role::Output,
                plane,
                sampler: config.sampler(),
            },
            work_size,
        )
        .map_err(|source| HarnessError::Binding {
            variant: index,
            stage: Stage::Baseline,
            source,
        })
    }

    /// Copy of the compared bytes of every row of a plane
    pub fn read_plane(
        &mut self,
        role: Role,
        plane: PlaneTarget,
    ) -> Result<Vec<Vec<u8>>, HarnessError> {
        let (format, mem) = self.view(role, plane);
        let (region, width) = self.geometry(format)?;

        let mapping = self
            .device
            .map_image(mem, MapFlags::READ, region)
            .map_err(|source| HarnessError::ResourceCreation {
                what: "plane mapping",
                source,
            })?;

        let rows = (0..region.height)
            .map(|row| mapping.row(row, width).to_vec())
            .collect();

        self.device
            .unmap(mapping)
            .map_err(|source| HarnessError::ResourceCreation {
                what: "plane mapping",
                source,
            })?;

        Ok(rows)
    }

    fn view(&self, role: Role, plane: PlaneTarget) -> (PixelFormat, MemHandle) {
        let set = match role {
            Role::Source => &self.source,
            Role::Compressed => &self.compressed,
            Role::Output => &self.output,
        };

        let id = set.plane(plane);

        (self.registry.view(id).format(), self.registry.view_mem(id))
    }

    fn image_mem(&self, role: Role) -> MemHandle {
        let set = match role {
            Role::Source => &self.source,
            Role::Compressed => &self.compressed,
            Role::Output => &self.output,
        };

        self.registry.image_mem(set.image)
    }

    /// Map region and compared bytes per row of a single plane format
    fn geometry(&self, format: PixelFormat) -> Result<(Region, usize), HarnessError> {
        let no_single_plane = InvalidPlaneError {
            format,
            plane: PlaneSelector::Full,
        };

        let (width, height) = format
            .map_region(self.width, self.height)
            .ok_or(no_single_plane)?;
        let bytes = format
            .comparison_bytes(self.width)
            .ok_or(no_single_plane)?;

        Ok((Region { width, height }, bytes))
    }

    fn dispatch(
        &mut self,
        kernel: KernelHandle,
        args: KernelArgs,
        work_size: WorkSize,
    ) -> Result<(), DeviceError> {
        let src = self.image_mem(args.src);
        let (_, dst) = self.view(args.dst, args.plane);

        self.device.set_kernel_arg(kernel, 0, KernelArg::Image(src))?;
        self.device.set_kernel_arg(kernel, 1, KernelArg::Image(dst))?;
        self.device
            .set_kernel_arg(kernel, 2, KernelArg::Sampler(args.sampler))?;

        self.device.enqueue_kernel(kernel, work_size)
    }

    fn map_for_validation(
        &mut self,
        index: usize,
        plane: PlaneTarget,
    ) -> Result<ValidationRecord, HarnessError> {
        let (format, reference) = self.view(Role::Source, plane);
        let (_, candidate) = self.view(Role::Output, plane);
        let (region, width) = self.geometry(format)?;

        let binding = |source| HarnessError::Binding {
            variant: index,
            stage: Stage::Map,
            source,
        };

        let reference = self
            .device
            .map_image(reference, MapFlags::READ, region)
            .map_err(binding)?;

        let candidate = match self.device.map_image(candidate, MapFlags::READ_WRITE, region) {
            Ok(candidate) => candidate,
            Err(source) => {
                if let Err(err) = self.device.unmap(reference) {
                    error!("Failed to unmap the reference plane of variant {index}: {err}");
                }

                return Err(binding(source));
            }
        };

        Ok(ValidationRecord {
            reference,
            candidate,
            width,
            height: region.height,
        })
    }

    fn release(&mut self, index: usize, record: ValidationRecord) -> Result<(), HarnessError> {
        let unmap = |source| HarnessError::Binding {
            variant: index,
            stage: Stage::Unmap,
            source,
        };

        let candidate = self.device.unmap(record.candidate).map_err(unmap);
        let reference = self.device.unmap(record.reference).map_err(unmap);

        candidate.and(reference)
    }

    fn upload(&mut self, image: &HostImage) -> Result<(), HarnessError> {
        let failed = |source| HarnessError::ResourceCreation {
            what: "source upload",
            source,
        };

        for (plane, selector) in [
            (PlaneTarget::YOnly, PlaneSelector::Y),
            (PlaneTarget::UvOnly, PlaneSelector::Uv),
        ] {
            let (format, mem) = self.view(Role::Source, plane);
            let (region, _) = self.geometry(format)?;
            let stride = image.stride(selector)?;

            debug!(
                "Uploading {format} plane, {}x{} texels",
                region.width, region.height
            );

            let mut mapping = self
                .device
                .map_image(mem, MapFlags::WRITE, region)
                .map_err(failed)?;

            for (y, row) in image.rows(selector)?.enumerate() {
                mapping.row_mut(y, stride).copy_from_slice(row);
            }

            self.device.unmap(mapping).map_err(failed)?;
        }

        self.device.finish().map_err(failed)
    }
}

#[derive(Debug, Clone, Copy)]
struct KernelArgs {
    src: Role,
    dst: Role,
    plane: PlaneTarget,
    sampler: SamplerHandle,
}

/// Fail if the device lacks any extension the run needs
pub fn check_capabilities<D: Device + ?Sized>(device: &D) -> Result<(), HarnessError> {
    for extension in Extension::REQUIRED {
        if !device.supports(extension) {
            error!("Device does not support {extension}");
            return Err(HarnessError::Capability { extension });
        }
    }

    Ok(())
}

/// Upload `image` to `device` and validate every variant against it
pub fn run<D: Device + ?Sized>(device: &mut D, image: &HostImage) -> Result<Report, HarnessError> {
    let mut driver = Driver::new(device, image)?;
    let config = driver.build_config()?;

    driver.run(&config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pitch: usize, rows: &[&[u8]]) -> Mapping {
        let mut data = vec![0xEE; pitch * rows.len()];

        for (i, row) in rows.iter().enumerate() {
            data[i * pitch..i * pitch + row.len()].copy_from_slice(row);
        }

        Mapping::new(
            0,
            MemHandle(0),
            MapFlags::READ_WRITE,
            Region {
                width: 3,
                height: rows.len(),
            },
            pitch,
            data,
        )
    }

    #[test]
    fn equal_planes_are_cleared() {
        let mut record = ValidationRecord {
            reference: mapping(8, &[&[1, 2, 3, 4], &[5, 6, 7, 8]]),
            candidate: mapping(8, &[&[1, 2, 3, 4], &[5, 6, 7, 8]]),
            width: 4,
            height: 2,
        };

        record.validate(0).unwrap();

        // Padding past the compared width is left untouched
        assert_eq!(
            record.candidate.as_bytes(),
            &[0, 0, 0, 0, 0xEE, 0xEE, 0xEE, 0xEE, 0, 0, 0, 0, 0xEE, 0xEE, 0xEE, 0xEE]
        );
        assert_eq!(record.reference.row(1, 4), &[5, 6, 7, 8]);
    }

    #[test]
    fn first_differing_row_is_reported() {
        let mut record = ValidationRecord {
            reference: mapping(4, &[&[1, 2], &[3, 4], &[5, 6]]),
            candidate: mapping(4, &[&[1, 2], &[3, 9], &[0, 0]]),
            width: 2,
            height: 3,
        };

        let err = record.validate(4).unwrap_err();

        assert!(matches!(
            err,
            HarnessError::ValidationMismatch {
                variant: 4,
                row: 1,
                column: 1
            }
        ));
        assert_eq!(record.candidate.row(1, 2), &[3, 9]);
    }

    #[test]
    fn differences_in_padding_are_ignored() {
        let mut record = ValidationRecord {
            reference: mapping(4, &[&[1, 2, 3]]),
            candidate: mapping(4, &[&[1, 2, 4]]),
            width: 2,
            height: 1,
        };

        record.validate(0).unwrap();
    }

    #[test]
    fn pitch_mismatch_aborts() {
        let mut record = ValidationRecord {
            reference: mapping(4, &[&[1, 2]]),
            candidate: mapping(8, &[&[1, 2]]),
            width: 2,
            height: 1,
        };

        let err = record.validate(1).unwrap_err();

        assert!(matches!(
            err,
            HarnessError::Consistency {
                variant: 1,
                reference_pitch: 4,
                candidate_pitch: 8
            }
        ));
    }

    #[test]
    fn geometry_needs_a_single_plane_format() {
        let image = HostImage::blank(12, 6).unwrap();
        let mut device = crate::HostDevice::new();
        let driver = Driver::new(&mut device, &image).unwrap();

        let (region, bytes) = driver.geometry(PixelFormat::Tp10Uv).unwrap();
        assert_eq!(
            region,
            Region {
                width: 6,
                height: 3
            }
        );
        assert_eq!(bytes, 16);

        for format in [PixelFormat::Tp10, PixelFormat::CompressedTp10] {
            let err = driver.geometry(format).unwrap_err();

            assert!(
                matches!(err, HarnessError::InvalidPlane(InvalidPlaneError { format: f, .. }) if f == format),
                "{err}"
            );
        }
    }
}
