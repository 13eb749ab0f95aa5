use crate::device::{AccessMode, Device, DeviceError, ImageDesc, MemHandle};
use crate::{InvalidPlaneError, PixelFormat, PlaneSelector};

/// Index of an image owned by a [`Registry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(usize);

/// Index of a view owned by a [`Registry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(usize);

/// Projection of one plane of a parent image, sharing the parent's memory
///
/// The reported width and height are always the parent's, even for the sub sampled UV plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneView {
    parent: ImageId,
    plane: PlaneSelector,
    access: AccessMode,
    format: PixelFormat,
    width: usize,
    height: usize,
}

/// Everything that can go wrong when registering images and views
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error(transparent)]
    InvalidPlane(#[from] InvalidPlaneError),

    #[error("failed to create {what}: {source}")]
    Device {
        what: &'static str,
        #[source]
        source: DeviceError,
    },
}

impl PlaneView {
    /// Describe the view selecting `plane` from `parent`, without touching any pixel data
    pub fn derive(
        parent: ImageId,
        desc: &ImageDesc,
        plane: PlaneSelector,
        access: AccessMode,
    ) -> Result<Self, InvalidPlaneError> {
        let format = desc.format.plane(plane)?;

        Ok(Self {
            parent,
            plane,
            access,
            format,
            width: desc.width,
            height: desc.height,
        })
    }

    pub fn parent(&self) -> ImageId {
        self.parent
    }

    pub fn plane(&self) -> PlaneSelector {
        self.plane
    }

    pub fn access(&self) -> AccessMode {
        self.access
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn desc(&self) -> ImageDesc {
        ImageDesc {
            format: self.format,
            width: self.width,
            height: self.height,
        }
    }
}

struct ImageEntry {
    desc: ImageDesc,
    mem: MemHandle,
}

struct ViewEntry {
    view: PlaneView,
    mem: MemHandle,
}

/// Owns every image and view of a run, views refer to their parent by [`ImageId`]
#[derive(Default)]
pub struct Registry {
    images: Vec<ImageEntry>,
    views: Vec<ViewEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_image<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        desc: ImageDesc,
        access: AccessMode,
        what: &'static str,
    ) -> Result<ImageId, ViewError> {
        let mem = device
            .create_image(&desc, access)
            .map_err(|source| ViewError::Device { what, source })?;

        self.images.push(ImageEntry { desc, mem });

        Ok(ImageId(self.images.len() - 1))
    }

    pub fn derive_view<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        parent: ImageId,
        plane: PlaneSelector,
        access: AccessMode,
        what: &'static str,
    ) -> Result<ViewId, ViewError> {
        let entry = &self.images[parent.0];
        let view = PlaneView::derive(parent, &entry.desc, plane, access)?;

        let mem = device
            .create_view(entry.mem, &view)
            .map_err(|source| ViewError::Device { what, source })?;

        self.views.push(ViewEntry { view, mem });

        Ok(ViewId(self.views.len() - 1))
    }

    pub fn image(&self, id: ImageId) -> &ImageDesc {
        &self.images[id.0].desc
    }

    pub fn image_mem(&self, id: ImageId) -> MemHandle {
        self.images[id.0].mem
    }

    pub fn view(&self, id: ViewId) -> &PlaneView {
        &self.views[id.0].view
    }

    pub fn view_mem(&self, id: ViewId) -> MemHandle {
        self.views[id.0].mem
    }
}
