//! Media exchanged with the engine: image tensors and video frame sequences.

use ndarray::Array4;

/// An image as an NCHW float tensor with a batch dimension of 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Array4<f32>,
}

impl ImageTensor {
    pub fn new(data: Array4<f32>) -> Self {
        Self { data }
    }

    /// Blank image of the given geometry
    pub fn zeros(channels: usize, height: usize, width: usize) -> Self {
        Self::new(Array4::zeros((1, channels, height, width)))
    }

    pub fn channels(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn height(&self) -> usize {
        self.data.shape()[2]
    }

    pub fn width(&self) -> usize {
        self.data.shape()[3]
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn into_array(self) -> Array4<f32> {
        self.data
    }
}

/// Decoded video frames at a fixed frame rate.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrames {
    pub frames: Vec<ImageTensor>,
    pub fps: f32,
}

impl VideoFrames {
    pub fn new(frames: Vec<ImageTensor>, fps: f32) -> Self {
        Self { frames, fps }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Input or control media attached to a request.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaInput {
    Image(ImageTensor),
    Video(VideoFrames),
}

impl MediaInput {
    pub fn as_image(&self) -> Option<&ImageTensor> {
        match self {
            Self::Image(image) => Some(image),
            Self::Video(_) => None,
        }
    }

    pub fn as_video(&self) -> Option<&VideoFrames> {
        match self {
            Self::Image(_) => None,
            Self::Video(video) => Some(video),
        }
    }
}

/// Which kind of media a generation produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

/// Media produced by a generation
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedMedia {
    Image(ImageTensor),
    Video(VideoFrames),
}

impl GeneratedMedia {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Image(_) => MediaKind::Image,
            Self::Video(_) => MediaKind::Video,
        }
    }

    pub fn as_image(&self) -> Option<&ImageTensor> {
        match self {
            Self::Image(image) => Some(image),
            Self::Video(_) => None,
        }
    }

    pub fn as_video(&self) -> Option<&VideoFrames> {
        match self {
            Self::Image(_) => None,
            Self::Video(video) => Some(video),
        }
    }
}
